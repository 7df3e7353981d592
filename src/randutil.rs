use num_bigint::BigUint;
use num_traits::Zero;
use rand::{CryptoRng, RngCore};

/// Uniform value with at most `nbits` bits.
pub fn random_bits<R: RngCore + CryptoRng>(nbits: u64, rng: &mut R) -> BigUint {
    if nbits == 0 {
        return BigUint::zero();
    }
    let mut buf = vec![0u8; nbits.div_ceil(8) as usize];
    rng.fill_bytes(&mut buf);
    // clear the excess high bits of the leading byte
    let excess = (buf.len() as u64) * 8 - nbits;
    buf[0] &= 0xffu8 >> excess;
    BigUint::from_bytes_be(&buf)
}

/// Uniform value in `[0, bound)` by rejection sampling. `bound` must be positive.
pub fn random_below<R: RngCore + CryptoRng>(bound: &BigUint, rng: &mut R) -> BigUint {
    debug_assert!(!bound.is_zero());
    let nbits = bound.bits();
    loop {
        let candidate = random_bits(nbits, rng);
        if &candidate < bound {
            return candidate;
        }
    }
}
