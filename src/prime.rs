use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};

use crate::randutil::{random_below, random_bits};

const MILLER_RABIN_ROUNDS: usize = 40;

const SMALL_PRIMES: [u32; 24] = [
    2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43, 47, 53, 59, 61, 67, 71, 73, 79, 83, 89,
];

// Miller–Rabin primality test
pub fn is_probable_prime<R: RngCore + CryptoRng>(n: &BigUint, rng: &mut R) -> bool {
    if *n < BigUint::from(2u32) {
        return false;
    }
    for &p in SMALL_PRIMES.iter() {
        let p = BigUint::from(p);
        if *n == p {
            return true;
        }
        if (n % &p).is_zero() {
            return false;
        }
    }

    let one = BigUint::one();
    let n_minus_one = n - 1u32;
    let mut d = n_minus_one.clone();
    let mut s = 0u32;
    while (&d % 2u32).is_zero() {
        d >>= 1;
        s += 1;
    }

    // witnesses are drawn from [2, n - 2]
    let witness_range = n - 3u32;
    for _ in 0..MILLER_RABIN_ROUNDS {
        let a = random_below(&witness_range, rng) + 2u32;
        let mut x = a.modpow(&d, n);
        if x == one || x == n_minus_one {
            continue;
        }
        let mut composite = true;
        for _ in 1..s {
            x = (&x * &x) % n;
            if x == n_minus_one {
                composite = false;
                break;
            }
        }
        if composite {
            return false;
        }
    }
    true
}

/// Probable prime with exactly `bits` bits.
pub fn random_prime<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> BigUint {
    debug_assert!(bits >= 2);
    loop {
        let mut candidate = random_bits(bits, rng);
        candidate |= BigUint::one() << (bits - 1);
        candidate |= BigUint::one();

        if is_probable_prime(&candidate, rng) {
            return candidate;
        }
    }
}

/// Safe prime pair `(p, q)` with `p = 2q + 1`, `q` having `bits` bits.
pub fn random_safe_prime<R: RngCore + CryptoRng>(bits: u64, rng: &mut R) -> (BigUint, BigUint) {
    loop {
        let q = random_prime(bits, rng);
        let p = (&q << 1) + 1u32;
        if is_probable_prime(&p, rng) {
            return (p, q);
        }
    }
}
