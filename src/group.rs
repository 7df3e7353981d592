use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::mpi::{BigInteger, PrimeGenerator};

/// Safe-prime group: `p = 2q + 1` with `g` generating the subgroup of order `q`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupZpValues {
    pub p: BigInteger,
    pub q: BigInteger,
    pub g: BigInteger,
}

impl GroupZpValues {
    pub fn generate<R: RngCore + CryptoRng>(nbits: u64, rng: &mut R) -> Self {
        let (p, q) = PrimeGenerator::new(nbits).generate_safe(rng);
        let g = find_generator(&p, &q);
        Self { p, q, g }
    }

    /// `true` when `p = 2q + 1`, both prime, and `g` has order `q`.
    pub fn is_valid(&self) -> bool {
        let two = BigInteger::from(2u64);
        self.p == &two * &self.q + BigInteger::one()
            && self.q.is_prime()
            && self.p.is_prime()
            && self.g > BigInteger::one()
            && self.g < self.p
            && self.g.pow_mod(&self.q, &self.p) == BigInteger::one()
    }

    /// `base^exponent mod p`.
    pub fn pow(&self, base: &BigInteger, exponent: &BigInteger) -> BigInteger {
        base.pow_mod(exponent, &self.p)
    }

    /// `g^exponent mod p`, the exponent reduced modulo `q` first.
    pub fn g_pow(&self, exponent: &BigInteger) -> BigInteger {
        self.g.pow_mod(&(exponent % &self.q), &self.p)
    }

    pub fn mul(&self, a: &BigInteger, b: &BigInteger) -> BigInteger {
        (a * b) % &self.p
    }
}

// smallest g >= 2 with g^(q+1) == g, i.e. a quadratic residue
fn find_generator(p: &BigInteger, q: &BigInteger) -> BigInteger {
    let exponent = q + BigInteger::one();
    let mut g = BigInteger::from(2u64);
    while g.pow_mod(&exponent, p) != g {
        g.increment();
    }
    g
}
