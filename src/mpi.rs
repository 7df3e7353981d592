//! Arbitrary-precision integers used throughout the scheme.
//!
//! `BigInteger` wraps a signed [`BigInt`] so that intermediate differences may
//! go negative, but every modular reduction (`%`, [`BigInteger::pow_mod`],
//! [`BigInteger::inv_mod`]) is floored: for a positive modulus the result
//! always lies in `[0, modulus)`. Division is floored as well, so
//! `a == (a / m) * m + a % m` holds for every sign combination.

use core::fmt;
use core::ops::{Add, Div, Mul, Neg, Rem, Sub};
use core::str::FromStr;

use num_bigint::{BigInt, BigUint, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{MathError, Result};
use crate::prime::{is_probable_prime, random_prime, random_safe_prime};
use crate::randutil::random_bits;

#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BigInteger(BigInt);

impl BigInteger {
    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn one() -> Self {
        Self(BigInt::one())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_negative()
    }

    pub fn bits(&self) -> u64 {
        self.0.bits()
    }

    /// Prefix increment.
    pub fn increment(&mut self) -> &Self {
        self.0 += 1u32;
        self
    }

    /// Prefix decrement.
    pub fn decrement(&mut self) -> &Self {
        self.0 -= 1u32;
        self
    }

    /// `self^exponent mod modulus`, in `[0, modulus)`.
    ///
    /// The exponent must be non-negative; every exponent in the scheme is
    /// reduced modulo a group order before it gets here.
    pub fn pow_mod(&self, exponent: &BigInteger, modulus: &BigInteger) -> BigInteger {
        debug_assert!(!exponent.is_negative(), "negative exponent");
        debug_assert!(modulus.0.is_positive(), "non-positive modulus");
        let exponent = BigInt::from(exponent.0.magnitude().clone());
        Self(self.0.modpow(&exponent, &modulus.0))
    }

    /// Inverse of `self` modulo `modulus`, in `[0, modulus)`.
    ///
    /// Fails when `gcd(self, modulus) != 1`.
    pub fn inv_mod(&self, modulus: &BigInteger) -> Result<BigInteger> {
        if !modulus.0.is_positive() {
            return Err(MathError::ZeroModulus.into());
        }
        let a = self.0.mod_floor(&modulus.0);
        let (g, x) = extended_gcd(a, modulus.0.clone());
        if !g.is_one() {
            return Err(MathError::NotInvertible.into());
        }
        Ok(Self(x.mod_floor(&modulus.0)))
    }

    /// Probabilistic primality test (Miller–Rabin).
    pub fn is_prime(&self) -> bool {
        match self.0.to_biguint() {
            Some(n) => is_probable_prime(&n, &mut rand::rng()),
            None => false,
        }
    }

    /// Lowercase hexadecimal, with a leading `-` for negative values.
    pub fn to_hex(&self) -> String {
        self.0.to_str_radix(16)
    }

    pub fn from_hex(hex: &str) -> Option<BigInteger> {
        let (sign, digits) = match hex.strip_prefix('-') {
            Some(rest) => (Sign::Minus, rest),
            None => (Sign::Plus, hex),
        };
        if digits.is_empty() {
            return None;
        }
        let magnitude = BigUint::parse_bytes(digits.as_bytes(), 16)?;
        Some(Self(BigInt::from_biguint(sign, magnitude)))
    }

    pub fn from_biguint(value: BigUint) -> Self {
        Self(BigInt::from(value))
    }

    /// Magnitude as big-endian bytes.
    pub fn to_bytes_be(&self) -> Vec<u8> {
        self.0.magnitude().to_bytes_be()
    }

    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Self(BigInt::from_bytes_be(Sign::Plus, bytes))
    }
}

// iterative extended Euclid, returns (gcd, x) with a*x ≡ gcd (mod b)
fn extended_gcd(a: BigInt, b: BigInt) -> (BigInt, BigInt) {
    let (mut old_r, mut r) = (a, b);
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    while !r.is_zero() {
        let quotient = old_r.div_floor(&r);
        let next_r = &old_r - &quotient * &r;
        old_r = core::mem::replace(&mut r, next_r);
        let next_s = &old_s - &quotient * &s;
        old_s = core::mem::replace(&mut s, next_s);
    }
    (old_r, old_s)
}

/// Draws uniform values of a fixed bit width.
#[derive(Clone, Copy, Debug)]
pub struct RandomGenerator {
    nbits: u64,
}

impl RandomGenerator {
    pub fn new(nbits: u64) -> Self {
        Self { nbits }
    }

    pub fn generate<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigInteger {
        BigInteger::from_biguint(random_bits(self.nbits, rng))
    }
}

/// Draws probable primes of a fixed bit width.
#[derive(Clone, Copy, Debug)]
pub struct PrimeGenerator {
    nbits: u64,
}

impl PrimeGenerator {
    pub fn new(nbits: u64) -> Self {
        Self { nbits }
    }

    pub fn generate<R: RngCore + CryptoRng>(&self, rng: &mut R) -> BigInteger {
        BigInteger::from_biguint(random_prime(self.nbits, rng))
    }

    /// Safe prime pair `(p, q)` with `p = 2q + 1` and `q` of the generator's width.
    pub fn generate_safe<R: RngCore + CryptoRng>(&self, rng: &mut R) -> (BigInteger, BigInteger) {
        let (p, q) = random_safe_prime(self.nbits, rng);
        (BigInteger::from_biguint(p), BigInteger::from_biguint(q))
    }
}

impl From<u64> for BigInteger {
    fn from(value: u64) -> Self {
        Self(BigInt::from(value))
    }
}

impl From<usize> for BigInteger {
    fn from(value: usize) -> Self {
        Self(BigInt::from(value))
    }
}

impl From<i64> for BigInteger {
    fn from(value: i64) -> Self {
        Self(BigInt::from(value))
    }
}

impl fmt::Display for BigInteger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for BigInteger {
    type Err = MathError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| MathError::MalformedInteger(s.to_owned()))
    }
}

impl Serialize for BigInteger {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for BigInteger {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        if hex.starts_with('-') {
            return Err(serde::de::Error::custom("negative integer on the wire"));
        }
        BigInteger::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom("malformed hexadecimal integer"))
    }
}

impl Neg for BigInteger {
    type Output = BigInteger;

    fn neg(self) -> BigInteger {
        BigInteger(-self.0)
    }
}

impl Neg for &BigInteger {
    type Output = BigInteger;

    fn neg(self) -> BigInteger {
        BigInteger(-&self.0)
    }
}

macro_rules! forward_binop {
    ($trait:ident, $method:ident, |$a:ident, $b:ident| $body:expr) => {
        impl $trait<&BigInteger> for &BigInteger {
            type Output = BigInteger;

            fn $method(self, rhs: &BigInteger) -> BigInteger {
                let ($a, $b) = (&self.0, &rhs.0);
                BigInteger($body)
            }
        }

        impl $trait<BigInteger> for BigInteger {
            type Output = BigInteger;

            fn $method(self, rhs: BigInteger) -> BigInteger {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&BigInteger> for BigInteger {
            type Output = BigInteger;

            fn $method(self, rhs: &BigInteger) -> BigInteger {
                (&self).$method(rhs)
            }
        }

        impl $trait<BigInteger> for &BigInteger {
            type Output = BigInteger;

            fn $method(self, rhs: BigInteger) -> BigInteger {
                self.$method(&rhs)
            }
        }
    };
}

forward_binop!(Add, add, |a, b| a + b);
forward_binop!(Sub, sub, |a, b| a - b);
forward_binop!(Mul, mul, |a, b| a * b);
forward_binop!(Div, div, |a, b| a.div_floor(b));
forward_binop!(Rem, rem, |a, b| a.mod_floor(b));
