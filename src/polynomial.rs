//! Polynomials over `Z_m` with a degree fixed at construction.
//!
//! Coefficients are stored lowest degree first. Every arithmetic routine takes
//! the degree the caller expects back and refuses to produce anything else, so
//! a wrong degree relation surfaces as an error instead of a truncated result.

use std::collections::HashSet;
use std::ops::Index;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::errors::{MathError, Result};
use crate::mpi::{BigInteger, RandomGenerator};

/// Never empty: a decoded coefficient vector must hold at least the constant term.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BigInteger>", into = "Vec<BigInteger>")]
pub struct Polynomial {
    coefficients: Vec<BigInteger>,
}

impl TryFrom<Vec<BigInteger>> for Polynomial {
    type Error = MathError;

    fn try_from(coefficients: Vec<BigInteger>) -> std::result::Result<Self, Self::Error> {
        if coefficients.is_empty() {
            return Err(MathError::NoCoefficients);
        }
        Ok(Self { coefficients })
    }
}

impl From<Polynomial> for Vec<BigInteger> {
    fn from(poly: Polynomial) -> Self {
        poly.coefficients
    }
}

impl Polynomial {
    /// The zero polynomial stored with `degree + 1` coefficients.
    pub fn zero(degree: usize) -> Self {
        Self {
            coefficients: vec![BigInteger::zero(); degree + 1],
        }
    }

    /// `coefficients[0]` is the constant term. An empty vector yields the
    /// constant zero.
    pub fn from_coefficients(mut coefficients: Vec<BigInteger>) -> Self {
        if coefficients.is_empty() {
            coefficients.push(BigInteger::zero());
        }
        Self { coefficients }
    }

    /// Random coefficients of `nbits` bits, each reduced modulo `modulus`.
    pub fn random<R: RngCore + CryptoRng>(
        degree: usize,
        nbits: u64,
        modulus: &BigInteger,
        rng: &mut R,
    ) -> Self {
        let generator = RandomGenerator::new(nbits);
        let coefficients = (0..=degree)
            .map(|_| generator.generate(rng) % modulus)
            .collect();
        Self { coefficients }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[BigInteger] {
        &self.coefficients
    }

    /// Horner evaluation, result in `[0, modulus)`.
    pub fn evaluate(&self, x: &BigInteger, modulus: &BigInteger) -> BigInteger {
        self.coefficients
            .iter()
            .rev()
            .fold(BigInteger::zero(), |acc, c| (acc * x + c) % modulus)
    }

    /// Lagrange interpolation of the unique polynomial of degree
    /// `args.len() - 1` through `(args[i], values[i])`.
    ///
    /// `modulus` must be prime and the arguments pairwise distinct modulo it.
    pub fn interpolate(
        args: &[BigInteger],
        values: &[BigInteger],
        modulus: &BigInteger,
    ) -> Result<Self> {
        if args.len() != values.len() {
            return Err(MathError::LengthMismatch {
                args: args.len(),
                values: values.len(),
            }
            .into());
        }
        if args.is_empty() {
            return Err(MathError::EmptyInterpolation.into());
        }
        let args = reduce_distinct(args, modulus)?;

        let size = args.len();
        let mut coefficients = vec![BigInteger::zero(); size];
        for (i, value) in values.iter().enumerate() {
            let basis = lagrange_basis(&args, i, modulus)?;
            for (c, b) in coefficients.iter_mut().zip(basis.iter()) {
                *c = (&*c + b * value) % modulus;
            }
        }
        Ok(Self { coefficients })
    }

    pub fn add(&self, other: &Polynomial, degree: usize, modulus: &BigInteger) -> Result<Self> {
        let needed = self.degree().max(other.degree());
        if degree < needed {
            return Err(MathError::DegreeMismatch {
                expected: needed,
                actual: degree,
            }
            .into());
        }
        let mut coefficients = vec![BigInteger::zero(); degree + 1];
        for (i, c) in coefficients.iter_mut().enumerate() {
            if let Some(a) = self.coefficients.get(i) {
                *c = &*c + a;
            }
            if let Some(b) = other.coefficients.get(i) {
                *c = &*c + b;
            }
            *c = &*c % modulus;
        }
        Ok(Self { coefficients })
    }

    pub fn multiply(&self, other: &Polynomial, degree: usize, modulus: &BigInteger) -> Result<Self> {
        let expected = self.degree() + other.degree();
        if degree != expected {
            return Err(MathError::DegreeMismatch {
                expected,
                actual: degree,
            }
            .into());
        }
        Ok(Self {
            coefficients: convolve(&self.coefficients, &other.coefficients, modulus),
        })
    }

    /// Quotient of the long division by `divisor`.
    pub fn divide(&self, divisor: &Polynomial, degree: usize, modulus: &BigInteger) -> Result<Self> {
        if self.degree() < divisor.degree() || degree != self.degree() - divisor.degree() {
            return Err(MathError::DegreeMismatch {
                expected: self.degree().saturating_sub(divisor.degree()),
                actual: degree,
            }
            .into());
        }
        let (quotient, _) = self.long_division(divisor, modulus)?;
        Ok(Self {
            coefficients: quotient,
        })
    }

    /// Remainder of the long division by `divisor`, stored with
    /// `divisor.degree()` coefficients.
    pub fn modulo(&self, divisor: &Polynomial, degree: usize, modulus: &BigInteger) -> Result<Self> {
        if divisor.degree() == 0 || self.degree() < divisor.degree() || degree + 1 != divisor.degree()
        {
            return Err(MathError::DegreeMismatch {
                expected: divisor.degree().saturating_sub(1),
                actual: degree,
            }
            .into());
        }
        let (_, remainder) = self.long_division(divisor, modulus)?;
        Ok(Self {
            coefficients: remainder,
        })
    }

    /// `self^n`, padded to `degree`.
    pub fn pow(&self, n: usize, degree: usize, modulus: &BigInteger) -> Result<Self> {
        let needed = self.degree() * n;
        if degree < needed {
            return Err(MathError::DegreeMismatch {
                expected: needed,
                actual: degree,
            }
            .into());
        }
        let mut acc = vec![BigInteger::one() % modulus];
        for _ in 0..n {
            acc = convolve(&acc, &self.coefficients, modulus);
        }
        acc.resize(degree + 1, BigInteger::zero());
        Ok(Self { coefficients: acc })
    }

    // schoolbook division; the divisor's leading coefficient must be invertible
    fn long_division(
        &self,
        divisor: &Polynomial,
        modulus: &BigInteger,
    ) -> Result<(Vec<BigInteger>, Vec<BigInteger>)> {
        let n = self.degree();
        let d = divisor.degree();
        let lead_inverse = divisor.coefficients[d].inv_mod(modulus)?;

        let mut remainder: Vec<BigInteger> = self.coefficients.iter().map(|c| c % modulus).collect();
        let mut quotient = vec![BigInteger::zero(); n - d + 1];
        for k in (0..=n - d).rev() {
            let factor = (&remainder[k + d] * &lead_inverse) % modulus;
            for (j, c) in divisor.coefficients.iter().enumerate() {
                remainder[k + j] = (&remainder[k + j] - &factor * c) % modulus;
            }
            quotient[k] = factor;
        }
        remainder.truncate(d);
        Ok((quotient, remainder))
    }
}

impl Index<usize> for Polynomial {
    type Output = BigInteger;

    fn index(&self, index: usize) -> &BigInteger {
        &self.coefficients[index]
    }
}

fn convolve(left: &[BigInteger], right: &[BigInteger], modulus: &BigInteger) -> Vec<BigInteger> {
    let mut out = vec![BigInteger::zero(); left.len() + right.len() - 1];
    for (i, a) in left.iter().enumerate() {
        for (j, b) in right.iter().enumerate() {
            out[i + j] = (&out[i + j] + a * b) % modulus;
        }
    }
    out
}

/// Reduces every argument modulo `modulus` and rejects repeats.
pub(crate) fn reduce_distinct(args: &[BigInteger], modulus: &BigInteger) -> Result<Vec<BigInteger>> {
    let reduced: Vec<BigInteger> = args.iter().map(|a| a % modulus).collect();
    let mut seen = HashSet::with_capacity(reduced.len());
    if !reduced.iter().all(|a| seen.insert(a)) {
        return Err(MathError::DuplicateEvaluationPoint.into());
    }
    Ok(reduced)
}

/// Coefficients of `Π_{j≠i} (x - a_j) / (a_i - a_j)`, lowest degree first.
pub(crate) fn lagrange_basis(
    args: &[BigInteger],
    i: usize,
    modulus: &BigInteger,
) -> Result<Vec<BigInteger>> {
    let mut basis = Vec::with_capacity(args.len());
    basis.push(BigInteger::one());
    for (j, a_j) in args.iter().enumerate() {
        if j == i {
            continue;
        }
        let scale = (&args[i] - a_j).inv_mod(modulus)?;
        let shift = (-a_j * &scale) % modulus;
        // basis *= scale * x + shift
        basis.push(BigInteger::zero());
        for k in (1..basis.len()).rev() {
            basis[k] = (&scale * &basis[k - 1] + &shift * &basis[k]) % modulus;
        }
        basis[0] = (&shift * &basis[0]) % modulus;
    }
    Ok(basis)
}
