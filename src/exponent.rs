//! Polynomials whose coefficients are only known "in the exponent".
//!
//! A `PolynomialInTheExponent` holds `g^{c_i} mod p` for a hidden coefficient
//! vector `c`. Arithmetic on the hidden coefficients happens in the exponent,
//! that is modulo the order of `g`, while the stored values live in `Z_p`.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::errors::{MathError, Result};
use crate::mpi::BigInteger;
use crate::polynomial::{lagrange_basis, reduce_distinct, Polynomial};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<BigInteger>", into = "Vec<BigInteger>")]
pub struct PolynomialInTheExponent {
    coefficients: Vec<BigInteger>,
}

impl TryFrom<Vec<BigInteger>> for PolynomialInTheExponent {
    type Error = MathError;

    fn try_from(coefficients: Vec<BigInteger>) -> std::result::Result<Self, Self::Error> {
        if coefficients.is_empty() {
            return Err(MathError::NoCoefficients);
        }
        Ok(Self { coefficients })
    }
}

impl From<PolynomialInTheExponent> for Vec<BigInteger> {
    fn from(poly: PolynomialInTheExponent) -> Self {
        poly.coefficients
    }
}

impl PolynomialInTheExponent {
    pub fn from_coefficients(mut coefficients: Vec<BigInteger>) -> Self {
        if coefficients.is_empty() {
            coefficients.push(BigInteger::one());
        }
        Self { coefficients }
    }

    /// `coeff_i = (g^r)^{poly_i} mod p`.
    pub fn from_polynomial(
        poly: &Polynomial,
        g: &BigInteger,
        r: &BigInteger,
        p: &BigInteger,
    ) -> Self {
        let base = g.pow_mod(r, p);
        let coefficients = poly
            .coefficients()
            .iter()
            .map(|c| base.pow_mod(c, p))
            .collect();
        Self { coefficients }
    }

    /// Hides the product of the committed polynomial and a plaintext one:
    /// `coeff_{i+j} *= self_i^{poly_j}`.
    pub fn compose(&self, poly: &Polynomial, degree: usize, p: &BigInteger) -> Result<Self> {
        let expected = self.degree() + poly.degree();
        if degree != expected {
            return Err(MathError::DegreeMismatch {
                expected,
                actual: degree,
            }
            .into());
        }
        let mut coefficients = vec![BigInteger::one(); degree + 1];
        for (i, committed) in self.coefficients.iter().enumerate() {
            for (j, plain) in poly.coefficients().iter().enumerate() {
                let factor = committed.pow_mod(plain, p);
                coefficients[i + j] = (&coefficients[i + j] * factor) % p;
            }
        }
        Ok(Self { coefficients })
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[BigInteger] {
        &self.coefficients
    }

    /// `Π coeff_i^{x^i} mod p`, the powers of `x` kept modulo `p - 1`.
    pub fn evaluate(&self, x: &BigInteger, p: &BigInteger) -> BigInteger {
        let exponent_modulus = p - BigInteger::one();
        let mut result = BigInteger::one();
        let mut power = BigInteger::one();
        for c in &self.coefficients {
            result = (result * c.pow_mod(&power, p)) % p;
            power = (power * x) % &exponent_modulus;
        }
        result
    }

    /// Recovers all committed coefficients from `(args[i], g^{P(args[i])})`.
    ///
    /// Lagrange coefficients are computed modulo `q`, which must be prime.
    pub fn interpolate(
        args: &[BigInteger],
        values: &[BigInteger],
        p: &BigInteger,
        q: &BigInteger,
    ) -> Result<Self> {
        check_lengths(args, values)?;
        if !q.is_prime() {
            return Err(MathError::NonPrimeExponentModulus.into());
        }
        let args = reduce_distinct(args, q)?;

        let mut coefficients = vec![BigInteger::one(); args.len()];
        for (i, value) in values.iter().enumerate() {
            let basis = lagrange_basis(&args, i, q)?;
            for (c, b) in coefficients.iter_mut().zip(basis.iter()) {
                *c = (&*c * value.pow_mod(b, p)) % p;
            }
        }
        Ok(Self { coefficients })
    }
}

impl Index<usize> for PolynomialInTheExponent {
    type Output = BigInteger;

    fn index(&self, index: usize) -> &BigInteger {
        &self.coefficients[index]
    }
}

/// Evaluates at `x` the polynomial hidden behind `(args[i], values[i])`
/// without recovering its coefficients.
///
/// The exponent modulus is `(p - 1) / 2`, which must be prime.
pub fn interpolate_in_point(
    args: &[BigInteger],
    values: &[BigInteger],
    x: &BigInteger,
    p: &BigInteger,
) -> Result<BigInteger> {
    check_lengths(args, values)?;
    let exponent_modulus = (p - BigInteger::one()) / BigInteger::from(2u64);
    if !exponent_modulus.is_prime() {
        return Err(MathError::NonPrimeExponentModulus.into());
    }
    let args = reduce_distinct(args, &exponent_modulus)?;

    let mut result = BigInteger::one();
    for (i, value) in values.iter().enumerate() {
        let mut exponent = BigInteger::one();
        for (j, a_j) in args.iter().enumerate() {
            if i == j {
                continue;
            }
            let numerator = (x - a_j) % &exponent_modulus;
            let denominator = (&args[i] - a_j).inv_mod(&exponent_modulus)?;
            exponent = (exponent * numerator * denominator) % &exponent_modulus;
        }
        result = (result * value.pow_mod(&exponent, p)) % p;
    }
    Ok(result)
}

fn check_lengths(args: &[BigInteger], values: &[BigInteger]) -> Result<()> {
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
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::group::GroupZpValues;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn setup(seed: u64) -> (GroupZpValues, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let group = GroupZpValues::generate(32, &mut rng);
        (group, rng)
    }

    #[test]
    fn evaluation_matches_plain_polynomial() {
        let (group, mut rng) = setup(41);
        let poly = Polynomial::random(6, 64, &group.q, &mut rng);
        let r = BigInteger::from(987_654u64);
        let hidden = PolynomialInTheExponent::from_polynomial(&poly, &group.g, &r, &group.p);
        for x in [0u64, 1, 2, 77, 1 << 40] {
            let x = BigInteger::from(x);
            let expected = group.g_pow(&(&r * poly.evaluate(&x, &group.q)));
            assert_eq!(hidden.evaluate(&x, &group.p), expected);
        }
    }

    #[test]
    fn point_interpolation_reproduces_hidden_value() {
        let (group, mut rng) = setup(42);
        let poly = Polynomial::random(5, 64, &group.q, &mut rng);
        let r = BigInteger::from(31_337u64);
        let args: Vec<BigInteger> = (10..16u64).map(BigInteger::from).collect();
        let values: Vec<BigInteger> = args
            .iter()
            .map(|a| group.g_pow(&(&r * poly.evaluate(a, &group.q))))
            .collect();
        let x = BigInteger::from(123_456_789u64);
        let expected = group.g_pow(&(&r * poly.evaluate(&x, &group.q)));
        assert_eq!(
            interpolate_in_point(&args, &values, &x, &group.p).unwrap(),
            expected
        );
    }

    #[test]
    fn interpolation_recovers_committed_coefficients() {
        let (group, mut rng) = setup(43);
        let poly = Polynomial::random(4, 64, &group.q, &mut rng);
        let one = BigInteger::one();
        let hidden = PolynomialInTheExponent::from_polynomial(&poly, &group.g, &one, &group.p);
        let args: Vec<BigInteger> = (1..=5u64).map(BigInteger::from).collect();
        let values: Vec<BigInteger> = args.iter().map(|a| hidden.evaluate(a, &group.p)).collect();
        let recovered =
            PolynomialInTheExponent::interpolate(&args, &values, &group.p, &group.q).unwrap();
        assert_eq!(recovered, hidden);
    }

    #[test]
    fn composition_multiplies_hidden_polynomials() {
        let (group, mut rng) = setup(44);
        let q_poly = Polynomial::random(3, 64, &group.q, &mut rng);
        let m_poly = Polynomial::random(2, 64, &group.q, &mut rng);
        let one = BigInteger::one();
        let g_q = PolynomialInTheExponent::from_polynomial(&q_poly, &group.g, &one, &group.p);
        let g_qm = g_q.compose(&m_poly, 5, &group.p).unwrap();
        assert!(g_q.compose(&m_poly, 6, &group.p).is_err());

        let t = BigInteger::from(4242u64);
        let m_t = m_poly.evaluate(&t, &group.q);
        assert_eq!(
            g_qm.evaluate(&t, &group.p),
            group.pow(&g_q.evaluate(&t, &group.p), &m_t)
        );
        // undo m(t) with its inverse modulo q
        let m_inv = m_t.inv_mod(&group.q).unwrap();
        assert_eq!(
            group.pow(&g_qm.evaluate(&t, &group.p), &m_inv),
            g_q.evaluate(&t, &group.p)
        );
    }

    #[test]
    fn non_prime_exponent_modulus_is_rejected() {
        let args = [BigInteger::from(1u64), BigInteger::from(2u64)];
        let values = [BigInteger::from(3u64), BigInteger::from(4u64)];
        // (19 - 1) / 2 = 9
        let err = interpolate_in_point(&args, &values, &BigInteger::from(5u64), &BigInteger::from(19u64))
            .unwrap_err();
        assert!(matches!(err, Error::Math(MathError::NonPrimeExponentModulus)));
        let err = PolynomialInTheExponent::interpolate(
            &args,
            &values,
            &BigInteger::from(19u64),
            &BigInteger::from(9u64),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Math(MathError::NonPrimeExponentModulus)));
    }

    #[test]
    fn duplicate_points_are_rejected_in_the_exponent() {
        let (group, _) = setup(45);
        let args = [BigInteger::from(7u64), &BigInteger::from(7u64) + &group.q];
        let values = [group.g.clone(), group.g.clone()];
        let err = interpolate_in_point(&args, &values, &BigInteger::one(), &group.p).unwrap_err();
        assert!(matches!(err, Error::Math(MathError::DuplicateEvaluationPoint)));
    }

    #[test]
    fn decoding_rejects_an_empty_coefficient_list() {
        use crate::codec::{decode, encode};
        let empty = encode(&Vec::<BigInteger>::new()).unwrap();
        assert!(matches!(
            decode::<PolynomialInTheExponent>(&empty).unwrap_err(),
            Error::Codec(_)
        ));

        let value = PolynomialInTheExponent::from_coefficients(vec![
            BigInteger::from(4u64),
            BigInteger::from(9u64),
        ]);
        let decoded: PolynomialInTheExponent = decode(&encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(decoded.degree(), value.coefficients().len() - 1);
    }
}
