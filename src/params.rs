use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const DEFAULT_COEFFICIENTS_NBITS: u64 = 64;
pub const DEFAULT_RSA_KEY_NBITS: usize = 2048;

/// Degrees of the scheme polynomials, derived from six base constants.
///
/// Both sides of a session must use identical values, so the server sends
/// them along with the group parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeParameters {
    pub alpha: usize,
    pub beta: usize,
    pub eta: usize,
    pub gamma: usize,
    pub n: usize,
    pub zeta: usize,
}

impl Default for SchemeParameters {
    fn default() -> Self {
        Self {
            alpha: 12,
            beta: 10,
            eta: 300,
            gamma: 17,
            n: 20,
            zeta: 300,
        }
    }
}

impl SchemeParameters {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gamma == 0 {
            return Err(ConfigError::ZeroGamma);
        }
        if self.n == 0 {
            return Err(ConfigError::ZeroSigners);
        }
        let l_exp = self
            .beta
            .checked_mul(self.n)
            .and_then(|bn| bn.checked_add(self.alpha));
        let ope = self
            .zeta
            .checked_add(1)
            .and_then(|real| real.checked_add(self.eta));
        if l_exp.is_none() || ope.is_none() || self.n.checked_add(1).is_none() {
            return Err(ConfigError::DegreeOverflow);
        }
        if self.l_exp_degree() < self.s_degree() {
            return Err(ConfigError::LExpBelowS {
                l_exp: self.l_exp_degree(),
                s: self.s_degree(),
            });
        }
        if self.p_degree() >= self.s_degree() {
            return Err(ConfigError::PNotBelowS {
                p: self.p_degree(),
                s: self.s_degree(),
            });
        }
        if self.number_of_real_ope_values() <= self.l_exp_degree() {
            return Err(ConfigError::NotEnoughOpeValues {
                real: self.number_of_real_ope_values(),
                l_exp: self.l_exp_degree(),
            });
        }
        Ok(())
    }

    pub fn a_degree(&self) -> usize {
        self.alpha
    }

    /// Degree of `L(t, x)` in `x`.
    pub fn l_degree(&self) -> usize {
        self.n
    }

    /// Degree of `L(t, x(t))` in `t`.
    pub fn l_exp_degree(&self) -> usize {
        self.alpha + self.beta * self.n
    }

    pub fn m_degree(&self) -> usize {
        self.gamma
    }

    pub fn p_degree(&self) -> usize {
        self.gamma - 1
    }

    pub fn q_degree(&self) -> usize {
        self.l_exp_degree() - self.gamma
    }

    pub fn qm_degree(&self) -> usize {
        self.q_degree() + self.m_degree()
    }

    pub fn s_degree(&self) -> usize {
        self.gamma
    }

    pub fn x_degree(&self) -> usize {
        self.beta
    }

    pub fn maximal_number_of_signers(&self) -> usize {
        self.n
    }

    pub fn number_of_a_polynomials(&self) -> usize {
        self.n + 1
    }

    pub fn number_of_fake_ope_values(&self) -> usize {
        self.eta
    }

    pub fn number_of_real_ope_values(&self) -> usize {
        self.zeta + 1
    }

    pub fn ope_procedure_size(&self) -> usize {
        self.number_of_fake_ope_values() + self.number_of_real_ope_values()
    }
}

/// Everything the server needs before it can accept its first connection.
#[derive(Clone, Copy, Debug)]
pub struct ServerConfig {
    pub scheme: SchemeParameters,
    /// Bit size of `q` and of every random coefficient.
    pub coefficient_bits: u64,
    pub rsa_key_bits: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: SchemeParameters::default(),
            coefficient_bits: DEFAULT_COEFFICIENTS_NBITS,
            rsa_key_bits: DEFAULT_RSA_KEY_NBITS,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // q must exceed every evaluation point and the signer indices
        if self.coefficient_bits < 16 {
            return Err(ConfigError::CoefficientBits(self.coefficient_bits));
        }
        self.scheme.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_degrees() {
        let s = SchemeParameters::default();
        assert_eq!(s.validate(), Ok(()));
        assert_eq!(s.l_exp_degree(), 212);
        assert_eq!(s.q_degree(), 195);
        assert_eq!(s.qm_degree(), 212);
        assert_eq!(s.p_degree(), 16);
        assert_eq!(s.number_of_a_polynomials(), 21);
        assert_eq!(s.ope_procedure_size(), 601);
    }

    #[test]
    fn rejects_degenerate_constants() {
        let base = SchemeParameters::default();
        assert_eq!(
            SchemeParameters { gamma: 0, ..base }.validate(),
            Err(ConfigError::ZeroGamma)
        );
        assert_eq!(
            SchemeParameters { n: 0, ..base }.validate(),
            Err(ConfigError::ZeroSigners)
        );
        assert_eq!(
            SchemeParameters { zeta: 100, ..base }.validate(),
            Err(ConfigError::NotEnoughOpeValues { real: 101, l_exp: 212 })
        );
        assert_eq!(
            SchemeParameters { alpha: 1, beta: 1, n: 1, ..base }.validate(),
            Err(ConfigError::LExpBelowS { l_exp: 2, s: 17 })
        );
    }

    #[test]
    fn oversized_constants_are_rejected() {
        let base = SchemeParameters::default();
        for forged in [
            SchemeParameters { beta: usize::MAX / 2, n: 3, ..base },
            SchemeParameters { alpha: usize::MAX, ..base },
            SchemeParameters { zeta: usize::MAX, ..base },
            SchemeParameters { zeta: usize::MAX - 1, eta: 2, ..base },
            SchemeParameters { beta: 0, n: usize::MAX, ..base },
        ] {
            assert_eq!(forged.validate(), Err(ConfigError::DegreeOverflow));
        }
    }

    #[test]
    fn small_coefficients_are_rejected() {
        let config = ServerConfig {
            coefficient_bits: 8,
            ..ServerConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::CoefficientBits(8)));
    }
}
