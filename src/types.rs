use serde::{Deserialize, Serialize};

use crate::exponent::PolynomialInTheExponent;
use crate::group::GroupZpValues;
use crate::mpi::BigInteger;
use crate::params::SchemeParameters;
use crate::polynomial::Polynomial;
use crate::signing::{ServerPublicKey, Sigma};

/// A member's secret polynomials. Never leaves the client, apart from the
/// server's dummy key handed out for verification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPrivateKey {
    pub x: Polynomial,
    pub p: Polynomial,
    /// `g^{Q(t)}`, coefficient-wise.
    pub q: PolynomialInTheExponent,
    pub m: Polynomial,
}

/// `g^{Q(t) m(t)}`, coefficient-wise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPublicKey {
    pub qm: PolynomialInTheExponent,
}

/// Issued by the server at registration: `L(t, x(t)) = P(t) + Q(t) S(t)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PQPolynomials {
    pub p: Polynomial,
    pub q: PolynomialInTheExponent,
}

/// First message of every registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicParameters {
    pub group: GroupZpValues,
    pub scheme: SchemeParameters,
    pub server_public_key: ServerPublicKey,
}

/// Everything a client needs to verify signatures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMaterial {
    pub parameters: PublicParameters,
    pub dummy_private_key: UserPrivateKey,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeSignatureInput {
    pub user_index: usize,
    pub message: String,
    pub x: BigInteger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSignatureInput {
    pub user_index: usize,
    pub xt: BigInteger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseSignatureInput {
    pub user_index: usize,
    pub signature_index: usize,
}

/// `(t, g^r, r S(t))` of a closed signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSignatureInput {
    pub t: BigInteger,
    pub gr: BigInteger,
    pub r_st: BigInteger,
}

/// `(x(t), g^{r P(t)}, g^{Q(t) r S(t)})`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThetaPrimElement {
    pub xt: BigInteger,
    pub gr_pt: BigInteger,
    pub gq_tr_st: BigInteger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSignatureOutput {
    pub user_index: usize,
    pub element: ThetaPrimElement,
}

/// `(x(t), g^{r L(t, x(t))})`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThetaElement {
    pub xt: BigInteger,
    pub gr_ltxt: BigInteger,
}

/// Decoy point `(i, g^{r L(t, i)})`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaElement {
    pub i: BigInteger,
    pub gr_lti: BigInteger,
}

/// Randomized commitment `(g^r, r S(t), g^{r L(t, x)})`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct C {
    pub gr: BigInteger,
    pub r_st: BigInteger,
    pub gr_ltx: BigInteger,
}

pub type Delta = Vec<DeltaElement>;
pub type ThetaPrim = Vec<ThetaPrimElement>;
pub type Theta = Vec<ThetaElement>;

/// Points handed to the exponent interpolation, `(argument, g^{value})`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsiElement {
    pub arg: BigInteger,
    pub value: BigInteger,
}

pub type Psi = Vec<PsiElement>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub t: BigInteger,
    pub x: BigInteger,
    pub delta: Delta,
    pub theta_prim: ThetaPrim,
    pub c: C,
    pub sigma: Sigma,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignProcedureInput {
    pub t: BigInteger,
    pub x: BigInteger,
    /// Number of signers.
    pub d: usize,
    pub h: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignProcedureOutput {
    pub delta: Delta,
    pub c: C,
    pub sigma: Sigma,
}

/// `(t, x(t), P(t), m(t))` disclosed by a member to step out of a signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedValues {
    pub t: BigInteger,
    pub xt: BigInteger,
    pub pt: BigInteger,
    pub mt: BigInteger,
}

impl PublishedValues {
    /// Every value lies in `[0, q)` and `m(t)` is invertible.
    pub fn is_canonical(&self, q: &BigInteger) -> bool {
        let reduced = |v: &BigInteger| !v.is_negative() && v < q;
        [&self.t, &self.xt, &self.pt, &self.mt]
            .into_iter()
            .all(reduced)
            && !self.mt.is_zero()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishProcedureInput {
    pub user_index: usize,
    pub published: PublishedValues,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckProcedureInput {
    pub user_index: usize,
    pub t: BigInteger,
}

/// Reply to a check request; `None` when nothing was published for `t`.
pub type CheckProcedureOutput = Option<(UserPublicKey, PublishedValues)>;

// Oblivious polynomial evaluation messages. Registration issues P and Q
// directly, so these are carried for wire compatibility only.

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeProcedureInputElement {
    pub t: BigInteger,
    pub x: BigInteger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeProcedureInput(pub Vec<OpeProcedureInputElement>);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeProcedureOutputElement {
    pub p: BigInteger,
    pub q: BigInteger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeProcedureOutput(pub Vec<OpeProcedureOutputElement>);

impl OpeProcedureInput {
    pub fn has_expected_size(&self, scheme: &SchemeParameters) -> bool {
        self.0.len() == scheme.ope_procedure_size()
    }
}

impl OpeProcedureOutput {
    pub fn has_expected_size(&self, scheme: &SchemeParameters) -> bool {
        self.0.len() == scheme.ope_procedure_size()
    }
}

impl ThetaPrimElement {
    /// Folds the two group components: `g^{r P(t)} g^{Q(t) r S(t)}`.
    pub fn to_theta(&self, p: &BigInteger) -> ThetaElement {
        ThetaElement {
            xt: self.xt.clone(),
            gr_ltxt: (&self.gr_pt * &self.gq_tr_st) % p,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: u64) -> BigInteger {
        BigInteger::from(v)
    }

    #[test]
    fn theta_multiplies_group_components() {
        let element = ThetaPrimElement {
            xt: int(5),
            gr_pt: int(6),
            gq_tr_st: int(9),
        };
        assert_eq!(
            element.to_theta(&int(23)),
            ThetaElement {
                xt: int(5),
                gr_ltxt: int(8)
            }
        );
    }

    #[test]
    fn ope_messages_are_sized_by_scheme() {
        let scheme = SchemeParameters {
            eta: 2,
            zeta: 3,
            ..SchemeParameters::default()
        };
        let element = OpeProcedureInputElement { t: int(1), x: int(2) };
        let input = OpeProcedureInput(vec![element; 6]);
        assert!(input.has_expected_size(&scheme));
        let output = OpeProcedureOutput(vec![OpeProcedureOutputElement { p: int(3), q: int(4) }; 5]);
        assert!(!output.has_expected_size(&scheme));
    }
}
