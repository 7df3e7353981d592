//! The group manager: owns the group's secret polynomials, issues member
//! keys, and drives every signature from `Open` to complete.

use std::collections::{BTreeMap, HashMap};

use rand::{CryptoRng, RngCore};
use tracing::{debug, info};

use crate::errors::{ProtocolError, Result};
use crate::exponent::PolynomialInTheExponent;
use crate::group::GroupZpValues;
use crate::hash::{calculate_t, create_h, create_z, transcript_digest};
use crate::mpi::{BigInteger, RandomGenerator};
use crate::params::{SchemeParameters, ServerConfig};
use crate::pending::{PendingSignature, PendingSignatures};
use crate::polynomial::Polynomial;
use crate::signing::{ServerKeyPair, ServerPublicKey, Sigma};
use crate::types::{
    CheckProcedureInput, CheckProcedureOutput, CloseSignatureInput, Delta, DeltaElement,
    FinalizeSignatureInput, FinalizeSignatureOutput, InitializeSignatureInput, JoinSignatureInput,
    PQPolynomials, PublicParameters, PublishProcedureInput, PublishedValues, SignProcedureInput,
    SignProcedureOutput, Signature, UserPrivateKey, UserPublicKey, VerificationMaterial, C,
};

pub struct GroupManager {
    scheme: SchemeParameters,
    coefficient_bits: u64,
    group: GroupZpValues,
    key_pair: ServerKeyPair,
    a_polynomials: Vec<Polynomial>,
    s_polynomial: Polynomial,
    dummy_private_key: UserPrivateKey,
    users: Vec<UserPublicKey>,
    pending: PendingSignatures,
    published: HashMap<usize, BTreeMap<BigInteger, PublishedValues>>,
}

impl GroupManager {
    /// Validates `config`, generates the RSA key pair, the group and the
    /// secret polynomials.
    pub fn new(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let key_pair = ServerKeyPair::generate(config.rsa_key_bits)?;
        Self::with_key_pair(config, key_pair, &mut rand::rng())
    }

    pub fn with_key_pair<R: RngCore + CryptoRng>(
        config: &ServerConfig,
        key_pair: ServerKeyPair,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let scheme = config.scheme;
        let bits = config.coefficient_bits;
        let group = GroupZpValues::generate(bits, rng);
        info!(q_bits = bits, g = %group.g, "group parameters generated");

        let a_polynomials = (0..scheme.number_of_a_polynomials())
            .map(|_| Polynomial::random(scheme.a_degree(), bits, &group.q, rng))
            .collect();
        let s_polynomial = loop {
            let s = Polynomial::random(scheme.s_degree(), bits, &group.q, rng);
            if !s[scheme.s_degree()].is_zero() {
                break s;
            }
        };

        let mut manager = Self {
            scheme,
            coefficient_bits: bits,
            group,
            key_pair,
            a_polynomials,
            s_polynomial,
            dummy_private_key: UserPrivateKey {
                x: Polynomial::zero(0),
                p: Polynomial::zero(0),
                q: PolynomialInTheExponent::from_coefficients(vec![]),
                m: Polynomial::zero(0),
            },
            users: Vec::new(),
            pending: PendingSignatures::default(),
            published: HashMap::new(),
        };
        manager.dummy_private_key = manager.create_dummy_user_private_key(rng)?;
        Ok(manager)
    }

    fn create_dummy_user_private_key<R: RngCore + CryptoRng>(&self, rng: &mut R) -> Result<UserPrivateKey> {
        let x = self.random_polynomial(self.scheme.x_degree(), rng);
        let PQPolynomials { p, q } = self.calculate_pq_polynomials(&x)?;
        let m = self.random_polynomial(self.scheme.m_degree(), rng);
        Ok(UserPrivateKey { x, p, q, m })
    }

    fn random_polynomial<R: RngCore + CryptoRng>(&self, degree: usize, rng: &mut R) -> Polynomial {
        Polynomial::random(degree, self.coefficient_bits, &self.group.q, rng)
    }

    fn random_exponent(&self) -> BigInteger {
        RandomGenerator::new(self.coefficient_bits).generate(&mut rand::rng()) % &self.group.q
    }

    pub fn scheme(&self) -> &SchemeParameters {
        &self.scheme
    }

    pub fn group_zp_values(&self) -> &GroupZpValues {
        &self.group
    }

    pub fn server_public_key(&self) -> ServerPublicKey {
        self.key_pair.public_key()
    }

    pub fn dummy_user_private_key(&self) -> &UserPrivateKey {
        &self.dummy_private_key
    }

    pub fn public_parameters(&self) -> PublicParameters {
        PublicParameters {
            group: self.group.clone(),
            scheme: self.scheme,
            server_public_key: self.server_public_key(),
        }
    }

    pub fn verification_material(&self) -> VerificationMaterial {
        VerificationMaterial {
            parameters: self.public_parameters(),
            dummy_private_key: self.dummy_private_key.clone(),
        }
    }

    /// `Σ_{i=0..n} a_i(t) x(t)^i`, of degree `alpha + beta * n`.
    pub fn expand_l_polynomial(&self, x: &Polynomial) -> Result<Polynomial> {
        let q = &self.group.q;
        let l_exp = self.scheme.l_exp_degree();
        let power_degree = self.scheme.x_degree() * self.scheme.l_degree();
        let mut expanded = Polynomial::zero(l_exp);
        for (i, a) in self.a_polynomials.iter().enumerate() {
            let x_power = x.pow(i, power_degree, q)?;
            let element = a.multiply(&x_power, l_exp, q)?;
            expanded = expanded.add(&element, l_exp, q)?;
        }
        Ok(expanded)
    }

    /// Splits `L(t, x(t))` by `S(t)` into `P(t)` and `g^{Q(t)}`.
    pub fn calculate_pq_polynomials(&self, x: &Polynomial) -> Result<PQPolynomials> {
        if x.degree() != self.scheme.x_degree() {
            return Err(ProtocolError::UnexpectedDegree {
                what: "x(t)",
                expected: self.scheme.x_degree(),
                actual: x.degree(),
            }
            .into());
        }
        let q = &self.group.q;
        let expanded = self.expand_l_polynomial(x)?;
        let p = expanded.modulo(&self.s_polynomial, self.scheme.p_degree(), q)?;
        let q_poly = expanded.divide(&self.s_polynomial, self.scheme.q_degree(), q)?;
        let g_q = PolynomialInTheExponent::from_polynomial(
            &q_poly,
            &self.group.g,
            &BigInteger::one(),
            &self.group.p,
        );
        Ok(PQPolynomials { p, q: g_q })
    }

    /// `L(t, x) = Σ_{i=0..n} a_i(t) x^i mod q`.
    pub fn calculate_l(&self, t: &BigInteger, x: &BigInteger) -> BigInteger {
        let q = &self.group.q;
        let l = Polynomial::from_coefficients(
            self.a_polynomials.iter().map(|a| a.evaluate(t, q)).collect(),
        );
        l.evaluate(x, q)
    }

    pub fn calculate_t(&self, x: &BigInteger, message: &str) -> Result<BigInteger> {
        calculate_t(x, message, &self.group.q)
    }

    /// Appends the key and returns its index.
    pub fn register_new_user(&mut self, public_key: UserPublicKey) -> Result<usize> {
        if public_key.qm.degree() != self.scheme.qm_degree() {
            return Err(ProtocolError::UnexpectedDegree {
                what: "Q(t)m(t)",
                expected: self.scheme.qm_degree(),
                actual: public_key.qm.degree(),
            }
            .into());
        }
        self.users.push(public_key);
        let index = self.users.len() - 1;
        info!(user = index, "user registered");
        Ok(index)
    }

    pub fn get_user_public_key(&self, user_index: usize) -> Result<&UserPublicKey> {
        self.users
            .get(user_index)
            .ok_or_else(|| ProtocolError::UnknownUser(user_index).into())
    }

    pub fn initialize_signature(&mut self, input: InitializeSignatureInput) -> Result<usize> {
        self.get_user_public_key(input.user_index)?;
        let t = self.calculate_t(&input.x, &input.message)?;
        let index = self
            .pending
            .add(input.user_index, input.message, t, input.x);
        info!(signature = index, initiator = input.user_index, "signature opened");
        Ok(index)
    }

    pub fn pending_signature(&self, signature_index: usize) -> Result<&PendingSignature> {
        self.pending.get(signature_index)
    }

    pub fn get_t_from_pending_signature(&self, signature_index: usize) -> Result<BigInteger> {
        Ok(self.pending.get(signature_index)?.t().clone())
    }

    pub fn join_signature(&mut self, signature_index: usize, input: JoinSignatureInput) -> Result<()> {
        self.get_user_public_key(input.user_index)?;
        let max = self.scheme.maximal_number_of_signers();
        self.pending
            .get_mut(signature_index)?
            .add_signer(input.user_index, input.xt, max)?;
        info!(signature = signature_index, user = input.user_index, "signer joined");
        Ok(())
    }

    /// Only the initiator may close. Draws `r` and fixes Delta, C and Sigma.
    pub fn close_signature(&mut self, input: CloseSignatureInput) -> Result<()> {
        let pending = self.pending.get(input.signature_index)?;
        pending.check_close(input.user_index)?;

        let r = self.random_exponent();
        let d = pending.signer_count();
        let delta = self.create_delta(pending.t(), d, &r)?;
        let c = self.create_c(pending.t(), pending.x(), &r);
        let z = create_z(pending.signers_xt().values());
        let h = create_h(pending.message(), &z);
        let sigma = self.create_sigma(&c, &delta, &h)?;

        self.pending
            .get_mut(input.signature_index)?
            .close(input.user_index, delta, c, sigma)?;
        info!(signature = input.signature_index, signers = d, "signature closed");
        Ok(())
    }

    pub fn create_finalize_signature_input(&self, signature_index: usize) -> Result<FinalizeSignatureInput> {
        let pending = self.pending.get(signature_index)?;
        let c = pending.c()?;
        Ok(FinalizeSignatureInput {
            t: pending.t().clone(),
            gr: c.gr.clone(),
            r_st: c.r_st.clone(),
        })
    }

    /// Returns `true` once every signer has contributed.
    pub fn finalize_signature(&mut self, signature_index: usize, output: FinalizeSignatureOutput) -> Result<bool> {
        let user = output.user_index;
        let complete = self
            .pending
            .get_mut(signature_index)?
            .finalize(user, output.element)?;
        if complete {
            info!(signature = signature_index, "signature complete");
        } else {
            debug!(signature = signature_index, user, "finalize contribution stored");
        }
        Ok(complete)
    }

    pub fn get_signature(&self, signature_index: usize) -> Result<Signature> {
        self.pending.get(signature_index)?.signature()
    }

    /// Single-member signing: fresh Delta, C and Sigma bound to `(t, x, h)`.
    pub fn sign(&self, input: &SignProcedureInput) -> Result<SignProcedureOutput> {
        self.sign_with(&input.t, &input.x, input.d, &input.h)
    }

    pub fn sign_with(&self, t: &BigInteger, x: &BigInteger, d: usize, h: &str) -> Result<SignProcedureOutput> {
        let r = self.random_exponent();
        let delta = self.create_delta(t, d, &r)?;
        let c = self.create_c(t, x, &r);
        let sigma = self.create_sigma(&c, &delta, h)?;
        debug!(signers = d, "sign procedure served");
        Ok(SignProcedureOutput { delta, c, sigma })
    }

    /// Stores published values; the first publication for a given `t` wins.
    pub fn publish(&mut self, input: PublishProcedureInput) -> Result<()> {
        self.get_user_public_key(input.user_index)?;
        let t = input.published.t.clone();
        self.published
            .entry(input.user_index)
            .or_default()
            .entry(t)
            .or_insert(input.published);
        info!(user = input.user_index, "values published");
        Ok(())
    }

    pub fn has_published_values(&self, input: &CheckProcedureInput) -> bool {
        self.published
            .get(&input.user_index)
            .is_some_and(|by_t| by_t.contains_key(&input.t))
    }

    pub fn get_published_values(&self, input: &CheckProcedureInput) -> Result<&PublishedValues> {
        self.published
            .get(&input.user_index)
            .and_then(|by_t| by_t.get(&input.t))
            .ok_or_else(|| ProtocolError::NotPublished(input.user_index).into())
    }

    /// The member's public key with its published values, if any.
    pub fn check(&self, input: &CheckProcedureInput) -> Result<CheckProcedureOutput> {
        let public_key = self.get_user_public_key(input.user_index)?;
        if !self.has_published_values(input) {
            return Ok(None);
        }
        let published = self.get_published_values(input)?;
        Ok(Some((public_key.clone(), published.clone())))
    }

    fn create_delta(&self, t: &BigInteger, d: usize, r: &BigInteger) -> Result<Delta> {
        let max = self.scheme.maximal_number_of_signers();
        if d > max {
            return Err(ProtocolError::TooManySigners { count: d, max }.into());
        }
        Ok((1..=max - d)
            .map(|i| {
                let i = BigInteger::from(i);
                let exponent = (r * self.calculate_l(t, &i)) % &self.group.q;
                DeltaElement {
                    gr_lti: self.group.g_pow(&exponent),
                    i,
                }
            })
            .collect())
    }

    fn create_c(&self, t: &BigInteger, x: &BigInteger, r: &BigInteger) -> C {
        let q = &self.group.q;
        C {
            gr: self.group.g_pow(r),
            r_st: (r * self.s_polynomial.evaluate(t, q)) % q,
            gr_ltx: self.group.g_pow(&(r * self.calculate_l(t, x))),
        }
    }

    fn create_sigma(&self, c: &C, delta: &Delta, h: &str) -> Result<Sigma> {
        let digest = transcript_digest(c, delta, h)?;
        self.key_pair.sign(&digest)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::pending::SignatureStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::OnceLock;

    fn key_pair() -> ServerKeyPair {
        static KEY: OnceLock<ServerKeyPair> = OnceLock::new();
        KEY.get_or_init(|| ServerKeyPair::generate(1024).unwrap()).clone()
    }

    fn small_config() -> ServerConfig {
        ServerConfig {
            scheme: SchemeParameters {
                alpha: 3,
                beta: 2,
                eta: 4,
                gamma: 4,
                n: 4,
                zeta: 12,
            },
            coefficient_bits: 32,
            rsa_key_bits: 1024,
        }
    }

    pub(crate) fn manager(seed: u64) -> (GroupManager, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let m = GroupManager::with_key_pair(&small_config(), key_pair(), &mut rng).unwrap();
        (m, rng)
    }

    #[test]
    fn l_splits_into_p_and_q() {
        let (m, mut rng) = manager(61);
        let x = m.random_polynomial(m.scheme.x_degree(), &mut rng);
        let pq = m.calculate_pq_polynomials(&x).unwrap();
        assert_eq!(pq.p.degree(), m.scheme.p_degree());
        assert_eq!(pq.q.degree(), m.scheme.q_degree());

        let group = &m.group;
        for t in [1u64, 5, 123_456] {
            let t = BigInteger::from(t);
            let xt = x.evaluate(&t, &group.q);
            let lhs = group.g_pow(&m.calculate_l(&t, &xt));
            let st = m.s_polynomial.evaluate(&t, &group.q);
            let rhs = group.mul(
                &group.g_pow(&pq.p.evaluate(&t, &group.q)),
                &group.pow(&pq.q.evaluate(&t, &group.p), &st),
            );
            assert_eq!(lhs, rhs);
        }
    }

    #[test]
    fn wrong_degree_x_is_rejected() {
        let (m, mut rng) = manager(62);
        let x = m.random_polynomial(m.scheme.x_degree() + 1, &mut rng);
        assert!(matches!(
            m.calculate_pq_polynomials(&x).unwrap_err(),
            Error::Protocol(ProtocolError::UnexpectedDegree { what: "x(t)", .. })
        ));
    }

    #[test]
    fn dummy_key_is_consistent() {
        let (m, _) = manager(63);
        let dummy = m.dummy_user_private_key();
        let group = &m.group;
        let t = BigInteger::from(77u64);
        let xt = dummy.x.evaluate(&t, &group.q);
        let st = m.s_polynomial.evaluate(&t, &group.q);
        let recombined = group.mul(
            &group.g_pow(&dummy.p.evaluate(&t, &group.q)),
            &group.pow(&dummy.q.evaluate(&t, &group.p), &st),
        );
        assert_eq!(recombined, group.g_pow(&m.calculate_l(&t, &xt)));
    }

    #[test]
    fn delta_covers_non_signer_slots() {
        let (m, _) = manager(64);
        let t = BigInteger::from(9u64);
        let x = BigInteger::from(1234u64);
        let out = m.sign_with(&t, &x, 1, "h").unwrap();
        assert_eq!(out.delta.len(), 3);
        let indices: Vec<BigInteger> = out.delta.iter().map(|d| d.i.clone()).collect();
        assert_eq!(indices, (1..=3u64).map(BigInteger::from).collect::<Vec<_>>());
        assert!(m.sign_with(&t, &x, 5, "h").is_err());
        assert!(m.sign_with(&t, &x, 4, "h").unwrap().delta.is_empty());
    }

    #[test]
    fn operations_require_registered_users() {
        let (mut m, _) = manager(65);
        let err = m
            .initialize_signature(InitializeSignatureInput {
                user_index: 0,
                message: "m".into(),
                x: BigInteger::one(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::UnknownUser(0))));
        let err = m
            .join_signature(
                7,
                JoinSignatureInput {
                    user_index: 0,
                    xt: BigInteger::one(),
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::UnknownUser(0))));
        let bad_key = UserPublicKey {
            qm: PolynomialInTheExponent::from_coefficients(vec![BigInteger::one()]),
        };
        assert!(m.register_new_user(bad_key).is_err());
        assert!(m.get_user_public_key(0).is_err());
    }

    #[test]
    fn first_publication_wins() {
        let (mut m, _) = manager(66);
        let qm_degree = m.scheme.qm_degree();
        let key = UserPublicKey {
            qm: PolynomialInTheExponent::from_coefficients(vec![BigInteger::one(); qm_degree + 1]),
        };
        let user = m.register_new_user(key).unwrap();
        let values = |xt: u64| PublishedValues {
            t: BigInteger::from(5u64),
            xt: BigInteger::from(xt),
            pt: BigInteger::one(),
            mt: BigInteger::one(),
        };
        let query = CheckProcedureInput {
            user_index: user,
            t: BigInteger::from(5u64),
        };
        assert_eq!(m.check(&query).unwrap(), None);
        m.publish(PublishProcedureInput { user_index: user, published: values(1) }).unwrap();
        m.publish(PublishProcedureInput { user_index: user, published: values(2) }).unwrap();
        assert!(m.has_published_values(&query));
        assert_eq!(m.get_published_values(&query).unwrap(), &values(1));
        let other_t = CheckProcedureInput {
            user_index: user,
            t: BigInteger::from(6u64),
        };
        assert!(matches!(
            m.get_published_values(&other_t).unwrap_err(),
            Error::Protocol(ProtocolError::NotPublished(0))
        ));
        assert!(m.check(&CheckProcedureInput { user_index: 9, t: BigInteger::one() }).is_err());
    }

    #[test]
    fn pending_signature_follows_its_lifecycle() {
        let (mut m, _) = manager(67);
        assert!(m.group_zp_values().is_valid());
        let key = UserPublicKey {
            qm: PolynomialInTheExponent::from_coefficients(vec![
                BigInteger::one();
                m.scheme.qm_degree() + 1
            ]),
        };
        let alice = m.register_new_user(key.clone()).unwrap();
        let bob = m.register_new_user(key).unwrap();

        let x = BigInteger::from(4242u64);
        let index = m
            .initialize_signature(InitializeSignatureInput {
                user_index: alice,
                message: "minutes".into(),
                x: x.clone(),
            })
            .unwrap();
        let t = m.get_t_from_pending_signature(index).unwrap();
        assert_eq!(t, m.calculate_t(&x, "minutes").unwrap());

        for (user, xt) in [(alice, 11u64), (bob, 12)] {
            m.join_signature(index, JoinSignatureInput { user_index: user, xt: BigInteger::from(xt) })
                .unwrap();
        }
        let pending = m.pending_signature(index).unwrap();
        assert_eq!(pending.status(), SignatureStatus::Open);
        assert_eq!(pending.signer_count(), 2);

        let close = |user_index| CloseSignatureInput { user_index, signature_index: index };
        assert!(matches!(
            m.close_signature(close(bob)).unwrap_err(),
            Error::Protocol(ProtocolError::NotInitiator { .. })
        ));
        m.close_signature(close(alice)).unwrap();
        let pending = m.pending_signature(index).unwrap();
        assert_eq!(pending.status(), SignatureStatus::Closed);
        assert_eq!(pending.c().unwrap().gr, m.create_finalize_signature_input(index).unwrap().gr);
        assert!(matches!(
            m.get_signature(index).unwrap_err(),
            Error::Protocol(ProtocolError::SignatureIncomplete(_))
        ));
        assert!(m.pending_signature(index + 1).is_err());
    }
}
