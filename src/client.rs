//! A member's side of the protocol: key material, the messages it sends, and
//! the step-out and verification predicates.

use tracing::debug;

use crate::errors::{ProtocolError, Result};
use crate::group::GroupZpValues;
use crate::hash::{calculate_t, create_h, transcript_digest};
use crate::mpi::{BigInteger, RandomGenerator};
use crate::params::SchemeParameters;
use crate::polynomial::Polynomial;
use crate::protocol::{
    candidate_theta, create_psi, create_theta, h_from_theta_prim, interpolate_psi, recombine,
    theta_prim_element,
};
use crate::signing::ServerPublicKey;
use crate::types::{
    CheckProcedureInput, CloseSignatureInput, FinalizeSignatureInput, FinalizeSignatureOutput,
    InitializeSignatureInput, JoinSignatureInput, PQPolynomials, PsiElement, PublicParameters,
    PublishProcedureInput, PublishedValues, SignProcedureInput, SignProcedureOutput, Signature,
    ThetaElement, UserPrivateKey, UserPublicKey, VerificationMaterial,
};

/// Outcome of checking a member against a signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authorship {
    /// The published values match one of the signers.
    Signer,
    /// The published values lie on the signature polynomial but belong to
    /// nobody in the signer set.
    NotSigner,
    /// The published values are inconsistent with the signature.
    Cheater,
}

#[derive(Clone, Debug, Default)]
pub struct ClientManager {
    parameters: Option<PublicParameters>,
    x_polynomial: Option<Polynomial>,
    private_key: Option<UserPrivateKey>,
    public_key: Option<UserPublicKey>,
    user_index: Option<usize>,
    dummy_private_key: Option<UserPrivateKey>,
}

impl ClientManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts the server's parameters after checking them.
    pub fn set_public_parameters(&mut self, parameters: PublicParameters) -> Result<()> {
        parameters.scheme.validate()?;
        if !parameters.group.is_valid() {
            return Err(ProtocolError::InvalidGroupParameters.into());
        }
        self.parameters = Some(parameters);
        Ok(())
    }

    pub fn set_verification_material(&mut self, material: VerificationMaterial) -> Result<()> {
        self.set_public_parameters(material.parameters)?;
        self.dummy_private_key = Some(material.dummy_private_key);
        Ok(())
    }

    fn parameters(&self) -> Result<&PublicParameters> {
        self.parameters
            .as_ref()
            .ok_or_else(|| ProtocolError::MissingGroupParameters.into())
    }

    pub fn group(&self) -> Result<&GroupZpValues> {
        Ok(&self.parameters()?.group)
    }

    pub fn scheme(&self) -> Result<&SchemeParameters> {
        Ok(&self.parameters()?.scheme)
    }

    fn server_public_key(&self) -> Result<&ServerPublicKey> {
        Ok(&self.parameters()?.server_public_key)
    }

    fn private_key(&self) -> Result<&UserPrivateKey> {
        self.private_key
            .as_ref()
            .ok_or_else(|| ProtocolError::NotRegistered.into())
    }

    fn index(&self) -> Result<usize> {
        self.user_index.ok_or_else(|| ProtocolError::NotRegistered.into())
    }

    pub fn user_index(&self) -> Option<usize> {
        self.user_index
    }

    pub fn is_registered(&self) -> bool {
        self.user_index.is_some()
    }

    /// Index for display, `?` before registration.
    pub fn user_index_label(&self) -> String {
        match self.user_index {
            Some(index) => index.to_string(),
            None => "?".to_owned(),
        }
    }

    pub fn public_key(&self) -> Option<&UserPublicKey> {
        self.public_key.as_ref()
    }

    fn random(&self) -> Result<BigInteger> {
        let bits = self.group()?.q.bits();
        Ok(RandomGenerator::new(bits).generate(&mut rand::rng()))
    }

    /// Draws the secret `x(t)` sent to the server during registration.
    pub fn initialize_user_keys(&mut self) -> Result<Polynomial> {
        let degree = self.scheme()?.x_degree();
        let group = self.group()?;
        let x = Polynomial::random(degree, group.q.bits(), &group.q, &mut rand::rng());
        self.x_polynomial = Some(x.clone());
        Ok(x)
    }

    /// Completes the key pair with the issued `P(t)`, `g^{Q(t)}` and a fresh `m(t)`.
    pub fn create_keys(&mut self, polynomials: PQPolynomials) -> Result<UserPublicKey> {
        let scheme = *self.scheme()?;
        let group = self.group()?.clone();
        let x = self.x_polynomial.clone().ok_or(ProtocolError::NotRegistered)?;
        check_degree("P(t)", scheme.p_degree(), polynomials.p.degree())?;
        check_degree("Q(t)", scheme.q_degree(), polynomials.q.degree())?;

        let m = Polynomial::random(scheme.m_degree(), group.q.bits(), &group.q, &mut rand::rng());
        let qm = polynomials.q.compose(&m, scheme.qm_degree(), &group.p)?;
        let public_key = UserPublicKey { qm };
        self.private_key = Some(UserPrivateKey {
            x,
            p: polynomials.p,
            q: polynomials.q,
            m,
        });
        self.public_key = Some(public_key.clone());
        Ok(public_key)
    }

    pub fn set_user_index(&mut self, user_index: usize) {
        self.user_index = Some(user_index);
    }

    pub fn create_initialize_signature_input(&self, message: &str) -> Result<InitializeSignatureInput> {
        let x = self.random()? % &self.group()?.p;
        Ok(InitializeSignatureInput {
            user_index: self.index()?,
            message: message.to_owned(),
            x,
        })
    }

    pub fn create_join_signature_input(&self, t: &BigInteger) -> Result<JoinSignatureInput> {
        let xt = self.private_key()?.x.evaluate(t, &self.group()?.q);
        Ok(JoinSignatureInput {
            user_index: self.index()?,
            xt,
        })
    }

    pub fn create_close_signature_input(&self, signature_index: usize) -> Result<CloseSignatureInput> {
        Ok(CloseSignatureInput {
            user_index: self.index()?,
            signature_index,
        })
    }

    pub fn create_finalize_signature_output(
        &self,
        input: &FinalizeSignatureInput,
    ) -> Result<FinalizeSignatureOutput> {
        let element =
            theta_prim_element(self.group()?, self.private_key()?, &input.t, &input.gr, &input.r_st);
        Ok(FinalizeSignatureOutput {
            user_index: self.index()?,
            element,
        })
    }

    /// Inputs for signing alone: random `x`, `t`, `Z = x(t)` and `h`.
    pub fn create_sign_procedure_input(&self, message: &str) -> Result<SignProcedureInput> {
        let group = self.group()?;
        let x = self.random()? % &group.p;
        let t = calculate_t(&x, message, &group.q)?;
        let z = self.private_key()?.x.evaluate(&t, &group.q);
        let h = create_h(message, &z.to_hex());
        Ok(SignProcedureInput { t, x, d: 1, h })
    }

    pub fn create_signature(
        &self,
        input: &SignProcedureInput,
        output: SignProcedureOutput,
    ) -> Result<Signature> {
        let element = theta_prim_element(
            self.group()?,
            self.private_key()?,
            &input.t,
            &output.c.gr,
            &output.c.r_st,
        );
        Ok(Signature {
            t: input.t.clone(),
            x: input.x.clone(),
            delta: output.delta,
            theta_prim: vec![element],
            c: output.c,
            sigma: output.sigma,
        })
    }

    /// `(t, x(t), P(t), m(t))` for the signature's `t`.
    pub fn create_publish_procedure_input(&self, signature: &Signature) -> Result<PublishProcedureInput> {
        let q = &self.group()?.q;
        let key = self.private_key()?;
        let t = &signature.t;
        Ok(PublishProcedureInput {
            user_index: self.index()?,
            published: PublishedValues {
                t: t.clone(),
                xt: key.x.evaluate(t, q),
                pt: key.p.evaluate(t, q),
                mt: key.m.evaluate(t, q),
            },
        })
    }

    pub fn create_check_procedure_input(&self, user_index: usize, signature: &Signature) -> CheckProcedureInput {
        CheckProcedureInput {
            user_index,
            t: signature.t.clone(),
        }
    }

    /// `true` when the member's recomputed Theta point is in the signature.
    pub fn is_signer(
        &self,
        public_key: &UserPublicKey,
        published: &PublishedValues,
        signature: &Signature,
    ) -> Result<bool> {
        let Some(candidate) = self.candidate(public_key, published, signature)? else {
            return Ok(false);
        };
        let theta = create_theta(&signature.theta_prim, &self.group()?.p);
        Ok(theta.contains(&candidate))
    }

    /// `true` when the member is provably outside the signer set: its point
    /// lies on the same polynomial as the signers' points.
    pub fn is_not_signer(
        &self,
        public_key: &UserPublicKey,
        published: &PublishedValues,
        signature: &Signature,
    ) -> Result<bool> {
        if self.is_signer(public_key, published, signature)? {
            return Ok(false);
        }
        let Some(candidate) = self.candidate(public_key, published, signature)? else {
            return Ok(false);
        };
        self.interpolates_to_commitment(candidate, signature)
    }

    pub fn check_user(
        &self,
        public_key: &UserPublicKey,
        published: &PublishedValues,
        signature: &Signature,
    ) -> Result<Authorship> {
        let authorship = if self.is_signer(public_key, published, signature)? {
            Authorship::Signer
        } else if self.is_not_signer(public_key, published, signature)? {
            Authorship::NotSigner
        } else {
            Authorship::Cheater
        };
        debug!(?authorship, "member checked");
        Ok(authorship)
    }

    /// Server signature, message binding, and interpolation consistency.
    pub fn verify_signature(&self, message: &str, signature: &Signature) -> Result<bool> {
        Ok(self.verify_sigma(message, signature)?
            && self.verify_message_hash(message, signature)?
            && self.verify_interpolation(signature)?)
    }

    pub fn verify_sigma(&self, message: &str, signature: &Signature) -> Result<bool> {
        let h = h_from_theta_prim(message, &signature.theta_prim);
        let digest = transcript_digest(&signature.c, &signature.delta, &h)?;
        Ok(self.server_public_key()?.verify(&digest, &signature.sigma))
    }

    pub fn verify_message_hash(&self, message: &str, signature: &Signature) -> Result<bool> {
        let t = calculate_t(&signature.x, message, &self.group()?.q)?;
        Ok(t == signature.t)
    }

    /// Interpolation check with the server's dummy member in place of a real one.
    pub fn verify_interpolation(&self, signature: &Signature) -> Result<bool> {
        let group = self.group()?;
        let dummy = self
            .dummy_private_key
            .as_ref()
            .ok_or(ProtocolError::MissingDummyKey)?;
        let t = &signature.t;
        let xt = dummy.x.evaluate(t, &group.q);
        let pt = dummy.p.evaluate(t, &group.q);
        let gq_t = dummy.q.evaluate(t, &group.p);
        let candidate = ThetaElement {
            xt,
            gr_ltxt: recombine(group, &signature.c.gr, &pt, &gq_t, &signature.c.r_st),
        };
        self.interpolates_to_commitment(candidate, signature)
    }

    /// `None` when the published values are not reduced modulo `q` or `m(t)`
    /// is zero.
    fn candidate(
        &self,
        public_key: &UserPublicKey,
        published: &PublishedValues,
        signature: &Signature,
    ) -> Result<Option<ThetaElement>> {
        let group = self.group()?;
        if !published.is_canonical(&group.q) {
            debug!("published values are not canonical");
            return Ok(None);
        }
        candidate_theta(group, public_key, published, &signature.c.gr, &signature.c.r_st).map(Some)
    }

    fn interpolates_to_commitment(&self, candidate: ThetaElement, signature: &Signature) -> Result<bool> {
        let group = self.group()?;
        let (p, q) = (&group.p, &group.q);
        let theta = create_theta(&signature.theta_prim, p);
        // a second value at an argument already in Psi cannot lie on the polynomial
        let arg = &candidate.xt % q;
        if signature.delta.iter().any(|d| &d.i % q == arg)
            || theta.iter().any(|e| &e.xt % q == arg)
        {
            return Ok(false);
        }
        let psi = create_psi(
            &signature.delta,
            &theta,
            PsiElement {
                arg: candidate.xt,
                value: candidate.gr_ltxt,
            },
        );
        let gr_l = interpolate_psi(&psi, &signature.x, p)?;
        Ok(gr_l == signature.c.gr_ltx)
    }
}

fn check_degree(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(ProtocolError::UnexpectedDegree {
            what,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::server::tests::manager;
    use crate::server::GroupManager;

    fn enroll(server: &mut GroupManager) -> ClientManager {
        let mut client = ClientManager::new();
        client.set_public_parameters(server.public_parameters()).unwrap();
        let x = client.initialize_user_keys().unwrap();
        let polynomials = server.calculate_pq_polynomials(&x).unwrap();
        let public_key = client.create_keys(polynomials).unwrap();
        let index = server.register_new_user(public_key).unwrap();
        client.set_user_index(index);
        client
    }

    fn collective(server: &mut GroupManager, signers: &[&ClientManager], message: &str) -> Signature {
        let input = signers[0].create_initialize_signature_input(message).unwrap();
        let index = server.initialize_signature(input).unwrap();
        let t = server.get_t_from_pending_signature(index).unwrap();
        for signer in signers {
            let join = signer.create_join_signature_input(&t).unwrap();
            server.join_signature(index, join).unwrap();
        }
        let close = signers[0].create_close_signature_input(index).unwrap();
        server.close_signature(close).unwrap();
        let input = server.create_finalize_signature_input(index).unwrap();
        for signer in signers {
            let output = signer.create_finalize_signature_output(&input).unwrap();
            server.finalize_signature(index, output).unwrap();
        }
        server.get_signature(index).unwrap()
    }

    fn verifier(server: &GroupManager) -> ClientManager {
        let mut client = ClientManager::new();
        client
            .set_verification_material(server.verification_material())
            .unwrap();
        client
    }

    #[test]
    fn unregistered_client_cannot_sign() {
        let client = ClientManager::new();
        assert_eq!(client.user_index_label(), "?");
        assert!(!client.is_registered());
        assert!(matches!(
            client.create_sign_procedure_input("m").unwrap_err(),
            Error::Protocol(ProtocolError::MissingGroupParameters)
        ));
        assert!(matches!(
            client.create_close_signature_input(0).unwrap_err(),
            Error::Protocol(ProtocolError::NotRegistered)
        ));
    }

    #[test]
    fn enrollment_assigns_keys_and_index() {
        let (mut server, _) = manager(71);
        let alice = enroll(&mut server);
        let bob = enroll(&mut server);
        assert!(alice.is_registered());
        assert_eq!(alice.user_index(), Some(0));
        assert_eq!(bob.user_index_label(), "1");
        assert_eq!(
            server.get_user_public_key(1).unwrap(),
            bob.public_key().unwrap()
        );
    }

    #[test]
    fn issued_polynomials_with_wrong_degree_are_refused() {
        let (server, _) = manager(72);
        let mut client = ClientManager::new();
        client.set_public_parameters(server.public_parameters()).unwrap();
        let x = client.initialize_user_keys().unwrap();
        let mut polynomials = server.calculate_pq_polynomials(&x).unwrap();
        polynomials.p = Polynomial::zero(polynomials.p.degree() + 1);
        assert!(matches!(
            client.create_keys(polynomials).unwrap_err(),
            Error::Protocol(ProtocolError::UnexpectedDegree { what: "P(t)", .. })
        ));
        assert!(client.public_key().is_none());
    }

    #[test]
    fn forged_group_is_refused() {
        let (server, _) = manager(73);
        let mut parameters = server.public_parameters();
        parameters.group = GroupZpValues {
            p: BigInteger::from(15u64),
            q: BigInteger::from(7u64),
            g: BigInteger::from(4u64),
        };
        assert!(matches!(
            ClientManager::new().set_public_parameters(parameters).unwrap_err(),
            Error::Protocol(ProtocolError::InvalidGroupParameters)
        ));
    }

    #[test]
    fn overflowing_scheme_constants_are_refused() {
        let (server, _) = manager(78);
        let mut parameters = server.public_parameters();
        parameters.scheme.beta = usize::MAX;
        let mut client = ClientManager::new();
        assert!(matches!(
            client.set_public_parameters(parameters).unwrap_err(),
            Error::Config(crate::errors::ConfigError::DegreeOverflow)
        ));
        assert!(client.initialize_user_keys().is_err());
    }

    #[test]
    fn collective_signature_verifies_and_members_step_out() {
        let (mut server, _) = manager(74);
        let alice = enroll(&mut server);
        let bob = enroll(&mut server);
        let carol = enroll(&mut server);
        let signature = collective(&mut server, &[&alice, &bob], "hello");

        let verifier = verifier(&server);
        assert!(verifier.verify_sigma("hello", &signature).unwrap());
        assert!(verifier.verify_message_hash("hello", &signature).unwrap());
        assert!(verifier.verify_interpolation(&signature).unwrap());
        assert!(verifier.verify_signature("hello", &signature).unwrap());
        assert!(!verifier.verify_signature("goodbye", &signature).unwrap());

        let published = |member: &ClientManager| {
            member
                .create_publish_procedure_input(&signature)
                .unwrap()
                .published
        };
        let key = |member: &ClientManager| member.public_key().unwrap().clone();

        for signer in [&alice, &bob] {
            assert!(verifier.is_signer(&key(signer), &published(signer), &signature).unwrap());
            assert!(!verifier.is_not_signer(&key(signer), &published(signer), &signature).unwrap());
        }
        assert!(!verifier.is_signer(&key(&carol), &published(&carol), &signature).unwrap());
        assert!(verifier.is_not_signer(&key(&carol), &published(&carol), &signature).unwrap());
        assert_eq!(
            verifier.check_user(&key(&carol), &published(&carol), &signature).unwrap(),
            Authorship::NotSigner
        );

        let mut forged = published(&carol);
        forged.mt = &forged.mt + &BigInteger::one();
        assert_eq!(
            verifier.check_user(&key(&carol), &forged, &signature).unwrap(),
            Authorship::Cheater
        );
        // bob cannot claim alice's contribution
        assert_eq!(
            verifier.check_user(&key(&bob), &published(&alice), &signature).unwrap(),
            Authorship::Cheater
        );
    }

    #[test]
    fn sign_procedure_produces_a_verifiable_signature() {
        let (mut server, _) = manager(75);
        let alice = enroll(&mut server);
        let input = alice.create_sign_procedure_input("solo").unwrap();
        assert_eq!(input.d, 1);
        let output = server.sign(&input).unwrap();
        let signature = alice.create_signature(&input, output).unwrap();

        let verifier = verifier(&server);
        assert!(verifier.verify_signature("solo", &signature).unwrap());
        let published = alice.create_publish_procedure_input(&signature).unwrap().published;
        assert_eq!(
            verifier
                .check_user(alice.public_key().unwrap(), &published, &signature)
                .unwrap(),
            Authorship::Signer
        );
    }

    #[test]
    fn interpolation_check_needs_the_dummy_key() {
        let (mut server, _) = manager(76);
        let alice = enroll(&mut server);
        let signature = collective(&mut server, &[&alice], "m");
        let mut client = ClientManager::new();
        client.set_public_parameters(server.public_parameters()).unwrap();
        assert!(client.verify_sigma("m", &signature).unwrap());
        assert!(matches!(
            client.verify_signature("m", &signature).unwrap_err(),
            Error::Protocol(ProtocolError::MissingDummyKey)
        ));
    }

    #[test]
    fn unreduced_published_values_are_cheating() {
        let (mut server, _) = manager(77);
        let alice = enroll(&mut server);
        let bob = enroll(&mut server);
        let signature = collective(&mut server, &[&alice], "reduce");
        let verifier = verifier(&server);
        let q = server.public_parameters().group.q;
        let honest = alice.create_publish_procedure_input(&signature).unwrap().published;
        assert!(honest.is_canonical(&q));

        let mut shifted_xt = honest.clone();
        shifted_xt.xt = &shifted_xt.xt + &q;
        let mut zero_mt = honest.clone();
        zero_mt.mt = BigInteger::zero();
        let mut negative_pt = honest.clone();
        negative_pt.pt = &negative_pt.pt - &q;
        for published in [shifted_xt, zero_mt, negative_pt] {
            assert!(!published.is_canonical(&q));
            assert_eq!(
                verifier
                    .check_user(alice.public_key().unwrap(), &published, &signature)
                    .unwrap(),
                Authorship::Cheater
            );
        }

        // a non-signer claiming a signer's argument shifted by q
        let mut claimed = bob.create_publish_procedure_input(&signature).unwrap().published;
        claimed.xt = &signature.theta_prim[0].xt + &q;
        assert_eq!(
            verifier
                .check_user(bob.public_key().unwrap(), &claimed, &signature)
                .unwrap(),
            Authorship::Cheater
        );
    }
}
