//! Computations shared by the signing, step-out and verification paths.

use crate::errors::Result;
use crate::exponent::interpolate_in_point;
use crate::group::GroupZpValues;
use crate::hash::{create_h, create_z};
use crate::mpi::BigInteger;
use crate::types::{
    Delta, PsiElement, PublishedValues, Psi, Theta, ThetaElement, ThetaPrim, ThetaPrimElement,
    UserPrivateKey, UserPublicKey,
};

/// A signer's contribution `(x(t), (g^r)^{P(t)}, (g^{Q(t)})^{r S(t)})`.
pub fn theta_prim_element(
    group: &GroupZpValues,
    key: &UserPrivateKey,
    t: &BigInteger,
    gr: &BigInteger,
    r_st: &BigInteger,
) -> ThetaPrimElement {
    let xt = key.x.evaluate(t, &group.q);
    let pt = key.p.evaluate(t, &group.q);
    let gq_t = key.q.evaluate(t, &group.p);
    ThetaPrimElement {
        xt,
        gr_pt: group.pow(gr, &pt),
        gq_tr_st: group.pow(&gq_t, r_st),
    }
}

/// `g^{r L(t, x(t))} = (g^r)^{P(t)} (g^{Q(t)})^{r S(t)}`.
pub fn recombine(
    group: &GroupZpValues,
    gr: &BigInteger,
    pt: &BigInteger,
    gq_t: &BigInteger,
    r_st: &BigInteger,
) -> BigInteger {
    group.mul(&group.pow(gr, pt), &group.pow(gq_t, r_st))
}

/// Strips `m(t)` from the public key: `g^{Q(t)} = (g^{Q(t) m(t)})^{m(t)^{-1}}`.
pub fn g_q_at(
    group: &GroupZpValues,
    public_key: &UserPublicKey,
    published: &PublishedValues,
) -> Result<BigInteger> {
    let gqm_t = public_key.qm.evaluate(&published.t, &group.p);
    let m_inverse = (&published.mt % &group.q).inv_mod(&group.q)?;
    Ok(group.pow(&gqm_t, &m_inverse))
}

/// Theta point a member claims from its published values.
pub fn candidate_theta(
    group: &GroupZpValues,
    public_key: &UserPublicKey,
    published: &PublishedValues,
    gr: &BigInteger,
    r_st: &BigInteger,
) -> Result<ThetaElement> {
    let gq_t = g_q_at(group, public_key, published)?;
    Ok(ThetaElement {
        xt: published.xt.clone(),
        gr_ltxt: recombine(group, gr, &published.pt, &gq_t, r_st),
    })
}

pub fn create_theta(theta_prim: &ThetaPrim, p: &BigInteger) -> Theta {
    theta_prim.iter().map(|e| e.to_theta(p)).collect()
}

/// Decoys, then the signers, then the extra point.
pub fn create_psi(delta: &Delta, theta: &Theta, extra: PsiElement) -> Psi {
    let mut psi = Vec::with_capacity(delta.len() + theta.len() + 1);
    psi.extend(delta.iter().map(|d| PsiElement {
        arg: d.i.clone(),
        value: d.gr_lti.clone(),
    }));
    psi.extend(theta.iter().map(|e| PsiElement {
        arg: e.xt.clone(),
        value: e.gr_ltxt.clone(),
    }));
    psi.push(extra);
    psi
}

/// `g^{r L'(t, x)}` for the polynomial through every point of `psi`.
pub fn interpolate_psi(psi: &Psi, x: &BigInteger, p: &BigInteger) -> Result<BigInteger> {
    let (args, values): (Vec<BigInteger>, Vec<BigInteger>) = psi
        .iter()
        .map(|e| (e.arg.clone(), e.value.clone()))
        .unzip();
    interpolate_in_point(&args, &values, x, p)
}

/// `H` recomputed from the signers' `x_i(t)` carried in `ThetaPrim`.
pub fn h_from_theta_prim(message: &str, theta_prim: &ThetaPrim) -> String {
    let z = create_z(theta_prim.iter().map(|e| &e.xt));
    create_h(message, &z)
}
