//! Server-side state of signatures that are still being assembled.

use std::collections::BTreeMap;

use crate::errors::{ProtocolError, Result};
use crate::mpi::BigInteger;
use crate::signing::Sigma;
use crate::types::{Delta, Signature, ThetaPrim, ThetaPrimElement, C};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignatureStatus {
    Open,
    Closed,
}

#[derive(Clone, Debug)]
struct ClosedFields {
    delta: Delta,
    c: C,
    sigma: Sigma,
}

#[derive(Clone, Debug)]
pub struct PendingSignature {
    index: usize,
    status: SignatureStatus,
    initiator: usize,
    message: String,
    t: BigInteger,
    x: BigInteger,
    signers_xt: BTreeMap<usize, BigInteger>,
    theta_prim_elements: BTreeMap<usize, ThetaPrimElement>,
    closed: Option<ClosedFields>,
    theta_prim: Option<ThetaPrim>,
}

impl PendingSignature {
    fn new(index: usize, initiator: usize, message: String, t: BigInteger, x: BigInteger) -> Self {
        Self {
            index,
            status: SignatureStatus::Open,
            initiator,
            message,
            t,
            x,
            signers_xt: BTreeMap::new(),
            theta_prim_elements: BTreeMap::new(),
            closed: None,
            theta_prim: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> SignatureStatus {
        self.status
    }

    pub fn initiator(&self) -> usize {
        self.initiator
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn t(&self) -> &BigInteger {
        &self.t
    }

    pub fn x(&self) -> &BigInteger {
        &self.x
    }

    pub fn signers_xt(&self) -> &BTreeMap<usize, BigInteger> {
        &self.signers_xt
    }

    pub fn signer_count(&self) -> usize {
        self.signers_xt.len()
    }

    pub fn is_complete(&self) -> bool {
        self.theta_prim.is_some()
    }

    /// Records (or replaces) a signer's `x_i(t)` while the signature is open.
    pub fn add_signer(&mut self, user_index: usize, xt: BigInteger, max_signers: usize) -> Result<()> {
        if self.status != SignatureStatus::Open {
            return Err(ProtocolError::SignatureClosed(self.index).into());
        }
        if !self.signers_xt.contains_key(&user_index) && self.signers_xt.len() >= max_signers {
            return Err(ProtocolError::TooManySigners {
                count: self.signers_xt.len() + 1,
                max: max_signers,
            }
            .into());
        }
        self.signers_xt.insert(user_index, xt);
        Ok(())
    }

    /// Fails unless `user_index` may close this signature now.
    pub fn check_close(&self, user_index: usize) -> Result<()> {
        if self.initiator != user_index {
            return Err(ProtocolError::NotInitiator {
                user: user_index,
                signature: self.index,
            }
            .into());
        }
        if self.status != SignatureStatus::Open {
            return Err(ProtocolError::SignatureClosed(self.index).into());
        }
        if self.signers_xt.is_empty() {
            return Err(ProtocolError::NoSigners(self.index).into());
        }
        Ok(())
    }

    pub fn close(&mut self, user_index: usize, delta: Delta, c: C, sigma: Sigma) -> Result<()> {
        self.check_close(user_index)?;
        self.closed = Some(ClosedFields { delta, c, sigma });
        self.status = SignatureStatus::Closed;
        Ok(())
    }

    pub fn c(&self) -> Result<&C> {
        self.closed
            .as_ref()
            .map(|fields| &fields.c)
            .ok_or_else(|| ProtocolError::SignatureNotClosed(self.index).into())
    }

    /// Stores a signer's contribution. Returns `true` once every signer has
    /// contributed and `ThetaPrim` is assembled.
    pub fn finalize(&mut self, user_index: usize, element: ThetaPrimElement) -> Result<bool> {
        if self.status != SignatureStatus::Closed {
            return Err(ProtocolError::SignatureNotClosed(self.index).into());
        }
        if !self.signers_xt.contains_key(&user_index) {
            return Err(ProtocolError::NotASigner {
                user: user_index,
                signature: self.index,
            }
            .into());
        }
        self.theta_prim_elements.insert(user_index, element);
        if self.theta_prim_elements.len() == self.signers_xt.len() {
            // BTreeMap iteration keeps ThetaPrim ordered by user index
            self.theta_prim = Some(self.theta_prim_elements.values().cloned().collect());
        }
        Ok(self.is_complete())
    }

    pub fn signature(&self) -> Result<Signature> {
        let closed = self
            .closed
            .as_ref()
            .ok_or(ProtocolError::SignatureNotClosed(self.index))?;
        let theta_prim = self
            .theta_prim
            .as_ref()
            .ok_or(ProtocolError::SignatureIncomplete(self.index))?;
        Ok(Signature {
            t: self.t.clone(),
            x: self.x.clone(),
            delta: closed.delta.clone(),
            theta_prim: theta_prim.clone(),
            c: closed.c.clone(),
            sigma: closed.sigma.clone(),
        })
    }
}

/// Append-only collection; a signature's index is its position.
#[derive(Clone, Debug, Default)]
pub struct PendingSignatures {
    signatures: Vec<PendingSignature>,
}

impl PendingSignatures {
    pub fn add(&mut self, initiator: usize, message: String, t: BigInteger, x: BigInteger) -> usize {
        let index = self.signatures.len();
        self.signatures
            .push(PendingSignature::new(index, initiator, message, t, x));
        index
    }

    pub fn get(&self, index: usize) -> Result<&PendingSignature> {
        self.signatures
            .get(index)
            .ok_or_else(|| ProtocolError::UnknownSignature(index).into())
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut PendingSignature> {
        self.signatures
            .get_mut(index)
            .ok_or_else(|| ProtocolError::UnknownSignature(index).into())
    }
}
