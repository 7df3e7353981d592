use rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::errors::Result;
use crate::mpi::BigInteger;

/// RSA PKCS#1 v1.5 signature over a SHA-256 transcript digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sigma(pub Vec<u8>);

/// Server public key as it travels on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPublicKey {
    pub modulus: BigInteger,
    pub exponent: BigInteger,
}

impl ServerPublicKey {
    fn to_rsa(&self) -> Result<RsaPublicKey> {
        let n = rsa::BigUint::from_bytes_be(&self.modulus.to_bytes_be());
        let e = rsa::BigUint::from_bytes_be(&self.exponent.to_bytes_be());
        Ok(RsaPublicKey::new(n, e)?)
    }

    /// `false` for a malformed key or a signature that does not match.
    pub fn verify(&self, digest: &[u8; 32], sigma: &Sigma) -> bool {
        match self.to_rsa() {
            Ok(key) => key
                .verify(Pkcs1v15Sign::new::<Sha256>(), digest, &sigma.0)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// The server's signing key.
#[derive(Clone, Debug)]
pub struct ServerKeyPair {
    private_key: RsaPrivateKey,
}

impl ServerKeyPair {
    pub fn generate(bits: usize) -> Result<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)?;
        Ok(Self { private_key })
    }

    pub fn sign(&self, digest: &[u8; 32]) -> Result<Sigma> {
        let signature = self
            .private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), digest)?;
        Ok(Sigma(signature))
    }

    pub fn public_key(&self) -> ServerPublicKey {
        let public_key = RsaPublicKey::from(&self.private_key);
        ServerPublicKey {
            modulus: BigInteger::from_bytes_be(&public_key.n().to_bytes_be()),
            exponent: BigInteger::from_bytes_be(&public_key.e().to_bytes_be()),
        }
    }
}
