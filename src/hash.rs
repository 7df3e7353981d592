use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::{MathError, Result};
use crate::mpi::BigInteger;

type HmacSha256 = Hmac<Sha256>;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(data);
    h.finalize().into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// HMAC-SHA256(key, text) as lowercase hex.
pub fn hmac_sha256_hex(key: &[u8], text: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    mac.update(text);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// `t = HMAC-SHA256(key = hex(x), message) mod q`.
pub fn calculate_t(x: &BigInteger, message: &str, q: &BigInteger) -> Result<BigInteger> {
    let digest = hmac_sha256_hex(x.to_hex().as_bytes(), message.as_bytes())?;
    let t = BigInteger::from_hex(&digest).ok_or(MathError::MalformedInteger(digest))?;
    Ok(t % q)
}

/// Concatenated hex of the signers' `x_i(t)` in ascending order.
pub fn create_z<'a, I>(xt_values: I) -> String
where
    I: IntoIterator<Item = &'a BigInteger>,
{
    let mut sorted: Vec<&BigInteger> = xt_values.into_iter().collect();
    sorted.sort();
    sorted.iter().map(|xt| xt.to_hex()).collect()
}

/// `H = SHA256-hex(message || Z)`.
pub fn create_h(message: &str, z: &str) -> String {
    let mut text = String::with_capacity(message.len() + z.len());
    text.push_str(message);
    text.push_str(z);
    sha256_hex(text.as_bytes())
}

/// Digest signed by the server: `SHA256(encode(C) || encode(Delta) || H)`.
pub fn transcript_digest<C: Serialize, D: Serialize>(c: &C, delta: &D, h: &str) -> Result<[u8; 32]> {
    let mut h_buf = Sha256::new();
    h_buf.update(bincode::serialize(c)?);
    h_buf.update(bincode::serialize(delta)?);
    h_buf.update(h.as_bytes());
    Ok(h_buf.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_answer() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hmac_known_answer() {
        // RFC 4231, test case 2
        assert_eq!(
            hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn t_is_keyed_by_x_and_reduced() {
        let q = BigInteger::from(1_000_000_007u64);
        let x = BigInteger::from(0xdeadu64);
        let t = calculate_t(&x, "hello", &q).unwrap();
        assert!(t < q);
        assert_eq!(t, calculate_t(&x, "hello", &q).unwrap());
        assert_ne!(t, calculate_t(&BigInteger::from(0xbeefu64), "hello", &q).unwrap());
        assert_ne!(t, calculate_t(&x, "hello!", &q).unwrap());
    }

    #[test]
    fn z_is_order_independent() {
        let a = BigInteger::from(0x20u64);
        let b = BigInteger::from(0x3u64);
        let c = BigInteger::from(0x100u64);
        assert_eq!(create_z([&c, &a, &b]), "320100");
        assert_eq!(create_z([&a, &b, &c]), create_z([&b, &c, &a]));
        assert_eq!(create_h("m", "ab"), sha256_hex(b"mab"));
    }

    #[test]
    fn transcript_binds_every_part() {
        let base = transcript_digest(&1u32, &vec![2u32], "h").unwrap();
        assert_ne!(base, transcript_digest(&9u32, &vec![2u32], "h").unwrap());
        assert_ne!(base, transcript_digest(&1u32, &vec![3u32], "h").unwrap());
        assert_ne!(base, transcript_digest(&1u32, &vec![2u32], "g").unwrap());
    }
}
