use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::Result;
use crate::types::Signature;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn save_signature(path: &Path, signature: &Signature) -> Result<()> {
    fs::write(path, encode(signature)?)?;
    Ok(())
}

pub fn load_signature(path: &Path) -> Result<Signature> {
    decode(&fs::read(path)?)
}
