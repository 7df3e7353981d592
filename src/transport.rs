//! Length-prefixed framing over a reliable byte stream.
//!
//! A frame is a 4-byte big-endian payload length followed by the payload,
//! which carries exactly one bincode-encoded value.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{decode, encode};
use crate::errors::{Error, Result};

pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

pub struct Connection<S> {
    stream: S,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn send_frame(&mut self, payload: &[u8]) -> Result<()> {
        let len = u32::try_from(payload.len())
            .ok()
            .filter(|len| *len as usize <= MAX_FRAME_LEN)
            .ok_or_else(|| oversized(payload.len()))?;
        self.stream.write_all(&len.to_be_bytes())?;
        self.stream.write_all(payload)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn recv_frame(&mut self) -> Result<Vec<u8>> {
        let mut header = [0u8; 4];
        self.stream.read_exact(&mut header)?;
        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_FRAME_LEN {
            return Err(oversized(len));
        }
        let mut payload = vec![0u8; len];
        self.stream.read_exact(&mut payload)?;
        Ok(payload)
    }

    pub fn send<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.send_frame(&encode(value)?)
    }

    pub fn recv<T: DeserializeOwned>(&mut self) -> Result<T> {
        decode(&self.recv_frame()?)
    }
}

fn oversized(len: usize) -> Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"),
    )
    .into()
}
