//! Purpose: Shared immutable byte storage with text encodings and digests.
//! Exports: `Buffer`.
//! Role: The binary leaf of the value model; CBOR byte strings decode into it.
//! Invariants: Contents never mutate after construction; clones share storage.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use sha2::{Digest, Sha256};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone)]
pub struct Buffer {
    bytes: Arc<Vec<u8>>,
}

impl Buffer {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::new(bytes),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Self {
        Self::new(bytes.to_vec())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read buffer")
                .with_path(path)
                .with_source(err)
        })?;
        Ok(Self::new(bytes))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        std::fs::write(path, self.as_slice()).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write buffer")
                .with_path(path)
                .with_source(err)
        })
    }

    /// Uppercase hex, two digits per byte.
    pub fn hex(&self) -> String {
        const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
        let mut out = String::with_capacity(self.bytes.len() * 2);
        for byte in self.bytes.iter() {
            out.push(DIGITS[(byte >> 4) as usize] as char);
            out.push(DIGITS[(byte & 0xF) as usize] as char);
        }
        out
    }

    pub fn from_hex(input: &str) -> Result<Self, Error> {
        if input.len() % 2 != 0 {
            return Err(Error::new(ErrorKind::Parse).with_message("odd hex length"));
        }
        let mut out = Vec::with_capacity(input.len() / 2);
        let raw = input.as_bytes();
        for pair in raw.chunks_exact(2) {
            let hi = hex_digit(pair[0])?;
            let lo = hex_digit(pair[1])?;
            out.push((hi << 4) | lo);
        }
        Ok(Self::new(out))
    }

    /// Standard alphabet with padding.
    pub fn base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.as_slice())
    }

    pub fn from_base64(input: &str) -> Result<Self, Error> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(input)
            .map_err(|err| {
                Error::new(ErrorKind::Parse)
                    .with_message("invalid base64")
                    .with_source(err)
            })?;
        Ok(Self::new(bytes))
    }

    /// Hex sha256 of the contents.
    pub fn sha256(&self) -> String {
        let digest = Sha256::digest(self.as_slice());
        let mut out = String::with_capacity(64);
        for byte in digest {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}

fn hex_digit(ch: u8) -> Result<u8, Error> {
    match ch {
        b'0'..=b'9' => Ok(ch - b'0'),
        b'a'..=b'f' => Ok(ch - b'a' + 10),
        b'A'..=b'F' => Ok(ch - b'A' + 10),
        other => Err(Error::new(ErrorKind::Parse)
            .with_message(format!("invalid hex digit {:?}", other as char))),
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buffer({} bytes)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::Buffer;

    #[test]
    fn hex_round_trip() {
        let buf = Buffer::from_slice(b"svar");
        let hex = buf.hex();
        assert_eq!(hex, "73766172");
        assert_eq!(Buffer::from_hex(&hex).unwrap().as_slice(), b"svar");
    }

    #[test]
    fn base64_round_trip() {
        let buf = Buffer::from_slice(b"any carnal pleasure");
        let encoded = buf.base64();
        assert_eq!(
            Buffer::from_base64(&encoded).unwrap().as_slice(),
            buf.as_slice()
        );
        assert_eq!(Buffer::from_slice(b"M").base64(), "TQ==");
    }

    #[test]
    fn rejects_bad_hex() {
        assert!(Buffer::from_hex("abc").is_err());
        assert!(Buffer::from_hex("zz").is_err());
    }

    #[test]
    fn digest_is_stable() {
        let buf = Buffer::from_slice(b"abc");
        assert_eq!(
            buf.sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let buf = Buffer::from_slice(&[0u8, 1, 2, 255]);
        buf.save(&path).unwrap();
        let loaded = Buffer::load(&path).unwrap();
        assert_eq!(loaded.as_slice(), buf.as_slice());
    }
}
