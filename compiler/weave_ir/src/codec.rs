//! Binary class codec.
//!
//! Layout: 4-byte magic `WVCL`, a little-endian `u16` format version, then a
//! `bincode` body of the [`ClassNode`]. The tree only contains ordered
//! vectors, so encoding is deterministic.

use thiserror::Error;

use crate::node::ClassNode;

/// Leading magic of every encoded class.
pub const MAGIC: [u8; 4] = *b"WVCL";

/// Current body format version.
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("class data truncated ({len} bytes)")]
    Truncated { len: usize },
    #[error("bad class magic {0:02x?}")]
    InvalidMagic([u8; 4]),
    #[error("unsupported class format version {found} (expected {FORMAT_VERSION})")]
    UnsupportedVersion { found: u16 },
    #[error("malformed class body: {0}")]
    Body(#[from] bincode::Error),
}

impl ClassNode {
    /// Encode this class.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        let body = bincode::serialize(self)?;
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decode a class.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() < HEADER_LEN {
            return Err(CodecError::Truncated { len: bytes.len() });
        }
        let magic = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if magic != MAGIC {
            return Err(CodecError::InvalidMagic(magic));
        }
        let found = u16::from_le_bytes([bytes[4], bytes[5]]);
        if found != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion { found });
        }
        Ok(bincode::deserialize(&bytes[HEADER_LEN..])?)
    }
}

#[cfg(test)]
mod tests;
