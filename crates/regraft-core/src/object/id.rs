//! Hex object identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Errors from parsing an [`ObjectId`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The identifier was empty.
    #[error("object id is empty")]
    Empty,

    /// The identifier contained a non-hex character.
    #[error("object id contains non-hex byte {byte:#04x} at offset {offset}")]
    NotHex {
        /// The offending byte.
        byte: u8,
        /// Byte offset of the first offending character.
        offset: usize,
    },
}

/// A content identifier: the lowercase hex fingerprint of an object's bytes.
///
/// Identical bytes always yield identical ids, which is the property every
/// cache and every idempotent store write in this crate leans on. The id
/// length is store-defined (40 hex chars for SHA-1 backends, 64 for BLAKE3),
/// so no fixed width is enforced here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse an id from a hex string. Uppercase input is folded to lowercase.
    ///
    /// # Errors
    ///
    /// Returns [`IdError`] if the string is empty or contains a non-hex
    /// character.
    pub fn from_hex(hex: &str) -> Result<Self, IdError> {
        let hex = hex.trim();
        if hex.is_empty() {
            return Err(IdError::Empty);
        }
        for (offset, byte) in hex.bytes().enumerate() {
            if !byte.is_ascii_hexdigit() {
                return Err(IdError::NotHex { byte, offset });
            }
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Borrow the id as its hex string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ObjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
