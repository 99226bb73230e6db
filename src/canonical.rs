// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Canonical equality, hashing and size-prefixed wrapping
//!
//! Structural identity is a pure function of the wire representation: two
//! instances are equal iff their types match exactly and their canonical
//! encodings are byte-identical, and the hash code is derived from the
//! encoding alone.

use sha2::{Digest, Sha256};

use crate::encode::to_bytes;
use crate::error::{Result, WireError};
use crate::structure::TpmStructure;

/// Wraps already-encoded bytes as a TPM2B: a 2-byte big-endian length
/// followed by the original bytes.
pub fn wrap_size_prefixed(bytes: &[u8]) -> Result<Vec<u8>> {
    let len = bytes.len() as u64;
    if len > u16::MAX as u64 {
        return Err(WireError::SizeTagOverflow { len, width: 2 });
    }
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(out)
}

/// Canonical encoding of `s` boxed as a TPM2B.
pub fn to_tpm2b(s: &dyn TpmStructure) -> Result<Vec<u8>> {
    wrap_size_prefixed(&to_bytes(s)?)
}

/// Structural equality: exact type match plus byte-identical canonical
/// encodings. An instance that fails to encode compares unequal.
pub fn equals(a: &dyn TpmStructure, b: &dyn TpmStructure) -> bool {
    if a.as_any().type_id() != b.as_any().type_id() {
        return false;
    }
    match (to_bytes(a), to_bytes(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Hash code derived from the canonical encoding: an encoding no longer
/// than a machine word is interpreted directly as a big-endian integer,
/// anything longer is digested with SHA-256 and the first eight digest
/// bytes are taken.
pub fn hash(s: &dyn TpmStructure) -> Result<u64> {
    let bytes = to_bytes(s)?;
    let mut word = [0u8; 8];
    if bytes.len() <= 8 {
        word[8 - bytes.len()..].copy_from_slice(&bytes);
    } else {
        let digest = Sha256::digest(&bytes);
        word.copy_from_slice(&digest[..8]);
    }
    Ok(u64::from_be_bytes(word))
}

/// Named marshalling operations available on every structure type.
pub trait TpmStructureExt: TpmStructure + Sized {
    /// Canonical wire encoding.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        to_bytes(self)
    }

    /// Canonical wire encoding wrapped as a TPM2B.
    fn to_tpm2b(&self) -> Result<Vec<u8>> {
        to_tpm2b(self)
    }

    /// Structural equality against any other structure.
    fn wire_eq(&self, other: &dyn TpmStructure) -> bool {
        equals(self, other)
    }

    /// Canonical hash code.
    fn wire_hash(&self) -> Result<u64> {
        hash(self)
    }
}

impl<T: TpmStructure> TpmStructureExt for T {}
