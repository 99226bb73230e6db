// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for wire marshalling and unmarshalling

use thiserror::Error;

/// Errors surfaced by descriptor resolution and the encode/decode engines.
///
/// All of these are terminal: they are raised at the point of failure and
/// propagated to the top-level caller with no partial result and no retry.
#[derive(Debug, Error)]
pub enum WireError {
    /// A structure declared a malformed descriptor table (duplicate order,
    /// dangling selector reference, bad size-tag width). Always a programming
    /// error in the declaring type, never recoverable at runtime.
    #[error("bad descriptor table for {type_name}: {reason}")]
    Descriptor {
        type_name: &'static str,
        reason: String,
    },

    /// Decoding required more bytes than the input had remaining.
    #[error("truncated input at offset {offset}: needed {needed} bytes, {remaining} remaining")]
    TruncatedInput {
        needed: usize,
        remaining: usize,
        offset: usize,
    },

    /// A decoded selector value has no registered union variant.
    #[error("unknown selector value {selector:#06x} for union {union_type}")]
    UnknownUnionSelector {
        selector: u64,
        union_type: &'static str,
    },

    /// A sized struct's declared length disagrees with its own re-encoded
    /// length. Indicates transport corruption or a TPM-side mismatch.
    #[error("size mismatch in {field}: declared {declared} bytes, re-encoded to {actual}")]
    SizeMismatch {
        field: &'static str,
        declared: u64,
        actual: u64,
    },

    /// A length does not fit the declared size-tag width.
    #[error("length {len} does not fit in a {width}-byte size tag")]
    SizeTagOverflow { len: u64, width: u8 },

    /// A decoded value is outside the declared field's domain, or a value of
    /// the wrong shape was written back into a field.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, WireError>;
