// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Descriptor-driven marshalling core for the TPM 2.0 wire format
//!
//! This crate converts declared structure types to and from the TPM's
//! canonical big-endian byte encoding without per-type serialization code.
//! Each type exposes a static table of field descriptors naming its wire
//! kind, encode order and tag linkages; the generic engines do the rest:
//!
//! - **Size tags** are computed from the referenced field's runtime length
//!   on encode and drive array/struct parsing on decode.
//! - **Tagged unions** carry no discriminant of their own; an earlier
//!   selector field's decoded value picks the variant.
//! - **Equality and hashing** are defined purely over the canonical
//!   encoding, independent of in-memory layout.
//!
//! ## Example
//!
//! ```
//! use tpm2_wire::{from_bytes, Tpm2bDigest, TpmStructureExt};
//!
//! let digest = Tpm2bDigest::new(vec![0xAA, 0xBB, 0xCC]);
//! assert_eq!(digest.to_bytes()?, vec![0x00, 0x03, 0xAA, 0xBB, 0xCC]);
//!
//! let back: Tpm2bDigest = from_bytes(&[0x00, 0x03, 0xAA, 0xBB, 0xCC])?;
//! assert!(back.wire_eq(&digest));
//! # Ok::<(), tpm2_wire::WireError>(())
//! ```

mod buffer;
mod canonical;
mod constants;
mod decode;
mod descriptor;
mod encode;
mod error;
mod print;
mod structure;
mod types;

pub use buffer::{WireBuffer, WireReader};
pub use canonical::{equals, hash, to_tpm2b, wrap_size_prefixed, TpmStructureExt};
pub use constants::TpmAlgId;
pub use decode::{decode, decode_into, from_bytes};
pub use descriptor::{
    resolve, FieldDescriptor, FieldSpec, StructCtor, TypeDecl, VariantFn, WireKind,
};
pub use encode::{encode, encoded_len, to_bytes};
pub use error::{Result, WireError};
pub use print::render;
pub use structure::{boxed_default, TpmStructure, Value};
pub use types::*;
