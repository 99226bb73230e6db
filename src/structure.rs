// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! The contract every wire-marshallable structure type implements
//!
//! A type participates in marshalling by exposing a static descriptor table
//! and a name-keyed view of its field values. The engines never touch a
//! type's fields directly; everything flows through [`Value`].

use std::any::Any;
use std::fmt;

use crate::descriptor::FieldSpec;
use crate::error::{Result, WireError};

/// A runtime view of one field's value.
///
/// For array fields, `Bytes` carries a byte array and `List` carries the
/// elements of any other array. `Absent` stands for an optional field with
/// no value; it encodes as a zero-length size tag, or as nothing at all for
/// conditional fields.
#[derive(Debug)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bytes(Vec<u8>),
    Struct(Box<dyn TpmStructure>),
    List(Vec<Value>),
    Absent,
}

impl Value {
    /// Element count for size-tag computation: array length, or zero for
    /// an absent field.
    pub fn count(&self) -> usize {
        match self {
            Value::Bytes(b) => b.len(),
            Value::List(items) => items.len(),
            Value::Absent => 0,
            _ => 1,
        }
    }

    /// The scalar value widened to `u64`, if this is a scalar.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(v) => Some(*v as u64),
            Value::U16(v) => Some(*v as u64),
            Value::U32(v) => Some(*v as u64),
            Value::U64(v) => Some(*v),
            _ => None,
        }
    }

    fn mismatch(self, field: &'static str, expected: &str) -> WireError {
        WireError::InvalidValue {
            field,
            reason: format!("expected {expected}, got {self:?}"),
        }
    }

    pub fn into_u8(self, field: &'static str) -> Result<u8> {
        match self {
            Value::U8(v) => Ok(v),
            other => Err(other.mismatch(field, "u8")),
        }
    }

    pub fn into_u16(self, field: &'static str) -> Result<u16> {
        match self {
            Value::U16(v) => Ok(v),
            other => Err(other.mismatch(field, "u16")),
        }
    }

    pub fn into_u32(self, field: &'static str) -> Result<u32> {
        match self {
            Value::U32(v) => Ok(v),
            other => Err(other.mismatch(field, "u32")),
        }
    }

    pub fn into_u64(self, field: &'static str) -> Result<u64> {
        match self {
            Value::U64(v) => Ok(v),
            other => Err(other.mismatch(field, "u64")),
        }
    }

    pub fn into_bytes(self, field: &'static str) -> Result<Vec<u8>> {
        match self {
            Value::Bytes(b) => Ok(b),
            other => Err(other.mismatch(field, "bytes")),
        }
    }

    pub fn into_list(self, field: &'static str) -> Result<Vec<Value>> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch(field, "list")),
        }
    }

    /// Takes the nested structure out of the value, downcasting it to the
    /// concrete declared type.
    pub fn into_struct<T: TpmStructure>(self, field: &'static str) -> Result<T> {
        let expected = std::any::type_name::<T>();
        match self {
            Value::Struct(boxed) => match boxed.into_any().downcast::<T>() {
                Ok(v) => Ok(*v),
                Err(_) => Err(WireError::InvalidValue {
                    field,
                    reason: format!("nested structure is not a {expected}"),
                }),
            },
            other => Err(other.mismatch(field, expected)),
        }
    }
}

/// A structure type participating in the TPM wire protocol.
///
/// Union enums also implement this trait, delegating every method to their
/// active variant so the engines can recurse into them uniformly.
pub trait TpmStructure: Any + fmt::Debug {
    /// The static descriptor table driving encode and decode.
    fn wire_spec(&self) -> &'static [FieldSpec];

    fn type_name(&self) -> &'static str;

    /// Current value of the named field.
    ///
    /// Only called with names from this type's own descriptor table.
    fn wire_get(&self, field: &str) -> Value;

    /// Writes a decoded value back into the named field.
    fn wire_set(&mut self, field: &str, value: Value) -> Result<()>;

    fn clone_box(&self) -> Box<dyn TpmStructure>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl Clone for Box<dyn TpmStructure> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Decode constructor for any `Default` structure type; descriptor tables
/// name this as `boxed_default::<T>`.
pub fn boxed_default<T: TpmStructure + Default>() -> Box<dyn TpmStructure> {
    Box::new(T::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count() {
        assert_eq!(Value::Bytes(vec![1, 2, 3]).count(), 3);
        assert_eq!(Value::List(vec![Value::U8(1)]).count(), 1);
        assert_eq!(Value::Absent.count(), 0);
        assert_eq!(Value::U32(7).count(), 1);
    }

    #[test]
    fn test_as_u64_widens() {
        assert_eq!(Value::U8(0xFF).as_u64(), Some(0xFF));
        assert_eq!(Value::U16(0x1234).as_u64(), Some(0x1234));
        assert_eq!(Value::Bytes(vec![]).as_u64(), None);
    }

    #[test]
    fn test_conversion_mismatch() {
        let err = Value::U8(1).into_u16("field").unwrap_err();
        assert!(matches!(err, WireError::InvalidValue { field: "field", .. }));
    }
}
