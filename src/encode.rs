// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Encode engine
//!
//! Walks a structure's resolved descriptors in ascending order, emitting a
//! freshly computed size tag ahead of each sized field, then the field's
//! wire bytes. Size tags are always derived from the current runtime value,
//! never from stored state, so they cannot drift out of sync with the data.

use tracing::trace;

use crate::buffer::WireBuffer;
use crate::descriptor::{resolve, FieldDescriptor, WireKind};
use crate::error::{Result, WireError};
use crate::structure::{TpmStructure, Value};

/// Writes the canonical wire bytes of `s` into `buf`.
pub fn encode(s: &dyn TpmStructure, buf: &mut WireBuffer) -> Result<()> {
    let descs = resolve(s.wire_spec(), s.type_name())?;
    trace!("marshalling {} ({} fields)", s.type_name(), descs.len());
    for d in descs.iter() {
        let value = s.wire_get(d.name);
        match d.kind {
            WireKind::VariableLengthArray => {
                let count = value.count();
                trace!("  {}: array of {} elements", d.name, count);
                buf.put_size_tag(count as u64, d.size_width)?;
                put_value(buf, d, value)?;
            }
            WireKind::SizedStruct => match value {
                Value::Struct(inner) => {
                    let body = to_bytes(inner.as_ref())?;
                    trace!("  {}: sized struct of {} bytes", d.name, body.len());
                    buf.put_size_tag(body.len() as u64, d.size_width)?;
                    buf.put_bytes(&body);
                }
                Value::Absent => {
                    buf.put_size_tag(0, d.size_width)?;
                }
                other => {
                    return Err(WireError::InvalidValue {
                        field: d.name,
                        reason: format!("sized struct field holds {other:?}"),
                    });
                }
            },
            WireKind::ArrayCount | WireKind::LengthOfStruct => {
                // Derived fields never pass resolution.
                debug_assert!(false, "derived field {} reached the encoder", d.name);
            }
            _ => put_value(buf, d, value)?,
        }
    }
    Ok(())
}

/// Canonical encoding of `s` as a standalone byte vector.
pub fn to_bytes(s: &dyn TpmStructure) -> Result<Vec<u8>> {
    let mut buf = WireBuffer::new();
    encode(s, &mut buf)?;
    Ok(buf.into_vec())
}

/// Byte length of the canonical encoding of `s`.
pub fn encoded_len(s: &dyn TpmStructure) -> Result<usize> {
    Ok(to_bytes(s)?.len())
}

fn put_value(buf: &mut WireBuffer, d: &FieldDescriptor, value: Value) -> Result<()> {
    match value {
        Value::U8(v) => buf.put_u8(v),
        Value::U16(v) => buf.put_u16(v),
        Value::U32(v) => buf.put_u32(v),
        Value::U64(v) => buf.put_u64(v),
        Value::Bytes(b) => buf.put_bytes(&b),
        Value::Struct(inner) => encode(inner.as_ref(), buf)?,
        Value::List(items) => {
            for item in items {
                put_value(buf, d, item)?;
            }
        }
        // Absent optional fields contribute no payload bytes.
        Value::Absent => {}
    }
    Ok(())
}
