// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Decode engine
//!
//! Walks a structure's resolved descriptors in ascending order, reading size
//! and selector tags first and using their values to drive the rest of the
//! parse: array lengths, sized-struct presence, union variant choice, and
//! conditional field skips. Every field value is resolved before any of them
//! is written back, so a failed decode never leaves a half-populated
//! instance in the caller's hands.

use tracing::trace;

use crate::buffer::WireReader;
use crate::descriptor::{resolve, FieldDescriptor, TypeDecl, WireKind};
use crate::encode::encoded_len;
use crate::error::{Result, WireError};
use crate::structure::{TpmStructure, Value};

/// Decodes one instance of `T` from the reader.
pub fn decode<T: TpmStructure + Default>(reader: &mut WireReader) -> Result<T> {
    let mut instance = T::default();
    decode_into(&mut instance, reader)?;
    Ok(instance)
}

/// Decodes one instance of `T` from a standalone byte slice.
pub fn from_bytes<T: TpmStructure + Default>(bytes: &[u8]) -> Result<T> {
    let mut reader = WireReader::new(bytes);
    decode(&mut reader)
}

/// Populates `s` from the reader, consuming exactly the bytes its
/// descriptor table demands. This is the streaming form used for recursion
/// into nested structures and union payloads.
pub fn decode_into(s: &mut dyn TpmStructure, reader: &mut WireReader) -> Result<()> {
    let descs = resolve(s.wire_spec(), s.type_name())?;
    trace!("unmarshalling {} ({} fields)", s.type_name(), descs.len());

    // Size-tag and selector values decoded so far, by descriptor index.
    let mut tags: Vec<Option<u64>> = vec![None; descs.len()];
    let mut resolved: Vec<Option<Value>> = Vec::with_capacity(descs.len());
    resolved.resize_with(descs.len(), || None);

    for (idx, d) in descs.iter().enumerate() {
        match d.kind {
            WireKind::Union => {
                let selector = d
                    .tag
                    .and_then(|t| tags[t])
                    .ok_or_else(|| WireError::Descriptor {
                        type_name: s.type_name(),
                        reason: format!("union {} decoded before its selector", d.name),
                    })?;
                let variants = match d.decl {
                    TypeDecl::Union(f) => f,
                    _ => {
                        return Err(WireError::Descriptor {
                            type_name: s.type_name(),
                            reason: format!("union {} has no variant mapping", d.name),
                        });
                    }
                };
                let mut payload =
                    variants(selector).ok_or(WireError::UnknownUnionSelector {
                        selector,
                        union_type: d.type_name,
                    })?;
                trace!("  {}: union variant for selector {:#x}", d.name, selector);
                decode_into(payload.as_mut(), reader)?;
                resolved[idx] = Some(Value::Struct(payload));
            }
            WireKind::FixedLengthArray => {
                // The element count is part of the type shape, taken from
                // the field's existing default value.
                let count = s.wire_get(d.name).count();
                resolved[idx] = Some(read_elements(reader, d, count)?);
            }
            WireKind::VariableLengthArray => {
                let count = reader.get_size_tag(d.size_width)?;
                trace!("  {}: array of {} elements", d.name, count);
                tags[idx] = Some(count);
                resolved[idx] = Some(read_elements(reader, d, count as usize)?);
            }
            WireKind::SizedStruct => {
                let declared = reader.get_size_tag(d.size_width)?;
                tags[idx] = Some(declared);
                if declared == 0 {
                    trace!("  {}: absent sized struct", d.name);
                    continue;
                }
                let ctor = match d.decl {
                    TypeDecl::Struct(f) => f,
                    _ => {
                        return Err(WireError::Descriptor {
                            type_name: s.type_name(),
                            reason: format!("sized struct {} has no constructor", d.name),
                        });
                    }
                };
                let mut inner = ctor();
                decode_into(inner.as_mut(), reader)?;
                // Format self-consistency: the nested structure must
                // re-encode to exactly its declared length.
                let actual = encoded_len(inner.as_ref())? as u64;
                if actual != declared {
                    return Err(WireError::SizeMismatch {
                        field: d.name,
                        declared,
                        actual,
                    });
                }
                resolved[idx] = Some(Value::Struct(inner));
            }
            WireKind::Normal | WireKind::UnionSelector => {
                // Conditionally present: skipped when the linked size or
                // selector tag decoded to zero.
                if d.tag.is_some_and(|t| tags[t] == Some(0)) {
                    trace!("  {}: skipped, tag is zero", d.name);
                    continue;
                }
                let value = read_value(reader, s.type_name(), d)?;
                if d.kind == WireKind::UnionSelector {
                    tags[idx] = value.as_u64();
                }
                resolved[idx] = Some(value);
            }
            WireKind::ArrayCount | WireKind::LengthOfStruct => {
                // Derived fields never pass resolution and are never
                // decode targets.
                debug_assert!(false, "derived field {} reached the decoder", d.name);
            }
        }
    }

    // Apply phase: write everything back, selector values included. All
    // writes land on a scratch copy first; a rejected value must not leave
    // the caller's instance half-populated.
    let mut scratch = s.clone_box();
    let mut written: Vec<usize> = Vec::with_capacity(descs.len());
    for (idx, d) in descs.iter().enumerate() {
        if let Some(value) = resolved[idx].take() {
            scratch.wire_set(d.name, value)?;
            written.push(idx);
        }
    }
    for &idx in &written {
        let d = &descs[idx];
        s.wire_set(d.name, scratch.wire_get(d.name))?;
    }
    Ok(())
}

fn read_value(
    reader: &mut WireReader,
    type_name: &'static str,
    d: &FieldDescriptor,
) -> Result<Value> {
    Ok(match d.decl {
        TypeDecl::U8 => Value::U8(reader.get_u8()?),
        TypeDecl::U16 => Value::U16(reader.get_u16()?),
        TypeDecl::U32 => Value::U32(reader.get_u32()?),
        TypeDecl::U64 => Value::U64(reader.get_u64()?),
        TypeDecl::Struct(ctor) => {
            let mut inner = ctor();
            decode_into(inner.as_mut(), reader)?;
            Value::Struct(inner)
        }
        TypeDecl::Bytes | TypeDecl::Union(_) => {
            return Err(WireError::Descriptor {
                type_name,
                reason: format!("field {} cannot be read as a single value", d.name),
            });
        }
    })
}

fn read_elements(reader: &mut WireReader, d: &FieldDescriptor, count: usize) -> Result<Value> {
    Ok(match d.decl {
        TypeDecl::Bytes | TypeDecl::U8 => Value::Bytes(reader.get_bytes(count)?),
        TypeDecl::U16 => {
            let mut items = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                items.push(Value::U16(reader.get_u16()?));
            }
            Value::List(items)
        }
        TypeDecl::U32 => {
            let mut items = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                items.push(Value::U32(reader.get_u32()?));
            }
            Value::List(items)
        }
        TypeDecl::U64 => {
            let mut items = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                items.push(Value::U64(reader.get_u64()?));
            }
            Value::List(items)
        }
        TypeDecl::Struct(ctor) => {
            // Cap the preallocation by what the input could possibly hold.
            let mut items = Vec::with_capacity(count.min(reader.remaining()));
            for _ in 0..count {
                let mut element = ctor();
                decode_into(element.as_mut(), reader)?;
                items.push(Value::Struct(element));
            }
            Value::List(items)
        }
        TypeDecl::Union(_) => {
            return Err(WireError::Descriptor {
                type_name: d.type_name,
                reason: format!("array field {} cannot hold union elements", d.name),
            });
        }
    })
}
