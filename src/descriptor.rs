// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Field descriptor tables and their resolver
//!
//! Every structure type declares a static table of [`FieldSpec`] annotations,
//! one per wire field. The resolver validates the table, sorts it by encode
//! order, links union fields to their selectors and conditional fields to
//! their size or selector tags, and caches the result process-wide.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::{Result, WireError};
use crate::structure::TpmStructure;

/// How a field appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireKind {
    /// Scalar or nested structure, encoded directly.
    Normal,
    /// Array whose element count is fixed by the declared type shape;
    /// no length prefix on the wire.
    FixedLengthArray,
    /// Array preceded by an unsigned length prefix of `size_width` bytes.
    VariableLengthArray,
    /// Nested structure preceded by a byte-length prefix; length zero
    /// means the structure is absent.
    SizedStruct,
    /// Payload whose concrete type is chosen by an earlier selector field.
    Union,
    /// Scalar whose decoded value selects union variants of sibling fields.
    UnionSelector,
    /// Derived from a sibling array's length; never independently marshalled.
    ArrayCount,
    /// Derived from a sibling struct's encoded length; never independently
    /// marshalled.
    LengthOfStruct,
}

/// Constructs a boxed default instance, used for decode allocation.
pub type StructCtor = fn() -> Box<dyn TpmStructure>;

/// Maps a decoded selector value to a default instance of the matching
/// union variant, or `None` if the value is unmapped.
pub type VariantFn = fn(u64) -> Option<Box<dyn TpmStructure>>;

/// The declared type of a field, or of its elements for array kinds.
#[derive(Clone, Copy)]
pub enum TypeDecl {
    U8,
    U16,
    U32,
    U64,
    /// Raw bytes (byte arrays only).
    Bytes,
    /// A nested structure, with its decode constructor.
    Struct(StructCtor),
    /// A tagged union, with its selector-value-to-variant mapping.
    Union(VariantFn),
}

impl fmt::Debug for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeDecl::U8 => "u8",
            TypeDecl::U16 => "u16",
            TypeDecl::U32 => "u32",
            TypeDecl::U64 => "u64",
            TypeDecl::Bytes => "bytes",
            TypeDecl::Struct(_) => "struct",
            TypeDecl::Union(_) => "union",
        };
        f.write_str(name)
    }
}

impl TypeDecl {
    fn is_scalar(&self) -> bool {
        matches!(
            self,
            TypeDecl::U8 | TypeDecl::U16 | TypeDecl::U32 | TypeDecl::U64
        )
    }
}

/// Static per-field annotation, as written in a type's descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    name: &'static str,
    order: u32,
    kind: WireKind,
    decl: TypeDecl,
    size_name: &'static str,
    size_width: u8,
    tag: &'static str,
    type_name: &'static str,
}

impl FieldSpec {
    const fn new(name: &'static str, order: u32, kind: WireKind, decl: TypeDecl) -> Self {
        Self {
            name,
            order,
            kind,
            decl,
            size_name: "",
            size_width: 0,
            tag: "",
            type_name: "",
        }
    }

    const fn scalar_type_name(decl: TypeDecl) -> &'static str {
        match decl {
            TypeDecl::U8 => "u8",
            TypeDecl::U16 => "u16",
            TypeDecl::U32 => "u32",
            TypeDecl::U64 => "u64",
            _ => "bytes",
        }
    }

    /// A plain scalar field.
    pub const fn scalar(name: &'static str, order: u32, decl: TypeDecl) -> Self {
        let mut s = Self::new(name, order, WireKind::Normal, decl);
        s.type_name = Self::scalar_type_name(decl);
        s
    }

    /// A nested structure encoded inline, with no length prefix.
    pub const fn structure(
        name: &'static str,
        order: u32,
        type_name: &'static str,
        ctor: StructCtor,
    ) -> Self {
        let mut s = Self::new(name, order, WireKind::Normal, TypeDecl::Struct(ctor));
        s.type_name = type_name;
        s
    }

    /// A byte array with an unsigned length prefix of `size_width` bytes.
    pub const fn byte_array(
        name: &'static str,
        order: u32,
        size_name: &'static str,
        size_width: u8,
    ) -> Self {
        let mut s = Self::new(name, order, WireKind::VariableLengthArray, TypeDecl::Bytes);
        s.size_name = size_name;
        s.size_width = size_width;
        s.type_name = "bytes";
        s
    }

    /// An array of structures with an unsigned element-count prefix.
    pub const fn struct_array(
        name: &'static str,
        order: u32,
        size_name: &'static str,
        size_width: u8,
        type_name: &'static str,
        ctor: StructCtor,
    ) -> Self {
        let mut s = Self::new(
            name,
            order,
            WireKind::VariableLengthArray,
            TypeDecl::Struct(ctor),
        );
        s.size_name = size_name;
        s.size_width = size_width;
        s.type_name = type_name;
        s
    }

    /// An array with no length prefix; the element count comes from the
    /// length of the field's default value.
    pub const fn fixed_array(name: &'static str, order: u32, decl: TypeDecl) -> Self {
        let mut s = Self::new(name, order, WireKind::FixedLengthArray, decl);
        s.type_name = Self::scalar_type_name(decl);
        s
    }

    /// A nested structure with a byte-length prefix; length zero encodes
    /// an absent structure.
    pub const fn sized_struct(
        name: &'static str,
        order: u32,
        size_name: &'static str,
        size_width: u8,
        type_name: &'static str,
        ctor: StructCtor,
    ) -> Self {
        let mut s = Self::new(name, order, WireKind::SizedStruct, TypeDecl::Struct(ctor));
        s.size_name = size_name;
        s.size_width = size_width;
        s.type_name = type_name;
        s
    }

    /// A scalar whose decoded value selects union variants.
    pub const fn selector(name: &'static str, order: u32, decl: TypeDecl) -> Self {
        let mut s = Self::new(name, order, WireKind::UnionSelector, decl);
        s.type_name = Self::scalar_type_name(decl);
        s
    }

    /// A union payload, dispatched on the named selector field.
    pub const fn union_of(
        name: &'static str,
        order: u32,
        selector: &'static str,
        type_name: &'static str,
        variants: VariantFn,
    ) -> Self {
        let mut s = Self::new(name, order, WireKind::Union, TypeDecl::Union(variants));
        s.tag = selector;
        s.type_name = type_name;
        s
    }

    /// Marks the field as conditionally present: when the named size or
    /// selector field decodes to zero, this field is skipped entirely.
    pub const fn when_nonzero(mut self, tag: &'static str) -> Self {
        self.tag = tag;
        self
    }
}

/// A resolved field descriptor, sorted by `order` with tag references
/// linked to descriptor indices.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub order: u32,
    pub kind: WireKind,
    pub decl: TypeDecl,
    pub size_width: u8,
    pub size_name: &'static str,
    /// Index of the linked selector (for `Union`) or presence tag (for
    /// conditional `Normal` fields) in the resolved descriptor list.
    pub tag: Option<usize>,
    pub type_name: &'static str,
}

fn bad(type_name: &'static str, reason: String) -> WireError {
    WireError::Descriptor { type_name, reason }
}

fn build(spec: &'static [FieldSpec], type_name: &'static str) -> Result<Vec<FieldDescriptor>> {
    let mut sorted: Vec<&FieldSpec> = spec.iter().collect();
    sorted.sort_by_key(|f| f.order);

    for pair in sorted.windows(2) {
        if pair[0].order == pair[1].order {
            return Err(bad(
                type_name,
                format!(
                    "fields {} and {} both declare order {}",
                    pair[0].name, pair[1].name, pair[0].order
                ),
            ));
        }
    }

    // First pass: validate each annotation and collect the tag namespaces.
    let mut selectors: HashMap<&'static str, usize> = HashMap::new();
    let mut size_tags: HashMap<&'static str, usize> = HashMap::new();
    for (idx, f) in sorted.iter().enumerate() {
        match f.kind {
            WireKind::ArrayCount | WireKind::LengthOfStruct => {
                return Err(bad(
                    type_name,
                    format!("field {} declares derived kind {:?}", f.name, f.kind),
                ));
            }
            WireKind::VariableLengthArray | WireKind::SizedStruct => {
                if !matches!(f.size_width, 1 | 2 | 4 | 8) {
                    return Err(bad(
                        type_name,
                        format!("field {} has size-tag width {}", f.name, f.size_width),
                    ));
                }
                if selectors.contains_key(f.size_name) {
                    return Err(bad(
                        type_name,
                        format!("tag name {} is both a selector and a size tag", f.size_name),
                    ));
                }
                if size_tags.insert(f.size_name, idx).is_some() {
                    return Err(bad(
                        type_name,
                        format!("duplicate size tag name {}", f.size_name),
                    ));
                }
            }
            WireKind::UnionSelector => {
                if !f.decl.is_scalar() {
                    return Err(bad(
                        type_name,
                        format!("selector {} must be a scalar", f.name),
                    ));
                }
                if size_tags.contains_key(f.name) {
                    return Err(bad(
                        type_name,
                        format!("tag name {} is both a selector and a size tag", f.name),
                    ));
                }
                if selectors.insert(f.name, idx).is_some() {
                    return Err(bad(
                        type_name,
                        format!("duplicate selector name {}", f.name),
                    ));
                }
            }
            WireKind::Union => {
                if !matches!(f.decl, TypeDecl::Union(_)) {
                    return Err(bad(
                        type_name,
                        format!("union field {} has no variant mapping", f.name),
                    ));
                }
            }
            WireKind::Normal | WireKind::FixedLengthArray => {}
        }
    }

    // Second pass: link tag references now that all tags are known.
    let mut out = Vec::with_capacity(sorted.len());
    for (idx, f) in sorted.iter().enumerate() {
        let tag = if f.tag.is_empty() {
            None
        } else {
            let linked = selectors
                .get(f.tag)
                .or_else(|| size_tags.get(f.tag))
                .copied()
                .ok_or_else(|| {
                    bad(
                        type_name,
                        format!("field {} references unknown tag {}", f.name, f.tag),
                    )
                })?;
            if linked >= idx {
                return Err(bad(
                    type_name,
                    format!("tag {} must be declared before field {}", f.tag, f.name),
                ));
            }
            Some(linked)
        };
        if f.kind == WireKind::Union && tag.is_none() {
            return Err(bad(
                type_name,
                format!("union field {} has no selector", f.name),
            ));
        }
        out.push(FieldDescriptor {
            name: f.name,
            order: f.order,
            kind: f.kind,
            decl: f.decl,
            size_width: f.size_width,
            size_name: f.size_name,
            tag,
            type_name: f.type_name,
        });
    }
    Ok(out)
}

static CACHE: OnceLock<RwLock<HashMap<usize, Arc<[FieldDescriptor]>>>> = OnceLock::new();

/// Resolves a descriptor table, returning the cached result when available.
///
/// Keyed by the identity of the static table rather than the declaring type,
/// so each variant of a union enum keeps its own resolution. Resolution is
/// pure; a freshly built list is published atomically under the write lock,
/// so concurrent callers never observe a partial result.
pub fn resolve(
    spec: &'static [FieldSpec],
    type_name: &'static str,
) -> Result<Arc<[FieldDescriptor]>> {
    let cache = CACHE.get_or_init(|| RwLock::new(HashMap::new()));
    let key = spec.as_ptr() as usize;
    if let Ok(map) = cache.read() {
        if let Some(descs) = map.get(&key) {
            return Ok(descs.clone());
        }
    }
    let built: Arc<[FieldDescriptor]> = build(spec, type_name)?.into();
    if let Ok(mut map) = cache.write() {
        // A racing resolver may have published first; keep its copy.
        return Ok(map.entry(key).or_insert(built).clone());
    }
    Ok(built)
}
