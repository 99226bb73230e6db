// Exercises the generic engines against synthetic structure types covering
// every wire kind: counted arrays, fixed arrays, sized structs, tagged
// unions, conditional fields, and the canonical equality/hash contract.

use std::any::Any;

use sha2::{Digest, Sha256};
use tpm2_wire::{
    decode, encode, equals, from_bytes, hash, to_bytes, FieldSpec, Tpm2bDigest, TpmStructure,
    TpmStructureExt, TypeDecl, Value, WireBuffer, WireError, WireReader,
};

// ============================================================================
// Fixture types
// ============================================================================

/// A 2-byte counted byte array, the smallest sized field there is.
#[derive(Debug, Clone, Default)]
struct CountedBytes {
    data: Vec<u8>,
}

static COUNTED_BYTES_FIELDS: &[FieldSpec] = &[FieldSpec::byte_array("data", 0, "count", 2)];

impl TpmStructure for CountedBytes {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        COUNTED_BYTES_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "CountedBytes"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "data" => Value::Bytes(self.data.clone()),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "data" => self.data = value.into_bytes("data")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A 1-byte counted array, for exercising the max representable length.
#[derive(Debug, Clone, Default)]
struct SmallBytes {
    data: Vec<u8>,
}

static SMALL_BYTES_FIELDS: &[FieldSpec] = &[FieldSpec::byte_array("data", 0, "size", 1)];

impl TpmStructure for SmallBytes {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        SMALL_BYTES_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "SmallBytes"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "data" => Value::Bytes(self.data.clone()),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "data" => self.data = value.into_bytes("data")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// An 8-byte counted array, for exercising lengths near the u64 ceiling.
#[derive(Debug, Clone, Default)]
struct WideBytes {
    data: Vec<u8>,
}

static WIDE_BYTES_FIELDS: &[FieldSpec] = &[FieldSpec::byte_array("data", 0, "size", 8)];

impl TpmStructure for WideBytes {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        WIDE_BYTES_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "WideBytes"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "data" => Value::Bytes(self.data.clone()),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "data" => self.data = value.into_bytes("data")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A four-byte magic field: the element count comes from the default value,
/// not from the wire.
#[derive(Debug, Clone)]
struct FixedMagic {
    magic: Vec<u8>,
}

impl Default for FixedMagic {
    fn default() -> Self {
        Self { magic: vec![0; 4] }
    }
}

static FIXED_MAGIC_FIELDS: &[FieldSpec] = &[FieldSpec::fixed_array("magic", 0, TypeDecl::Bytes)];

impl TpmStructure for FixedMagic {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        FIXED_MAGIC_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "FixedMagic"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "magic" => Value::Bytes(self.magic.clone()),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "magic" => self.magic = value.into_bytes("magic")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A counted payload followed by a trailer that is only present when the
/// payload is non-empty.
#[derive(Debug, Clone, Default)]
struct Trailed {
    data: Vec<u8>,
    trailer: Option<u16>,
}

static TRAILED_FIELDS: &[FieldSpec] = &[
    FieldSpec::byte_array("data", 0, "size", 2),
    FieldSpec::scalar("trailer", 1, TypeDecl::U16).when_nonzero("size"),
];

impl TpmStructure for Trailed {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TRAILED_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "Trailed"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "data" => Value::Bytes(self.data.clone()),
            "trailer" => match self.trailer {
                Some(v) => Value::U16(v),
                None => Value::Absent,
            },
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "data" => self.data = value.into_bytes("data")?,
            "trailer" => self.trailer = Some(value.into_u16("trailer")?),
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, Default)]
struct TypeA {
    value: u32,
}

static TYPE_A_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("value", 0, TypeDecl::U32)];

impl TpmStructure for TypeA {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TYPE_A_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TypeA"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "value" => Value::U32(self.value),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "value" => self.value = value.into_u32("value")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, Default)]
struct TypeB {
    flag: u8,
}

static TYPE_B_FIELDS: &[FieldSpec] = &[FieldSpec::scalar("flag", 0, TypeDecl::U8)];

impl TpmStructure for TypeB {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TYPE_B_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TypeB"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "flag" => Value::U8(self.flag),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "flag" => self.flag = value.into_u8("flag")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone)]
enum Payload {
    A(TypeA),
    B(TypeB),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::A(TypeA::default())
    }
}

fn payload_variant(selector: u64) -> Option<Box<dyn TpmStructure>> {
    match selector {
        1 => Some(Box::new(Payload::A(TypeA::default()))),
        2 => Some(Box::new(Payload::B(TypeB::default()))),
        _ => None,
    }
}

impl Payload {
    fn active(&self) -> &dyn TpmStructure {
        match self {
            Payload::A(a) => a,
            Payload::B(b) => b,
        }
    }

    fn active_mut(&mut self) -> &mut dyn TpmStructure {
        match self {
            Payload::A(a) => a,
            Payload::B(b) => b,
        }
    }
}

impl TpmStructure for Payload {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        self.active().wire_spec()
    }

    fn type_name(&self) -> &'static str {
        "Payload"
    }

    fn wire_get(&self, field: &str) -> Value {
        self.active().wire_get(field)
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        self.active_mut().wire_set(field, value)
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Selector + union: the payload's concrete type rides on `kind`.
#[derive(Debug, Clone, Default)]
struct Packet {
    kind: u16,
    payload: Payload,
}

static PACKET_FIELDS: &[FieldSpec] = &[
    FieldSpec::selector("kind", 0, TypeDecl::U16),
    FieldSpec::union_of("payload", 1, "kind", "Payload", payload_variant),
];

impl TpmStructure for Packet {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        PACKET_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "Packet"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "kind" => Value::U16(self.kind),
            "payload" => Value::Struct(Box::new(self.payload.clone())),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "kind" => self.kind = value.into_u16("kind")?,
            "payload" => self.payload = value.into_struct::<Payload>("payload")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Inner {
    a: u16,
    b: u16,
}

static INNER_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("a", 0, TypeDecl::U16),
    FieldSpec::scalar("b", 1, TypeDecl::U16),
];

impl TpmStructure for Inner {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        INNER_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "Inner"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "a" => Value::U16(self.a),
            "b" => Value::U16(self.b),
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "a" => self.a = value.into_u16("a")?,
            "b" => self.b = value.into_u16("b")?,
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

fn new_inner() -> Box<dyn TpmStructure> {
    Box::new(Inner::default())
}

#[derive(Debug, Clone, Default)]
struct SizedOuter {
    inner: Option<Inner>,
}

static SIZED_OUTER_FIELDS: &[FieldSpec] =
    &[FieldSpec::sized_struct("inner", 0, "size", 2, "Inner", new_inner)];

impl TpmStructure for SizedOuter {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        SIZED_OUTER_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "SizedOuter"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "inner" => match &self.inner {
                Some(inner) => Value::Struct(Box::new(inner.clone())),
                None => Value::Absent,
            },
            _ => unreachable!("no field {field}"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> tpm2_wire::Result<()> {
        match field {
            "inner" => {
                self.inner = match value {
                    Value::Absent => None,
                    other => Some(other.into_struct::<Inner>("inner")?),
                };
            }
            _ => unreachable!("no field {field}"),
        }
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn TpmStructure> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

// ============================================================================
// Size tags and arrays
// ============================================================================

#[test]
fn counted_bytes_wire_layout() {
    let value = CountedBytes {
        data: vec![0xAA, 0xBB, 0xCC],
    };
    assert_eq!(value.to_bytes().unwrap(), vec![0x00, 0x03, 0xAA, 0xBB, 0xCC]);

    let back: CountedBytes = from_bytes(&[0x00, 0x03, 0xAA, 0xBB, 0xCC]).unwrap();
    assert_eq!(back.data, vec![0xAA, 0xBB, 0xCC]);
}

#[test]
fn empty_array_is_a_bare_zero_tag() {
    let value = CountedBytes::default();
    assert_eq!(value.to_bytes().unwrap(), vec![0x00, 0x00]);
    let back: CountedBytes = from_bytes(&[0x00, 0x00]).unwrap();
    assert!(back.data.is_empty());
}

#[test]
fn one_byte_tag_holds_max_length() {
    let value = SmallBytes {
        data: vec![0x5A; 255],
    };
    let bytes = value.to_bytes().unwrap();
    assert_eq!(bytes.len(), 256);
    assert_eq!(bytes[0], 0xFF);
    let back: SmallBytes = from_bytes(&bytes).unwrap();
    assert_eq!(back.data.len(), 255);
}

#[test]
fn oversized_array_overflows_its_tag() {
    let value = SmallBytes {
        data: vec![0; 256],
    };
    let err = value.to_bytes().unwrap_err();
    assert!(matches!(err, WireError::SizeTagOverflow { len: 256, width: 1 }));
}

#[test]
fn near_max_eight_byte_tag_fails_cleanly() {
    // Tag claims u64::MAX bytes with one byte of payload behind it. The
    // decoder must report truncation rather than overflow its cursor math.
    let mut wire = vec![0xFF; 8];
    wire.push(0xAA);
    let err = from_bytes::<WideBytes>(&wire).unwrap_err();
    assert!(matches!(err, WireError::TruncatedInput { .. }), "{err}");
}

#[test]
fn eight_byte_tag_roundtrip() {
    let value = WideBytes {
        data: vec![0x5A, 0x5B],
    };
    let bytes = value.to_bytes().unwrap();
    assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 2, 0x5A, 0x5B]);
    let back: WideBytes = from_bytes(&bytes).unwrap();
    assert_eq!(back.data, value.data);
}

#[test]
fn fixed_array_length_comes_from_the_type() {
    let value = FixedMagic {
        magic: vec![0xDE, 0xAD, 0xBE, 0xEF],
    };
    // No length prefix on the wire.
    assert_eq!(value.to_bytes().unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);

    let back: FixedMagic = from_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
    assert_eq!(back.magic, vec![0xDE, 0xAD, 0xBE, 0xEF]);
}

// ============================================================================
// Conditional fields
// ============================================================================

#[test]
fn conditional_trailer_skipped_when_tag_is_zero() {
    let back: Trailed = from_bytes(&[0x00, 0x00]).unwrap();
    assert!(back.data.is_empty());
    assert!(back.trailer.is_none());
}

#[test]
fn conditional_trailer_read_when_tag_is_nonzero() {
    let back: Trailed = from_bytes(&[0x00, 0x01, 0x7F, 0x12, 0x34]).unwrap();
    assert_eq!(back.data, vec![0x7F]);
    assert_eq!(back.trailer, Some(0x1234));
}

#[test]
fn conditional_trailer_roundtrips_both_ways() {
    for value in [
        Trailed {
            data: vec![],
            trailer: None,
        },
        Trailed {
            data: vec![1, 2],
            trailer: Some(7),
        },
    ] {
        let bytes = value.to_bytes().unwrap();
        let back: Trailed = from_bytes(&bytes).unwrap();
        assert!(back.wire_eq(&value));
        assert_eq!(back.to_bytes().unwrap(), bytes);
    }
}

// ============================================================================
// Unions
// ============================================================================

#[test]
fn union_decodes_variant_a() {
    let back: Packet = from_bytes(&[0x00, 0x01, 0x11, 0x22, 0x33, 0x44]).unwrap();
    assert_eq!(back.kind, 1);
    match back.payload {
        Payload::A(ref a) => assert_eq!(a.value, 0x11223344),
        ref other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn union_decodes_variant_b() {
    let back: Packet = from_bytes(&[0x00, 0x02, 0x99]).unwrap();
    assert_eq!(back.kind, 2);
    match back.payload {
        Payload::B(ref b) => assert_eq!(b.flag, 0x99),
        ref other => panic!("wrong variant: {other:?}"),
    }
}

#[test]
fn unmapped_selector_fails() {
    let err = from_bytes::<Packet>(&[0x00, 0x03, 0x00]).unwrap_err();
    match err {
        WireError::UnknownUnionSelector {
            selector,
            union_type,
        } => {
            assert_eq!(selector, 3);
            assert_eq!(union_type, "Payload");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn union_reencodes_to_the_same_bytes() {
    let bytes = [0x00, 0x02, 0x42];
    let back: Packet = from_bytes(&bytes).unwrap();
    assert_eq!(back.to_bytes().unwrap(), bytes.to_vec());
}

// ============================================================================
// Sized structs
// ============================================================================

#[test]
fn sized_struct_roundtrip() -> anyhow::Result<()> {
    let value = SizedOuter {
        inner: Some(Inner { a: 0x0102, b: 0x0304 }),
    };
    let bytes = value.to_bytes()?;
    assert_eq!(bytes, vec![0x00, 0x04, 0x01, 0x02, 0x03, 0x04]);

    let back: SizedOuter = from_bytes(&bytes)?;
    assert!(back.wire_eq(&value));
    Ok(())
}

#[test]
fn sized_struct_zero_length_is_absent() {
    let back: SizedOuter = from_bytes(&[0x00, 0x00]).unwrap();
    assert!(back.inner.is_none());
}

#[test]
fn sized_struct_length_mismatch_fails() {
    // Declared 5 bytes, but Inner always re-encodes to 4.
    let err = from_bytes::<SizedOuter>(&[0x00, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05]).unwrap_err();
    match err {
        WireError::SizeMismatch {
            field,
            declared,
            actual,
        } => {
            assert_eq!(field, "inner");
            assert_eq!(declared, 5);
            assert_eq!(actual, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Truncation
// ============================================================================

#[test]
fn truncated_payload_fails() {
    let err = from_bytes::<CountedBytes>(&[0x00, 0x03, 0xAA]).unwrap_err();
    assert!(matches!(err, WireError::TruncatedInput { .. }), "{err}");
}

#[test]
fn truncated_size_tag_fails() {
    let err = from_bytes::<CountedBytes>(&[0x00]).unwrap_err();
    assert!(matches!(err, WireError::TruncatedInput { .. }), "{err}");
}

// ============================================================================
// Streaming across a shared cursor
// ============================================================================

#[test]
fn consecutive_structures_share_one_cursor() -> anyhow::Result<()> {
    let mut buf = WireBuffer::new();
    encode(
        &CountedBytes {
            data: vec![0xAA, 0xBB],
        },
        &mut buf,
    )?;
    encode(&Inner { a: 1, b: 2 }, &mut buf)?;

    let bytes = buf.into_vec();
    let mut reader = WireReader::new(&bytes);
    let first: CountedBytes = decode(&mut reader)?;
    let second: Inner = decode(&mut reader)?;
    assert_eq!(first.data, vec![0xAA, 0xBB]);
    assert_eq!(second.a, 1);
    assert_eq!(second.b, 2);
    assert_eq!(reader.remaining(), 0);
    Ok(())
}

// ============================================================================
// Canonical equality and hashing
// ============================================================================

#[test]
fn equality_follows_the_encoding() {
    let a = CountedBytes { data: vec![0xAA] };
    let b = CountedBytes { data: vec![0xAA] };
    let c = CountedBytes { data: vec![0xAB] };
    assert!(equals(&a, &b));
    assert!(!equals(&a, &c));
    assert_eq!(hash(&a).unwrap(), hash(&b).unwrap());
}

#[test]
fn equal_bytes_different_types_are_unequal() {
    let a = CountedBytes { data: vec![0xAA] };
    let b = Tpm2bDigest::new(vec![0xAA]);
    assert_eq!(to_bytes(&a).unwrap(), to_bytes(&b).unwrap());
    assert!(!equals(&a, &b));
}

#[test]
fn short_encoding_hashes_as_a_word() {
    let a = CountedBytes { data: vec![0xAA] };
    // Encoding is 00 01 AA, interpreted as a big-endian integer.
    assert_eq!(hash(&a).unwrap(), 0x01AA);
}

#[test]
fn long_encoding_hashes_as_a_digest_prefix() {
    let a = CountedBytes {
        data: (0..32).collect(),
    };
    let encoding = to_bytes(&a).unwrap();
    assert!(encoding.len() > 8);
    let digest = Sha256::digest(&encoding);
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    assert_eq!(hash(&a).unwrap(), u64::from_be_bytes(word));
}
