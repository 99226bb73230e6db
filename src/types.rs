// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! TPM 2.0 data types declared through descriptor tables
//!
//! Each type carries a static [`FieldSpec`] table naming its wire fields in
//! encode order; the generic engines do the rest. These double as the
//! reference for declaring new structure types.

use std::any::Any;

use crate::constants::TpmAlgId;
use crate::descriptor::{FieldSpec, TypeDecl};
use crate::error::{Result, WireError};
use crate::structure::{boxed_default, TpmStructure, Value};

fn unknown_alg(field: &'static str, raw: u16) -> WireError {
    WireError::InvalidValue {
        field,
        reason: format!("unknown algorithm {raw:#06x}"),
    }
}

/// TPM2B_DIGEST - Variable length digest
#[derive(Debug, Clone, Default)]
pub struct Tpm2bDigest {
    pub buffer: Vec<u8>,
}

impl Tpm2bDigest {
    pub fn new(data: Vec<u8>) -> Self {
        Self { buffer: data }
    }

    pub fn empty() -> Self {
        Self { buffer: Vec::new() }
    }
}

static TPM2B_DIGEST_FIELDS: &[FieldSpec] = &[FieldSpec::byte_array("buffer", 0, "size", 2)];

impl TpmStructure for Tpm2bDigest {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPM2B_DIGEST_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "Tpm2bDigest"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "buffer" => Value::Bytes(self.buffer.clone()),
            _ => unreachable!("no field {field} in Tpm2bDigest"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "buffer" => self.buffer = value.into_bytes("buffer")?,
            _ => unreachable!("no field {field} in Tpm2bDigest"),
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

/// TPM2B_NONCE - Nonce value
pub type Tpm2bNonce = Tpm2bDigest;

/// TPMS_PCR_SELECTION - PCR selection for a single hash algorithm
#[derive(Debug, Clone)]
pub struct TpmsPcrSelection {
    pub hash: TpmAlgId,
    pub pcr_select: Vec<u8>, // Bitmap of selected PCRs
}

impl TpmsPcrSelection {
    pub fn new(hash: TpmAlgId, pcrs: &[u32]) -> Self {
        // At least 3 bytes, covering PCR 0-23
        let max_pcr = pcrs.iter().max().copied().unwrap_or(0);
        let size = ((max_pcr / 8) + 1).max(3) as usize;
        let mut pcr_select = vec![0u8; size];

        for &pcr in pcrs {
            let byte_idx = (pcr / 8) as usize;
            let bit_idx = pcr % 8;
            if byte_idx < pcr_select.len() {
                pcr_select[byte_idx] |= 1 << bit_idx;
            }
        }

        Self { hash, pcr_select }
    }

    pub fn sha256(pcrs: &[u32]) -> Self {
        Self::new(TpmAlgId::Sha256, pcrs)
    }
}

impl Default for TpmsPcrSelection {
    fn default() -> Self {
        Self {
            hash: TpmAlgId::Null,
            pcr_select: Vec::new(),
        }
    }
}

static TPMS_PCR_SELECTION_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("hash", 0, TypeDecl::U16),
    FieldSpec::byte_array("pcr_select", 1, "sizeof_select", 1),
];

impl TpmStructure for TpmsPcrSelection {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPMS_PCR_SELECTION_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TpmsPcrSelection"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "hash" => Value::U16(self.hash.to_u16()),
            "pcr_select" => Value::Bytes(self.pcr_select.clone()),
            _ => unreachable!("no field {field} in TpmsPcrSelection"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "hash" => {
                let raw = value.into_u16("hash")?;
                self.hash = TpmAlgId::from_u16(raw).ok_or_else(|| unknown_alg("hash", raw))?;
            }
            "pcr_select" => self.pcr_select = value.into_bytes("pcr_select")?,
            _ => unreachable!("no field {field} in TpmsPcrSelection"),
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

/// TPML_PCR_SELECTION - List of PCR selections
#[derive(Debug, Clone, Default)]
pub struct TpmlPcrSelection {
    pub pcr_selections: Vec<TpmsPcrSelection>,
}

impl TpmlPcrSelection {
    pub fn single(hash: TpmAlgId, pcrs: &[u32]) -> Self {
        Self {
            pcr_selections: vec![TpmsPcrSelection::new(hash, pcrs)],
        }
    }
}

static TPML_PCR_SELECTION_FIELDS: &[FieldSpec] = &[FieldSpec::struct_array(
    "pcr_selections",
    0,
    "count",
    4,
    "TpmsPcrSelection",
    boxed_default::<TpmsPcrSelection>,
)];

impl TpmStructure for TpmlPcrSelection {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPML_PCR_SELECTION_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TpmlPcrSelection"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "pcr_selections" => Value::List(
                self.pcr_selections
                    .iter()
                    .map(|sel| Value::Struct(Box::new(sel.clone())))
                    .collect(),
            ),
            _ => unreachable!("no field {field} in TpmlPcrSelection"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "pcr_selections" => {
                let items = value.into_list("pcr_selections")?;
                let mut selections = Vec::with_capacity(items.len());
                for item in items {
                    selections.push(item.into_struct::<TpmsPcrSelection>("pcr_selections")?);
                }
                self.pcr_selections = selections;
            }
            _ => unreachable!("no field {field} in TpmlPcrSelection"),
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

/// TPMS_CLOCK_INFO - Clock, reset and restart counters
#[derive(Debug, Clone, Default)]
pub struct TpmsClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: u8,
}

static TPMS_CLOCK_INFO_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("clock", 0, TypeDecl::U64),
    FieldSpec::scalar("reset_count", 1, TypeDecl::U32),
    FieldSpec::scalar("restart_count", 2, TypeDecl::U32),
    FieldSpec::scalar("safe", 3, TypeDecl::U8),
];

impl TpmStructure for TpmsClockInfo {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPMS_CLOCK_INFO_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TpmsClockInfo"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "clock" => Value::U64(self.clock),
            "reset_count" => Value::U32(self.reset_count),
            "restart_count" => Value::U32(self.restart_count),
            "safe" => Value::U8(self.safe),
            _ => unreachable!("no field {field} in TpmsClockInfo"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "clock" => self.clock = value.into_u64("clock")?,
            "reset_count" => self.reset_count = value.into_u32("reset_count")?,
            "restart_count" => self.restart_count = value.into_u32("restart_count")?,
            "safe" => self.safe = value.into_u8("safe")?,
            _ => unreachable!("no field {field} in TpmsClockInfo"),
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

/// TPMS_RSA_PARMS - RSA key parameters
#[derive(Debug, Clone)]
pub struct TpmsRsaParms {
    pub scheme: TpmAlgId,
    pub key_bits: u16,
    pub exponent: u32,
}

impl Default for TpmsRsaParms {
    fn default() -> Self {
        Self {
            scheme: TpmAlgId::Null,
            key_bits: 2048,
            exponent: 0, // Default exponent (65537)
        }
    }
}

static TPMS_RSA_PARMS_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("scheme", 0, TypeDecl::U16),
    FieldSpec::scalar("key_bits", 1, TypeDecl::U16),
    FieldSpec::scalar("exponent", 2, TypeDecl::U32),
];

impl TpmStructure for TpmsRsaParms {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPMS_RSA_PARMS_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TpmsRsaParms"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "scheme" => Value::U16(self.scheme.to_u16()),
            "key_bits" => Value::U16(self.key_bits),
            "exponent" => Value::U32(self.exponent),
            _ => unreachable!("no field {field} in TpmsRsaParms"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "scheme" => {
                let raw = value.into_u16("scheme")?;
                self.scheme = TpmAlgId::from_u16(raw).ok_or_else(|| unknown_alg("scheme", raw))?;
            }
            "key_bits" => self.key_bits = value.into_u16("key_bits")?,
            "exponent" => self.exponent = value.into_u32("exponent")?,
            _ => unreachable!("no field {field} in TpmsRsaParms"),
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

/// TPMS_ECC_PARMS - ECC key parameters
#[derive(Debug, Clone)]
pub struct TpmsEccParms {
    pub scheme: TpmAlgId,
    pub curve_id: u16,
    pub kdf: TpmAlgId,
}

impl Default for TpmsEccParms {
    fn default() -> Self {
        Self {
            scheme: TpmAlgId::Null,
            curve_id: 0,
            kdf: TpmAlgId::Null,
        }
    }
}

static TPMS_ECC_PARMS_FIELDS: &[FieldSpec] = &[
    FieldSpec::scalar("scheme", 0, TypeDecl::U16),
    FieldSpec::scalar("curve_id", 1, TypeDecl::U16),
    FieldSpec::scalar("kdf", 2, TypeDecl::U16),
];

impl TpmStructure for TpmsEccParms {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPMS_ECC_PARMS_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TpmsEccParms"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "scheme" => Value::U16(self.scheme.to_u16()),
            "curve_id" => Value::U16(self.curve_id),
            "kdf" => Value::U16(self.kdf.to_u16()),
            _ => unreachable!("no field {field} in TpmsEccParms"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "scheme" => {
                let raw = value.into_u16("scheme")?;
                self.scheme = TpmAlgId::from_u16(raw).ok_or_else(|| unknown_alg("scheme", raw))?;
            }
            "curve_id" => self.curve_id = value.into_u16("curve_id")?,
            "kdf" => {
                let raw = value.into_u16("kdf")?;
                self.kdf = TpmAlgId::from_u16(raw).ok_or_else(|| unknown_alg("kdf", raw))?;
            }
            _ => unreachable!("no field {field} in TpmsEccParms"),
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

/// TPMS_KEYEDHASH_PARMS - Keyed hash parameters (for sealed data)
#[derive(Debug, Clone)]
pub struct TpmsKeyedHashParms {
    pub scheme: TpmAlgId,
}

impl Default for TpmsKeyedHashParms {
    fn default() -> Self {
        Self {
            scheme: TpmAlgId::Null,
        }
    }
}

static TPMS_KEYEDHASH_PARMS_FIELDS: &[FieldSpec] =
    &[FieldSpec::scalar("scheme", 0, TypeDecl::U16)];

impl TpmStructure for TpmsKeyedHashParms {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPMS_KEYEDHASH_PARMS_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TpmsKeyedHashParms"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "scheme" => Value::U16(self.scheme.to_u16()),
            _ => unreachable!("no field {field} in TpmsKeyedHashParms"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "scheme" => {
                let raw = value.into_u16("scheme")?;
                self.scheme = TpmAlgId::from_u16(raw).ok_or_else(|| unknown_alg("scheme", raw))?;
            }
            _ => unreachable!("no field {field} in TpmsKeyedHashParms"),
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

/// TPMU_PUBLIC_PARMS - Public parameters union
///
/// The active variant is chosen by the `type_alg` selector of the enclosing
/// [`TpmtPublic`]; on the wire the payload is the variant's own encoding
/// with no discriminant byte of its own.
#[derive(Debug, Clone)]
pub enum TpmuPublicParms {
    Rsa(TpmsRsaParms),
    Ecc(TpmsEccParms),
    KeyedHash(TpmsKeyedHashParms),
}

impl Default for TpmuPublicParms {
    fn default() -> Self {
        TpmuPublicParms::KeyedHash(TpmsKeyedHashParms::default())
    }
}

/// Selector-value to variant mapping for [`TpmuPublicParms`].
fn public_parms_variant(selector: u64) -> Option<Box<dyn TpmStructure>> {
    if selector > u16::MAX as u64 {
        return None;
    }
    match TpmAlgId::from_u16(selector as u16)? {
        TpmAlgId::Rsa => Some(Box::new(TpmuPublicParms::Rsa(TpmsRsaParms::default()))),
        TpmAlgId::Ecc => Some(Box::new(TpmuPublicParms::Ecc(TpmsEccParms::default()))),
        TpmAlgId::KeyedHash => Some(Box::new(TpmuPublicParms::KeyedHash(
            TpmsKeyedHashParms::default(),
        ))),
        _ => None,
    }
}

impl TpmuPublicParms {
    fn active(&self) -> &dyn TpmStructure {
        match self {
            TpmuPublicParms::Rsa(p) => p,
            TpmuPublicParms::Ecc(p) => p,
            TpmuPublicParms::KeyedHash(p) => p,
        }
    }

    fn active_mut(&mut self) -> &mut dyn TpmStructure {
        match self {
            TpmuPublicParms::Rsa(p) => p,
            TpmuPublicParms::Ecc(p) => p,
            TpmuPublicParms::KeyedHash(p) => p,
        }
    }
}

impl TpmStructure for TpmuPublicParms {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        self.active().wire_spec()
    }

    fn type_name(&self) -> &'static str {
        "TpmuPublicParms"
    }

    fn wire_get(&self, field: &str) -> Value {
        self.active().wire_get(field)
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
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

/// TPMT_PUBLIC - Public area template
#[derive(Debug, Clone)]
pub struct TpmtPublic {
    pub type_alg: TpmAlgId,
    pub name_alg: TpmAlgId,
    pub auth_policy: Tpm2bDigest,
    pub parameters: TpmuPublicParms,
}

impl Default for TpmtPublic {
    fn default() -> Self {
        Self {
            type_alg: TpmAlgId::KeyedHash,
            name_alg: TpmAlgId::Sha256,
            auth_policy: Tpm2bDigest::empty(),
            parameters: TpmuPublicParms::default(),
        }
    }
}

impl TpmtPublic {
    /// An RSA key template with the given modulus size.
    pub fn rsa(key_bits: u16) -> Self {
        Self {
            type_alg: TpmAlgId::Rsa,
            name_alg: TpmAlgId::Sha256,
            auth_policy: Tpm2bDigest::empty(),
            parameters: TpmuPublicParms::Rsa(TpmsRsaParms {
                scheme: TpmAlgId::Null,
                key_bits,
                exponent: 0,
            }),
        }
    }
}

static TPMT_PUBLIC_FIELDS: &[FieldSpec] = &[
    FieldSpec::selector("type_alg", 0, TypeDecl::U16),
    FieldSpec::scalar("name_alg", 1, TypeDecl::U16),
    FieldSpec::structure("auth_policy", 2, "Tpm2bDigest", boxed_default::<Tpm2bDigest>),
    FieldSpec::union_of(
        "parameters",
        3,
        "type_alg",
        "TpmuPublicParms",
        public_parms_variant,
    ),
];

impl TpmStructure for TpmtPublic {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPMT_PUBLIC_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "TpmtPublic"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "type_alg" => Value::U16(self.type_alg.to_u16()),
            "name_alg" => Value::U16(self.name_alg.to_u16()),
            "auth_policy" => Value::Struct(Box::new(self.auth_policy.clone())),
            "parameters" => Value::Struct(Box::new(self.parameters.clone())),
            _ => unreachable!("no field {field} in TpmtPublic"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "type_alg" => {
                let raw = value.into_u16("type_alg")?;
                self.type_alg =
                    TpmAlgId::from_u16(raw).ok_or_else(|| unknown_alg("type_alg", raw))?;
            }
            "name_alg" => {
                let raw = value.into_u16("name_alg")?;
                self.name_alg =
                    TpmAlgId::from_u16(raw).ok_or_else(|| unknown_alg("name_alg", raw))?;
            }
            "auth_policy" => self.auth_policy = value.into_struct::<Tpm2bDigest>("auth_policy")?,
            "parameters" => {
                self.parameters = value.into_struct::<TpmuPublicParms>("parameters")?;
            }
            _ => unreachable!("no field {field} in TpmtPublic"),
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

/// TPM2B_PUBLIC - Public area with size prefix
///
/// A zero size on the wire means the public area is absent.
#[derive(Debug, Clone, Default)]
pub struct Tpm2bPublic {
    pub public_area: Option<TpmtPublic>,
}

impl Tpm2bPublic {
    pub fn new(public_area: TpmtPublic) -> Self {
        Self {
            public_area: Some(public_area),
        }
    }
}

static TPM2B_PUBLIC_FIELDS: &[FieldSpec] = &[FieldSpec::sized_struct(
    "public_area",
    0,
    "size",
    2,
    "TpmtPublic",
    boxed_default::<TpmtPublic>,
)];

impl TpmStructure for Tpm2bPublic {
    fn wire_spec(&self) -> &'static [FieldSpec] {
        TPM2B_PUBLIC_FIELDS
    }

    fn type_name(&self) -> &'static str {
        "Tpm2bPublic"
    }

    fn wire_get(&self, field: &str) -> Value {
        match field {
            "public_area" => match &self.public_area {
                Some(area) => Value::Struct(Box::new(area.clone())),
                None => Value::Absent,
            },
            _ => unreachable!("no field {field} in Tpm2bPublic"),
        }
    }

    fn wire_set(&mut self, field: &str, value: Value) -> Result<()> {
        match field {
            "public_area" => {
                self.public_area = match value {
                    Value::Absent => None,
                    other => Some(other.into_struct::<TpmtPublic>("public_area")?),
                };
            }
            _ => unreachable!("no field {field} in Tpm2bPublic"),
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
