// SPDX-FileCopyrightText: © 2025 Phala Network <dstack@phala.network>
//
// SPDX-License-Identifier: Apache-2.0

//! Byte cursors for the TPM 2.0 wire format
//!
//! `WireBuffer` builds outgoing byte sequences, `WireReader` consumes
//! incoming ones while tracking its position. All integers are big-endian.

use crate::error::{Result, WireError};

/// Growable buffer for building wire bytes
#[derive(Debug, Default)]
pub struct WireBuffer {
    data: Vec<u8>,
}

impl WireBuffer {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn put_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.data.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Put an unsigned length prefix of 1, 2, 4 or 8 bytes.
    ///
    /// Fails if `len` is not representable in `width` bytes.
    pub fn put_size_tag(&mut self, len: u64, width: u8) -> Result<()> {
        let max = match width {
            1 => u8::MAX as u64,
            2 => u16::MAX as u64,
            4 => u32::MAX as u64,
            8 => u64::MAX,
            _ => {
                return Err(WireError::Descriptor {
                    type_name: "size tag",
                    reason: format!("width {width} is not 1, 2, 4 or 8"),
                });
            }
        };
        if len > max {
            return Err(WireError::SizeTagOverflow { len, width });
        }
        match width {
            1 => self.put_u8(len as u8),
            2 => self.put_u16(len as u16),
            4 => self.put_u32(len as u32),
            _ => self.put_u64(len),
        }
        Ok(())
    }

    /// Put a TPM2B structure (2-byte size prefix + data)
    pub fn put_tpm2b(&mut self, data: &[u8]) -> Result<()> {
        self.put_size_tag(data.len() as u64, 2)?;
        self.put_bytes(data);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

/// Position-tracking reader over incoming wire bytes
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn check(&self, needed: usize) -> Result<()> {
        // No addition here: `needed` can be a hostile near-max length
        // decoded from the wire.
        if needed > self.remaining() {
            return Err(WireError::TruncatedInput {
                needed,
                remaining: self.remaining(),
                offset: self.pos,
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.check(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.check(2)?;
        let v = u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.check(4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(raw))
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.check(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[self.pos..self.pos + 8]);
        self.pos += 8;
        Ok(u64::from_be_bytes(raw))
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.check(len)?;
        let v = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(v)
    }

    /// Get an unsigned length prefix of 1, 2, 4 or 8 bytes
    pub fn get_size_tag(&mut self, width: u8) -> Result<u64> {
        match width {
            1 => Ok(self.get_u8()? as u64),
            2 => Ok(self.get_u16()? as u64),
            4 => Ok(self.get_u32()? as u64),
            8 => self.get_u64(),
            _ => Err(WireError::Descriptor {
                type_name: "size tag",
                reason: format!("width {width} is not 1, 2, 4 or 8"),
            }),
        }
    }

    /// Get a TPM2B structure (2-byte size prefix + data)
    pub fn get_tpm2b(&mut self) -> Result<Vec<u8>> {
        let size = self.get_u16()? as usize;
        self.get_bytes(size)
    }

    /// Skip bytes
    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.check(len)?;
        self.pos += len;
        Ok(())
    }
}
