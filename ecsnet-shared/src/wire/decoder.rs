//! Per-decode cursor over an untrusted byte slice. Every read is fallible.

use super::error::CodecError;
use super::varint::read_varint;
use crate::registry::{FieldValue, ScalarType};

pub struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::TruncatedBuffer);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i8(&mut self) -> Result<i8, CodecError> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, CodecError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32, CodecError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64, CodecError> {
        let b = self.take(8)?;
        Ok(f64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_u16()? as usize;
        if len > self.remaining() {
            return Err(CodecError::StringLengthOverflow {
                declared: len,
                remaining: self.remaining(),
            });
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::TruncatedBuffer)
    }

    pub fn read_varint(&mut self) -> Result<u64, CodecError> {
        read_varint(self.buf, &mut self.pos)
    }

    pub fn read_field_value(&mut self, scalar_type: ScalarType) -> Result<FieldValue, CodecError> {
        Ok(match scalar_type {
            ScalarType::I8 => FieldValue::I8(self.read_i8()?),
            ScalarType::I16 => FieldValue::I16(self.read_i16()?),
            ScalarType::I32 => FieldValue::I32(self.read_i32()?),
            ScalarType::U8 => FieldValue::U8(self.read_u8()?),
            ScalarType::U16 => FieldValue::U16(self.read_u16()?),
            ScalarType::U32 => FieldValue::U32(self.read_u32()?),
            ScalarType::F32 => FieldValue::F32(self.read_f32()?),
            ScalarType::F64 => FieldValue::F64(self.read_f64()?),
            ScalarType::Str => FieldValue::Str(self.read_string()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_string_length_is_rejected_before_allocating() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1000u16.to_le_bytes());
        buf.extend_from_slice(b"short");
        let mut dec = Decoder::new(&buf);
        assert!(matches!(
            dec.read_string(),
            Err(CodecError::StringLengthOverflow { .. })
        ));
    }

    #[test]
    fn reads_le_scalars() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x1234u16.to_le_bytes());
        buf.extend_from_slice(&1.5f32.to_le_bytes());
        let mut dec = Decoder::new(&buf);
        assert_eq!(dec.read_u16().unwrap(), 0x1234);
        assert_eq!(dec.read_f32().unwrap(), 1.5);
    }
}
