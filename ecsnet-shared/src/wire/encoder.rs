//! Growable byte-buffer writer. Reused across ticks via `reset()` to avoid
//! per-tick allocation (§9 "Arena-style scratch").

use super::varint::write_varint;
use crate::registry::FieldValue;

/// Position of a reserved placeholder, returned by `reserve_u8`/`reserve_u16` for
/// later backpatching.
#[derive(Debug, Clone, Copy)]
pub struct Placeholder(usize);

#[derive(Debug, Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(256) }
    }

    /// Rewinds the write cursor without releasing the backing allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Returns a trimmed copy of the bytes written since the last `reset()`.
    pub fn finish(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.push(value as u8);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        self.write_u16(bytes.len() as u16);
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_varint(&mut self, value: u64) {
        write_varint(&mut self.buf, value);
    }

    pub fn write_field_value(&mut self, value: &FieldValue) {
        match value {
            FieldValue::I8(v) => self.write_i8(*v),
            FieldValue::I16(v) => self.write_i16(*v),
            FieldValue::I32(v) => self.write_i32(*v),
            FieldValue::U8(v) => self.write_u8(*v),
            FieldValue::U16(v) => self.write_u16(*v),
            FieldValue::U32(v) => self.write_u32(*v),
            FieldValue::F32(v) => self.write_f32(*v),
            FieldValue::F64(v) => self.write_f64(*v),
            FieldValue::Str(v) => self.write_string(v),
        }
    }

    /// Reserves one byte, to be filled in later via `patch_u8`.
    pub fn reserve_u8(&mut self) -> Placeholder {
        let pos = self.buf.len();
        self.buf.push(0);
        Placeholder(pos)
    }

    /// Reserves two bytes, to be filled in later via `patch_u16`.
    pub fn reserve_u16(&mut self) -> Placeholder {
        let pos = self.buf.len();
        self.buf.extend_from_slice(&[0, 0]);
        Placeholder(pos)
    }

    pub fn patch_u8(&mut self, placeholder: Placeholder, value: u8) {
        self.buf[placeholder.0] = value;
    }

    pub fn patch_u16(&mut self, placeholder: Placeholder, value: u16) {
        self.buf[placeholder.0..placeholder.0 + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// Raw access for composing pre-encoded entity slices into a group buffer.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_capacity() {
        let mut enc = Encoder::new();
        enc.write_u32(0xdead_beef);
        let cap_before = enc.buf.capacity();
        enc.reset();
        assert_eq!(enc.len(), 0);
        assert_eq!(enc.buf.capacity(), cap_before);
    }

    #[test]
    fn patch_overwrites_reserved_slot() {
        let mut enc = Encoder::new();
        let ph = enc.reserve_u16();
        enc.write_u8(0xff);
        enc.patch_u16(ph, 0x1234);
        let bytes = enc.finish();
        assert_eq!(&bytes[0..2], &0x1234u16.to_le_bytes());
        assert_eq!(bytes[2], 0xff);
    }
}
