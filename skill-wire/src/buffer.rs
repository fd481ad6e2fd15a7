//! Write and read buffers
//!
//! `OutBuffer` is the side buffer of the two-phase write: field data is
//! streamed into it first, the type block is emitted once the per-field
//! end offsets are known, then the buffer is copied into the main output.
//! `InStream` is the positional reader the block parser uses.

use crate::error::{WireError, WireResult};
use crate::v64;
use byteorder::{ByteOrder, LittleEndian};

/// Growable little-endian output buffer recording field end offsets.
#[derive(Debug, Default)]
pub struct OutBuffer {
    bytes: Vec<u8>,
    end_offsets: Vec<u64>,
}

impl OutBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Record the current length as the end offset of the field just
    /// streamed. The type block writes these after the counts are known.
    pub fn mark_field_end(&mut self) {
        self.end_offsets.push(self.bytes.len() as u64);
    }

    pub fn end_offsets(&self) -> &[u64] {
        &self.end_offsets
    }

    pub fn write_bool(&mut self, v: bool) {
        self.bytes.push(v as u8);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.bytes.push(v as u8);
    }

    pub fn write_i16(&mut self, v: i16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_i16(&mut buf, v);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_i32(&mut self, v: i32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_i32(&mut buf, v);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_i64(&mut self, v: i64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_i64(&mut buf, v);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_f32(&mut self, v: f32) {
        let mut buf = [0u8; 4];
        LittleEndian::write_f32(&mut buf, v);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_f64(&mut self, v: f64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_f64(&mut buf, v);
        self.bytes.extend_from_slice(&buf);
    }

    pub fn write_v64(&mut self, v: u64) {
        v64::write_v64(&mut self.bytes, v);
    }

    pub fn write_raw(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }
}

/// Positional reader over a byte slice.
#[derive(Debug)]
pub struct InStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> InStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.data.len()
    }

    fn take(&mut self, n: usize) -> WireResult<&'a [u8]> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEof { offset: self.pos });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_bool(&mut self) -> WireResult<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_i8(&mut self) -> WireResult<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_i16(&mut self) -> WireResult<i16> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub fn read_i32(&mut self) -> WireResult<i32> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub fn read_i64(&mut self) -> WireResult<i64> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub fn read_f32(&mut self) -> WireResult<f32> {
        Ok(LittleEndian::read_f32(self.take(4)?))
    }

    pub fn read_f64(&mut self) -> WireResult<f64> {
        Ok(LittleEndian::read_f64(self.take(8)?))
    }

    pub fn read_v64(&mut self) -> WireResult<u64> {
        match v64::read_v64(&self.data[self.pos..]) {
            Some((value, used)) => {
                self.pos += used;
                Ok(value)
            }
            None => Err(WireError::UnexpectedEof { offset: self.pos }),
        }
    }

    pub fn read_bytes(&mut self, n: usize) -> WireResult<&'a [u8]> {
        self.take(n)
    }

    pub fn read_string(&mut self, n: usize) -> WireResult<String> {
        let offset = self.pos;
        let bytes = self.take(n)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8 { offset })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_width_values_are_little_endian() {
        let mut out = OutBuffer::new();
        out.write_i32(0x0403_0201);
        assert_eq!(out.as_slice(), &[0x01, 0x02, 0x03, 0x04]);

        let mut input = InStream::new(out.as_slice());
        assert_eq!(input.read_i32().unwrap(), 0x0403_0201);
        assert!(input.is_at_end());
    }

    #[test]
    fn field_end_offsets_accumulate() {
        let mut out = OutBuffer::new();
        out.write_i64(1);
        out.mark_field_end();
        out.write_bool(true);
        out.mark_field_end();
        assert_eq!(out.end_offsets(), &[8, 9]);
    }

    #[test]
    fn short_reads_fail() {
        let mut input = InStream::new(&[1, 2]);
        assert!(matches!(
            input.read_i32(),
            Err(WireError::UnexpectedEof { offset: 0 })
        ));
    }
}
