//! Minimal big-endian primitive reader/writer used to assemble and
//! disassemble the request/response envelope shapes in
//! [`crate::protocol::messages`]. Decoding the request-type-specific body
//! itself is out of scope for this crate (spec §1): a real deployment
//! plugs in the official per-API Kafka codec here. This module only
//! carries the routing-relevant scalar fields (topic names, partition
//! numbers, group ids) those codecs would also need to touch.
//!
//! The cursor-advance-and-bounds-check style mirrors how request headers
//! are parsed on the wire: read a length-prefixed field, check the
//! remaining slice is long enough, slice it off, advance.

use bytes::{BufMut, BytesMut};
use std::convert::TryInto;

use crate::error::ClientError;

pub struct ByteReader<'a> {
    cursor: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { cursor: bytes }
    }

    pub fn remaining(&self) -> usize {
        self.cursor.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ClientError> {
        if self.cursor.len() < n {
            return Err(ClientError::DecodeError(format!(
                "expected {n} bytes, found {}",
                self.cursor.len()
            )));
        }
        let (head, tail) = self.cursor.split_at(n);
        self.cursor = tail;
        Ok(head)
    }

    pub fn read_i16(&mut self) -> Result<i16, ClientError> {
        Ok(i16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub fn read_i32(&mut self) -> Result<i32, ClientError> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub fn read_i64(&mut self) -> Result<i64, ClientError> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    /// A 2-byte length-prefixed UTF-8 string. A negative length decodes to
    /// an empty string (the wire convention for "null string" isn't
    /// meaningful for the routing-key fields this reader handles).
    pub fn read_string(&mut self) -> Result<String, ClientError> {
        let len = self.read_i16()?;
        if len < 0 {
            return Ok(String::new());
        }
        let bytes = self.take(len as usize)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| ClientError::DecodeError(format!("invalid utf8 string: {e}")))
    }

    /// A 4-byte length-prefixed raw byte blob.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>, ClientError> {
        let len = self.read_i32()?;
        if len < 0 {
            return Ok(Vec::new());
        }
        Ok(self.take(len as usize)?.to_vec())
    }
}

pub struct ByteWriter {
    buf: BytesMut,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn write_i16(&mut self, v: i16) -> &mut Self {
        self.buf.put_i16(v);
        self
    }

    pub fn write_i32(&mut self, v: i32) -> &mut Self {
        self.buf.put_i32(v);
        self
    }

    pub fn write_i64(&mut self, v: i64) -> &mut Self {
        self.buf.put_i64(v);
        self
    }

    pub fn write_string(&mut self, s: &str) -> &mut Self {
        self.write_i16(s.len() as i16);
        self.buf.put_slice(s.as_bytes());
        self
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_i32(bytes.len() as i32);
        self.buf.put_slice(bytes);
        self
    }

    pub fn into_bytes(self) -> bytes::Bytes {
        self.buf.freeze()
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_scalars_and_strings() {
        let mut w = ByteWriter::new();
        w.write_i16(7).write_i32(-42).write_string("topic-a");
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(r.read_i16().unwrap(), 7);
        assert_eq!(r.read_i32().unwrap(), -42);
        assert_eq!(r.read_string().unwrap(), "topic-a");
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn short_buffer_is_decode_error() {
        let mut r = ByteReader::new(&[0x00]);
        assert!(r.read_i16().is_err());
    }
}
