//! Compact binary framing for external handshakes.
//!
//! Trivially copyable values are written host-endian as raw
//! `size_of::<T>()` bytes. Strings are raw UTF-8 bytes followed by a
//! single zero terminator. Composite messages are concatenations of these
//! primitives in a fixed field order.

use crate::error::{CoreError, CoreResult};

/// A cursor over a caller-supplied write buffer that bounds-checks every
/// write and never retains the slice beyond the call.
pub struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn written(&self) -> usize {
        self.pos
    }

    fn reserve(&mut self, len: usize) -> CoreResult<&mut [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(CoreError::BufferTooSmall {
                required: self.pos + len,
                available: self.buf.len(),
            });
        }
        let slice = &mut self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn write_i32(&mut self, value: i32) -> CoreResult<()> {
        self.reserve(4)?.copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    pub fn write_f64(&mut self, value: f64) -> CoreResult<()> {
        self.reserve(8)?.copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> CoreResult<()> {
        self.reserve(4)?.copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> CoreResult<()> {
        self.reserve(1)?[0] = value;
        Ok(())
    }

    /// Writes `value` followed by a single zero terminator.
    pub fn write_cstring(&mut self, value: &str) -> CoreResult<()> {
        let bytes = value.as_bytes();
        let dst = self.reserve(bytes.len() + 1)?;
        dst[..bytes.len()].copy_from_slice(bytes);
        dst[bytes.len()] = 0;
        Ok(())
    }
}

/// A cursor over a read-only buffer, the mirror of [`Writer`].
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        if self.pos + len > self.buf.len() {
            return Err(CoreError::DecodeError(format!(
                "expected {len} more bytes at offset {}, have {}",
                self.pos,
                self.buf.len()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_i32(&mut self) -> CoreResult<i32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(i32::from_ne_bytes(bytes))
    }

    pub fn read_f64(&mut self) -> CoreResult<f64> {
        let bytes: [u8; 8] = self.take(8)?.try_into().unwrap();
        Ok(f64::from_ne_bytes(bytes))
    }

    pub fn read_f32(&mut self) -> CoreResult<f32> {
        let bytes: [u8; 4] = self.take(4)?.try_into().unwrap();
        Ok(f32::from_ne_bytes(bytes))
    }

    pub fn read_u8(&mut self) -> CoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads bytes up to (and consuming) the next zero terminator.
    pub fn read_cstring(&mut self) -> CoreResult<String> {
        let start = self.pos;
        let rel_end = self.buf[start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| CoreError::DecodeError("unterminated string".to_string()))?;
        let s = std::str::from_utf8(&self.buf[start..start + rel_end])
            .map_err(|e| CoreError::DecodeError(e.to_string()))?
            .to_string();
        self.pos = start + rel_end + 1;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_primitives() {
        let mut buf = [0u8; 64];
        {
            let mut w = Writer::new(&mut buf);
            w.write_i32(-7).unwrap();
            w.write_f64(3.5).unwrap();
            w.write_cstring("hello").unwrap();
        }
        let mut r = Reader::new(&buf);
        assert_eq!(r.read_i32().unwrap(), -7);
        assert_eq!(r.read_f64().unwrap(), 3.5);
        assert_eq!(r.read_cstring().unwrap(), "hello");
    }

    #[test]
    fn write_reports_buffer_too_small() {
        let mut buf = [0u8; 2];
        let mut w = Writer::new(&mut buf);
        assert!(matches!(
            w.write_i32(1),
            Err(CoreError::BufferTooSmall { .. })
        ));
    }

    #[test]
    fn read_reports_unterminated_string() {
        let buf = [b'a', b'b'];
        let mut r = Reader::new(&buf);
        assert!(matches!(r.read_cstring(), Err(CoreError::DecodeError(_))));
    }
}
