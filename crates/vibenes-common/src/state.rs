//! Save-state byte buffers.
//!
//! Save states are flat little-endian byte streams: a writer appends
//! primitive values, a reader consumes them in the same order. Components
//! implement [`Snapshot`] to emit and restore their state; the container
//! framing (magic, version, checksum) lives in the core crate.
//!
//! The reader is strict: running off the end of the buffer is an error, and
//! the core refuses a restore that leaves trailing bytes. Field-order
//! mismatches therefore surface as load failures instead of silently
//! corrupted emulation.

/// Errors produced while decoding a state buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// The buffer ended before the expected data.
    #[error("state buffer truncated: needed {needed} more bytes, {remaining} left")]
    Truncated {
        /// Bytes the reader tried to consume.
        needed: usize,
        /// Bytes that were actually left.
        remaining: usize,
    },

    /// A decoded value was outside its legal range.
    #[error("state buffer contains invalid value for {field}: {value:#06x}")]
    InvalidValue {
        /// Name of the field being decoded.
        field: &'static str,
        /// The offending raw value.
        value: u32,
    },
}

/// Append-only little-endian byte sink for save states.
#[derive(Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    /// Create an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a writer with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the writer and return the buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Append a single byte.
    #[inline]
    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a 16-bit value, low byte first.
    #[inline]
    pub fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a 32-bit value, low byte first.
    #[inline]
    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a 64-bit value, low byte first.
    #[inline]
    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a signed 64-bit value, low byte first.
    #[inline]
    pub fn put_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    /// Append a bool as one byte (0 or 1).
    #[inline]
    pub fn put_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Append a raw byte slice verbatim.
    #[inline]
    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }
}

/// Cursor over a state buffer, consuming values in write order.
#[derive(Debug)]
pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    /// Wrap a byte slice for reading.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether the whole buffer has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], StateError> {
        if self.remaining() < count {
            return Err(StateError::Truncated {
                needed: count,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }

    /// Read one byte.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Truncated`] if the buffer is exhausted.
    #[inline]
    pub fn get_u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    /// Read a little-endian 16-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Truncated`] if the buffer is exhausted.
    #[inline]
    pub fn get_u16(&mut self) -> Result<u16, StateError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a little-endian 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Truncated`] if the buffer is exhausted.
    #[inline]
    pub fn get_u32(&mut self) -> Result<u32, StateError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a little-endian 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Truncated`] if the buffer is exhausted.
    #[inline]
    pub fn get_u64(&mut self) -> Result<u64, StateError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    /// Read a little-endian signed 64-bit value.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Truncated`] if the buffer is exhausted.
    #[inline]
    pub fn get_i64(&mut self) -> Result<i64, StateError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    /// Read a bool (any non-zero byte is true).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Truncated`] if the buffer is exhausted.
    #[inline]
    pub fn get_bool(&mut self) -> Result<bool, StateError> {
        Ok(self.get_u8()? != 0)
    }

    /// Fill `dest` from the buffer.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Truncated`] if fewer than `dest.len()` bytes remain.
    #[inline]
    pub fn get_bytes(&mut self, dest: &mut [u8]) -> Result<(), StateError> {
        let src = self.take(dest.len())?;
        dest.copy_from_slice(src);
        Ok(())
    }
}

/// Emit and restore a component's complete state.
///
/// Implementations must write every field that affects emulation so that
/// `load_state(save_state())` leaves the component byte-identical. ROM
/// contents are excluded; they are validated by checksum instead.
pub trait Snapshot {
    /// Append this component's state to the writer.
    fn save_state(&self, w: &mut StateWriter);

    /// Restore this component's state from the reader.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the buffer is truncated or a field decodes
    /// to an illegal value. The component may be left partially restored on
    /// error; callers are expected to discard it.
    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_primitives() {
        let mut w = StateWriter::new();
        w.put_u8(0xAB);
        w.put_u16(0x1234);
        w.put_u32(0xDEAD_BEEF);
        w.put_u64(0x0102_0304_0506_0708);
        w.put_i64(-42);
        w.put_bool(true);
        w.put_bytes(&[1, 2, 3]);

        let buf = w.into_inner();
        let mut r = StateReader::new(&buf);
        assert_eq!(r.get_u8().unwrap(), 0xAB);
        assert_eq!(r.get_u16().unwrap(), 0x1234);
        assert_eq!(r.get_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(r.get_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(r.get_i64().unwrap(), -42);
        assert!(r.get_bool().unwrap());
        let mut tail = [0u8; 3];
        r.get_bytes(&mut tail).unwrap();
        assert_eq!(tail, [1, 2, 3]);
        assert!(r.is_exhausted());
    }

    #[test]
    fn test_little_endian_layout() {
        let mut w = StateWriter::new();
        w.put_u16(0x1234);
        assert_eq!(w.into_inner(), vec![0x34, 0x12]);
    }

    #[test]
    fn test_truncated_read() {
        let buf = vec![0x01];
        let mut r = StateReader::new(&buf);
        let err = r.get_u32().unwrap_err();
        assert_eq!(
            err,
            StateError::Truncated {
                needed: 4,
                remaining: 1
            }
        );
    }

    #[test]
    fn test_remaining_tracks_position() {
        let buf = vec![0u8; 10];
        let mut r = StateReader::new(&buf);
        assert_eq!(r.remaining(), 10);
        r.get_u32().unwrap();
        assert_eq!(r.remaining(), 6);
        assert!(!r.is_exhausted());
    }
}
