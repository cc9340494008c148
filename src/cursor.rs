use std::io::Cursor;

use bytes::Buf;

use crate::ProtocolError;

/// A bounds-checked reader over one complete DNS message.
///
/// Name decompression needs to jump to arbitrary offsets inside the message,
/// so the cursor always keeps the whole buffer rather than the unread tail.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    inner: Cursor<&'a [u8]>,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            inner: Cursor::new(buf),
        }
    }

    /// The complete message, independent of the current position.
    pub fn buffer(&self) -> &'a [u8] {
        *self.inner.get_ref()
    }

    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    pub fn position(&self) -> usize {
        self.inner.position() as usize
    }

    pub fn remaining(&self) -> usize {
        self.inner.remaining()
    }

    pub fn set_position(&mut self, position: usize) -> Result<(), ProtocolError> {
        if position > self.len() {
            return Err(self.out_of_bounds_at(position, 0));
        }

        self.inner.set_position(position as u64);
        Ok(())
    }

    pub fn advance(&mut self, n: usize) -> Result<(), ProtocolError> {
        self.ensure(n)?;
        self.inner.advance(n);
        Ok(())
    }

    pub fn peek_u8(&self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buffer()[self.position()])
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.inner.get_u8())
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.inner.get_u16())
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.inner.get_u32())
    }

    /// Reads exactly `n` bytes or fails without moving.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure(n)?;
        let start = self.position();
        let buf = self.buffer();
        self.inner.advance(n);
        Ok(&buf[start..start + n])
    }

    /// Reads `N` bytes, zero-filling whatever lies past the end of the
    /// message. Only for the fixed-size header, where every field has a
    /// protocol-defined width; never for offsets taken from the message.
    pub fn read_padded<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0; N];
        let available = self.remaining().min(N);
        self.inner.copy_to_slice(&mut out[..available]);
        out
    }

    fn ensure(&self, wanted: usize) -> Result<(), ProtocolError> {
        if self.remaining() < wanted {
            return Err(self.out_of_bounds_at(self.position(), wanted));
        }

        Ok(())
    }

    fn out_of_bounds_at(&self, offset: usize, wanted: usize) -> ProtocolError {
        ProtocolError::OutOfBounds {
            offset,
            wanted,
            len: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_integers() {
        let buf = [0x12, 0x34, 0xde, 0xad, 0xbe, 0xef, 0x07];
        let mut cursor = ByteCursor::new(&buf);

        assert_eq!(cursor.read_u16().unwrap(), 0x1234);
        assert_eq!(cursor.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(cursor.peek_u8().unwrap(), 7);
        assert_eq!(cursor.position(), 6);
        assert_eq!(cursor.read_u8().unwrap(), 7);
        assert_eq!(cursor.remaining(), 0);
    }

    #[test]
    fn strict_reads_fail_without_moving() {
        let buf = [1, 2, 3];
        let mut cursor = ByteCursor::new(&buf);
        cursor.advance(2).unwrap();

        let err = cursor.read_u16().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::OutOfBounds {
                offset: 2,
                wanted: 2,
                len: 3
            }
        );
        assert_eq!(cursor.position(), 2);
        assert!(cursor.read_bytes(2).is_err());
        assert!(cursor.advance(2).is_err());
        assert_eq!(cursor.read_bytes(1).unwrap(), &[3]);
    }

    #[test]
    fn set_position_allows_end_but_not_past_it() {
        let buf = [0; 4];
        let mut cursor = ByteCursor::new(&buf);

        assert!(cursor.set_position(4).is_ok());
        assert!(cursor.peek_u8().is_err());
        assert!(cursor.set_position(5).is_err());
    }

    #[test]
    fn padded_read_zero_fills_short_input() {
        let buf = [0xab, 0xcd, 0xef];
        let mut cursor = ByteCursor::new(&buf);

        let first: [u8; 2] = cursor.read_padded();
        let second: [u8; 2] = cursor.read_padded();
        let third: [u8; 2] = cursor.read_padded();

        assert_eq!(first, [0xab, 0xcd]);
        assert_eq!(second, [0xef, 0]);
        assert_eq!(third, [0, 0]);
        assert_eq!(cursor.position(), 3);
    }
}
