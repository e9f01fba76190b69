//! Bounds checked cursors over the input and output buffers of the blocked driver.
//!
//! Workers receive both cursors by mutable reference and advance them by however many bytes
//! they consumed or produced, which is what lets compressed (variable length) output flow
//! through the same driver as the fixed length transforms.

use crate::error::BitshuffleError;

/// A read position within an input buffer.
#[derive(Debug, Clone)]
pub struct ReadCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadCursor<'a> {
    /// Creates a cursor at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes consumed so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unread part of the buffer.
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    /// Returns the next `len` bytes and moves past them.
    ///
    /// # Errors
    ///
    /// [`BitshuffleError::InputTooSmall`] if fewer than `len` bytes remain. The cursor does not
    /// move in that case.
    #[inline]
    pub fn read(&mut self, len: usize) -> Result<&'a [u8], BitshuffleError> {
        let bytes = self.peek(len)?;
        self.pos += len;
        Ok(bytes)
    }

    /// Returns the next `len` bytes without moving.
    #[inline]
    pub fn peek(&self, len: usize) -> Result<&'a [u8], BitshuffleError> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => Ok(&self.data[self.pos..end]),
            None => Err(BitshuffleError::InputTooSmall {
                needed: self.pos.saturating_add(len),
                actual: self.data.len(),
            }),
        }
    }
}

/// A write position within an output buffer.
#[derive(Debug)]
pub struct WriteCursor<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl<'a> WriteCursor<'a> {
    /// Creates a cursor at the start of `data`.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes written so far.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The unwritten part of the buffer. Writing here does not move the cursor; follow up
    /// with [`WriteCursor::advance`].
    #[inline]
    pub fn remaining_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.pos..]
    }

    /// Moves the cursor past `len` bytes that were written through
    /// [`WriteCursor::remaining_mut`].
    ///
    /// # Errors
    ///
    /// [`BitshuffleError::OutputTooSmall`] if fewer than `len` bytes remain.
    #[inline]
    pub fn advance(&mut self, len: usize) -> Result<(), BitshuffleError> {
        self.check(len)?;
        self.pos += len;
        Ok(())
    }

    /// Returns the next `len` bytes for writing and moves past them.
    #[inline]
    pub fn reserve(&mut self, len: usize) -> Result<&mut [u8], BitshuffleError> {
        self.check(len)?;
        let start = self.pos;
        self.pos += len;
        Ok(&mut self.data[start..start + len])
    }

    /// Copies `bytes` to the cursor and moves past them.
    #[inline]
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), BitshuffleError> {
        self.reserve(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    fn check(&self, len: usize) -> Result<(), BitshuffleError> {
        match self.pos.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(()),
            _ => Err(BitshuffleError::OutputTooSmall {
                needed: self.pos.saturating_add(len),
                actual: self.data.len(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_advances_and_stops_at_end() {
        let data = [1, 2, 3, 4, 5];
        let mut cursor = ReadCursor::new(&data);
        assert_eq!(cursor.read(2).unwrap(), &[1, 2]);
        assert_eq!(cursor.position(), 2);
        assert_eq!(
            cursor.read(4),
            Err(BitshuffleError::InputTooSmall {
                needed: 6,
                actual: 5
            })
        );
        assert_eq!(cursor.position(), 2);
        assert_eq!(cursor.read(3).unwrap(), &[3, 4, 5]);
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn write_rejects_overflow() {
        let mut buf = [0u8; 4];
        let mut cursor = WriteCursor::new(&mut buf);
        cursor.write(&[9, 8]).unwrap();
        cursor.remaining_mut()[0] = 7;
        cursor.advance(1).unwrap();
        assert_eq!(
            cursor.write(&[1, 1]),
            Err(BitshuffleError::OutputTooSmall {
                needed: 5,
                actual: 4
            })
        );
        assert_eq!(cursor.position(), 3);
        assert_eq!(buf, [9, 8, 7, 0]);
    }
}
