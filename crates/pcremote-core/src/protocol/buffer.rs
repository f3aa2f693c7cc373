//! Newline framing over a byte stream.
//!
//! TCP delivers bytes, not messages: one read may carry half a frame, or
//! three frames and the start of a fourth.  [`FrameBuffer`] collects the
//! bytes and hands out one complete line at a time, in arrival order.

use thiserror::Error;

use crate::protocol::tokens::FRAME_DELIMITER;

/// Default cap on bytes waiting for a delimiter.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 64 * 1024;

/// Errors raised while buffering stream data.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FrameBufferError {
    /// The undelimited tail grew past the limit and was discarded.
    #[error("discarded {discarded} undelimited bytes (limit {limit})")]
    Overflow { discarded: usize, limit: usize },
}

/// Accumulates stream bytes and splits them on `\n`.
#[derive(Debug)]
pub struct FrameBuffer {
    pending: Vec<u8>,
    max_pending: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_PENDING_BYTES)
    }
}

impl FrameBuffer {
    /// Creates a buffer holding at most `max_pending` undelimited bytes.
    pub fn with_limit(max_pending: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_pending,
        }
    }

    /// Appends bytes read from the stream.
    ///
    /// Complete lines already in the buffer are kept even when the tail
    /// overflows.
    ///
    /// # Errors
    ///
    /// Returns [`FrameBufferError::Overflow`] after discarding the tail if
    /// the bytes after the last delimiter exceed the limit.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), FrameBufferError> {
        self.pending.extend_from_slice(bytes);

        let tail_start = self
            .pending
            .iter()
            .rposition(|b| *b == FRAME_DELIMITER)
            .map_or(0, |pos| pos + 1);
        let tail_len = self.pending.len() - tail_start;
        if tail_len > self.max_pending {
            self.pending.truncate(tail_start);
            return Err(FrameBufferError::Overflow {
                discarded: tail_len,
                limit: self.max_pending,
            });
        }
        Ok(())
    }

    /// Removes and returns the next complete line without its delimiter.
    ///
    /// Blank lines are skipped.  Returns `None` when no complete line is
    /// buffered.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let pos = self.pending.iter().position(|b| *b == FRAME_DELIMITER)?;
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if !line.iter().all(u8::is_ascii_whitespace) {
                return Some(line);
            }
        }
    }

    /// Bytes buffered so far, delimited or not.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }

    /// Removes and returns everything buffered, delimiter or not.
    pub fn take_pending(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.pending)
    }

    /// Number of bytes buffered, delimited or not.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drops everything buffered.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_pending_returns_undelimited_bytes_and_empties_buffer() {
        let mut buf = FrameBuffer::default();
        buf.push(b"aa|bb|cc").unwrap();

        assert_eq!(buf.pending(), b"aa|bb|cc");
        assert_eq!(buf.take_pending(), b"aa|bb|cc".to_vec());
        assert_eq!(buf.pending_len(), 0);
        assert_eq!(buf.next_line(), None);
    }

    #[test]
    fn test_partial_line_is_held_until_delimiter_arrives() {
        // Arrange
        let mut buf = FrameBuffer::default();

        // Act
        buf.push(b"abc|de").unwrap();
        let first = buf.next_line();
        buf.push(b"f|01\n").unwrap();
        let second = buf.next_line();

        // Assert
        assert_eq!(first, None);
        assert_eq!(second.as_deref(), Some(&b"abc|def|01"[..]));
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_multiple_lines_in_one_push_come_out_in_order() {
        let mut buf = FrameBuffer::default();

        buf.push(b"one\ntwo\nthr").unwrap();

        assert_eq!(buf.next_line().as_deref(), Some(&b"one"[..]));
        assert_eq!(buf.next_line().as_deref(), Some(&b"two"[..]));
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.pending_len(), 3);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut buf = FrameBuffer::default();

        buf.push(b"\n\r\n  \nframe\n").unwrap();

        assert_eq!(buf.next_line().as_deref(), Some(&b"frame"[..]));
        assert_eq!(buf.next_line(), None);
    }

    #[test]
    fn test_overflowing_tail_is_discarded_but_complete_lines_survive() {
        // Arrange
        let mut buf = FrameBuffer::with_limit(8);

        // Act
        let result = buf.push(b"ok\n0123456789");

        // Assert
        assert_eq!(
            result,
            Err(FrameBufferError::Overflow {
                discarded: 10,
                limit: 8
            })
        );
        assert_eq!(buf.next_line().as_deref(), Some(&b"ok"[..]));
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_buffer_is_usable_after_overflow() {
        let mut buf = FrameBuffer::with_limit(4);
        assert!(buf.push(b"too long").is_err());

        buf.push(b"hi\n").unwrap();

        assert_eq!(buf.next_line().as_deref(), Some(&b"hi"[..]));
    }

    #[test]
    fn test_clear_drops_pending_bytes() {
        let mut buf = FrameBuffer::default();
        buf.push(b"line\npartial").unwrap();

        buf.clear();

        assert_eq!(buf.pending_len(), 0);
        assert_eq!(buf.next_line(), None);
    }
}
