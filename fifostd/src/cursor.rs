/// Helper struct representing a mutable buffer with a stored cursor position,
/// for writing sequential bytes without overrunning the buffer.
pub struct Cursor<'a> {
    buf: &'a mut [u8],
    cursor: usize,
}

impl<'a> Cursor<'a> {
    /// Constructs a new cursor from the provided buffer
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self {
            buf: buffer,
            cursor: 0,
        }
    }

    /// Tries to write a u8 to the buffer, returning `false` if end of buffer reached.
    pub fn write_u8(&mut self, data: u8) -> bool {
        match self.buf.get_mut(self.cursor) {
            Some(slot) => {
                *slot = data;
                self.cursor += 1;
                true
            }
            None => false,
        }
    }

    /// Returns the current position into the buffer (cursor).
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Whether the next write would fail.
    pub fn is_full(&self) -> bool {
        self.cursor == self.buf.len()
    }
}
