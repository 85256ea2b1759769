use core::fmt;

/// `fmt::Write` sink over a caller-owned byte buffer.
///
/// One byte is always held back for the NUL terminator written by
/// [`OutBuf::finish`]; a write that would eat into it fails.
#[derive(Debug)]
pub struct OutBuf<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl<'b> OutBuf<'b> {
    pub fn new(buf: &'b mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far, terminator excluded.
    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    fn capacity(&self) -> usize {
        self.buf.len().saturating_sub(1)
    }

    pub fn push(&mut self, byte: u8) -> fmt::Result {
        self.write_bytes(&[byte])
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> fmt::Result {
        let end = self.pos.checked_add(bytes.len()).ok_or(fmt::Error)?;
        if end > self.capacity() {
            return Err(fmt::Error);
        }
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
        Ok(())
    }

    /// Write the terminator and return the content length.
    pub fn finish(self) -> Option<usize> {
        let slot = self.buf.get_mut(self.pos)?;
        *slot = 0;
        Some(self.pos)
    }
}

impl fmt::Write for OutBuf<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_bytes(s.as_bytes())
    }
}
