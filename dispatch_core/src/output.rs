use crate::command::{error_bit, CommandDescriptor};

/// Per-call outcome details, filled in by the dispatcher.
///
/// The buffer belongs to the caller and is never grown. After a successful
/// call with a result it holds the formatted text followed by a NUL byte.
#[derive(Debug, Default)]
pub struct OutputReport<'b, 't> {
    pub buffer: &'b mut [u8],
    /// Last candidate the dispatcher tried.
    pub command: Option<&'t CommandDescriptor<'t>>,
    /// Bit `n` set when positional argument `n` failed to convert.
    pub arg_error_mask: u32,
    pub not_enough_arguments: bool,
    /// The handler ran but its result did not fit in the buffer.
    pub result_error: bool,
    /// Length of the formatted result, terminator excluded.
    pub written: usize,
}

impl<'b, 't> OutputReport<'b, 't> {
    pub fn new(buffer: &'b mut [u8]) -> Self {
        Self {
            buffer,
            command: None,
            arg_error_mask: 0,
            not_enough_arguments: false,
            result_error: false,
            written: 0,
        }
    }

    /// Clear everything except the buffer.
    pub fn reset(&mut self) {
        self.command = None;
        self.arg_error_mask = 0;
        self.not_enough_arguments = false;
        self.result_error = false;
        self.written = 0;
    }

    /// Whether binding failed for the current candidate.
    pub fn has_error(&self) -> bool {
        self.arg_error_mask != 0 || self.not_enough_arguments
    }

    pub fn arg_failed(&self, position: usize) -> bool {
        self.arg_error_mask & error_bit(position) != 0
    }

    /// Formatted result text, if one was written.
    pub fn result(&self) -> Option<&str> {
        if self.result_error {
            return None;
        }
        core::str::from_utf8(self.buffer.get(..self.written)?).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_buffer() {
        let mut raw = *b"42\0";
        let mut out = OutputReport::new(&mut raw);
        out.written = 2;
        out.arg_error_mask = 0b101;
        assert!(out.has_error());
        assert!(out.arg_failed(0));
        assert!(!out.arg_failed(1));
        assert!(out.arg_failed(2));
        assert_eq!(out.result(), Some("42"));

        out.reset();
        assert!(!out.has_error());
        assert_eq!(out.result(), Some(""));
        assert_eq!(out.buffer, b"42\0");
    }

    #[test]
    fn result_error_hides_text() {
        let mut out = OutputReport::default();
        assert!(out.buffer.is_empty());
        out.result_error = true;
        assert_eq!(out.result(), None);
    }
}
