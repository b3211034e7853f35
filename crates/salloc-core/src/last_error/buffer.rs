//! Fixed-capacity text buffer with `snprintf`-style truncation detection.

use std::fmt::{self, Write};

/// Text buffer bounded to `capacity` bytes, one of which is reserved for the
/// C terminator, so at most `capacity - 1` bytes of text are ever held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundedBuf {
    text: String,
    capacity: usize,
}

/// The formatter wanted `required` bytes but fewer were available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Truncated {
    pub required: usize,
    pub available: usize,
}

impl BoundedBuf {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            capacity,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still available to the next append, terminator slot included.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.text.len())
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Format `args` at the current end of the buffer.
    ///
    /// Output that needs `remaining()` bytes or more is truncation, exactly
    /// like an `snprintf` return value `>= size`. On truncation whatever did
    /// fit stays in the buffer; the caller decides what to discard.
    pub fn append(&mut self, args: fmt::Arguments<'_>) -> Result<usize, Truncated> {
        let available = self.remaining();
        let mut writer = CountingWriter {
            out: &mut self.text,
            room: available.saturating_sub(1),
            required: 0,
        };
        // CountingWriter never fails; a Display impl that errors counts as truncation.
        let formatted = writer.write_fmt(args);
        let required = writer.required;
        if formatted.is_err() || required >= available {
            return Err(Truncated {
                required,
                available,
            });
        }
        Ok(required)
    }
}

struct CountingWriter<'a> {
    out: &'a mut String,
    room: usize,
    required: usize,
}

impl Write for CountingWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.required = self.required.saturating_add(s.len());
        if self.room == 0 {
            return Ok(());
        }
        let mut take = s.len().min(self.room);
        while !s.is_char_boundary(take) {
            take -= 1;
        }
        self.out.push_str(&s[..take]);
        self.room = if take == s.len() { self.room - take } else { 0 };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_below_capacity() {
        let mut buf = BoundedBuf::with_capacity(8);
        assert_eq!(buf.append(format_args!("abc")), Ok(3));
        assert_eq!(buf.append(format_args!("{}", 1234)), Ok(4));
        assert_eq!(buf.as_str(), "abc1234");
        assert_eq!(buf.remaining(), 1);
    }

    #[test]
    fn exactly_capacity_is_truncation() {
        let mut buf = BoundedBuf::with_capacity(4);
        assert_eq!(
            buf.append(format_args!("abcd")),
            Err(Truncated {
                required: 4,
                available: 4
            })
        );
        assert_eq!(buf.as_str(), "abc");
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut buf = BoundedBuf::with_capacity(4);
        assert!(buf.append(format_args!("aé€")).is_err());
        assert_eq!(buf.as_str(), "aé");
    }

    #[test]
    fn counts_full_requirement_past_the_bound() {
        let mut buf = BoundedBuf::with_capacity(2);
        let err = buf.append(format_args!("{}", "x".repeat(50))).unwrap_err();
        assert_eq!(err.required, 50);
        assert_eq!(err.available, 2);
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut buf = BoundedBuf::with_capacity(0);
        assert!(buf.append(format_args!("")).is_err());
        assert_eq!(buf.as_str(), "");
    }
}
