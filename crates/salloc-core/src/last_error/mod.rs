//! Single-slot "last error" diagnostic.
//!
//! [`LastError::set`] overwrites the whole slot: code, file and line always,
//! and the message only if both the location prefix and the caller's text fit
//! the bounded buffer. Any truncation clears the message and is reported as a
//! [`FormatOverflow`]; a partial diagnostic is never kept.
//!
//! ```
//! use salloc_core::{LastError, set_last_error};
//!
//! let mut last = LastError::new();
//! set_last_error!(last, 2, "cannot open {}", "db.sqlite").unwrap();
//! assert_eq!(last.code(), 2);
//! assert!(last.message().ends_with("cannot open db.sqlite"));
//! ```

mod buffer;

use std::fmt;

use thiserror::Error;

pub use buffer::{BoundedBuf, Truncated};

/// Code held by a slot that has no error.
pub const NO_ERROR: i32 = -1;

/// Default message capacity in bytes, terminator slot included.
pub const MESSAGE_CAPACITY: usize = 128;

/// Default file capacity in bytes, terminator slot included.
pub const FILE_CAPACITY: usize = 2048;

/// The message did not fit the bounded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatOverflow {
    #[error("error location prefix needs {required} bytes, message buffer holds {capacity}")]
    Prefix { required: usize, capacity: usize },
    #[error("error message needs {required} bytes, {available} remain after the prefix")]
    Message { required: usize, available: usize },
}

/// The last reported error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastError {
    code: i32,
    file: String,
    file_capacity: usize,
    line: u32,
    message: BoundedBuf,
}

impl Default for LastError {
    fn default() -> Self {
        Self::new()
    }
}

impl LastError {
    /// Empty slot with the default capacities.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(MESSAGE_CAPACITY, FILE_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(message_capacity: usize, file_capacity: usize) -> Self {
        Self {
            code: NO_ERROR,
            file: String::new(),
            file_capacity,
            line: 0,
            message: BoundedBuf::with_capacity(message_capacity),
        }
    }

    /// Reset to the "no error" state.
    pub fn init(&mut self) {
        self.code = NO_ERROR;
        self.file.clear();
        self.line = 0;
        self.message.clear();
    }

    /// Record an error raised at `file:line` inside `function`.
    ///
    /// The message reads `#<code, 10 digits> [<file>:<line> <function>()] <args>`.
    pub fn set(
        &mut self,
        code: i32,
        file: &str,
        line: u32,
        function: &str,
        args: fmt::Arguments<'_>,
    ) -> Result<(), FormatOverflow> {
        self.code = code;
        self.line = line;
        self.store_file(file);

        self.message.clear();
        let capacity = self.message.capacity();
        if let Err(t) = self
            .message
            .append(format_args!("#{code:010} [{file}:{line} {function}()] "))
        {
            self.message.clear();
            return Err(FormatOverflow::Prefix {
                required: t.required,
                capacity,
            });
        }
        if let Err(t) = self.message.append(args) {
            self.message.clear();
            return Err(FormatOverflow::Message {
                required: t.required,
                available: t.available,
            });
        }
        Ok(())
    }

    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    #[must_use]
    pub fn file(&self) -> &str {
        &self.file
    }

    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.code != NO_ERROR
    }

    /// `strncpy`-like copy: silently cut to `file_capacity - 1` bytes.
    fn store_file(&mut self, file: &str) {
        let mut end = file.len().min(self.file_capacity.saturating_sub(1));
        while !file.is_char_boundary(end) {
            end -= 1;
        }
        self.file.clear();
        self.file.push_str(&file[..end]);
    }
}

/// Set a [`LastError`] with the caller's file, line and function.
#[macro_export]
macro_rules! set_last_error {
    ($slot:expr, $code:expr, $($arg:tt)+) => {
        $slot.set(
            $code,
            file!(),
            line!(),
            $crate::function_name!(),
            format_args!($($arg)+),
        )
    };
}
