//! Audit record model and its line format.
//!
//! ```text
//! A +[parse_config] +[src/config.rs]:42 0x55d0c8a0 64 (100)
//! R -[] +[src/buf.rs]:7 0x55d0c8a0 0x55d0c990 1024 (101)
//! F +[drop_all] -[]:0 0x55d0c990
//! ```
//!
//! Inside a `+[...]` marker, `\`, `]`, newline and carriage return are
//! written as `\\`, `\]`, `\n` and `\r`.

use std::borrow::Cow;
use std::fmt;

use thiserror::Error;

use crate::callsite::CallSite;

/// Kind of allocation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditOp {
    Allocate,
    Reallocate,
    Free,
}

impl AuditOp {
    /// Single-letter tag leading each line.
    #[must_use]
    pub const fn tag(self) -> char {
        match self {
            Self::Allocate => 'A',
            Self::Reallocate => 'R',
            Self::Free => 'F',
        }
    }

    #[must_use]
    pub const fn from_tag(tag: char) -> Option<Self> {
        match tag {
            'A' => Some(Self::Allocate),
            'R' => Some(Self::Reallocate),
            'F' => Some(Self::Free),
            _ => None,
        }
    }
}

/// One immutable audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord<'a> {
    pub op: AuditOp,
    pub site: CallSite<'a>,
    /// Region address after the event (0 for a sentinel handle).
    pub address: usize,
    /// Address before a reallocation.
    pub previous: Option<usize>,
    /// Requested size for allocate/reallocate.
    pub size: Option<usize>,
    /// Caller-supplied identifier for allocate/reallocate.
    pub id: Option<i64>,
}

impl<'a> AuditRecord<'a> {
    #[must_use]
    pub const fn allocate(site: CallSite<'a>, address: usize, size: usize, id: i64) -> Self {
        Self {
            op: AuditOp::Allocate,
            site,
            address,
            previous: None,
            size: Some(size),
            id: Some(id),
        }
    }

    #[must_use]
    pub const fn reallocate(
        site: CallSite<'a>,
        previous: usize,
        address: usize,
        size: usize,
        id: i64,
    ) -> Self {
        Self {
            op: AuditOp::Reallocate,
            site,
            address,
            previous: Some(previous),
            size: Some(size),
            id: Some(id),
        }
    }

    #[must_use]
    pub const fn free(site: CallSite<'a>, address: usize) -> Self {
        Self {
            op: AuditOp::Free,
            site,
            address,
            previous: None,
            size: None,
            id: None,
        }
    }

    /// Parse one line (with or without its trailing newline).
    pub fn parse(line: &'a str) -> Result<Self, AuditParseError> {
        let line = line.trim_end_matches(['\n', '\r']);
        let mut chars = line.chars();
        let op = chars
            .next()
            .and_then(AuditOp::from_tag)
            .ok_or(AuditParseError::UnknownTag)?;
        let rest = chars
            .as_str()
            .strip_prefix(' ')
            .ok_or(AuditParseError::Malformed("separator after tag"))?;

        let (function, rest) = split_marked(rest, ' ')?;
        let (file, rest) = split_marked(rest, ':')?;
        let mut fields = rest.split(' ');
        let line_no = fields
            .next()
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or(AuditParseError::Malformed("line number"))?;
        let site = CallSite {
            file,
            line: line_no,
            function,
        };

        let record = match op {
            AuditOp::Allocate => {
                let address = parse_addr(fields.next())?;
                let size = parse_size(fields.next())?;
                let id = parse_id(fields.next())?;
                Self::allocate(site, address, size, id)
            }
            AuditOp::Reallocate => {
                let previous = parse_addr(fields.next())?;
                let address = parse_addr(fields.next())?;
                let size = parse_size(fields.next())?;
                let id = parse_id(fields.next())?;
                Self::reallocate(site, previous, address, size, id)
            }
            AuditOp::Free => Self::free(site, parse_addr(fields.next())?),
        };
        if fields.next().is_some() {
            return Err(AuditParseError::Malformed("trailing fields"));
        }
        Ok(record)
    }
}

struct Marked<'b>(Option<&'b str>);

impl fmt::Display for Marked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(text) = self.0 else {
            return f.write_str("-[]");
        };
        f.write_str("+[")?;
        let mut plain = 0;
        for (idx, ch) in text.char_indices() {
            let escaped = match ch {
                '\\' => "\\\\",
                ']' => "\\]",
                '\n' => "\\n",
                '\r' => "\\r",
                _ => continue,
            };
            f.write_str(&text[plain..idx])?;
            f.write_str(escaped)?;
            plain = idx + ch.len_utf8();
        }
        f.write_str(&text[plain..])?;
        f.write_str("]")
    }
}

impl fmt::Display for AuditRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {}:{}",
            self.op.tag(),
            Marked(self.site.function()),
            Marked(self.site.file()),
            self.site.line
        )?;
        if let Some(previous) = self.previous {
            write!(f, " {previous:#x}")?;
        }
        write!(f, " {:#x}", self.address)?;
        if let Some(size) = self.size {
            write!(f, " {size}")?;
        }
        if let Some(id) = self.id {
            write!(f, " ({id})")?;
        }
        Ok(())
    }
}

/// Why an audit line could not be read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuditParseError {
    #[error("unknown event tag")]
    UnknownTag,
    #[error("malformed audit line: {0}")]
    Malformed(&'static str),
}

/// Split `+[text]<end>` / `-[]<end>` off the front of `input`.
///
/// The text stays borrowed unless it carried escapes.
fn split_marked<'b>(
    input: &'b str,
    end: char,
) -> Result<(Option<Cow<'b, str>>, &'b str), AuditParseError> {
    if let Some(rest) = input.strip_prefix("-[]") {
        let rest = rest
            .strip_prefix(end)
            .ok_or(AuditParseError::Malformed("absent marker"))?;
        return Ok((None, rest));
    }
    let body = input
        .strip_prefix("+[")
        .ok_or(AuditParseError::Malformed("presence marker"))?;

    let mut unescaped: Option<String> = None;
    let mut plain = 0;
    let mut chars = body.char_indices();
    let close = loop {
        match chars.next() {
            Some((idx, ']')) => break idx,
            Some((idx, '\\')) => {
                let ch = match chars.next() {
                    Some((_, '\\')) => '\\',
                    Some((_, ']')) => ']',
                    Some((_, 'n')) => '\n',
                    Some((_, 'r')) => '\r',
                    _ => return Err(AuditParseError::Malformed("escape")),
                };
                let text = unescaped.get_or_insert_with(String::new);
                text.push_str(&body[plain..idx]);
                text.push(ch);
                plain = idx + 2;
            }
            Some(_) => {}
            None => return Err(AuditParseError::Malformed("unterminated field")),
        }
    };
    let text = match unescaped {
        Some(mut text) => {
            text.push_str(&body[plain..close]);
            Cow::Owned(text)
        }
        None => Cow::Borrowed(&body[..close]),
    };
    let rest = body[close + 1..]
        .strip_prefix(end)
        .ok_or(AuditParseError::Malformed("field separator"))?;
    Ok((Some(text), rest))
}

fn parse_addr(field: Option<&str>) -> Result<usize, AuditParseError> {
    field
        .and_then(|v| v.strip_prefix("0x"))
        .and_then(|hex| usize::from_str_radix(hex, 16).ok())
        .ok_or(AuditParseError::Malformed("address"))
}

fn parse_size(field: Option<&str>) -> Result<usize, AuditParseError> {
    field
        .and_then(|v| v.parse::<usize>().ok())
        .ok_or(AuditParseError::Malformed("size"))
}

fn parse_id(field: Option<&str>) -> Result<i64, AuditParseError> {
    field
        .and_then(|v| v.strip_prefix('('))
        .and_then(|v| v.strip_suffix(')'))
        .and_then(|v| v.parse::<i64>().ok())
        .ok_or(AuditParseError::Malformed("identifier"))
}
