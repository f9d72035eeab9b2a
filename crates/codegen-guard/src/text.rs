//! Host string representation shared by candidate sources and block messages
//!
//! Script engines hand out strings as UTF-16 code units, which may contain
//! lone surrogates. [`HostString`] keeps whichever form it was built from and
//! converts between the two without substitution: a conversion that cannot be
//! exact is reported as an error instead.

use std::{borrow::Cow, fmt};

use crate::error::{GuardError, Result};

/// A string as seen by the host, stored as UTF-8 or raw UTF-16
#[derive(Clone)]
pub enum HostString {
    /// Valid Unicode text
    Utf8(String),
    /// Raw engine code units, possibly unpaired surrogates
    Utf16(Vec<u16>),
}

impl HostString {
    /// Build from engine code units
    pub fn from_utf16(units: impl Into<Vec<u16>>) -> Self {
        HostString::Utf16(units.into())
    }

    /// Code units of this string
    pub fn to_utf16(&self) -> Cow<'_, [u16]> {
        match self {
            HostString::Utf8(s) => Cow::Owned(s.encode_utf16().collect()),
            HostString::Utf16(units) => Cow::Borrowed(units),
        }
    }

    /// Exact UTF-8 view; fails on unpaired surrogates
    pub fn to_utf8(&self) -> Result<Cow<'_, str>> {
        match self {
            HostString::Utf8(s) => Ok(Cow::Borrowed(s)),
            HostString::Utf16(units) => String::from_utf16(units)
                .map(Cow::Owned)
                .map_err(|e| GuardError::Transcoding(e.to_string())),
        }
    }

    /// UTF-8 view with unpaired surrogates written as `\uXXXX`
    pub fn to_utf8_escaped(&self) -> Cow<'_, str> {
        match self {
            HostString::Utf8(s) => Cow::Borrowed(s),
            HostString::Utf16(units) => Cow::Owned(
                char::decode_utf16(units.iter().copied())
                    .map(|r| match r {
                        Ok(c) => c.to_string(),
                        Err(e) => format!("\\u{:04X}", e.unpaired_surrogate()),
                    })
                    .collect(),
            ),
        }
    }

    /// Length in UTF-16 code units
    pub fn len_utf16(&self) -> usize {
        match self {
            HostString::Utf8(s) => s.encode_utf16().count(),
            HostString::Utf16(units) => units.len(),
        }
    }

    /// True when the string has no code units
    pub fn is_empty(&self) -> bool {
        match self {
            HostString::Utf8(s) => s.is_empty(),
            HostString::Utf16(units) => units.is_empty(),
        }
    }

    /// Short escaped prefix for log lines
    pub fn preview(&self, max_chars: usize) -> String {
        let text = self.to_utf8_escaped();
        let mut out: String = text.chars().take(max_chars).collect();
        if text.chars().nth(max_chars).is_some() {
            out.push('…');
        }
        out
    }
}

impl PartialEq for HostString {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostString::Utf8(a), HostString::Utf8(b)) => a == b,
            _ => self.to_utf16() == other.to_utf16(),
        }
    }
}

impl Eq for HostString {}

impl PartialEq<str> for HostString {
    fn eq(&self, other: &str) -> bool {
        match self {
            HostString::Utf8(s) => s == other,
            HostString::Utf16(units) => units.iter().copied().eq(other.encode_utf16()),
        }
    }
}

impl PartialEq<&str> for HostString {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl From<String> for HostString {
    fn from(s: String) -> Self {
        HostString::Utf8(s)
    }
}

impl From<&str> for HostString {
    fn from(s: &str) -> Self {
        HostString::Utf8(s.to_string())
    }
}

impl fmt::Debug for HostString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_utf8_escaped())
    }
}

impl fmt::Display for HostString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_utf8_escaped())
    }
}
