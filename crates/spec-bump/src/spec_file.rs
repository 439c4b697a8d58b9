// Copyright 2026 Oxide Computer Company

//! Spec file parsing and serialization.

use crate::SpecParseError;
use std::{fmt, str::FromStr};

/// The key holding the package version.
pub const VER: &str = "VER";

/// The key holding the whitespace-separated source list.
pub const SRCS: &str = "SRCS";

/// The key holding the package release counter.
///
/// It is never written back: once the version changes the release counter
/// no longer applies.
pub const REL: &str = "REL";

/// The separator used to wrap multi-word values across lines.
const CONTINUATION: &str = " \\\n\t";

/// A parsed spec file: an insertion-ordered list of `KEY=VALUE`
/// assignments.
///
/// Comments and blank lines are not retained. Values of [`VER`] and
/// [`SRCS`] are stored without their surrounding quotes and are always
/// written back double-quoted; all other values are stored verbatim.
///
/// # Examples
///
/// ```
/// use spec_bump::SpecFile;
///
/// let text = "# comment\nVER=\"1.0\"\nSRCS='git::https://example.com/r.git'\n";
/// let spec: SpecFile = text.parse().unwrap();
/// assert_eq!(spec.get("VER"), Some("1.0"));
/// assert_eq!(spec.get("SRCS"), Some("git::https://example.com/r.git"));
/// assert_eq!(
///     spec.to_file_contents(),
///     "VER=\"1.0\"\nSRCS=\"git::https://example.com/r.git\"\n",
/// );
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpecFile {
    entries: Vec<(String, String)>,
}

impl SpecFile {
    /// Creates an empty spec file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Returns true if `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Sets `key` to `value`.
    ///
    /// An existing key keeps its position; a new key is appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Iterates over the assignments in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of assignments.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no assignments.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the serialized file contents, ending with a newline.
    pub fn to_file_contents(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            if key == REL {
                continue;
            }
            out.push_str(key);
            out.push('=');
            if is_quoted_key(key) {
                out.push('"');
                out.push_str(value);
                out.push('"');
            } else {
                out.push_str(&value.replace(' ', CONTINUATION));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for SpecFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_file_contents())
    }
}

impl FromStr for SpecFile {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut spec = SpecFile::new();
        for (line_number, line) in logical_lines(s) {
            let (key, value) = line.split_once('=').ok_or_else(|| {
                SpecParseError::MalformedLine { line_number, line: line.clone() }
            })?;
            if key.is_empty()
                || !key.bytes().all(|b| b.is_ascii_alphabetic() || b == b'_')
            {
                return Err(SpecParseError::InvalidKey {
                    line_number,
                    key: key.to_owned(),
                });
            }
            let value =
                if is_quoted_key(key) { strip_quotes(value) } else { value };
            spec.set(key, value);
        }
        Ok(spec)
    }
}

fn is_quoted_key(key: &str) -> bool {
    key == VER || key == SRCS
}

fn strip_quotes(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Splits `text` into logical lines, each tagged with the physical line
/// number it starts on.
///
/// Blank lines and `#` comments are dropped first. A line ending in `\` is
/// joined with the next remaining line, without the `\` and without the
/// next line's leading whitespace.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let piece = raw.trim_start();
        match piece.strip_suffix('\\') {
            Some(head) => {
                pending
                    .get_or_insert_with(|| (idx + 1, String::new()))
                    .1
                    .push_str(head);
            }
            None => {
                let (line_number, mut line) =
                    pending.take().unwrap_or_else(|| (idx + 1, String::new()));
                line.push_str(piece);
                lines.push((line_number, line));
            }
        }
    }

    // A dangling continuation at end of file still forms a line.
    lines.extend(pending);
    lines
}
