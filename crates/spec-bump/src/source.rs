// Copyright 2026 Oxide Computer Company

//! Source list (`SRCS`) types and operations.

use crate::SourceParseError;
use std::{fmt, str::FromStr};

/// Separator between entries when a source list is written back.
///
/// The indentation lines continuation entries up under the first one in
/// `SRCS="...`.
const ENTRY_SEPARATOR: &str = " \\\n      ";

/// Option keys that are held outside the options block.
const RESERVED_OPTIONS: [&str; 2] = ["name", "url"];

/// The backend named by a source entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum SourceKind {
    /// Git (`git`).
    Git,
    /// Mercurial (`hg`).
    Hg,
    /// Subversion (`svn`).
    Svn,
    /// Bazaar (`bzr`).
    Bzr,
    /// Any other backend, such as `tbl` or `file`. Preserved verbatim.
    Other(String),
}

impl SourceKind {
    /// Returns the name as written in a source entry.
    pub fn as_str(&self) -> &str {
        match self {
            SourceKind::Git => "git",
            SourceKind::Hg => "hg",
            SourceKind::Svn => "svn",
            SourceKind::Bzr => "bzr",
            SourceKind::Other(name) => name,
        }
    }
}

impl From<&str> for SourceKind {
    fn from(name: &str) -> Self {
        match name {
            "git" => SourceKind::Git,
            "hg" => SourceKind::Hg,
            "svn" => SourceKind::Svn,
            "bzr" => SourceKind::Bzr,
            other => SourceKind::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a source list: `name::url` or `name::k=v;k=v::url`.
///
/// # Examples
///
/// ```
/// use spec_bump::{SourceDescriptor, SourceKind};
///
/// let src: SourceDescriptor =
///     "git::commit=abc123;branch=main::https://example.com/r.git"
///         .parse()
///         .unwrap();
/// assert_eq!(src.kind(), &SourceKind::Git);
/// assert_eq!(src.url(), "https://example.com/r.git");
/// assert_eq!(src.option("branch"), Some("main"));
/// assert_eq!(src.commit(), Some("abc123"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceDescriptor {
    kind: SourceKind,
    url: String,
    options: Vec<(String, String)>,
}

impl SourceDescriptor {
    /// Creates a descriptor with no options.
    pub fn new(kind: SourceKind, url: impl Into<String>) -> Self {
        SourceDescriptor { kind, url: url.into(), options: Vec::new() }
    }

    /// Returns the backend.
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// Returns the repository URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the value of option `key`, if present.
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Iterates over the options in insertion order.
    pub fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Sets option `key`, keeping its position if it already exists.
    ///
    /// The reserved keys `name` and `url` are ignored.
    pub fn set_option(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        let key = key.into();
        if RESERVED_OPTIONS.contains(&key.as_str()) {
            return;
        }
        let value = value.into();
        match self.options.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.options.push((key, value)),
        }
    }

    /// Returns the recorded `commit` option.
    pub fn commit(&self) -> Option<&str> {
        self.option("commit")
    }

    /// Returns the `branch` option.
    pub fn branch(&self) -> Option<&str> {
        self.option("branch")
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::", self.kind)?;
        if !self.options.is_empty() {
            for (idx, (key, value)) in self.options.iter().enumerate() {
                if idx > 0 {
                    f.write_str(";")?;
                }
                write!(f, "{key}={value}")?;
            }
            f.write_str("::")?;
        }
        f.write_str(&self.url)
    }
}

impl FromStr for SourceDescriptor {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, spec) = s.split_once("::").ok_or_else(|| {
            SourceParseError::MissingSeparator { entry: s.to_owned() }
        })?;
        if name.is_empty() {
            return Err(SourceParseError::EmptyName { entry: s.to_owned() });
        }

        let mut descriptor = SourceDescriptor::new(SourceKind::from(name), "");
        let url = match spec.split_once("::") {
            Some((options, url)) => {
                for option in options.split(';') {
                    let (key, value) = option.split_once('=').ok_or_else(|| {
                        SourceParseError::MalformedOption {
                            entry: s.to_owned(),
                            option: option.to_owned(),
                        }
                    })?;
                    descriptor.set_option(key, value);
                }
                url
            }
            None => spec,
        };
        if url.is_empty() {
            return Err(SourceParseError::EmptyUrl { entry: s.to_owned() });
        }
        descriptor.url = url.to_owned();
        Ok(descriptor)
    }
}

/// A parsed `SRCS` value: whitespace-separated [`SourceDescriptor`]s.
///
/// Parsing is all-or-nothing: one malformed entry fails the whole list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceList {
    sources: Vec<SourceDescriptor>,
}

impl SourceList {
    /// Creates a source list from descriptors.
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        SourceList { sources }
    }

    /// Returns the descriptors in order.
    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    /// Returns the descriptors mutably, in order.
    pub fn sources_mut(&mut self) -> &mut [SourceDescriptor] {
        &mut self.sources
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl fmt::Display for SourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, source) in self.sources.iter().enumerate() {
            if idx > 0 {
                f.write_str(ENTRY_SEPARATOR)?;
            }
            write!(f, "{source}")?;
        }
        Ok(())
    }
}

impl FromStr for SourceList {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sources = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SourceList { sources })
    }
}
