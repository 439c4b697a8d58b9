// Copyright 2026 Oxide Computer Company

//! Error types for spec file and source list parsing.

use thiserror::Error;

/// An error that occurs while parsing a [`SpecFile`](crate::SpecFile).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpecParseError {
    /// A logical line did not contain the `key=value` separator.
    #[error(
        "malformed spec file line {line_number}: expected KEY=VALUE, \
         got {line:?}"
    )]
    MalformedLine {
        /// The 1-based physical line number where the logical line starts.
        line_number: usize,
        /// The logical line, after continuation splicing.
        line: String,
    },

    /// The key of an assignment contained something other than ASCII
    /// letters and underscores.
    #[error(
        "invalid key {key:?} on spec file line {line_number} \
         (only letters and '_' are allowed)"
    )]
    InvalidKey {
        /// The 1-based physical line number where the logical line starts.
        line_number: usize,
        /// The rejected key.
        key: String,
    },
}

/// An error that occurs while parsing a [`SourceList`](crate::SourceList).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceParseError {
    /// The entry did not contain the `::` separator after the backend name.
    #[error(
        "malformed source entry {entry:?}: expected 'name::url' or \
         'name::options::url'"
    )]
    MissingSeparator {
        /// The entry that failed to parse.
        entry: String,
    },

    /// The backend name was empty.
    #[error("malformed source entry {entry:?}: empty backend name")]
    EmptyName {
        /// The entry that failed to parse.
        entry: String,
    },

    /// The URL was empty.
    #[error("malformed source entry {entry:?}: empty URL")]
    EmptyUrl {
        /// The entry that failed to parse.
        entry: String,
    },

    /// An option in the options block was not a `key=value` pair.
    #[error(
        "malformed option {option:?} in source entry {entry:?}: \
         expected key=value"
    )]
    MalformedOption {
        /// The entry that failed to parse.
        entry: String,
        /// The offending option.
        option: String,
    },
}
