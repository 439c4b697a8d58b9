// Copyright 2026 Oxide Computer Company

//! Parsing types for package spec files.
//!
//! A *spec file* is a restricted shell-assignment file describing how a
//! package is built:
//!
//! ```text
//! # comments and blank lines are ignored
//! VER="1.0+git20240102.r42.deadbee"
//! SRCS="git::commit=deadbeef::https://example.com/r.git \
//!       tbl::https://example.com/extra.tar.xz"
//! PKGDEP="foo \
//!         bar"
//! ```
//!
//! [`SpecFile`] parses and serializes the file as an ordered list of
//! assignments. [`SourceList`] parses and serializes the `SRCS` value, whose
//! entries ([`SourceDescriptor`]) name a backend, optional options, and a
//! URL.
//!
//! # Examples
//!
//! ```
//! use spec_bump::{SourceList, SpecFile, SRCS};
//!
//! let spec: SpecFile =
//!     "VER=1.0\nSRCS=\"git::commit=abc::https://example.com/r.git\"\n"
//!         .parse()
//!         .unwrap();
//! let mut sources: SourceList = spec.get(SRCS).unwrap().parse().unwrap();
//! sources.sources_mut()[0].set_option("commit", "def");
//! assert_eq!(
//!     sources.to_string(),
//!     "git::commit=def::https://example.com/r.git",
//! );
//! ```
//!
//! # Related crates
//!
//! For fetching the sources and bumping `VER`, see `spec-bump-vcs`.

#![deny(missing_docs)]

mod errors;
mod source;
mod spec_file;

pub use errors::{SourceParseError, SpecParseError};
pub use source::{SourceDescriptor, SourceKind, SourceList};
pub use spec_file::{REL, SRCS, SpecFile, VER};
