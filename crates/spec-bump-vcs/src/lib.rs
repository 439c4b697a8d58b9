// Copyright 2026 Oxide Computer Company

//! VCS backends and version bumping for package spec files.
//!
//! A spec file's `SRCS` list names the upstream repositories a package is
//! built from. This crate checks each Git, Mercurial or Subversion source
//! for new commits, records the new commit in the source's `commit` option,
//! and renders a new `VER` such as `1.0+git20240102.r42.deadbee`.
//!
//! Two fetch modes are supported:
//!
//! - [`FetchMode::Mirror`] keeps a local clone per repository URL under a
//!   mirror root (see [`mirror_dir`]) and reads the head commit, its
//!   revision ordinal and its commit time from it.
//! - [`FetchMode::RemoteOnly`] asks a Git remote for the head commit with
//!   `git ls-remote`, and renders the version as `0+git{today}`.
//!
//! # Usage
//!
//! ```no_run
//! use spec_bump_vcs::{FetchConfig, SpecUpdater};
//!
//! let updater = SpecUpdater::standard(FetchConfig::new("/var/cache/mirrors"))
//!     .with_base_version("1.0");
//! let outcome = updater.update_file("packages/foo/spec")
//!     .expect("spec file updated");
//! if let Some(version) = outcome.new_version {
//!     println!("bumped to {version}");
//! }
//! ```

#![deny(missing_docs)]

mod errors;
mod fetch;
mod source;
mod update;
mod vcs;

pub use errors::{AtomicWriteError, FetchError, UpdateError, VcsEnvError};
pub use fetch::{Fetch, FetchConfig, FetchMode, Fetcher, mirror_dir};
pub use source::{CommitInfo, VcsSource, nightly_version};
pub use update::{
    SpecUpdater, TextUpdate, UpdateOutcome, Updater, base_version_from,
};
pub use vcs::{Vcs, VcsName};
