// Copyright 2026 Oxide Computer Company

//! Error types for VCS operations and spec file updates.

use crate::VcsName;
use camino::Utf8PathBuf;
use spec_bump::{SourceKind, SourceParseError, SpecParseError};
use std::{ffi::OsString, io};
use thiserror::Error;

// ---- VCS errors ----

/// An error from reading a VCS binary path from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VcsEnvError {
    /// The environment variable is set but is not valid UTF-8.
    #[error(
        "${var} environment variable is not valid \
         UTF-8: {value:?}"
    )]
    NonUtf8 {
        /// The environment variable name.
        var: &'static str,
        /// The non-UTF-8 value.
        value: OsString,
    },
}

/// An error that occurs while fetching a source's latest commit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// Failed to spawn the VCS process.
    #[error("failed to run {vcs_name} at {binary_path:?} in {cwd}")]
    SpawnFailed {
        /// The name of the VCS.
        vcs_name: VcsName,
        /// The path to the VCS executable.
        binary_path: String,
        /// The working directory where the command was run.
        cwd: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The VCS command failed.
    #[error("`{command}` failed for {url} ({exit_status}): {stderr}")]
    VcsFailed {
        /// The name of the VCS.
        vcs_name: VcsName,
        /// The repository URL.
        url: String,
        /// The command line that failed.
        command: String,
        /// A human-readable description of the exit status (e.g.,
        /// "exit status: 128" or "signal: 9").
        exit_status: String,
        /// The stderr output from the VCS.
        stderr: String,
    },

    /// The VCS command succeeded but returned output that could not be
    /// interpreted.
    #[error(
        "`{command}` returned unexpected output for {url} \
         ({reason}): {stdout:?}"
    )]
    UnexpectedOutput {
        /// The name of the VCS.
        vcs_name: VcsName,
        /// The repository URL.
        url: String,
        /// The command line whose output was rejected.
        command: String,
        /// What was wrong with the output.
        reason: String,
        /// The stdout content that could not be interpreted.
        stdout: String,
    },

    /// The remote did not advertise the requested ref.
    #[error("{url} has no ref named {reference:?}")]
    RefNotFound {
        /// The repository URL.
        url: String,
        /// The requested ref.
        reference: String,
    },

    /// The backend cannot be fetched in the current mode.
    #[error("{kind} sources cannot be fetched in {mode} mode")]
    Unsupported {
        /// The backend.
        kind: SourceKind,
        /// The fetch mode.
        mode: crate::FetchMode,
    },

    /// Failed to create the mirror root directory.
    #[error("failed to create mirror directory {path}")]
    CreateDir {
        /// The directory path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// An I/O error occurred while probing the mirror directory.
    #[error("I/O error while checking mirror at {path}")]
    Io {
        /// The path being checked when the error occurred.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A VCS environment variable is not valid UTF-8.
    #[error(transparent)]
    Env(#[from] VcsEnvError),
}

// ---- Update errors ----

/// Errors that can occur while updating a spec file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    /// Failed to read the spec file.
    #[error("failed to read spec file {path}")]
    ReadSpec {
        /// The path to the spec file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        error: io::Error,
    },

    /// The spec file is malformed.
    #[error("malformed spec file")]
    InvalidSpec(#[from] SpecParseError),

    /// A key the update needs is missing from the spec file.
    #[error("spec file has no {key} key")]
    MissingKey {
        /// The missing key.
        key: &'static str,
    },

    /// The `SRCS` value is malformed.
    #[error("malformed SRCS value")]
    InvalidSources(#[from] SourceParseError),

    /// Fetching a source failed.
    #[error("failed to fetch {kind} source {url}")]
    Fetch {
        /// The backend.
        kind: SourceKind,
        /// The repository URL.
        url: String,
        /// The underlying fetch error.
        #[source]
        error: FetchError,
    },

    /// Failed to write the updated spec file.
    #[error("failed to write updated spec file to {path}")]
    WriteSpec {
        /// The path where the write failed.
        path: Utf8PathBuf,
        /// The underlying write error.
        #[source]
        error: AtomicWriteError,
    },
}

/// An error that occurred during an atomic file write.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AtomicWriteError {
    /// Writing contents to the temporary file failed.
    #[error("writing file contents failed")]
    Write(#[source] io::Error),

    /// The atomic write infrastructure failed (e.g., creating the
    /// temporary file, or renaming it into place).
    #[error("atomic create or rename failed")]
    Rename(#[source] io::Error),
}
