// Copyright 2026 Oxide Computer Company

//! Fetch strategies and mirror layout.

use crate::{CommitInfo, FetchError, Vcs, VcsSource};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use fs_err as fs;
use sha2::{Digest, Sha256};
use std::fmt;

/// How sources are fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchMode {
    /// Keep a full local mirror per repository and read history from it.
    #[default]
    Mirror,
    /// List the remote's refs without cloning. Git only.
    RemoteOnly,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Mirror => write!(f, "mirror"),
            FetchMode::RemoteOnly => write!(f, "remote-only"),
        }
    }
}

/// Settings for [`Fetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// Directory holding one mirror per repository URL.
    pub mirror_root: Utf8PathBuf,
    /// The fetch strategy.
    pub mode: FetchMode,
    /// Log VCS diagnostics at `info` level instead of `debug`.
    pub verbose: bool,
}

impl FetchConfig {
    /// Creates a mirror-mode configuration rooted at `mirror_root`.
    pub fn new(mirror_root: impl Into<Utf8PathBuf>) -> Self {
        FetchConfig {
            mirror_root: mirror_root.into(),
            mode: FetchMode::Mirror,
            verbose: false,
        }
    }

    /// Sets the fetch mode.
    pub fn with_mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets verbose VCS logging.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Reads the current head commit of a source.
///
/// [`Fetcher`] is the implementation backed by the VCS tools; the trait
/// exists so the update logic can be driven without them.
pub trait Fetch {
    /// The strategy this fetcher uses. Decides which sources are tracked,
    /// how commits are compared and how the version is rendered.
    fn mode(&self) -> FetchMode;

    /// Brings `source` up to date and returns its head commit.
    fn fetch(&self, source: &VcsSource) -> Result<CommitInfo, FetchError>;
}

impl<F: Fetch + ?Sized> Fetch for &F {
    fn mode(&self) -> FetchMode {
        (**self).mode()
    }

    fn fetch(&self, source: &VcsSource) -> Result<CommitInfo, FetchError> {
        (**self).fetch(source)
    }
}

/// Fetches sources with the `git`, `hg` and `svn` command-line tools.
#[derive(Debug, Clone)]
pub struct Fetcher {
    config: FetchConfig,
}

impl Fetcher {
    /// Creates a fetcher.
    pub fn new(config: FetchConfig) -> Self {
        Fetcher { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn vcs_for(&self, source: &VcsSource) -> Result<Vcs, FetchError> {
        let vcs = Vcs::for_kind(source.kind())?.ok_or_else(|| {
            FetchError::Unsupported {
                kind: source.kind().clone(),
                mode: self.config.mode,
            }
        })?;
        Ok(vcs.with_verbose(self.config.verbose))
    }
}

impl Fetch for Fetcher {
    fn mode(&self) -> FetchMode {
        self.config.mode
    }

    fn fetch(&self, source: &VcsSource) -> Result<CommitInfo, FetchError> {
        let vcs = self.vcs_for(source)?;
        match self.config.mode {
            FetchMode::Mirror => {
                let root = &self.config.mirror_root;
                fs::create_dir_all(root).map_err(|error| {
                    FetchError::CreateDir { path: root.clone(), error }
                })?;
                let mirror = mirror_dir(root, source.repo_url());
                vcs.fetch_mirror(source.repo_url(), source.reference(), &mirror)
            }
            FetchMode::RemoteOnly => {
                let commit =
                    vcs.ls_remote(source.repo_url(), source.reference())?;
                let short_commit: String = commit.chars().take(7).collect();
                // No history is available, so there is no revision count
                // and the commit time is unknown.
                Ok(CommitInfo::new(commit, short_commit, 0, Utc::now()))
            }
        }
    }
}

/// Returns the mirror directory for `url` under `mirror_root`.
///
/// The directory name is the hex SHA-256 of the URL, so the same URL always
/// maps to the same mirror and no URL characters reach the filesystem.
pub fn mirror_dir(mirror_root: &Utf8Path, url: &str) -> Utf8PathBuf {
    mirror_root.join(hex::encode(Sha256::digest(url.as_bytes())))
}
