// Copyright 2026 Oxide Computer Company

//! Tracked sources and version rendering.

use crate::{Fetch, FetchError, FetchMode};
use chrono::{DateTime, NaiveDate, Utc};
use spec_bump::{SourceDescriptor, SourceKind};

/// The head commit of a source, as read by a fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    commit: String,
    short_commit: String,
    revision: u64,
    timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// Creates commit information.
    ///
    /// `revision` is the backend's ordinal for the commit: the ancestor
    /// count for Git, the local revision number for Mercurial, and the
    /// global revision number for Subversion.
    pub fn new(
        commit: impl Into<String>,
        short_commit: impl Into<String>,
        revision: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        CommitInfo {
            commit: commit.into(),
            short_commit: short_commit.into(),
            revision,
            timestamp,
        }
    }

    /// Returns the canonical commit identifier.
    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Returns the abbreviated commit identifier.
    pub fn short_commit(&self) -> &str {
        &self.short_commit
    }

    /// Returns the revision ordinal.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the commit time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the UTC commit date as `YYYYMMDD`.
    pub fn date_string(&self) -> String {
        self.timestamp.format("%Y%m%d").to_string()
    }
}

/// A source entry that is tracked for upstream changes.
///
/// Built from a [`SourceDescriptor`] with [`VcsSource::from_descriptor`].
/// [`has_update`](Self::has_update) and
/// [`render_version`](Self::render_version) only give meaningful answers
/// after a successful [`fetch`](Self::fetch).
#[derive(Clone, Debug)]
pub struct VcsSource {
    kind: SourceKind,
    repo_url: String,
    reference: Option<String>,
    last_rev: Option<String>,
    mode: FetchMode,
    info: Option<CommitInfo>,
    base_version: Option<String>,
}

impl VcsSource {
    /// Creates a tracked source from a descriptor.
    ///
    /// Returns `None` for descriptors that are not tracked in `mode`:
    /// Bazaar and unrecognized backends never are, and only Git is tracked
    /// in [`FetchMode::RemoteOnly`].
    pub fn from_descriptor(
        descriptor: &SourceDescriptor,
        mode: FetchMode,
    ) -> Option<Self> {
        let tracked = match (mode, descriptor.kind()) {
            (
                FetchMode::Mirror,
                SourceKind::Git | SourceKind::Hg | SourceKind::Svn,
            ) => true,
            (FetchMode::RemoteOnly, SourceKind::Git) => true,
            _ => false,
        };
        if !tracked {
            return None;
        }
        Some(VcsSource {
            kind: descriptor.kind().clone(),
            repo_url: descriptor.url().to_owned(),
            reference: descriptor.branch().map(str::to_owned),
            // An empty `commit=` records nothing.
            last_rev: descriptor
                .commit()
                .filter(|commit| !commit.is_empty())
                .map(str::to_owned),
            mode,
            info: None,
            base_version: None,
        })
    }

    /// Returns the backend.
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    /// Returns the repository URL.
    pub fn repo_url(&self) -> &str {
        &self.repo_url
    }

    /// Returns the branch or tag to follow, if any.
    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    /// Returns the commit recorded in the descriptor, if any.
    pub fn last_rev(&self) -> Option<&str> {
        self.last_rev.as_deref()
    }

    /// Returns the fetch mode this source was created for.
    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Returns the fetched head commit, if a fetch has succeeded.
    pub fn info(&self) -> Option<&CommitInfo> {
        self.info.as_ref()
    }

    /// Returns the base version, set only on the primary source.
    pub fn base_version(&self) -> Option<&str> {
        self.base_version.as_deref()
    }

    /// Sets the base version this source's rendered version builds on.
    pub fn set_base_version(&mut self, base_version: impl Into<String>) {
        self.base_version = Some(base_version.into());
    }

    /// Fetches the source's head commit through `fetcher` and records it.
    pub fn fetch<F: Fetch + ?Sized>(
        &mut self,
        fetcher: &F,
    ) -> Result<&CommitInfo, FetchError> {
        let info = fetcher.fetch(self)?;
        Ok(&*self.info.insert(info))
    }

    /// Moves the recorded commit time forward to `timestamp` if it is
    /// later. Earlier timestamps are ignored.
    pub fn advance_timestamp(&mut self, timestamp: DateTime<Utc>) {
        if let Some(info) = &mut self.info {
            if timestamp > info.timestamp {
                info.timestamp = timestamp;
            }
        }
    }

    /// Returns true if the fetched head differs from the recorded commit.
    ///
    /// A source without a recorded commit always has an update. Otherwise:
    ///
    /// - In [`FetchMode::RemoteOnly`], the commit must equal the recorded
    ///   one exactly.
    /// - Git and Mercurial accept an abbreviated recorded commit: there is
    ///   no update if the head starts with it.
    /// - Subversion compares revision numbers: there is an update only if
    ///   the head revision is greater. A recorded value that is not a
    ///   number counts as an update.
    ///
    /// Returns false if the source has not been fetched.
    pub fn has_update(&self) -> bool {
        let Some(last_rev) = self.last_rev.as_deref() else {
            return true;
        };
        let Some(info) = &self.info else {
            return false;
        };
        if self.mode == FetchMode::RemoteOnly {
            return info.commit != last_rev;
        }
        match self.kind {
            SourceKind::Git | SourceKind::Hg => {
                !info.commit.starts_with(last_rev)
            }
            SourceKind::Svn => last_rev
                .parse::<u64>()
                .map_or(true, |last| info.revision > last),
            _ => false,
        }
    }

    /// Renders the package version from the base version and the fetched
    /// commit.
    ///
    /// - Git: `{base}+git{date}.r{revision}.{short_commit}`
    /// - Mercurial: `{base}+hg{date}.r{revision}.{commit}`
    /// - Subversion: `{base}+svn{date}.r{revision}`
    ///
    /// Returns `None` if the source has not been fetched or has no base
    /// version.
    pub fn render_version(&self) -> Option<String> {
        let info = self.info.as_ref()?;
        let base = self.base_version.as_deref()?;
        let date = info.date_string();
        let revision = info.revision;
        match self.kind {
            SourceKind::Git => Some(format!(
                "{base}+git{date}.r{revision}.{}",
                info.short_commit
            )),
            SourceKind::Hg => {
                Some(format!("{base}+hg{date}.r{revision}.{}", info.commit))
            }
            SourceKind::Svn => Some(format!("{base}+svn{date}.r{revision}")),
            _ => None,
        }
    }
}

/// Renders the version used in remote-only mode: `0+git{today}`.
pub fn nightly_version(today: NaiveDate) -> String {
    format!("0+git{}", today.format("%Y%m%d"))
}
