// Copyright 2026 Oxide Computer Company

//! Version bumping for spec files.

use crate::{
    AtomicWriteError, Fetch, FetchConfig, FetchMode, Fetcher, UpdateError,
    VcsSource, nightly_version,
};
use atomicwrites::AtomicFile;
use camino::Utf8Path;
use chrono::{NaiveDate, Utc};
use fs_err as fs;
use spec_bump::{SRCS, SourceKind, SourceList, SpecFile, VER};
use std::io::Write;
use tracing::{debug, info, warn};

/// The result of an update run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// The number of sources whose recorded commit changed.
    pub updated: usize,
    /// The new package version. Set if and only if `updated > 0`.
    pub new_version: Option<String>,
}

impl UpdateOutcome {
    /// Returns true if any source was updated.
    pub fn is_updated(&self) -> bool {
        self.updated > 0
    }
}

/// Checks every tracked source in a source list for upstream changes and
/// computes the new package version.
///
/// Sources are fetched one at a time, in list order. The first tracked
/// source is the *primary* source: it carries the base version, and the
/// new version is rendered from it.
#[derive(Debug, Clone)]
pub struct Updater<F> {
    fetcher: F,
    today: NaiveDate,
}

impl<F: Fetch> Updater<F> {
    /// Creates an updater that fetches through `fetcher`, in the fetcher's
    /// mode.
    pub fn new(fetcher: F) -> Self {
        Updater { fetcher, today: Utc::now().date_naive() }
    }

    /// Overrides the date used for remote-only versions.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    /// Returns the fetch mode.
    pub fn mode(&self) -> FetchMode {
        self.fetcher.mode()
    }

    /// Fetches every tracked source in `sources`, records new commits in
    /// place, and returns the new version if anything changed.
    ///
    /// Any fetch failure aborts the run. `sources` may already have been
    /// partially modified when that happens, so callers should discard it.
    pub fn run(
        &self,
        sources: &mut SourceList,
        base_version: &str,
    ) -> Result<UpdateOutcome, UpdateError> {
        let mode = self.mode();
        let mut tracked: Vec<(usize, VcsSource)> = Vec::new();
        for (idx, descriptor) in sources.sources().iter().enumerate() {
            match VcsSource::from_descriptor(descriptor, mode) {
                Some(source) => tracked.push((idx, source)),
                None if matches!(
                    descriptor.kind(),
                    SourceKind::Hg | SourceKind::Svn
                ) =>
                {
                    warn!(
                        "skipping {} source {}: not supported in {} mode",
                        descriptor.kind(),
                        descriptor.url(),
                        mode,
                    );
                }
                None => {
                    debug!(
                        "not tracking {} source {}",
                        descriptor.kind(),
                        descriptor.url()
                    );
                }
            }
        }

        let Some((_, primary)) = tracked.first_mut() else {
            info!("no tracked sources");
            return Ok(UpdateOutcome::default());
        };
        primary.set_base_version(base_version);

        let mut updated = 0;
        for (idx, source) in &mut tracked {
            let kind = source.kind().clone();
            let url = source.repo_url().to_owned();
            let commit = source
                .fetch(&self.fetcher)
                .map_err(|error| UpdateError::Fetch { kind, url, error })?
                .commit()
                .to_owned();

            if source.has_update() {
                info!(
                    "{} source {} updated: {} -> {commit}",
                    source.kind(),
                    source.repo_url(),
                    source.last_rev().unwrap_or("(none)"),
                );
                sources.sources_mut()[*idx].set_option("commit", commit);
                updated += 1;
            } else {
                info!(
                    "{} source {} is up to date at {commit}",
                    source.kind(),
                    source.repo_url(),
                );
            }
        }

        if updated == 0 {
            return Ok(UpdateOutcome::default());
        }

        // The version date follows the newest commit across all sources,
        // not just the primary's.
        let latest = tracked
            .iter()
            .filter_map(|(_, source)| source.info().map(|i| i.timestamp()))
            .max();
        let primary = &mut tracked[0].1;
        if let Some(latest) = latest {
            primary.advance_timestamp(latest);
        }

        let new_version = match mode {
            FetchMode::Mirror => primary.render_version(),
            FetchMode::RemoteOnly => Some(nightly_version(self.today)),
        };
        Ok(UpdateOutcome { updated, new_version })
    }
}

/// The result of updating spec file text in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextUpdate {
    /// What the update found.
    pub outcome: UpdateOutcome,
    /// The rewritten file contents, if any source was updated.
    pub contents: Option<String>,
}

/// Rewrites spec files whose sources have changed upstream.
///
/// The spec file is parsed, its `SRCS` sources are checked with an
/// [`Updater`], and if anything changed `VER` and `SRCS` are replaced in
/// place and the file is rewritten. `REL` is dropped on rewrite.
#[derive(Debug, Clone)]
pub struct SpecUpdater<F> {
    updater: Updater<F>,
    base_version: Option<String>,
}

impl SpecUpdater<Fetcher> {
    /// Creates a spec updater that fetches with the VCS tools.
    pub fn standard(config: FetchConfig) -> Self {
        SpecUpdater::new(Updater::new(Fetcher::new(config)))
    }
}

impl<F: Fetch> SpecUpdater<F> {
    /// Creates a spec updater around an existing [`Updater`].
    pub fn new(updater: Updater<F>) -> Self {
        SpecUpdater { updater, base_version: None }
    }

    /// Sets the base version the new version builds on.
    ///
    /// Without one, the base is taken from the existing `VER` (see
    /// [`base_version_from`]).
    pub fn with_base_version(mut self, base_version: impl Into<String>) -> Self {
        self.base_version = Some(base_version.into());
        self
    }

    /// Returns the underlying updater.
    pub fn updater(&self) -> &Updater<F> {
        &self.updater
    }

    /// Updates spec file text in memory.
    ///
    /// `contents` is `None` when nothing was updated; the caller should
    /// leave the file alone in that case.
    pub fn update_text(&self, text: &str) -> Result<TextUpdate, UpdateError> {
        let mut spec: SpecFile = text.parse()?;
        let srcs =
            spec.get(SRCS).ok_or(UpdateError::MissingKey { key: SRCS })?;
        let mut sources: SourceList = srcs.parse()?;

        let base_version = match &self.base_version {
            Some(base) => base.clone(),
            None => base_version_from(spec.get(VER)),
        };

        let outcome = self.updater.run(&mut sources, &base_version)?;
        let Some(new_version) = &outcome.new_version else {
            return Ok(TextUpdate { outcome, contents: None });
        };

        spec.set(VER, new_version.clone());
        spec.set(SRCS, sources.to_string());
        let contents = Some(spec.to_file_contents());
        Ok(TextUpdate { outcome, contents })
    }

    /// Updates the spec file at `path` in place.
    ///
    /// The new contents are built in memory and written atomically, so the
    /// file is either fully rewritten or untouched.
    pub fn update_file(
        &self,
        path: impl AsRef<Utf8Path>,
    ) -> Result<UpdateOutcome, UpdateError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|error| {
            UpdateError::ReadSpec { path: path.to_owned(), error }
        })?;

        let TextUpdate { outcome, contents } = self.update_text(&text)?;
        let Some(contents) = contents else {
            return Ok(outcome);
        };

        AtomicFile::new(path, atomicwrites::OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(contents.as_bytes()))
            .map_err(|error| {
                let error = match error {
                    atomicwrites::Error::Internal(e) => {
                        AtomicWriteError::Rename(e)
                    }
                    atomicwrites::Error::User(e) => AtomicWriteError::Write(e),
                };
                UpdateError::WriteSpec { path: path.to_owned(), error }
            })?;

        Ok(outcome)
    }
}

/// Derives a base version from an existing `VER` value.
///
/// Any `+...` build suffix from a previous bump is removed. A missing or
/// empty version yields `"0"`.
pub fn base_version_from(ver: Option<&str>) -> String {
    match ver.and_then(|v| v.split('+').next()).map(str::trim) {
        Some(base) if !base.is_empty() => base.to_owned(),
        _ => "0".to_owned(),
    }
}
