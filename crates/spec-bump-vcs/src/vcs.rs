// Copyright 2026 Oxide Computer Company

//! Version control tool wrappers for mirroring repositories and reading
//! their head commit.

use crate::{CommitInfo, FetchError, VcsEnvError};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use quick_xml::{Reader, events::Event};
use spec_bump::SourceKind;
use std::{fmt, process::Command};
use tracing::{debug, info};

/// Reads a VCS binary path from an environment variable, falling back
/// to `default` if the variable is unset or empty.
///
/// The value is trimmed of leading and trailing whitespace.
///
/// Returns an error if the variable is set but is not valid UTF-8.
fn read_vcs_env(
    var: &'static str,
    default: &str,
) -> Result<String, VcsEnvError> {
    match std::env::var(var) {
        Ok(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(default.to_string())
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(std::env::VarError::NotPresent) => Ok(default.to_string()),
        Err(std::env::VarError::NotUnicode(value)) => {
            Err(VcsEnvError::NonUtf8 { var, value })
        }
    }
}

/// The name of a version control system.
///
/// Used in error messages and for identifying which VCS is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum VcsName {
    /// Git version control.
    Git,
    /// Mercurial version control.
    Hg,
    /// Subversion version control.
    Svn,
}

impl fmt::Display for VcsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsName::Git => write!(f, "git"),
            VcsName::Hg => write!(f, "hg"),
            VcsName::Svn => write!(f, "svn"),
        }
    }
}

/// A version control command-line tool.
///
/// Supports Git, Mercurial and Subversion. Use [`Vcs::git()`],
/// [`Vcs::hg()`], [`Vcs::svn()`], or [`Vcs::for_kind()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vcs {
    kind: VcsKind,
    verbose: bool,
}

/// The internal representation of a VCS.
#[derive(Debug, Clone, PartialEq, Eq)]
enum VcsKind {
    /// Git version control.
    Git {
        /// Path to the git binary.
        binary: String,
    },
    /// Mercurial version control.
    Hg {
        /// Path to the hg binary.
        binary: String,
    },
    /// Subversion version control.
    Svn {
        /// Path to the svn binary.
        binary: String,
    },
}

impl Vcs {
    /// Creates a Git VCS using the `$GIT` environment variable or
    /// `"git"`.
    ///
    /// Returns an error if the `$GIT` environment variable is set
    /// but is not valid UTF-8.
    pub fn git() -> Result<Self, VcsEnvError> {
        let binary = read_vcs_env("GIT", "git")?;
        Ok(Vcs { kind: VcsKind::Git { binary }, verbose: false })
    }

    /// Creates a Mercurial VCS using the `$HG` environment variable or
    /// `"hg"`.
    pub fn hg() -> Result<Self, VcsEnvError> {
        let binary = read_vcs_env("HG", "hg")?;
        Ok(Vcs { kind: VcsKind::Hg { binary }, verbose: false })
    }

    /// Creates a Subversion VCS using the `$SVN` environment variable or
    /// `"svn"`.
    pub fn svn() -> Result<Self, VcsEnvError> {
        let binary = read_vcs_env("SVN", "svn")?;
        Ok(Vcs { kind: VcsKind::Svn { binary }, verbose: false })
    }

    /// Returns the VCS for a source backend, or `None` if the backend is
    /// not one this crate can fetch (Bazaar, or anything unrecognized).
    pub fn for_kind(kind: &SourceKind) -> Result<Option<Self>, VcsEnvError> {
        match kind {
            SourceKind::Git => Self::git().map(Some),
            SourceKind::Hg => Self::hg().map(Some),
            SourceKind::Svn => Self::svn().map(Some),
            _ => Ok(None),
        }
    }

    /// Sets whether the tool's stderr is logged at `info` level even when
    /// the command succeeds.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Returns the path to the VCS binary.
    pub fn binary(&self) -> &str {
        match &self.kind {
            VcsKind::Git { binary }
            | VcsKind::Hg { binary }
            | VcsKind::Svn { binary } => binary,
        }
    }

    /// Returns the name of the VCS.
    pub fn name(&self) -> VcsName {
        match &self.kind {
            VcsKind::Git { .. } => VcsName::Git,
            VcsKind::Hg { .. } => VcsName::Hg,
            VcsKind::Svn { .. } => VcsName::Svn,
        }
    }

    /// Brings the mirror of `url` at `mirror` up to date and reads its head
    /// commit.
    ///
    /// If `mirror` does not exist it is created by cloning (or, for
    /// Subversion, checking out) into it. Otherwise the existing mirror is
    /// updated in place.
    ///
    /// `reference` selects the branch or tag for Git and Mercurial clones.
    /// Subversion ignores it.
    pub fn fetch_mirror(
        &self,
        url: &str,
        reference: Option<&str>,
        mirror: &Utf8Path,
    ) -> Result<CommitInfo, FetchError> {
        let exists = mirror.try_exists().map_err(|source| FetchError::Io {
            path: mirror.to_owned(),
            source,
        })?;
        // Clones run from the mirror root; everything else runs inside
        // the mirror.
        let parent = match mirror.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let target = mirror.file_name().unwrap_or(mirror.as_str());

        match &self.kind {
            VcsKind::Git { .. } => {
                if exists {
                    self.run(url, mirror, &["fetch", "--tags", "--force", "origin"])?;
                    let on_branch = self
                        .output(mirror, &["symbolic-ref", "-q", "HEAD"])?
                        .status
                        .success();
                    match (on_branch, reference) {
                        (false, Some(reference)) => {
                            self.run(url, mirror, &["checkout", "--detach", reference])?;
                        }
                        _ => {
                            self.run(url, mirror, &["pull", "--ff-only"])?;
                        }
                    }
                } else {
                    let mut args = vec!["clone"];
                    if let Some(reference) = reference {
                        args.extend(["--branch", reference]);
                    }
                    args.extend(["--", url, target]);
                    self.run(url, parent, &args)?;
                }
                self.read_git_head(url, mirror)
            }
            VcsKind::Hg { .. } => {
                if exists {
                    self.run(url, mirror, &["pull", "-u"])?;
                } else {
                    let mut args = vec!["clone"];
                    if let Some(reference) = reference {
                        args.extend(["-u", reference]);
                    }
                    args.extend([url, target]);
                    self.run(url, parent, &args)?;
                }
                self.read_hg_head(url, mirror)
            }
            VcsKind::Svn { .. } => {
                if exists {
                    self.run(url, mirror, &["update", "--non-interactive"])?;
                } else {
                    self.run(
                        url,
                        parent,
                        &["checkout", "--non-interactive", url, target],
                    )?;
                }
                self.read_svn_head(url, mirror)
            }
        }
    }

    /// Lists the remote `url` and returns the commit that `reference` (or
    /// `HEAD`) points to, without cloning.
    ///
    /// Only Git supports this.
    pub fn ls_remote(
        &self,
        url: &str,
        reference: Option<&str>,
    ) -> Result<String, FetchError> {
        if !matches!(self.kind, VcsKind::Git { .. }) {
            return Err(FetchError::Unsupported {
                kind: self.source_kind(),
                mode: crate::FetchMode::RemoteOnly,
            });
        }
        let pattern = reference.unwrap_or("HEAD");
        let stdout =
            self.run(url, Utf8Path::new("."), &["ls-remote", url, pattern])?;
        select_ls_remote(&stdout, reference).ok_or_else(|| {
            FetchError::RefNotFound {
                url: url.to_owned(),
                reference: pattern.to_owned(),
            }
        })
    }

    fn source_kind(&self) -> SourceKind {
        match self.kind {
            VcsKind::Git { .. } => SourceKind::Git,
            VcsKind::Hg { .. } => SourceKind::Hg,
            VcsKind::Svn { .. } => SourceKind::Svn,
        }
    }

    fn read_git_head(
        &self,
        url: &str,
        mirror: &Utf8Path,
    ) -> Result<CommitInfo, FetchError> {
        let commit = self.run(url, mirror, &["rev-parse", "HEAD"])?;
        let short_commit =
            self.run(url, mirror, &["rev-parse", "--short", "HEAD"])?;

        let args = ["rev-list", "--count", "HEAD"];
        let count = self.run(url, mirror, &args)?;
        let revision = count.parse::<u64>().map_err(|_| {
            self.unexpected(url, &args, "expected a commit count", &count)
        })?;

        let args = ["log", "-1", "--format=%ct", "HEAD"];
        let epoch = self.run(url, mirror, &args)?;
        let timestamp = epoch
            .parse::<i64>()
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .ok_or_else(|| {
                self.unexpected(url, &args, "expected a Unix timestamp", &epoch)
            })?;

        Ok(CommitInfo::new(commit, short_commit, revision, timestamp))
    }

    fn read_hg_head(
        &self,
        url: &str,
        mirror: &Utf8Path,
    ) -> Result<CommitInfo, FetchError> {
        let args = [
            "log",
            "-r",
            ".",
            "--template",
            "{node|short} {rev} {date|hgdate}",
        ];
        let stdout = self.run(url, mirror, &args)?;
        let (node, revision, timestamp) =
            parse_hg_log(&stdout).ok_or_else(|| {
                self.unexpected(
                    url,
                    &args,
                    "expected '<node> <rev> <epoch> <offset>'",
                    &stdout,
                )
            })?;
        Ok(CommitInfo::new(node.clone(), node, revision, timestamp))
    }

    fn read_svn_head(
        &self,
        url: &str,
        mirror: &Utf8Path,
    ) -> Result<CommitInfo, FetchError> {
        let args = ["info", "--xml"];
        let stdout = self.run(url, mirror, &args)?;
        let (revision, timestamp) = parse_svn_info(&stdout)
            .map_err(|reason| self.unexpected(url, &args, &reason, &stdout))?;
        let commit = revision.to_string();
        Ok(CommitInfo::new(commit.clone(), commit, revision, timestamp))
    }

    fn unexpected(
        &self,
        url: &str,
        args: &[&str],
        reason: &str,
        stdout: &str,
    ) -> FetchError {
        FetchError::UnexpectedOutput {
            vcs_name: self.name(),
            url: url.to_owned(),
            command: self.command_line(args),
            reason: reason.to_owned(),
            stdout: stdout.to_owned(),
        }
    }

    fn command_line(&self, args: &[&str]) -> String {
        let mut line = self.binary().to_owned();
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Runs the tool and returns its raw output, whatever the exit status.
    fn output(
        &self,
        cwd: &Utf8Path,
        args: &[&str],
    ) -> Result<std::process::Output, FetchError> {
        debug!(cwd = %cwd, "running `{}`", self.command_line(args));
        Command::new(self.binary())
            .current_dir(cwd)
            .args(args)
            .output()
            .map_err(|source| FetchError::SpawnFailed {
                vcs_name: self.name(),
                binary_path: self.binary().to_owned(),
                cwd: cwd.to_owned(),
                source,
            })
    }

    /// Runs the tool and returns its trimmed stdout, failing on a non-zero
    /// exit status.
    fn run(
        &self,
        url: &str,
        cwd: &Utf8Path,
        args: &[&str],
    ) -> Result<String, FetchError> {
        let output = self.output(cwd, args)?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();

        if !output.status.success() {
            return Err(FetchError::VcsFailed {
                vcs_name: self.name(),
                url: url.to_owned(),
                command: self.command_line(args),
                exit_status: output.status.to_string(),
                stderr: stderr.to_owned(),
            });
        }

        if !stderr.is_empty() {
            if self.verbose {
                info!("{}: {stderr}", self.name());
            } else {
                debug!("{}: {stderr}", self.name());
            }
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

/// Picks the commit for `reference` out of `git ls-remote` output.
///
/// A branch wins over a tag, and a peeled tag (`^{}`, the commit an
/// annotated tag points to) wins over the tag object itself.
fn select_ls_remote(stdout: &str, reference: Option<&str>) -> Option<String> {
    let refs: Vec<(&str, &str)> = stdout
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(hash, name)| (hash.trim(), name.trim()))
        .collect();

    let preferred = reference.and_then(|reference| {
        let candidates = [
            format!("refs/heads/{reference}"),
            format!("refs/tags/{reference}^{{}}"),
            format!("refs/tags/{reference}"),
        ];
        candidates.iter().find_map(|candidate| {
            refs.iter().find(|(_, name)| name == candidate).map(|(h, _)| *h)
        })
    });

    preferred.or_else(|| refs.first().map(|(hash, _)| *hash)).map(str::to_owned)
}

/// Parses `{node|short} {rev} {date|hgdate}` output.
fn parse_hg_log(stdout: &str) -> Option<(String, u64, DateTime<Utc>)> {
    let mut parts = stdout.split_whitespace();
    let node = parts.next()?.to_owned();
    let revision = parts.next()?.parse().ok()?;
    // hgdate is "<unix seconds> <offset>"; the offset does not move the
    // instant.
    let secs = parts.next()?.parse().ok()?;
    let timestamp = DateTime::from_timestamp(secs, 0)?;
    Some((node, revision, timestamp))
}

/// Extracts the last-changed revision and its date from `svn info --xml`.
///
/// The values come from the `<commit revision="N"><date>...</date>` element
/// of the first entry.
fn parse_svn_info(xml: &str) -> Result<(u64, DateTime<Utc>), String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut revision: Option<u64> = None;
    let mut in_commit = false;
    let mut in_date = false;

    loop {
        match reader.read_event().map_err(|e| format!("invalid XML: {e}"))? {
            Event::Start(start) => match start.name().as_ref() {
                b"commit" if revision.is_none() => {
                    let attr = start
                        .try_get_attribute("revision")
                        .map_err(|e| format!("invalid XML attribute: {e}"))?
                        .ok_or("<commit> has no revision attribute")?;
                    let value = attr
                        .unescape_value()
                        .map_err(|e| format!("invalid XML attribute: {e}"))?;
                    revision = Some(value.parse().map_err(|_| {
                        format!("commit revision {value:?} is not a number")
                    })?);
                    in_commit = true;
                }
                b"date" if in_commit => in_date = true,
                _ => {}
            },
            Event::Text(text) if in_date => {
                let text =
                    text.unescape().map_err(|e| format!("invalid XML text: {e}"))?;
                let date = DateTime::parse_from_rfc3339(&text)
                    .map_err(|e| format!("invalid commit date {text:?}: {e}"))?;
                let revision = revision.ok_or("<date> outside <commit>")?;
                return Ok((revision, date.with_timezone(&Utc)));
            }
            Event::End(end) if end.name().as_ref() == b"commit" => {
                in_commit = false;
                in_date = false;
            }
            Event::Eof => {
                return Err(match revision {
                    Some(_) => "<commit> has no <date>".to_owned(),
                    None => "no <commit> element".to_owned(),
                });
            }
            _ => {}
        }
    }
}
