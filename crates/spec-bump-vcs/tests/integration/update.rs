// Copyright 2026 Oxide Computer Company

//! End-to-end spec file updates against real repositories.

use anyhow::Result;
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::Utf8Path;
use camino_tempfile::Utf8TempDir;
use chrono::NaiveDate;
use spec_bump::{SourceList, SpecFile};
use spec_bump_vcs::{
    FetchConfig, FetchError, FetchMode, Fetcher, SpecUpdater, UpdateError,
    Updater, mirror_dir,
};
use std::{fs, io::Write, process::Command};

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// 2024-01-02T03:04:05Z
const FIRST_COMMIT_TIME: &str = "1704164645 +0000";
/// 2024-02-03T00:00:00Z
const SECOND_COMMIT_TIME: &str = "1706918400 +0000";

/// Returns a `Command` for `var`'s binary, falling back to `default`.
fn tool_command(var: &str, default: &str) -> Command {
    let bin = std::env::var(var).unwrap_or_else(|_| default.to_string());
    Command::new(bin)
}

/// Returns a `Command` for git, respecting the `$GIT` environment variable.
fn git_command() -> Command {
    tool_command("GIT", "git")
}

/// Returns true if `program --version` runs, unless `skip_var` is set.
fn tool_available(mut command: Command, skip_var: &str) -> bool {
    if std::env::var(skip_var).is_ok() {
        return false;
    }
    matches!(command.arg("--version").output(), Ok(o) if o.status.success())
}

/// Writes content to a file atomically.
fn write_file(
    path: impl AsRef<Utf8Path>,
    content: impl AsRef<[u8]>,
) -> std::io::Result<()> {
    let path = path.as_ref();
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|f| f.write_all(content.as_ref()))
        .map_err(|e| e.into())
}

/// Runs `command` in `cwd` and returns its trimmed stdout.
fn run(mut command: Command, cwd: &Utf8Path) -> Result<String> {
    let output = command.current_dir(cwd).output()?;
    assert!(
        output.status.success(),
        "{command:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

// ---------------------------------------------------------------------------
// Repository setup helpers
// ---------------------------------------------------------------------------

/// Initializes a git repository at `repo_root`.
fn init_git_repo(repo_root: &Utf8Path) -> Result<()> {
    fs::create_dir_all(repo_root)?;
    let mut cmd = git_command();
    cmd.args(["init", "-q"]);
    run(cmd, repo_root)?;
    Ok(())
}

/// Writes a file and commits it via git at a fixed time.
/// Returns the full commit hash.
fn commit_via_git(
    repo_root: &Utf8Path,
    contents: &str,
    time: &str,
) -> Result<String> {
    write_file(repo_root.join("README"), contents)?;

    let mut cmd = git_command();
    cmd.args(["add", "."]);
    run(cmd, repo_root)?;

    let mut cmd = git_command();
    cmd.args([
        "-c",
        "user.name=Test User",
        "-c",
        "user.email=test@example.com",
        "-c",
        "commit.gpgsign=false",
        "commit",
        "-q",
        "-m",
        contents,
    ])
    .env("GIT_AUTHOR_DATE", time)
    .env("GIT_COMMITTER_DATE", time);
    run(cmd, repo_root)?;

    let mut cmd = git_command();
    cmd.args(["rev-parse", "HEAD"]);
    run(cmd, repo_root)
}

/// Returns git's abbreviation of `commit` in `repo_root`.
fn git_short(repo_root: &Utf8Path, commit: &str) -> Result<String> {
    let mut cmd = git_command();
    cmd.args(["rev-parse", "--short", commit]);
    run(cmd, repo_root)
}

/// Sets up an upstream git repository with one commit and a spec file
/// tracking it. Returns (temp_dir, commit_hash).
fn setup_git_package() -> Result<(Utf8TempDir, String)> {
    let temp = Utf8TempDir::with_prefix("spec-bump-vcs-")?;
    let upstream = temp.path().join("upstream");
    init_git_repo(&upstream)?;
    let commit = commit_via_git(&upstream, "first", FIRST_COMMIT_TIME)?;

    let spec = format!(
        "# demo package\nVER=1.0\nREL=3\nSRCS=\"git::{upstream}\"\n\
         CHKSUMS=\"SKIP\"\nPKGDEP=\"foo bar\"\n"
    );
    write_file(temp.path().join("spec"), spec)?;
    Ok((temp, commit))
}

fn read_spec(path: &Utf8Path) -> Result<SpecFile> {
    Ok(fs::read_to_string(path)?.parse()?)
}

fn recorded_commit(spec: &SpecFile) -> Result<Option<String>> {
    let sources: SourceList = spec.get("SRCS").unwrap_or_default().parse()?;
    Ok(sources.sources()[0].commit().map(str::to_owned))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_git_mirror_update_cycle() -> Result<()> {
    let (temp, first) = setup_git_package()?;
    let upstream = temp.path().join("upstream");
    let mirrors = temp.path().join("mirrors");
    let spec_path = temp.path().join("spec");
    let updater = SpecUpdater::standard(FetchConfig::new(&mirrors));

    // First run clones and records the commit.
    let outcome = updater.update_file(&spec_path)?;
    assert_eq!(outcome.updated, 1);
    let expected = format!("1.0+git20240102.r1.{}", git_short(&upstream, &first)?);
    assert_eq!(outcome.new_version.as_deref(), Some(expected.as_str()));
    assert!(
        mirror_dir(&mirrors, upstream.as_str()).join(".git").exists(),
        "mirror should be cloned under its URL hash"
    );

    let contents = fs::read_to_string(&spec_path)?;
    assert_eq!(
        contents,
        format!(
            "VER=\"{expected}\"\nSRCS=\"git::commit={first}::{upstream}\"\n\
             CHKSUMS=\"SKIP\"\nPKGDEP=\"foo \\\n\tbar\"\n"
        ),
        "comments and REL are dropped, VER and SRCS rewritten in place"
    );

    // Nothing new upstream: no update and the file is untouched.
    let outcome = updater.update_file(&spec_path)?;
    assert_eq!(outcome.updated, 0);
    assert_eq!(outcome.new_version, None);
    assert_eq!(fs::read_to_string(&spec_path)?, contents);

    // A new upstream commit is picked up through the existing mirror.
    let second = commit_via_git(&upstream, "second", SECOND_COMMIT_TIME)?;
    let outcome = updater.update_file(&spec_path)?;
    assert_eq!(outcome.updated, 1);
    let expected =
        format!("1.0+git20240203.r2.{}", git_short(&upstream, &second)?);
    assert_eq!(outcome.new_version.as_deref(), Some(expected.as_str()));

    let spec = read_spec(&spec_path)?;
    assert_eq!(spec.get("VER"), Some(expected.as_str()));
    assert_eq!(recorded_commit(&spec)?, Some(second));

    Ok(())
}

#[test]
fn test_git_abbreviated_commit_is_up_to_date() -> Result<()> {
    let (temp, first) = setup_git_package()?;
    let upstream = temp.path().join("upstream");
    let spec_path = temp.path().join("spec");
    let spec = format!("VER=1.0\nSRCS=\"git::commit={}::{upstream}\"\n", &first[..7]);
    write_file(&spec_path, &spec)?;

    let updater =
        SpecUpdater::standard(FetchConfig::new(temp.path().join("mirrors")));
    let outcome = updater.update_file(&spec_path)?;
    assert_eq!(outcome.updated, 0);
    assert_eq!(fs::read_to_string(&spec_path)?, spec, "file unchanged");

    Ok(())
}

#[test]
fn test_git_branch_option() -> Result<()> {
    let (temp, _) = setup_git_package()?;
    let upstream = temp.path().join("upstream");

    let mut cmd = git_command();
    cmd.args(["checkout", "-q", "-b", "stable"]);
    run(cmd, &upstream)?;
    let stable = commit_via_git(&upstream, "on stable", SECOND_COMMIT_TIME)?;
    let mut cmd = git_command();
    cmd.args(["checkout", "-q", "-"]);
    run(cmd, &upstream)?;

    let text = format!("VER=2.0\nSRCS=\"git::branch=stable::{upstream}\"\n");
    let updater =
        SpecUpdater::standard(FetchConfig::new(temp.path().join("mirrors")));
    let update = updater.update_text(&text)?;

    let expected =
        format!("2.0+git20240203.r2.{}", git_short(&upstream, &stable)?);
    assert_eq!(update.outcome.new_version.as_deref(), Some(expected.as_str()));
    let contents = update.contents.expect("spec was updated");
    assert!(
        contents.contains(&format!("git::branch=stable;commit={stable}::")),
        "commit appended after existing options: {contents}"
    );

    Ok(())
}

#[test]
fn test_git_pinned_tag_follows_moved_tag() -> Result<()> {
    let (temp, first) = setup_git_package()?;
    let upstream = temp.path().join("upstream");
    let mirrors = temp.path().join("mirrors");
    let spec_path = temp.path().join("spec");

    let mut cmd = git_command();
    cmd.args(["tag", "v1"]);
    run(cmd, &upstream)?;
    write_file(&spec_path, format!("VER=1.0\nSRCS=\"git::branch=v1::{upstream}\"\n"))?;

    let updater = SpecUpdater::standard(FetchConfig::new(&mirrors));
    let outcome = updater.update_file(&spec_path)?;
    assert_eq!(outcome.updated, 1);
    assert_eq!(recorded_commit(&read_spec(&spec_path)?)?, Some(first));

    // The clone is pinned to the tag, so its HEAD is detached.
    let mut cmd = git_command();
    cmd.args(["symbolic-ref", "-q", "HEAD"]);
    let status = cmd
        .current_dir(mirror_dir(&mirrors, upstream.as_str()))
        .status()?;
    assert!(!status.success(), "mirror HEAD should be detached");

    let second = commit_via_git(&upstream, "second", SECOND_COMMIT_TIME)?;
    let mut cmd = git_command();
    cmd.args(["tag", "-f", "v1"]);
    run(cmd, &upstream)?;

    let outcome = updater.update_file(&spec_path)?;
    assert_eq!(outcome.updated, 1);
    let expected =
        format!("1.0+git20240203.r2.{}", git_short(&upstream, &second)?);
    assert_eq!(outcome.new_version.as_deref(), Some(expected.as_str()));
    let spec = read_spec(&spec_path)?;
    assert_eq!(recorded_commit(&spec)?, Some(second));
    assert_eq!(spec.get("VER"), Some(expected.as_str()));

    Ok(())
}

#[test]
fn test_git_remote_only() -> Result<()> {
    let (temp, first) = setup_git_package()?;
    let upstream = temp.path().join("upstream");
    let today = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    let config = FetchConfig::new(temp.path().join("mirrors"))
        .with_mode(FetchMode::RemoteOnly);
    let updater = SpecUpdater::new(
        Updater::new(Fetcher::new(config)).with_today(today),
    );

    let text = format!("VER=1.0\nSRCS=\"git::commit={first}::{upstream}\"\n");
    let update = updater.update_text(&text)?;
    assert_eq!(update.outcome.updated, 0, "exact commit is up to date");

    let text =
        format!("VER=1.0\nSRCS=\"git::commit={}::{upstream}\"\n", &first[..7]);
    let update = updater.update_text(&text)?;
    assert_eq!(update.outcome.updated, 1, "abbreviations never match remotely");
    assert_eq!(update.outcome.new_version.as_deref(), Some("0+git20240506"));

    assert!(
        !temp.path().join("mirrors").exists(),
        "remote-only mode does not create mirrors"
    );

    Ok(())
}

#[test]
fn test_git_fetch_failure_leaves_file_alone() -> Result<()> {
    let temp = Utf8TempDir::with_prefix("spec-bump-vcs-")?;
    let missing = temp.path().join("does-not-exist");
    let spec_path = temp.path().join("spec");
    let spec = format!("VER=1.0\nSRCS=\"git::{missing}\"\n");
    write_file(&spec_path, &spec)?;

    let updater =
        SpecUpdater::standard(FetchConfig::new(temp.path().join("mirrors")));
    let result = updater.update_file(&spec_path);
    match result {
        Err(UpdateError::Fetch { url, error, .. }) => {
            assert_eq!(url, missing.as_str());
            assert!(
                matches!(error, FetchError::VcsFailed { .. }),
                "unexpected fetch error: {error:?}"
            );
        }
        other => panic!("expected a fetch error, got {other:?}"),
    }
    assert_eq!(fs::read_to_string(&spec_path)?, spec);

    Ok(())
}

#[test]
fn test_missing_spec_file() -> Result<()> {
    let temp = Utf8TempDir::with_prefix("spec-bump-vcs-")?;
    let updater =
        SpecUpdater::standard(FetchConfig::new(temp.path().join("mirrors")));
    let result = updater.update_file(temp.path().join("spec"));
    assert!(
        matches!(result, Err(UpdateError::ReadSpec { .. })),
        "should fail with ReadSpec error"
    );

    Ok(())
}

#[test]
fn test_hg_mirror_update() -> Result<()> {
    if !tool_available(tool_command("HG", "hg"), "SKIP_HG_TESTS") {
        eprintln!("hg tests skipped (hg not available or SKIP_HG_TESTS set)");
        return Ok(());
    }

    let temp = Utf8TempDir::with_prefix("spec-bump-vcs-hg-")?;
    let upstream = temp.path().join("upstream");
    let mut cmd = tool_command("HG", "hg");
    cmd.args(["init", upstream.as_str()]);
    run(cmd, temp.path())?;
    write_file(upstream.join("README"), "first")?;
    let mut cmd = tool_command("HG", "hg");
    cmd.args([
        "--config",
        "ui.username=Test User <test@example.com>",
        "commit",
        "-A",
        "-m",
        "first",
        "-d",
        "1704164645 0",
    ]);
    run(cmd, &upstream)?;
    let mut cmd = tool_command("HG", "hg");
    cmd.args(["log", "-r", "tip", "--template", "{node|short}"]);
    let node = run(cmd, &upstream)?;

    let text = format!("VER=1.0\nSRCS=\"hg::{upstream}\"\n");
    let updater =
        SpecUpdater::standard(FetchConfig::new(temp.path().join("mirrors")));
    let update = updater.update_text(&text)?;
    assert_eq!(
        update.outcome.new_version,
        Some(format!("1.0+hg20240102.r0.{node}"))
    );

    let rewritten = update.contents.expect("spec was updated");
    let again = updater.update_text(&rewritten)?;
    assert_eq!(again.outcome.updated, 0);

    Ok(())
}

#[test]
fn test_svn_mirror_update() -> Result<()> {
    if !tool_available(tool_command("SVN", "svn"), "SKIP_SVN_TESTS")
        || !tool_available(Command::new("svnadmin"), "SKIP_SVN_TESTS")
    {
        eprintln!("svn tests skipped (svn not available or SKIP_SVN_TESTS set)");
        return Ok(());
    }

    let temp = Utf8TempDir::with_prefix("spec-bump-vcs-svn-")?;
    let repo = temp.path().join("repo");
    let mut cmd = Command::new("svnadmin");
    cmd.args(["create", repo.as_str()]);
    run(cmd, temp.path())?;
    let trunk = format!("file://{repo}/trunk");

    let mkdir = |url: String| -> Result<()> {
        let mut cmd = tool_command("SVN", "svn");
        cmd.args(["mkdir", "--non-interactive", "-m", "add", url.as_str()]);
        run(cmd, temp.path())?;
        Ok(())
    };
    mkdir(trunk.clone())?;

    let updater =
        SpecUpdater::standard(FetchConfig::new(temp.path().join("mirrors")));
    let text = format!("VER=1.0\nSRCS=\"svn::{trunk}\"\n");
    let update = updater.update_text(&text)?;
    let version = update.outcome.new_version.expect("first run updates");
    assert!(
        version.starts_with("1.0+svn") && version.ends_with(".r1"),
        "unexpected version {version}"
    );
    let rewritten = update.contents.expect("spec was updated");
    assert!(rewritten.contains(&format!("svn::commit=1::{trunk}")));

    let again = updater.update_text(&rewritten)?;
    assert_eq!(again.outcome.updated, 0, "same revision is up to date");

    mkdir(format!("{trunk}/sub"))?;
    let third = updater.update_text(&rewritten)?;
    let version = third.outcome.new_version.expect("new revision updates");
    assert!(version.ends_with(".r2"), "unexpected version {version}");

    Ok(())
}
