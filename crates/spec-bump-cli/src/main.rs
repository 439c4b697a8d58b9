// Copyright 2026 Oxide Computer Company

//! Checks one package's sources for upstream changes and bumps its spec
//! file.
//!
//! Exits 0 whether or not anything changed; the caller tells the two apart
//! by whether the spec file was rewritten. Any failure exits non-zero and
//! leaves the spec file untouched.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use fs_err as fs;
use spec_bump_vcs::{FetchConfig, FetchMode, SpecUpdater};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// The spec file name inside a package directory.
const SPEC_FILE_NAME: &str = "spec";

#[derive(Parser, Debug)]
#[command(name = "spec-bump", version, about)]
struct Cli {
    /// Package directory (containing `spec`) or spec file path
    #[arg(default_value = ".")]
    path: Utf8PathBuf,

    /// Directory holding repository mirrors
    #[arg(long, env = "SPEC_BUMP_MIRROR_ROOT")]
    mirror_root: Option<Utf8PathBuf>,

    /// Query Git remotes without cloning and emit a 0+git<date> version
    #[arg(long)]
    remote_only: bool,

    /// Base release version (defaults to the spec's VER without its
    /// +suffix)
    #[arg(long, value_name = "VER")]
    base_version: Option<String>,

    /// Print the rewritten spec file instead of writing it
    #[arg(long)]
    dry_run: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn spec_path(&self) -> Utf8PathBuf {
        if self.path.is_dir() {
            self.path.join(SPEC_FILE_NAME)
        } else {
            self.path.clone()
        }
    }

    fn fetch_config(&self) -> Result<FetchConfig> {
        let mirror_root = match &self.mirror_root {
            Some(root) => root.clone(),
            None => default_mirror_root()?,
        };
        let mode = if self.remote_only {
            FetchMode::RemoteOnly
        } else {
            FetchMode::Mirror
        };
        Ok(FetchConfig::new(mirror_root)
            .with_mode(mode)
            .with_verbose(self.verbose > 0))
    }
}

fn default_mirror_root() -> Result<Utf8PathBuf> {
    let cache = dirs::cache_dir()
        .context("no cache directory; pass --mirror-root")?;
    let cache = Utf8PathBuf::from_path_buf(cache).map_err(|path| {
        anyhow::anyhow!("cache directory {} is not UTF-8", path.display())
    })?;
    Ok(cache.join("spec-bump").join("mirrors"))
}

fn init_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let spec_path = cli.spec_path();
    let mut updater = SpecUpdater::standard(cli.fetch_config()?);
    if let Some(base) = &cli.base_version {
        updater = updater.with_base_version(base.clone());
    }

    let outcome = if cli.dry_run {
        let text = fs::read_to_string(&spec_path)?;
        let update = updater.update_text(&text)?;
        if let Some(contents) = &update.contents {
            print!("{contents}");
        }
        update.outcome
    } else {
        updater.update_file(&spec_path)?
    };

    report(&spec_path, outcome.updated, outcome.new_version.as_deref());
    Ok(())
}

fn report(spec_path: &Utf8Path, updated: usize, new_version: Option<&str>) {
    match new_version {
        Some(version) if updated > 0 => {
            info!("{spec_path}: updated {updated} source(s): VER={version}");
        }
        _ => info!("{spec_path}: no updates"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
