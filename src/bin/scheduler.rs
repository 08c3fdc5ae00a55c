#![forbid(unsafe_code)]

//! Runs `sync_channel` on a fixed interval. Each run is a separate process,
//! so a crash in one run never takes the loop down.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use crosspost_tools::logging::init_logging;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(about = "Run sync_channel every few hours")]
struct SchedulerArgs {
    /// Hours between the start of one run and the next.
    #[arg(long, default_value_t = 3)]
    interval_hours: u64,

    /// Run once and exit.
    #[arg(long)]
    once: bool,

    /// Explicit path to the sync_channel executable.
    #[arg(long)]
    sync_binary: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// Arguments passed through to sync_channel (after `--`).
    #[arg(last = true)]
    passthrough: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = SchedulerArgs::parse();
    init_logging(args.verbose)?;

    if args.interval_hours == 0 {
        bail!("--interval-hours must be at least 1");
    }
    let executable = match &args.sync_binary {
        Some(path) => path.clone(),
        None => first_existing(sync_executable_candidates())?,
    };
    let interval = Duration::from_secs(args.interval_hours * 3600);

    loop {
        run_sync(&executable, &args.passthrough);
        if args.once {
            return Ok(());
        }

        info!("next run in {} hour(s)", args.interval_hours);
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for shutdown signal")?;
                info!("interrupted, stopping");
                return Ok(());
            }
        }
    }
}

/// Runs one sync and reports whether it exited cleanly. Failures are logged,
/// the next run is still scheduled.
fn run_sync(executable: &Path, passthrough: &[String]) -> bool {
    info!("starting {}", executable.display());
    match Command::new(executable).args(passthrough).status() {
        Ok(status) if status.success() => {
            info!("sync finished");
            true
        }
        Ok(status) => {
            warn!("sync exited with {status}");
            false
        }
        Err(err) => {
            warn!("failed to run {}: {err}", executable.display());
            false
        }
    }
}

/// Places a `sync_channel` build may live, most specific first.
fn sync_executable_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = env::var_os("CARGO_BIN_EXE_sync_channel")
        .map(PathBuf::from)
        .into_iter()
        .collect();
    if let Ok(own) = env::current_exe() {
        candidates.push(own.with_file_name("sync_channel"));
    }
    candidates
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Result<PathBuf> {
    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| {
            anyhow!("sync_channel not found next to the scheduler; pass --sync-binary or run `cargo build --bin sync_channel`")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn write_script(path: &Path, body: &str) -> Result<()> {
        fs::write(path, format!("#!/usr/bin/env bash\n{body}\n"))?;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
        Ok(())
    }

    #[test]
    fn first_existing_skips_missing_candidates() -> Result<()> {
        let temp = tempdir()?;
        let missing = temp.path().join("target/debug/sync_channel");
        let present = temp.path().join("sync_channel");
        File::create(&present)?;
        fs::create_dir(temp.path().join("dir"))?;

        let found = first_existing([missing.clone(), temp.path().join("dir"), present.clone()])?;
        assert_eq!(found, present);
        assert!(first_existing([missing]).is_err());
        Ok(())
    }

    #[test]
    fn candidates_end_with_own_directory() -> Result<()> {
        let own = env::current_exe()?;
        assert_eq!(
            sync_executable_candidates().last(),
            Some(&own.with_file_name("sync_channel"))
        );
        Ok(())
    }

    #[test]
    fn run_sync_passes_arguments_through() -> Result<()> {
        let temp = tempdir()?;
        let marker = temp.path().join("args.txt");
        let script = temp.path().join("sync_channel");
        write_script(&script, &format!("echo \"$@\" > \"{}\"", marker.display()))?;

        let passthrough = vec!["--max-primary".to_string(), "2".to_string()];
        assert!(run_sync(&script, &passthrough));
        assert_eq!(fs::read_to_string(&marker)?.trim(), "--max-primary 2");
        Ok(())
    }

    #[test]
    fn run_sync_reports_failures() -> Result<()> {
        let temp = tempdir()?;
        let script = temp.path().join("sync_channel");
        write_script(&script, "exit 3")?;
        assert!(!run_sync(&script, &[]));
        assert!(!run_sync(&temp.path().join("missing"), &[]));
        Ok(())
    }

    #[test]
    fn parses_interval_and_passthrough() {
        let args = SchedulerArgs::parse_from(["scheduler", "--once", "--", "--dry-run"]);
        assert_eq!(args.interval_hours, 3);
        assert!(args.once);
        assert_eq!(args.passthrough, vec!["--dry-run"]);

        let args = SchedulerArgs::parse_from(["scheduler", "--interval-hours", "6"]);
        assert_eq!(args.interval_hours, 6);
        assert!(!args.once);
    }
}
