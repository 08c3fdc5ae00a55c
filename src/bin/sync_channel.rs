#![forbid(unsafe_code)]

//! One sync run: list the channel, push whatever is missing to Rutube and the
//! configured short-form uploaders, record what landed.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use crosspost_tools::{
    cache::MetadataCache,
    config::{Settings, SettingsOverrides, resolve_settings},
    discovery::YtDlp,
    logging::init_logging,
    orchestrator::{Collaborators, Orchestrator, PlatformOutcome, RunOptions, RunReport},
    rehost::{CatboxRehoster, Rehoster},
    rutube::RutubeClient,
    social::{CommandUploader, FfprobeDetector, SecondaryUploader},
    store::{Platform, SqliteSyncStore},
};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(about = "Mirror the newest YouTube uploads to Rutube, TikTok and Instagram")]
struct SyncArgs {
    /// Channel to mirror (overrides YOUTUBE_CHANNEL_URL).
    #[arg(long)]
    channel_url: Option<String>,

    /// Sync database path (overrides DB_FILE).
    #[arg(long)]
    db_file: Option<PathBuf>,

    /// Download directory (overrides UPLOADS_DIR).
    #[arg(long)]
    uploads_dir: Option<PathBuf>,

    /// Rutube submissions allowed this run.
    #[arg(long)]
    max_primary: Option<usize>,

    /// TikTok/Instagram uploads allowed this run.
    #[arg(long)]
    max_secondary: Option<usize>,

    /// Alternative `.env` file.
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Only report which videos need work.
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl SyncArgs {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            channel_url: self.channel_url.clone(),
            db_file: self.db_file.clone(),
            uploads_dir: self.uploads_dir.clone(),
            max_primary_uploads: self.max_primary,
            max_secondary_uploads: self.max_secondary,
            env_path: self.env_file.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = SyncArgs::parse();
    init_logging(args.verbose)?;

    let settings = resolve_settings(args.overrides()).context("loading configuration")?;
    if settings.pause_file.exists() {
        info!(
            "{} exists, sync is paused; nothing to do",
            settings.pause_file.display()
        );
        return Ok(());
    }

    let report = run(&settings, args.dry_run).await?;
    print_summary(&report);
    Ok(())
}

async fn run(settings: &Settings, dry_run: bool) -> Result<RunReport> {
    fs::create_dir_all(&settings.uploads_dir)
        .with_context(|| format!("creating {}", settings.uploads_dir.display()))?;

    let store = SqliteSyncStore::open(&settings.db_file)
        .await
        .context("opening sync database")?;
    let cache = MetadataCache::load(&settings.metadata_cache_file);
    let source = YtDlp::new(
        &settings.yt_dlp_path,
        settings.channel_url.as_str(),
        &settings.youtube_cookies,
    );

    let mut parts = Collaborators::new(
        Box::new(source),
        Arc::new(store),
        Box::new(FfprobeDetector::new(&settings.ffprobe_path)),
        cache,
    );

    if !dry_run {
        let client = RutubeClient::authenticate(
            &settings.rutube_api_base,
            &settings.rutube,
            settings.rutube_category_id,
        )
        .context("logging in to Rutube")?;
        parts.destination = Some(Box::new(client));
    }

    parts.rehoster = settings
        .rehost_endpoint
        .as_deref()
        .map(|endpoint| Box::new(CatboxRehoster::new(endpoint)) as Box<dyn Rehoster>);

    for (platform, command) in [
        (Platform::TikTok, &settings.tiktok_command),
        (Platform::Instagram, &settings.instagram_command),
    ] {
        if let Some(command) = command {
            let uploader = CommandUploader::new(platform, command)?;
            parts
                .secondaries
                .push(Box::new(uploader) as Box<dyn SecondaryUploader>);
        }
    }

    let mut options = RunOptions::from_settings(settings);
    options.dry_run = dry_run;

    let mut orchestrator = Orchestrator::new(parts, options);
    info!(
        "tracking {}",
        orchestrator
            .tracked_platforms()
            .iter()
            .map(Platform::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    match orchestrator.run().await {
        Ok(report) => Ok(report),
        Err(err) if err.is_fatal() => Err(err).context("sync run aborted"),
        Err(err) => {
            warn!("sync run ended early: {err}");
            Ok(RunReport::default())
        }
    }
}

fn print_summary(report: &RunReport) {
    for video in &report.videos {
        for (platform, outcome) in &video.outcomes {
            let text = match outcome {
                PlatformOutcome::Synced => "synced".to_string(),
                PlatformOutcome::Skipped(reason) => format!("skipped ({reason})"),
                PlatformOutcome::Failed(reason) => format!("failed: {reason}"),
                PlatformOutcome::TimedOut => "still processing, will retry".to_string(),
                PlatformOutcome::Deferred => "deferred to the next run".to_string(),
            };
            info!("{} \"{}\" {platform}: {text}", video.id, video.title);
        }
    }
    info!(
        "done: {} listed{}, {} candidate(s), {} upload(s) recorded",
        report.listed,
        if report.expanded { " (widened)" } else { "" },
        report.candidates.len(),
        report.synced_count()
    );
}
