#![forbid(unsafe_code)]

//! Repair tool for the sync database. Compares it with the Rutube account:
//! `check` lists rows whose upload is gone, `clean` makes those eligible for
//! upload again, `import` marks channel videos that are already on Rutube.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crosspost_tools::{
    config::{SettingsOverrides, resolve_settings},
    discovery::{MediaSource, YtDlp},
    logging::init_logging,
    reconcile,
    rutube::RutubeClient,
    store::SqliteSyncStore,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "Reconcile the sync database with the Rutube account")]
struct ReconcileArgs {
    #[command(subcommand)]
    action: Action,

    /// Sync database path (overrides DB_FILE).
    #[arg(long, global = true)]
    db_file: Option<PathBuf>,

    /// Alternative `.env` file.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// List rows marked as uploaded that Rutube no longer has.
    Check,
    /// Remove (or reset) those rows so the next sync uploads them again.
    Clean,
    /// Mark channel videos whose title already exists on Rutube as synced.
    Import {
        /// How many recent channel uploads to compare.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = ReconcileArgs::parse();
    init_logging(args.verbose)?;

    let settings = resolve_settings(SettingsOverrides {
        db_file: args.db_file.clone(),
        env_path: args.env_file.clone(),
        ..SettingsOverrides::default()
    })
    .context("loading configuration")?;

    let store = SqliteSyncStore::open(&settings.db_file)
        .await
        .context("opening sync database")?;
    let client = RutubeClient::authenticate(
        &settings.rutube_api_base,
        &settings.rutube,
        settings.rutube_category_id,
    )
    .context("logging in to Rutube")?;
    let remote = client
        .list_account_videos()
        .context("listing Rutube account videos")?;
    info!("{} video(s) on the Rutube account", remote.len());

    match args.action {
        Action::Check => {
            let missing = reconcile::find_missing(&store, &remote).await?;
            if missing.is_empty() {
                println!("Every synced video is present on Rutube.");
            } else {
                println!("Marked as synced but not found on Rutube:");
                for record in &missing {
                    println!("  {} ({})", record.title, record.external_id);
                }
                println!("Run `reconcile_db clean` to queue them for upload again.");
            }
        }
        Action::Clean => {
            let report = reconcile::clean(&store, &remote).await?;
            println!(
                "Removed {} row(s), reset {} row(s).",
                report.deleted.len(),
                report.reset.len()
            );
        }
        Action::Import { limit } => {
            let source = YtDlp::new(
                &settings.yt_dlp_path,
                settings.channel_url.as_str(),
                &settings.youtube_cookies,
            );
            let listed = source
                .list_recent(limit.unwrap_or(settings.window.expanded))
                .context("listing the YouTube channel")?;
            let imported = reconcile::import(&store, &listed, &remote).await?;
            println!(
                "Marked {} of {} listed video(s) as already on Rutube.",
                imported.len(),
                listed.len()
            );
        }
    }

    Ok(())
}
