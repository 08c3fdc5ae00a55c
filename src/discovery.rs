#![forbid(unsafe_code)]

//! Channel listing, metadata lookups and media downloads, all delegated to
//! `yt-dlp`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::cache::{CachedMetadata, MetadataCache};
use crate::error::{SyncError, SyncResult};
use crate::retry::{Backoff, Clock};

/// One entry of a flat channel listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedVideo {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub upload_date: Option<NaiveDate>,
}

/// Full per-video metadata used for titles, captions and orientation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl VideoDetails {
    fn from_cached(id: &str, cached: &CachedMetadata) -> Self {
        Self {
            id: id.to_owned(),
            title: cached.title.clone(),
            description: cached.description.clone(),
            width: cached.width,
            height: cached.height,
        }
    }

    /// Partial details built from the listing when the full lookup fails.
    pub fn from_listing(video: &ListedVideo) -> Self {
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            description: video.description.clone().unwrap_or_default(),
            width: None,
            height: None,
        }
    }
}

/// Where videos come from. `yt-dlp` in production, fakes in tests.
pub trait MediaSource: Send + Sync {
    /// Newest-first listing of at most `limit` uploads.
    fn list_recent(&self, limit: usize) -> SyncResult<Vec<ListedVideo>>;

    fn fetch_details(&self, id: &str) -> SyncResult<VideoDetails>;

    /// Materializes `<dest_dir>/<id>.mp4`, reusing an existing file.
    fn download(&self, id: &str, dest_dir: &Path) -> SyncResult<PathBuf>;
}

pub fn watch_url(id: &str) -> String {
    format!("https://youtube.com/watch?v={id}")
}

pub fn local_video_path(dest_dir: &Path, id: &str) -> PathBuf {
    dest_dir.join(format!("{id}.mp4"))
}

#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    upload_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

/// `yt-dlp` wrapper bound to one channel.
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    channel_url: String,
    cookies: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>, channel_url: impl Into<String>, cookies: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            channel_url: channel_url.into(),
            cookies: cookies.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        if self.cookies.exists() {
            command.arg("--cookies").arg(&self.cookies);
        }
        command
    }

    fn run(&self, mut command: Command, label: &str) -> SyncResult<String> {
        let output = command
            .output()
            .map_err(|err| SyncError::tool("yt-dlp", format!("{label}: {err}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SyncError::tool(
                "yt-dlp",
                format!("{label} exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl MediaSource for YtDlp {
    fn list_recent(&self, limit: usize) -> SyncResult<Vec<ListedVideo>> {
        let mut command = self.command();
        command
            .arg("--dump-json")
            .arg("--flat-playlist")
            .arg("--playlist-end")
            .arg(limit.to_string())
            .arg(&self.channel_url);
        let stdout = self.run(command, "listing channel")?;
        let videos = parse_flat_listing(&stdout);
        debug!("listed {} upload(s) from {}", videos.len(), self.channel_url);
        Ok(videos)
    }

    fn fetch_details(&self, id: &str) -> SyncResult<VideoDetails> {
        let mut command = self.command();
        command
            .arg("--dump-json")
            .arg("--no-warnings")
            .arg(watch_url(id));
        let stdout = self.run(command, "fetching metadata")?;
        let info: InfoJson = serde_json::from_str(stdout.trim())?;
        Ok(VideoDetails {
            id: info.id.unwrap_or_else(|| id.to_owned()),
            title: info.title.unwrap_or_default(),
            description: info.description.unwrap_or_default(),
            width: info.width,
            height: info.height,
        })
    }

    fn download(&self, id: &str, dest_dir: &Path) -> SyncResult<PathBuf> {
        let target = local_video_path(dest_dir, id);
        if target.exists() {
            info!("reusing existing download {}", target.display());
            return Ok(target);
        }
        fs::create_dir_all(dest_dir)?;

        let template = dest_dir.join(format!("{id}.%(ext)s"));
        let mut command = self.command();
        command
            .arg("-f")
            .arg("best[ext=mp4]")
            .arg("-o")
            .arg(&template)
            .arg(watch_url(id));
        if let Err(err) = self.run(command, "downloading") {
            warn!("download of {id} reported an error: {err}");
        }

        if target.exists() {
            Ok(target)
        } else {
            Err(SyncError::Download(format!(
                "{} was not produced (blocked or unavailable?)",
                target.display()
            )))
        }
    }
}

/// Parses `--dump-json --flat-playlist` output, one JSON object per line.
/// Malformed lines and entries without an id are skipped.
pub fn parse_flat_listing(stdout: &str) -> Vec<ListedVideo> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str::<FlatEntry>(line) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping malformed listing line: {err}");
                None
            }
        })
        .filter_map(|entry| {
            let id = entry.id.filter(|id| !id.trim().is_empty())?;
            Some(ListedVideo {
                title: entry.title.unwrap_or_default(),
                description: entry.description.filter(|text| !text.trim().is_empty()),
                upload_date: entry.upload_date.as_deref().and_then(parse_upload_date),
                id,
            })
        })
        .collect()
}

/// yt-dlp reports dates as `YYYYMMDD`.
pub fn parse_upload_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d").ok()
}

/// Cached details when present; otherwise a retried lookup whose result is
/// cached. Falls back to listing data when every attempt fails.
pub fn resolve_details(
    source: &dyn MediaSource,
    cache: &mut MetadataCache,
    backoff: &Backoff,
    clock: &dyn Clock,
    video: &ListedVideo,
) -> VideoDetails {
    if let Some(cached) = cache.get(&video.id) {
        debug!("metadata cache hit for {}", video.id);
        return VideoDetails::from_cached(&video.id, cached);
    }

    let label = format!("metadata lookup for {}", video.id);
    match backoff.retry(clock, &label, || source.fetch_details(&video.id)) {
        Ok(mut details) => {
            if details.title.trim().is_empty() {
                details.title = video.title.clone();
            }
            cache.insert(
                &video.id,
                CachedMetadata::new(details.title.clone(), details.description.clone())
                    .with_dimensions(details.width, details.height),
            );
            details
        }
        Err(err) => {
            warn!("using listing metadata for {}: {err}", video.id);
            VideoDetails::from_listing(video)
        }
    }
}

/// Deletes `<id>.*` files (the video and any partial fragments) directly
/// inside `dir`. Returns how many were removed.
pub fn remove_local_artifacts(dir: &Path, id: &str) -> usize {
    let prefix = format!("{id}.");
    let mut removed = 0;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
    {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if !matches {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                debug!("removed {}", entry.path().display());
                removed += 1;
            }
            Err(err) => warn!("could not remove {}: {err}", entry.path().display()),
        }
    }
    removed
}
