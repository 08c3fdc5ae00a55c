#![forbid(unsafe_code)]

//! One sync run: pick candidates, walk each through download, re-host,
//! submit and poll, hand it to the secondary uploaders, record the results.
//!
//! A per-run budget caps Rutube submissions and secondary uploads. Whatever
//! is left over is picked up by the next scheduled run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cache::MetadataCache;
use crate::config::{DiscoveryWindow, RunBudget, Settings};
use crate::discovery::{ListedVideo, MediaSource, VideoDetails, remove_local_artifacts, resolve_details};
use crate::error::{SyncError, SyncResult};
use crate::poller::{FailureKind, PollOutcome, PollPolicy, StatusSource, wait_for_terminal};
use crate::rehost::{Rehoster, public_url_for};
use crate::retry::{Backoff, Clock, SystemClock};
use crate::social::{Orientation, OrientationDetector, SecondaryUploader, build_caption};
use crate::store::{Candidate, Platform, SyncRepository, select_candidates};

/// Primary destination: accepts a URL, reports processing status.
pub trait Destination: StatusSource + Send + Sync {
    fn submit(&self, video_url: &str, title: &str, description: &str) -> SyncResult<String>;
}

/// Where a single video is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoState {
    Discovered,
    Downloading,
    Rehosting,
    Submitted,
    Processing,
    Ready,
    Failed,
    Deleted,
}

/// What happened for one platform of one video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformOutcome {
    Synced,
    Skipped(String),
    Failed(String),
    TimedOut,
    /// Budget ran out; picked up by a later run.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReport {
    pub id: String,
    pub title: String,
    pub states: Vec<VideoState>,
    pub outcomes: Vec<(Platform, PlatformOutcome)>,
    pub kept_file: Option<PathBuf>,
}

impl VideoReport {
    fn new(video: &ListedVideo) -> Self {
        Self {
            id: video.id.clone(),
            title: video.title.clone(),
            states: vec![VideoState::Discovered],
            outcomes: Vec::new(),
            kept_file: None,
        }
    }

    fn enter(&mut self, state: VideoState) {
        debug!("{} -> {state:?}", self.id);
        self.states.push(state);
    }

    pub fn state(&self) -> VideoState {
        self.states.last().copied().unwrap_or(VideoState::Discovered)
    }

    pub fn outcome(&self, platform: Platform) -> Option<&PlatformOutcome> {
        self.outcomes
            .iter()
            .find(|(candidate, _)| *candidate == platform)
            .map(|(_, outcome)| outcome)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub listed: usize,
    pub expanded: bool,
    pub candidates: Vec<Candidate>,
    pub videos: Vec<VideoReport>,
    pub primary_submissions: usize,
    pub secondary_uploads: usize,
}

impl RunReport {
    pub fn synced_count(&self) -> usize {
        self.videos
            .iter()
            .flat_map(|video| video.outcomes.iter())
            .filter(|(_, outcome)| *outcome == PlatformOutcome::Synced)
            .count()
    }
}

/// Knobs for one run, usually derived from `Settings`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub uploads_dir: PathBuf,
    pub public_domain: String,
    pub budget: RunBudget,
    pub poll: PollPolicy,
    pub window: DiscoveryWindow,
    pub backoff: Backoff,
    pub title_blacklist: Vec<String>,
    pub keep_downloads: bool,
    pub dry_run: bool,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            uploads_dir: settings.uploads_dir.clone(),
            public_domain: settings.public_domain.clone(),
            budget: settings.budget,
            poll: settings.poll,
            window: settings.window,
            backoff: Backoff::default(),
            title_blacklist: settings.title_blacklist.clone(),
            keep_downloads: settings.keep_downloads,
            dry_run: false,
        }
    }
}

/// Everything the orchestrator talks to.
pub struct Collaborators {
    pub source: Box<dyn MediaSource>,
    pub store: Arc<dyn SyncRepository>,
    /// `None` only makes sense for dry runs.
    pub destination: Option<Box<dyn Destination>>,
    pub rehoster: Option<Box<dyn Rehoster>>,
    pub detector: Box<dyn OrientationDetector>,
    pub secondaries: Vec<Box<dyn SecondaryUploader>>,
    pub cache: MetadataCache,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(
        source: Box<dyn MediaSource>,
        store: Arc<dyn SyncRepository>,
        detector: Box<dyn OrientationDetector>,
        cache: MetadataCache,
    ) -> Self {
        Self {
            source,
            store,
            destination: None,
            rehoster: None,
            detector,
            secondaries: Vec::new(),
            cache,
            clock: Arc::new(SystemClock),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Remaining {
    primary: usize,
    secondary: usize,
}

impl Remaining {
    fn exhausted(&self) -> bool {
        self.primary == 0 && self.secondary == 0
    }
}

pub struct Orchestrator {
    parts: Collaborators,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(parts: Collaborators, options: RunOptions) -> Self {
        Self { parts, options }
    }

    /// Rutube plus every secondary platform with an uploader.
    pub fn tracked_platforms(&self) -> Vec<Platform> {
        let mut tracked = vec![Platform::Rutube];
        for uploader in &self.parts.secondaries {
            let platform = uploader.platform();
            if !tracked.contains(&platform) {
                tracked.push(platform);
            }
        }
        tracked
    }

    /// Only `Auth` and `Store` errors escape; everything else is logged per
    /// video and the run moves on.
    pub async fn run(&mut self) -> SyncResult<RunReport> {
        if self.parts.destination.is_none() && !self.options.dry_run {
            return Err(SyncError::Auth("no authenticated destination client".into()));
        }

        let tracked = self.tracked_platforms();
        let mut report = RunReport::default();

        // Emptiness and staleness look at the raw listing; the blacklist only
        // narrows the candidates.
        let recent = self.parts.source.list_recent(self.options.window.recent)?;
        report.listed = recent.len();
        let mut candidates = select_candidates(
            &self.without_blacklisted(&recent),
            self.parts.store.as_ref(),
            &tracked,
        )
        .await?;

        if candidates.is_empty() {
            if recent.is_empty() {
                warn!("no videos found on the channel");
                return Ok(report);
            }
            let today = Utc::now().date_naive();
            if should_expand(&recent, today, self.options.window.stale_after_days) {
                info!(
                    "nothing to do in the newest {} upload(s) and the channel looks quiet, widening to {}",
                    recent.len(),
                    self.options.window.expanded
                );
                let expanded = self.parts.source.list_recent(self.options.window.expanded)?;
                report.listed = expanded.len();
                report.expanded = true;
                candidates = select_candidates(
                    &self.without_blacklisted(&expanded),
                    self.parts.store.as_ref(),
                    &tracked,
                )
                .await?;
            }
        }

        if candidates.is_empty() {
            info!("everything in the last {} upload(s) is synced", report.listed);
            return Ok(report);
        }
        info!("{} video(s) need work", candidates.len());
        report.candidates = candidates.clone();

        if self.options.dry_run {
            for candidate in &candidates {
                let pending: Vec<String> =
                    candidate.pending.iter().map(Platform::to_string).collect();
                info!(
                    "[dry-run] {} \"{}\" needs {}",
                    candidate.video.id,
                    candidate.video.title,
                    pending.join(", ")
                );
            }
            return Ok(report);
        }

        let mut remaining = Remaining {
            primary: self.options.budget.primary,
            secondary: self.options.budget.secondary,
        };

        for candidate in &candidates {
            if remaining.exhausted() {
                info!("run budget exhausted, leaving the rest for the next run");
                break;
            }
            let needs_primary = candidate.pending.contains(&Platform::Rutube);
            let has_secondary = candidate.pending.iter().any(|p| !p.is_primary());
            if needs_primary && remaining.primary == 0 {
                debug!("{} waits for primary budget", candidate.video.id);
                continue;
            }
            if !needs_primary && (!has_secondary || remaining.secondary == 0) {
                continue;
            }

            let span = info_span!("video", id = %candidate.video.id);
            let video = self
                .process_video(candidate, &mut remaining, &mut report)
                .instrument(span)
                .await?;
            report.videos.push(video);
        }

        if let Err(err) = self.parts.cache.save() {
            warn!("could not persist metadata cache: {err:#}");
        }
        Ok(report)
    }

    fn without_blacklisted(&self, listed: &[ListedVideo]) -> Vec<ListedVideo> {
        listed
            .iter()
            .filter(|video| {
                let blocked = is_blacklisted(&video.title, &self.options.title_blacklist);
                if blocked {
                    info!("skipping blacklisted title \"{}\"", video.title);
                }
                !blocked
            })
            .cloned()
            .collect()
    }

    async fn process_video(
        &mut self,
        candidate: &Candidate,
        remaining: &mut Remaining,
        report: &mut RunReport,
    ) -> SyncResult<VideoReport> {
        let video = &candidate.video;
        let mut outcome = VideoReport::new(video);
        info!("processing \"{}\"", video.title);

        let mut details = resolve_details(
            self.parts.source.as_ref(),
            &mut self.parts.cache,
            &self.options.backoff,
            self.parts.clock.as_ref(),
            video,
        );
        if details.title.trim().is_empty() {
            details.title = video.title.clone();
        }
        outcome.title = details.title.clone();

        outcome.enter(VideoState::Downloading);
        let path = match self.parts.source.download(&video.id, &self.options.uploads_dir) {
            Ok(path) => path,
            Err(err) => {
                warn!("skipping {}: {err}", video.id);
                outcome.enter(VideoState::Failed);
                for platform in &candidate.pending {
                    outcome
                        .outcomes
                        .push((*platform, PlatformOutcome::Failed(err.to_string())));
                }
                return Ok(outcome);
            }
        };

        let mut keep_file = self.options.keep_downloads;

        if candidate.pending.contains(&Platform::Rutube) {
            remaining.primary -= 1;
            report.primary_submissions += 1;
            let primary = self.publish_primary(&details, &path, &mut outcome).await?;
            if primary == PlatformOutcome::TimedOut {
                keep_file = true;
            }
            outcome.outcomes.push((Platform::Rutube, primary));
        }

        let mut orientation = None;
        for index in 0..self.parts.secondaries.len() {
            let platform = self.parts.secondaries[index].platform();
            if !candidate.pending.contains(&platform) {
                continue;
            }
            let result = self
                .publish_secondary(index, &details, &path, &mut orientation, remaining, report)
                .await?;
            outcome.outcomes.push((platform, result));
        }

        if keep_file {
            outcome.kept_file = Some(path);
        } else {
            let removed = remove_local_artifacts(&self.options.uploads_dir, &video.id);
            debug!("cleaned up {removed} local file(s)");
        }
        Ok(outcome)
    }

    async fn publish_primary(
        &self,
        details: &VideoDetails,
        path: &Path,
        outcome: &mut VideoReport,
    ) -> SyncResult<PlatformOutcome> {
        let Some(destination) = self.parts.destination.as_deref() else {
            return Err(SyncError::Auth("no authenticated destination client".into()));
        };

        outcome.enter(VideoState::Rehosting);
        let url = public_url_for(
            self.parts.rehoster.as_deref(),
            path,
            &self.options.public_domain,
            &details.id,
        );

        outcome.enter(VideoState::Submitted);
        let remote_id = match destination.submit(&url, &details.title, &details.description) {
            Ok(remote_id) => remote_id,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!("Rutube did not accept {}: {err}", details.id);
                outcome.enter(VideoState::Failed);
                return Ok(PlatformOutcome::Failed(err.to_string()));
            }
        };

        outcome.enter(VideoState::Processing);
        match wait_for_terminal(destination, &remote_id, self.options.poll, self.parts.clock.as_ref()) {
            PollOutcome::Ready => {
                outcome.enter(VideoState::Ready);
                self.parts
                    .store
                    .mark_synced(&details.id, &details.title, Platform::Rutube, Some(&details.description))
                    .await?;
                info!("{} is live on Rutube as {remote_id}", details.id);
                Ok(PlatformOutcome::Synced)
            }
            PollOutcome::Failed { kind, reason } => {
                outcome.enter(match kind {
                    FailureKind::Deleted => VideoState::Deleted,
                    FailureKind::Error => VideoState::Failed,
                });
                let reason = reason.unwrap_or_else(|| "no reason given".into());
                Ok(PlatformOutcome::Failed(format!("{kind}: {reason}")))
            }
            PollOutcome::TimedOut { attempts } => {
                warn!(
                    "{remote_id} still processing after {attempts} checks; keeping the local file"
                );
                Ok(PlatformOutcome::TimedOut)
            }
        }
    }

    async fn publish_secondary(
        &self,
        index: usize,
        details: &VideoDetails,
        path: &Path,
        orientation: &mut Option<Orientation>,
        remaining: &mut Remaining,
        report: &mut RunReport,
    ) -> SyncResult<PlatformOutcome> {
        let uploader = self.parts.secondaries[index].as_ref();
        let platform = uploader.platform();

        if uploader.vertical_only() {
            let detected = match *orientation {
                Some(known) => known,
                None => match self.detect_orientation(details, path) {
                    Ok(found) => {
                        *orientation = Some(found);
                        found
                    }
                    Err(err) => {
                        warn!("cannot tell orientation of {}: {err}", details.id);
                        return Ok(PlatformOutcome::Failed(err.to_string()));
                    }
                },
            };
            if detected != Orientation::Vertical {
                info!("{} is {detected}, not sending to {platform}", details.id);
                let reason = detected.to_string();
                self.parts
                    .store
                    .mark_skipped(&details.id, &details.title, platform, &reason)
                    .await?;
                return Ok(PlatformOutcome::Skipped(reason));
            }
        }

        if remaining.secondary == 0 {
            return Ok(PlatformOutcome::Deferred);
        }
        remaining.secondary -= 1;
        report.secondary_uploads += 1;

        let caption = build_caption(&details.title, &details.description);
        match uploader.upload(path, &caption) {
            Ok(()) => {
                self.parts
                    .store
                    .mark_synced(&details.id, &details.title, platform, Some(&details.description))
                    .await?;
                info!("{} uploaded to {platform}", details.id);
                Ok(PlatformOutcome::Synced)
            }
            Err(err) => {
                warn!("{platform} upload of {} failed: {err}", details.id);
                Ok(PlatformOutcome::Failed(err.to_string()))
            }
        }
    }

    /// Cached dimensions first, `ffprobe` on the file otherwise.
    fn detect_orientation(&self, details: &VideoDetails, path: &Path) -> SyncResult<Orientation> {
        if let (Some(width), Some(height)) = (details.width, details.height)
            && let Some(found) = Orientation::from_dimensions(width, height)
        {
            return Ok(found);
        }
        self.parts.detector.detect(path)
    }
}

/// Case-insensitive substring match against lowercased keywords.
pub fn is_blacklisted(title: &str, blacklist: &[String]) -> bool {
    if blacklist.is_empty() {
        return false;
    }
    let title = title.to_lowercase();
    blacklist.iter().any(|word| title.contains(word.as_str()))
}

/// Widen the search when the newest listed upload is older than
/// `stale_after_days`, or when no listed upload carries a date.
pub fn should_expand(listed: &[ListedVideo], today: NaiveDate, stale_after_days: i64) -> bool {
    match listed.iter().filter_map(|video| video.upload_date).max() {
        Some(newest) => (today - newest).num_days() > stale_after_days,
        None => true,
    }
}
