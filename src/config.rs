#![forbid(unsafe_code)]

use anyhow::{Context, Result, anyhow};
use std::{
    collections::HashMap,
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::poller::PollPolicy;

pub const DEFAULT_ENV_PATH: &str = ".env";
pub const DEFAULT_RUTUBE_API_BASE: &str = "https://rutube.ru";
pub const DEFAULT_REHOST_ENDPOINT: &str = "https://catbox.moe/user/api.php";
pub const DEFAULT_YT_DLP: &str = "yt-dlp";
pub const DEFAULT_FFPROBE: &str = "ffprobe";
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";
pub const DEFAULT_DB_FILE: &str = "sync_db.sqlite";
pub const DEFAULT_METADATA_CACHE_FILE: &str = "metadata_cache.json";
pub const DEFAULT_YOUTUBE_COOKIES_FILE: &str = "youtube_cookies.txt";
pub const DEFAULT_PAUSE_FILE: &str = "PAUSED";
pub const DEFAULT_RUTUBE_CATEGORY_ID: u32 = 13;
pub const DEFAULT_MAX_PRIMARY_UPLOADS: usize = 1;
pub const DEFAULT_MAX_SECONDARY_UPLOADS: usize = 2;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 120;
pub const DEFAULT_RECENT_WINDOW: usize = 5;
pub const DEFAULT_EXPANDED_WINDOW: usize = 50;
pub const DEFAULT_STALE_AFTER_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RutubeCredentials {
    pub login: String,
    pub password: String,
}

/// Upload caps for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBudget {
    pub primary: usize,
    pub secondary: usize,
}

impl Default for RunBudget {
    fn default() -> Self {
        Self {
            primary: DEFAULT_MAX_PRIMARY_UPLOADS,
            secondary: DEFAULT_MAX_SECONDARY_UPLOADS,
        }
    }
}

/// How many uploads to look at, and when to look further back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryWindow {
    pub recent: usize,
    pub expanded: usize,
    pub stale_after_days: i64,
}

impl Default for DiscoveryWindow {
    fn default() -> Self {
        Self {
            recent: DEFAULT_RECENT_WINDOW,
            expanded: DEFAULT_EXPANDED_WINDOW,
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
        }
    }
}

/// Every knob a sync run needs, resolved once at startup and passed down.
#[derive(Debug, Clone)]
pub struct Settings {
    pub rutube: RutubeCredentials,
    pub rutube_api_base: String,
    pub rutube_category_id: u32,
    pub channel_url: String,
    pub public_domain: String,
    pub yt_dlp_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub db_file: PathBuf,
    pub metadata_cache_file: PathBuf,
    pub youtube_cookies: PathBuf,
    pub pause_file: PathBuf,
    /// `None` disables external re-hosting and always uses the local URL.
    pub rehost_endpoint: Option<String>,
    pub tiktok_command: Option<String>,
    pub instagram_command: Option<String>,
    pub budget: RunBudget,
    pub poll: PollPolicy,
    pub window: DiscoveryWindow,
    pub title_blacklist: Vec<String>,
    pub keep_downloads: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub channel_url: Option<String>,
    pub db_file: Option<PathBuf>,
    pub uploads_dir: Option<PathBuf>,
    pub max_primary_uploads: Option<usize>,
    pub max_secondary_uploads: Option<usize>,
    pub env_path: Option<PathBuf>,
}

pub fn resolve_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let env_path = overrides
        .env_path
        .as_deref()
        .unwrap_or_else(|| Path::new(DEFAULT_ENV_PATH));
    let file_vars = read_env_file(env_path)?;
    build_settings_with_overrides(&file_vars, process_env, overrides)
}

#[cfg(test)]
fn build_settings(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<Settings> {
    build_settings_with_overrides(file_vars, env_lookup, SettingsOverrides::default())
}

fn build_settings_with_overrides(
    file_vars: &HashMap<String, String>,
    env_lookup: impl Fn(&str) -> Option<String>,
    overrides: SettingsOverrides,
) -> Result<Settings> {
    let lookup = |key: &str| lookup_value(key, file_vars, &env_lookup);
    let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} not set"));
    let path_or = |key: &str, default: &str| PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()));

    let rutube = RutubeCredentials {
        login: required("RUTUBE_LOGIN")?,
        password: required("RUTUBE_PASSWORD")?,
    };
    let channel_url = match overrides.channel_url.filter(|value| !value.trim().is_empty()) {
        Some(url) => url.trim().to_string(),
        None => required("YOUTUBE_CHANNEL_URL")?,
    };
    let public_domain = required("PUBLIC_DOMAIN")?
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string();

    let rehost_endpoint = match lookup("REHOST_ENDPOINT") {
        Some(value) if matches!(value.to_ascii_lowercase().as_str(), "off" | "none" | "disabled") => None,
        Some(value) => Some(value),
        None => Some(DEFAULT_REHOST_ENDPOINT.to_string()),
    };

    let budget = RunBudget {
        primary: overrides
            .max_primary_uploads
            .or_else(|| parse_value(lookup("MAX_PRIMARY_UPLOADS")))
            .unwrap_or(DEFAULT_MAX_PRIMARY_UPLOADS),
        secondary: overrides
            .max_secondary_uploads
            .or_else(|| parse_value(lookup("MAX_SECONDARY_UPLOADS")))
            .unwrap_or(DEFAULT_MAX_SECONDARY_UPLOADS),
    };

    let poll = PollPolicy {
        interval: Duration::from_secs(
            parse_value(lookup("POLL_INTERVAL_SECS")).unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        ),
        max_attempts: parse_value(lookup("POLL_MAX_ATTEMPTS"))
            .filter(|attempts| *attempts > 0)
            .unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS),
    };

    let window = DiscoveryWindow {
        recent: parse_value(lookup("RECENT_WINDOW"))
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_RECENT_WINDOW),
        expanded: parse_value(lookup("EXPANDED_WINDOW"))
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_EXPANDED_WINDOW),
        stale_after_days: parse_value(lookup("STALE_AFTER_DAYS")).unwrap_or(DEFAULT_STALE_AFTER_DAYS),
    };

    let title_blacklist = lookup("TITLE_BLACKLIST")
        .map(|value| {
            value
                .split(',')
                .map(|word| word.trim().to_lowercase())
                .filter(|word| !word.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(Settings {
        rutube,
        rutube_api_base: lookup("RUTUBE_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_RUTUBE_API_BASE.to_string()),
        rutube_category_id: parse_value(lookup("RUTUBE_CATEGORY_ID"))
            .unwrap_or(DEFAULT_RUTUBE_CATEGORY_ID),
        channel_url,
        public_domain,
        yt_dlp_path: path_or("YT_DLP_PATH", DEFAULT_YT_DLP),
        ffprobe_path: path_or("FFPROBE_PATH", DEFAULT_FFPROBE),
        uploads_dir: overrides
            .uploads_dir
            .unwrap_or_else(|| path_or("UPLOADS_DIR", DEFAULT_UPLOADS_DIR)),
        db_file: overrides
            .db_file
            .unwrap_or_else(|| path_or("DB_FILE", DEFAULT_DB_FILE)),
        metadata_cache_file: path_or("METADATA_CACHE_FILE", DEFAULT_METADATA_CACHE_FILE),
        youtube_cookies: path_or("YOUTUBE_COOKIES_FILE", DEFAULT_YOUTUBE_COOKIES_FILE),
        pause_file: path_or("PAUSE_FILE", DEFAULT_PAUSE_FILE),
        rehost_endpoint,
        tiktok_command: lookup("TIKTOK_UPLOAD_COMMAND"),
        instagram_command: lookup("INSTAGRAM_UPLOAD_COMMAND"),
        budget,
        poll,
        window,
        title_blacklist,
        keep_downloads: lookup("KEEP_DOWNLOADS").is_some_and(|value| parse_flag(&value)),
    })
}

fn parse_value<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|value| value.trim().parse::<T>().ok())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Process environment; blank values count as unset.
fn process_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn lookup_value(
    key: &str,
    file_vars: &HashMap<String, String>,
    env_lookup: &impl Fn(&str) -> Option<String>,
) -> Option<String> {
    env_lookup(key)
        .or_else(|| file_vars.get(key).cloned())
        .filter(|value| !value.trim().is_empty())
}

/// Reads `KEY=value` pairs. A missing file yields no pairs.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };
    Ok(content.lines().filter_map(parse_env_line).collect())
}

/// One `.env` line: comments, blanks and lines without `=` are ignored, an
/// `export ` prefix is dropped and one layer of matching quotes is removed.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_owned(), unquote(value.trim()).to_owned()))
}

fn unquote(value: &str) -> &str {
    ['"', '\'']
        .iter()
        .find_map(|quote| value.strip_prefix(*quote)?.strip_suffix(*quote))
        .unwrap_or(value)
}
