#![forbid(unsafe_code)]

//! Secondary destinations (TikTok, Instagram) driven through external upload
//! commands, plus the orientation and caption helpers they need.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};
use crate::store::Platform;

/// Longest caption handed to a secondary uploader, in characters.
pub const MAX_CAPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Vertical,
    Horizontal,
    Square,
}

impl Orientation {
    /// `None` when either side is zero.
    pub fn from_dimensions(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        Some(match height.cmp(&width) {
            std::cmp::Ordering::Greater => Orientation::Vertical,
            std::cmp::Ordering::Less => Orientation::Horizontal,
            std::cmp::Ordering::Equal => Orientation::Square,
        })
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Orientation::Vertical => "vertical",
            Orientation::Horizontal => "horizontal",
            Orientation::Square => "square",
        })
    }
}

pub trait OrientationDetector: Send + Sync {
    fn detect(&self, path: &Path) -> SyncResult<Orientation>;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Reads the first video stream's dimensions with `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeDetector {
    program: PathBuf,
}

impl FfprobeDetector {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl OrientationDetector for FfprobeDetector {
    fn detect(&self, path: &Path) -> SyncResult<Orientation> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-select_streams", "v:0"])
            .args(["-show_entries", "stream=width,height", "-of", "json"])
            .arg(path)
            .output()
            .map_err(|err| SyncError::tool("ffprobe", err.to_string()))?;
        if !output.status.success() {
            return Err(SyncError::tool(
                "ffprobe",
                format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }
        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)?;
        let stream = parsed
            .streams
            .first()
            .ok_or_else(|| SyncError::tool("ffprobe", "no video stream"))?;
        match (stream.width, stream.height) {
            (Some(width), Some(height)) => Orientation::from_dimensions(width, height)
                .ok_or_else(|| SyncError::tool("ffprobe", "zero-sized video stream")),
            _ => Err(SyncError::tool("ffprobe", "stream has no dimensions")),
        }
    }
}

/// Description cut to `MAX_CAPTION_CHARS`, or the title when the description
/// is blank.
pub fn build_caption(title: &str, description: &str) -> String {
    if description.trim().is_empty() {
        title.to_owned()
    } else {
        description.chars().take(MAX_CAPTION_CHARS).collect()
    }
}

pub trait SecondaryUploader: Send + Sync {
    fn platform(&self) -> Platform;

    /// Short-form destinations only take portrait video.
    fn vertical_only(&self) -> bool {
        true
    }

    fn upload(&self, path: &Path, caption: &str) -> SyncResult<()>;
}

/// Runs `<command> <video_path> <caption>`; exit status 0 is success.
/// Extra whitespace-separated words in `command` are passed first.
#[derive(Debug, Clone)]
pub struct CommandUploader {
    platform: Platform,
    program: String,
    leading_args: Vec<String>,
}

impl CommandUploader {
    pub fn new(platform: Platform, command: &str) -> SyncResult<Self> {
        let mut words = command.split_whitespace().map(str::to_owned);
        let program = words.next().ok_or_else(|| {
            SyncError::tool(platform.to_string(), "upload command is empty")
        })?;
        Ok(Self {
            platform,
            program,
            leading_args: words.collect(),
        })
    }
}

impl SecondaryUploader for CommandUploader {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn upload(&self, path: &Path, caption: &str) -> SyncResult<()> {
        info!("handing {} to the {} uploader", path.display(), self.platform);
        let output = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(path)
            .arg(caption)
            .output()
            .map_err(|err| SyncError::tool(format!("{} uploader", self.platform), err.to_string()))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("{} uploader said: {}", self.platform, stdout.trim());
        }
        if output.status.success() {
            Ok(())
        } else {
            Err(SyncError::tool(
                format!("{} uploader", self.platform),
                format!(
                    "exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn install_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
        let script_path = dir.join(name);
        fs::write(&script_path, format!("#!/usr/bin/env bash\n{body}\n"))?;
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&script_path)?.permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms)?;
        }
        Ok(script_path)
    }

    #[test]
    fn orientation_from_dimensions() {
        assert_eq!(Orientation::from_dimensions(1080, 1920), Some(Orientation::Vertical));
        assert_eq!(Orientation::from_dimensions(1920, 1080), Some(Orientation::Horizontal));
        assert_eq!(Orientation::from_dimensions(720, 720), Some(Orientation::Square));
        assert_eq!(Orientation::from_dimensions(0, 720), None);
    }

    #[test]
    fn caption_prefers_description() {
        assert_eq!(build_caption("Title", "Body text"), "Body text");
        assert_eq!(build_caption("Title", "  \n"), "Title");
    }

    #[test]
    fn caption_is_truncated_by_characters() {
        let long = "я".repeat(MAX_CAPTION_CHARS + 50);
        let caption = build_caption("T", &long);
        assert_eq!(caption.chars().count(), MAX_CAPTION_CHARS);
    }

    #[test]
    fn ffprobe_output_is_parsed() -> Result<()> {
        let dir = tempdir()?;
        let stub = install_script(
            dir.path(),
            "ffprobe",
            r#"echo '{"programs": [], "streams": [{"width": 1080, "height": 1920}]}'"#,
        )?;
        let detector = FfprobeDetector::new(stub);
        assert_eq!(detector.detect(Path::new("video.mp4"))?, Orientation::Vertical);
        Ok(())
    }

    #[test]
    fn ffprobe_without_streams_is_a_tool_error() -> Result<()> {
        let dir = tempdir()?;
        let stub = install_script(dir.path(), "ffprobe", r#"echo '{"streams": []}'"#)?;
        let err = FfprobeDetector::new(stub)
            .detect(Path::new("video.mp4"))
            .unwrap_err();
        assert!(matches!(err, SyncError::Tool { .. }));
        Ok(())
    }

    #[test]
    fn command_uploader_passes_path_and_caption() -> Result<()> {
        let dir = tempdir()?;
        let log = dir.path().join("args.log");
        let stub = install_script(
            dir.path(),
            "tiktok-upload",
            &format!(r#"printf '%s\n' "$@" > "{}""#, log.display()),
        )?;
        let uploader = CommandUploader::new(
            Platform::TikTok,
            &format!("{} --headless", stub.display()),
        )?;
        uploader.upload(Path::new("/tmp/abc.mp4"), "Caption with spaces")?;

        let args = fs::read_to_string(&log)?;
        assert_eq!(
            args.lines().collect::<Vec<_>>(),
            vec!["--headless", "/tmp/abc.mp4", "Caption with spaces"]
        );
        assert_eq!(uploader.platform(), Platform::TikTok);
        Ok(())
    }

    #[test]
    fn failing_uploader_is_reported() -> Result<()> {
        let dir = tempdir()?;
        let stub = install_script(dir.path(), "insta-upload", "echo 'login expired' >&2; exit 3")?;
        let uploader = CommandUploader::new(Platform::Instagram, &stub.display().to_string())?;
        let err = uploader
            .upload(Path::new("/tmp/abc.mp4"), "caption")
            .unwrap_err();
        assert!(err.to_string().contains("login expired"));
        assert!(!err.is_fatal());
        Ok(())
    }

    #[test]
    fn empty_command_is_rejected() {
        assert!(CommandUploader::new(Platform::TikTok, "   ").is_err());
    }
}
