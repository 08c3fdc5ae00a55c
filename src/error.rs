#![forbid(unsafe_code)]

//! Error taxonomy for a sync run.
//!
//! Only `Auth` and `Store` abort the whole run. Everything else is scoped to
//! the video being processed: the orchestrator logs it and moves on, leaving
//! the row unmarked so the next invocation retries.

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("sync store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("network error: {0}")]
    Transport(String),

    #[error("destination rejected the request: {0}")]
    Rejected(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SyncError {
    /// Fatal errors end the run; the rest only skip the current video.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::Store(_))
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        SyncError::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

impl From<ureq::Error> for SyncError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                let url = response.get_url().to_string();
                let body = response.into_string().unwrap_or_default();
                SyncError::Rejected(format!("{url} returned {code}: {}", body.trim()))
            }
            ureq::Error::Transport(transport) => SyncError::Transport(transport.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_and_store_are_fatal() {
        assert!(SyncError::Auth("bad password".into()).is_fatal());
        assert!(SyncError::Store(anyhow::anyhow!("disk full")).is_fatal());
        assert!(!SyncError::Transport("reset".into()).is_fatal());
        assert!(!SyncError::Rejected("422".into()).is_fatal());
        assert!(!SyncError::Download("blocked".into()).is_fatal());
        assert!(!SyncError::tool("ffprobe", "missing").is_fatal());
    }

    #[test]
    fn tool_error_mentions_tool_name() {
        let err = SyncError::tool("yt-dlp", "exit status 1");
        assert_eq!(err.to_string(), "yt-dlp failed: exit status 1");
    }
}
