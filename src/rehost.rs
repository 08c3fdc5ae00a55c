#![forbid(unsafe_code)]

//! Getting a publicly fetchable URL for a local video file.
//!
//! Rutube ingests by URL, so the downloaded file has to live somewhere it can
//! reach. An anonymous file host is tried first; the box's own static path is
//! the fallback.

use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::blocking::multipart::Form;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};

pub trait Rehoster: Send + Sync {
    /// Uploads the file and returns its public URL.
    fn rehost(&self, path: &Path) -> SyncResult<String>;
}

/// `https://<domain>/rutube-webhook/static/<file_name>`.
pub fn local_fallback_url(public_domain: &str, file_name: &str) -> String {
    format!("https://{public_domain}/rutube-webhook/static/{file_name}")
}

/// External host first, local static URL when that fails or is disabled.
pub fn public_url_for(
    rehoster: Option<&dyn Rehoster>,
    path: &Path,
    public_domain: &str,
    video_id: &str,
) -> String {
    if let Some(rehoster) = rehoster {
        match rehoster.rehost(path) {
            Ok(url) => {
                info!("external URL: {url}");
                return url;
            }
            Err(err) => warn!("external re-host failed, using local URL: {err}"),
        }
    }
    local_fallback_url(public_domain, &format!("{video_id}.mp4"))
}

/// Catbox-compatible endpoint: multipart `reqtype=fileupload` plus
/// `fileToUpload`, plain-text URL in the response body.
#[derive(Debug, Clone)]
pub struct CatboxRehoster {
    endpoint: String,
    connect_timeout: Duration,
    timeout: Duration,
}

impl CatboxRehoster {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(30),
            timeout: Duration::from_secs(600),
        }
    }

    fn upload(&self, path: &Path) -> SyncResult<String> {
        let client = Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .build()
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let form = Form::new()
            .text("reqtype", "fileupload")
            .file("fileToUpload", path)?;

        info!("uploading {} to {}", path.display(), self.endpoint);
        let response = client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(SyncError::Rejected(format!(
                "{} returned {}: {}",
                self.endpoint,
                status.as_u16(),
                body.trim()
            )));
        }

        let url = body.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            Ok(url.to_owned())
        } else {
            Err(SyncError::Rejected(format!(
                "{} answered without a URL: {url}",
                self.endpoint
            )))
        }
    }
}

impl Rehoster for CatboxRehoster {
    /// The blocking client owns a runtime of its own, so it runs on a plain
    /// worker thread outside the caller's tokio context.
    fn rehost(&self, path: &Path) -> SyncResult<String> {
        thread::scope(|scope| scope.spawn(|| self.upload(path)).join())
            .unwrap_or_else(|_| Err(SyncError::Transport("re-host worker panicked".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use wiremock::matchers::{body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FailingRehoster;

    impl Rehoster for FailingRehoster {
        fn rehost(&self, _path: &Path) -> SyncResult<String> {
            Err(SyncError::Transport("connection refused".into()))
        }
    }

    #[test]
    fn fallback_url_uses_public_domain() {
        assert_eq!(
            local_fallback_url("mirror.example.org", "abc123.mp4"),
            "https://mirror.example.org/rutube-webhook/static/abc123.mp4"
        );
    }

    #[test]
    fn failed_rehost_falls_back_to_local_url() {
        let url = public_url_for(
            Some(&FailingRehoster),
            Path::new("uploads/abc123.mp4"),
            "mirror.example.org",
            "abc123",
        );
        assert_eq!(
            url,
            "https://mirror.example.org/rutube-webhook/static/abc123.mp4"
        );
    }

    #[test]
    fn disabled_rehost_uses_local_url() {
        let url = public_url_for(None, Path::new("x.mp4"), "host", "x");
        assert_eq!(url, "https://host/rutube-webhook/static/x.mp4");
    }

    /// Called straight from async code, the way the orchestrator calls it.
    #[tokio::test(flavor = "multi_thread")]
    async fn catbox_upload_returns_trimmed_url() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/user/api.php"))
            .and(header_regex("content-type", "^multipart/form-data; boundary="))
            .and(body_string_contains("name=\"reqtype\""))
            .and(body_string_contains("fileupload"))
            .and(body_string_contains("filename=\"abc123.mp4\""))
            .and(body_string_contains("VIDEO-BYTES"))
            .respond_with(ResponseTemplate::new(200).set_body_string("https://files.catbox.moe/x1y2.mp4\n"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let file = dir.path().join("abc123.mp4");
        fs::write(&file, "VIDEO-BYTES")?;
        let rehoster = CatboxRehoster::new(format!("{}/user/api.php", server.uri()));

        let url = rehoster.rehost(&file)?;
        assert_eq!(url, "https://files.catbox.moe/x1y2.mp4");
        Ok(())
    }

    #[tokio::test]
    async fn catbox_error_is_rejected() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(412).set_body_string("File too large"))
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let file = dir.path().join("big.mp4");
        fs::write(&file, "data")?;
        let rehoster = CatboxRehoster::new(format!("{}/user/api.php", server.uri()));

        let result = tokio::task::spawn_blocking(move || rehoster.rehost(&file)).await?;
        match result {
            Err(SyncError::Rejected(message)) => assert!(message.contains("412")),
            other => panic!("expected rejection, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn non_url_body_is_rejected() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("error: bad request"))
            .mount(&server)
            .await;

        let dir = tempdir()?;
        let file = dir.path().join("a.mp4");
        fs::write(&file, "data")?;
        let rehoster = CatboxRehoster::new(server.uri());

        let result = tokio::task::spawn_blocking(move || rehoster.rehost(&file)).await?;
        assert!(matches!(result, Err(SyncError::Rejected(_))));
        Ok(())
    }
}
