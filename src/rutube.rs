#![forbid(unsafe_code)]

//! Blocking client for the handful of Rutube REST endpoints the sync needs.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::RutubeCredentials;
use crate::error::{SyncError, SyncResult};
use crate::orchestrator::Destination;
use crate::poller::{FailureKind, RemoteStatus, StatusSource};

/// Upper bound on followed `next` links, in case the API ever loops.
const MAX_LISTING_PAGES: usize = 500;

/// A video already present on the Rutube account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVideo {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RutubeClient {
    base: String,
    agent: ureq::Agent,
    token: String,
    category_id: u32,
}

fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(30))
        .timeout_read(Duration::from_secs(60))
        .build()
}

impl RutubeClient {
    /// Exchanges login and password for an API token. Any failure here is an
    /// `Auth` error and ends the run.
    pub fn authenticate(
        base: &str,
        credentials: &RutubeCredentials,
        category_id: u32,
    ) -> SyncResult<Self> {
        let base = base.trim_end_matches('/').to_owned();
        let agent = build_agent();
        let url = format!("{base}/api/accounts/token_auth/");
        let response = agent
            .post(&url)
            .send_form(&[
                ("username", credentials.login.as_str()),
                ("password", credentials.password.as_str()),
            ])
            .map_err(|err| SyncError::Auth(SyncError::from(err).to_string()))?;
        let body: TokenResponse = response
            .into_json()
            .map_err(|err| SyncError::Auth(format!("unreadable token response: {err}")))?;
        let token = body
            .token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| SyncError::Auth("token missing from response".into()))?;
        info!("authenticated against {base}");
        Ok(Self {
            base,
            agent,
            token,
            category_id,
        })
    }

    /// Client for an already issued token.
    pub fn with_token(base: &str, token: impl Into<String>, category_id: u32) -> Self {
        Self {
            base: base.trim_end_matches('/').to_owned(),
            agent: build_agent(),
            token: token.into(),
            category_id,
        }
    }

    fn authorization(&self) -> String {
        format!("Token {}", self.token)
    }

    fn get_json(&self, url: &str) -> SyncResult<Value> {
        let response = self
            .agent
            .get(url)
            .set("Authorization", &self.authorization())
            .call()?;
        Ok(response.into_json()?)
    }

    /// Asks Rutube to ingest `video_url`. Returns the new Rutube video id.
    pub fn submit(&self, video_url: &str, title: &str, description: &str) -> SyncResult<String> {
        let url = format!("{}/api/video/", self.base);
        let payload = json!({
            "url": video_url,
            "title": title,
            "is_hidden": false,
            "category_id": self.category_id,
            "description": description,
        });
        let response = self
            .agent
            .post(&url)
            .set("Authorization", &self.authorization())
            .send_json(payload)?;

        let status = response.status();
        let text = response.into_string()?;
        if status != 200 && status != 201 {
            return Err(SyncError::Rejected(format!("{url} returned {status}: {text}")));
        }
        let body: Value = serde_json::from_str(&text)?;
        match extract_id(&body, &["id", "video_id"]) {
            Some(id) => {
                info!("submitted, Rutube id {id}");
                Ok(id)
            }
            None => Err(SyncError::Rejected(format!(
                "upload accepted without a video id: {text}"
            ))),
        }
    }

    /// Numeric id of the account the token belongs to.
    pub fn account_id(&self) -> SyncResult<String> {
        let mut last_error = None;
        for path in ["/api/profile/user/", "/api/accounts/profile/"] {
            match self.get_json(&format!("{}{path}", self.base)) {
                Ok(body) => match extract_id(&body, &["id"]) {
                    Some(id) => return Ok(id),
                    None => {
                        last_error = Some(SyncError::Rejected(format!("{path} returned no id")))
                    }
                },
                Err(err) => {
                    debug!("profile lookup via {path} failed: {err}");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| SyncError::Rejected("profile lookup failed".into())))
    }

    /// Every video on the account, following `next` links page by page.
    pub fn list_account_videos(&self) -> SyncResult<Vec<RemoteVideo>> {
        let user_id = self.account_id()?;
        let mut next = Some(format!("{}/api/video/person/{user_id}/?limit=50", self.base));
        let mut videos = Vec::new();
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_LISTING_PAGES {
                warn!("stopping account listing after {MAX_LISTING_PAGES} pages");
                break;
            }
            let page: ListingPage = serde_json::from_value(self.get_json(&url)?)?;
            videos.extend(page.results.iter().filter_map(|entry| {
                Some(RemoteVideo {
                    id: extract_id(entry, &["id"])?,
                    title: entry.get("title")?.as_str()?.to_owned(),
                })
            }));
            next = page.next.filter(|link| !link.is_empty());
        }

        debug!("account {user_id} holds {} video(s)", videos.len());
        Ok(videos)
    }
}

impl Destination for RutubeClient {
    fn submit(&self, video_url: &str, title: &str, description: &str) -> SyncResult<String> {
        RutubeClient::submit(self, video_url, title, description)
    }
}

impl StatusSource for RutubeClient {
    fn check_status(&self, remote_id: &str) -> SyncResult<RemoteStatus> {
        let body = self.get_json(&format!("{}/api/video/{remote_id}/", self.base))?;
        Ok(classify_status(&body))
    }
}

/// Maps a `GET /api/video/<id>/` body to a processing state.
///
/// `ready`, or an `action_reason` of `moderation`, counts as done. `error` is
/// a failure. `is_deleted` is a failure unless the reason is
/// `downloading_video`, which Rutube reports while it is still fetching the
/// source.
pub fn classify_status(body: &Value) -> RemoteStatus {
    let status = body.get("status").and_then(Value::as_str);
    let reason = body
        .get("action_reason")
        .and_then(|reason| reason.get("name"))
        .and_then(Value::as_str);
    let is_deleted = body
        .get("is_deleted")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if status == Some("ready") || reason == Some("moderation") {
        RemoteStatus::Ready
    } else if status == Some("error") {
        RemoteStatus::Failed {
            kind: FailureKind::Error,
            reason: reason.map(str::to_owned),
        }
    } else if is_deleted && reason != Some("downloading_video") {
        RemoteStatus::Failed {
            kind: FailureKind::Deleted,
            reason: reason.map(str::to_owned),
        }
    } else {
        RemoteStatus::Pending {
            status: status.map(str::to_owned),
        }
    }
}

/// First of `keys` holding a non-empty string or a number.
fn extract_id(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match body.get(key)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}
