//! HTTP client for the discussion backend.
//!
//! All endpoints live under `{base_url}/api/v1`. Authenticated calls send
//! the stored token as a bearer credential. A non-2xx response whose body
//! carries a JSON `detail` field surfaces that text as
//! [`ViewerError::Rejected`]; any other non-2xx becomes [`ViewerError::Http`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::model::{
    CreatedDiscussion, DiscussionSnapshot, ProgressUpdate, TokenResponse, TurnRequest,
};
use crate::orchestration::ProgressSource;
use crate::poller::DiscussionSource;

/// Connection settings for [`ApiClient`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend origin without the `/api/v1` prefix.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ApiConfig {
    /// Defaults: 3 s connect timeout, 15 s request timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            connect_timeout: Duration::from_secs(3),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// A file attached to a new discussion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub async fn from_path(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self { file_name, bytes })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

pub struct ApiClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn builder(base_url: impl Into<String>) -> ApiClientBuilder {
        ApiClientBuilder::new(base_url)
    }

    pub fn from_config(cfg: &ViewerConfig) -> Self {
        Self::builder(cfg.api_root())
            .connect_timeout(cfg.connect_timeout())
            .request_timeout(cfg.request_timeout())
            .build()
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.config.base_url)
    }

    /// `POST /login/token` with form fields `username` and `password`.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let url = self.url("/login/token");
        let req = self
            .client
            .post(&url)
            .form(&[("username", email), ("password", password)]);
        let bytes = self.send(req, &url).await?.bytes().await.map_err(ViewerError::malformed)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `POST /discussions/` as multipart (`topic` plus optional `file`).
    /// The backend answers 202 and orchestrates in the background.
    pub async fn create_discussion(
        &self,
        token: &str,
        topic: &str,
        file: Option<Upload>,
    ) -> Result<CreatedDiscussion> {
        let url = self.url("/discussions/");
        let mut form = Form::new().text("topic", topic.to_string());
        if let Some(upload) = file {
            form = form.part("file", Part::bytes(upload.bytes).file_name(upload.file_name));
        }
        let req = self.client.post(&url).bearer_auth(token).multipart(form);
        let bytes = self.send(req, &url).await?.bytes().await.map_err(ViewerError::malformed)?;
        let created: CreatedDiscussion = serde_json::from_slice(&bytes)?;
        debug!(discussion_id = %created.discussion_id, "discussion created");
        Ok(created)
    }

    /// `GET /discussions/{id}`.
    pub async fn get_discussion(&self, discussion_id: &str, token: &str) -> Result<DiscussionSnapshot> {
        let url = self.url(&format!("/discussions/{discussion_id}"));
        let req = self.client.get(&url).bearer_auth(token);
        let bytes = self.send(req, &url).await?.bytes().await.map_err(ViewerError::malformed)?;
        DiscussionSnapshot::from_slice(&bytes)
    }

    /// `GET /discussions/{id}/progress`.
    pub async fn get_progress(&self, discussion_id: &str, token: &str) -> Result<ProgressUpdate> {
        let url = self.url(&format!("/discussions/{discussion_id}/progress"));
        let req = self.client.get(&url).bearer_auth(token);
        let bytes = self.send(req, &url).await?.bytes().await.map_err(ViewerError::malformed)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `POST /discussions/{id}/turns`.
    pub async fn submit_turn(&self, discussion_id: &str, token: &str, body: &TurnRequest) -> Result<()> {
        let url = self.url(&format!("/discussions/{discussion_id}/turns"));
        let req = self.client.post(&url).bearer_auth(token).json(body);
        self.send(req, &url).await.map(drop)
    }

    /// `POST /discussions/{id}/complete`; the report is produced in the
    /// background and appears on a later snapshot.
    pub async fn complete(&self, discussion_id: &str, token: &str) -> Result<()> {
        let url = self.url(&format!("/discussions/{discussion_id}/complete"));
        let req = self.client.post(&url).bearer_auth(token);
        self.send(req, &url).await.map(drop)
    }

    /// `POST /discussions/{id}/archive`: end without a report.
    pub async fn archive(&self, discussion_id: &str, token: &str) -> Result<()> {
        let url = self.url(&format!("/discussions/{discussion_id}/archive"));
        let req = self.client.post(&url).bearer_auth(token);
        self.send(req, &url).await.map(drop)
    }

    async fn send(&self, req: RequestBuilder, url: &str) -> Result<Response> {
        let resp = req.send().await.map_err(|e| ViewerError::Connect {
            url: url.to_string(),
            detail: e.to_string(),
        })?;
        check_status(resp, url).await
    }
}

async fn check_status(resp: Response, url: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ViewerError::Unauthorized);
    }
    let body = resp.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail)
        .map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
    Err(match detail {
        Some(detail) => ViewerError::Rejected { status: status.as_u16(), detail },
        None => ViewerError::Http { status: status.as_u16(), url: url.to_string() },
    })
}

#[async_trait]
impl DiscussionSource for ApiClient {
    async fn fetch_discussion(&self, discussion_id: &str, token: &str) -> Result<DiscussionSnapshot> {
        self.get_discussion(discussion_id, token).await
    }
}

#[async_trait]
impl ProgressSource for ApiClient {
    async fn fetch_progress(&self, discussion_id: &str, token: &str) -> Result<ProgressUpdate> {
        self.get_progress(discussion_id, token).await
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder {
    config: ApiConfig,
}

impl ApiClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { config: ApiConfig::new(base_url) }
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> ApiClient {
        // Builder failure only happens when the TLS backend cannot load;
        // the default client is still usable for plain HTTP.
        let client = reqwest::Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .build()
            .unwrap_or_default();
        ApiClient { config: self.config, client }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
