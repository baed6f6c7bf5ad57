//! HTTP client for the pipeline server's JSON endpoints.
//!
//! Responses are judged by their JSON payloads (`ok` / `status` fields), not
//! by HTTP status codes; the server answers meaningful JSON even on auth
//! failures. A body that cannot be parsed is a decode failure, which callers
//! treat as their own error kind, distinct from a job-reported error.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    AccountAction, AccountsResponse, AckResponse, BatchRef, ChannelsResponse, DownloadRequest,
    DownloadSelectedRequest, JobAccepted, MergeRequest, MergedFolder, ScheduleRequest,
    SuggestedResponse, TaskState, UploadAllRequest, UploadRequest,
};

/// Header carrying the security token on mutating requests.
const TOKEN_HEADER: &str = "X-CSRFToken";

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connect, timeout, I/O).
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    /// The response body was not the JSON we expect.
    #[error("invalid response body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("cannot read {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Build a client for `base_url`. The token is sourced once at startup
    /// and attached to every mutating request for the client's lifetime.
    pub fn new(
        base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Transport)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let res = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(ApiError::Transport)?;
        res.json::<T>().await.map_err(ApiError::Decode)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let mut req = self.http.post(self.url(path)).json(body);
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        let res = req.send().await.map_err(ApiError::Transport)?;
        res.json::<T>().await.map_err(ApiError::Decode)
    }

    // --- tasks ---

    pub async fn task_state(&self, task_id: &str) -> Result<TaskState, ApiError> {
        self.get_json(&format!("/api/task/{task_id}")).await
    }

    // --- accounts ---

    pub async fn list_accounts(&self) -> Result<Vec<crate::model::Account>, ApiError> {
        self.get_json("/api/accounts").await
    }

    pub async fn accounts_action(
        &self,
        action: &AccountAction,
    ) -> Result<AccountsResponse, ApiError> {
        self.post_json("/api/accounts", action).await
    }

    pub async fn suggested_accounts(&self) -> Result<SuggestedResponse, ApiError> {
        self.get_json("/api/suggested-accounts").await
    }

    // --- jobs ---

    pub async fn download(&self, req: &DownloadRequest) -> Result<JobAccepted, ApiError> {
        self.post_json("/api/download", req).await
    }

    pub async fn download_selected(
        &self,
        req: &DownloadSelectedRequest,
    ) -> Result<JobAccepted, ApiError> {
        self.post_json("/api/download-selected", req).await
    }

    pub async fn merge(&self, req: &MergeRequest) -> Result<JobAccepted, ApiError> {
        self.post_json("/api/merge", req).await
    }

    pub async fn upload(&self, req: &UploadRequest) -> Result<JobAccepted, ApiError> {
        self.post_json("/api/upload", req).await
    }

    pub async fn upload_all(&self, req: &UploadAllRequest) -> Result<JobAccepted, ApiError> {
        self.post_json("/api/upload-all", req).await
    }

    /// Multipart upload of a single local video file.
    pub async fn upload_file(
        &self,
        path: &Path,
        title: &str,
        privacy: &str,
        channel_id: Option<&str>,
    ) -> Result<JobAccepted, ApiError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("title", title.to_string())
            .text("privacy", privacy.to_string());
        if let Some(id) = channel_id {
            form = form.text("channel_id", id.to_string());
        }

        let mut req = self.http.post(self.url("/api/upload-file")).multipart(form);
        if let Some(token) = &self.token {
            req = req.header(TOKEN_HEADER, token);
        }
        let res = req.send().await.map_err(ApiError::Transport)?;
        res.json::<JobAccepted>().await.map_err(ApiError::Decode)
    }

    // --- collections ---

    pub async fn merged_folders(&self) -> Result<Vec<MergedFolder>, ApiError> {
        self.get_json("/api/merged-folders").await
    }

    pub async fn channels(&self) -> Result<ChannelsResponse, ApiError> {
        self.get_json("/api/youtube/channels").await
    }

    pub async fn refresh_channels(&self) -> Result<ChannelsResponse, ApiError> {
        self.post_json("/api/youtube/refresh", &serde_json::json!({}))
            .await
    }

    // --- synchronous maintenance calls ---

    pub async fn clear_batch(&self, batch: &BatchRef) -> Result<AckResponse, ApiError> {
        self.post_json("/api/clear-batch", batch).await
    }

    pub async fn open_folder(&self, batch: &BatchRef) -> Result<AckResponse, ApiError> {
        self.post_json("/api/open-folder", batch).await
    }

    pub async fn save_schedule(&self, req: &ScheduleRequest) -> Result<AckResponse, ApiError> {
        self.post_json("/api/schedule", req).await
    }
}
