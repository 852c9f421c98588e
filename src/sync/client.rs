//! HTTP client for the five protocol endpoints.

use crate::protocol::{
    File, PushRequest, PushStatus, ReadRequest, SyncRequest, SyncResponse, UnlockRequest,
    UnlockStatus, WatchRequest, WatchResponse,
};
use crate::sync::urls::{build_url, normalize_server_url};
use crate::sync::SyncError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct SyncClient {
    http: Client,
    server: String,
}

impl SyncClient {
    /// Client for the server at `address` (`host:port` or a full URL).
    pub fn new(address: &str) -> Self {
        Self::with_client(Client::new(), address)
    }

    pub fn with_client(http: Client, address: &str) -> Self {
        Self {
            http,
            server: normalize_server_url(address),
        }
    }

    /// Base URL of the server.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncResponse, SyncError> {
        self.post_json("sync", request).await
    }

    pub async fn read(&self, key: &str, target: &File) -> Result<File, SyncError> {
        let request = ReadRequest {
            key: key.to_string(),
            target: target.to_reference(),
        };
        self.post_json("read", &request).await
    }

    pub async fn watch(&self, key: &str, target: &File) -> Result<WatchResponse, SyncError> {
        let request = WatchRequest {
            key: key.to_string(),
            target: target.to_reference(),
        };
        self.post_json("watch", &request).await
    }

    pub async fn push(&self, key: &str, updated: File) -> Result<PushStatus, SyncError> {
        let request = PushRequest {
            key: key.to_string(),
            updated,
        };
        let line = self.post_for_text("push", &request).await?;
        PushStatus::parse(&line).ok_or(SyncError::UnexpectedReply(line))
    }

    pub async fn unlock(&self, key: &str) -> Result<UnlockStatus, SyncError> {
        let request = UnlockRequest {
            key: key.to_string(),
        };
        let line = self.post_for_text("unlock", &request).await?;
        UnlockStatus::parse(&line).ok_or(SyncError::UnexpectedReply(line))
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response, SyncError> {
        let url = build_url(&self.server, endpoint);
        let resp = self.http.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Status { status, body });
        }
        Ok(resp)
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, SyncError> {
        Ok(self.post(endpoint, body).await?.json().await?)
    }

    async fn post_for_text<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, SyncError> {
        Ok(self.post(endpoint, body).await?.text().await?)
    }
}
