use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    Client, StatusCode,
    header::{CONTENT_TYPE, HeaderName},
};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

pub const IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("idempotency-key");

/// A successful backend reply. The body is handed back as-is; callers decide
/// what shape, if any, to decode it into.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server responded with {status}")]
    Status { status: StatusCode, body: Bytes },
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// HTTP collaborator used by mutations and queries.
///
/// Implementations must treat every non-2xx reply as an error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        path: &str,
        body: Bytes,
        idempotency_key: Option<&str>,
    ) -> Result<ApiResponse, TransportError>;

    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base))
    }

    pub fn with_client(client: Client, mut base: Url) -> Self {
        // without the trailing slash `join` would replace the last segment
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self { client, base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base.join(path.trim_start_matches('/'))
    }

    async fn settle(response: reqwest::Response) -> Result<ApiResponse, TransportError> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            Ok(ApiResponse { status, body })
        } else {
            Err(TransportError::Status { status, body })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(name = "transport::post_json", skip(self, body), fields(len = body.len()))]
    async fn post_json(
        &self,
        path: &str,
        body: Bytes,
        idempotency_key: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint(path)?;

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_KEY_HEADER, key);
        }

        Self::settle(request.send().await?).await
    }

    #[tracing::instrument(name = "transport::get", skip(self))]
    async fn get(&self, path: &str) -> Result<ApiResponse, TransportError> {
        let url = self.endpoint(path)?;
        Self::settle(self.client.get(url).send().await?).await
    }
}
