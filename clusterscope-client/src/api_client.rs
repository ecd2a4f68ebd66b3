//! HTTP client for the master's operator API.

use crate::config::{AuthConfig, ClientConfig};
use crate::recordio::{self, RecordIoError};
use crate::transport::{EventStream, GetFlagsResponse, MasterApi, MasterFlags};
use async_trait::async_trait;
use clusterscope_core::MetricsSnapshot;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Not authorized (HTTP {status})")]
    Unauthorized { status: u16 },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("RecordIO error: {0}")]
    RecordIo(#[from] RecordIoError),
    /// A well-framed stream record whose payload is not a valid event.
    #[error("Undecodable event record: {0}")]
    MalformedRecord(#[source] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
}

impl ApiClientError {
    /// Authorization failures are not retried.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    /// The stream framing is intact; only one record was lost.
    pub fn is_malformed_record(&self) -> bool {
        matches!(self, Self::MalformedRecord(_))
    }
}

const OPERATOR_PATH: &str = "/api/v1";
const METRICS_PATH: &str = "/metrics/snapshot";

#[derive(Clone)]
pub struct MasterClient {
    client: reqwest::Client,
    base_url: String,
    auth: Option<AuthConfig>,
}

impl MasterClient {
    /// No request timeout: a subscription stays open indefinitely and a hung
    /// connection surfaces only through the stream ending.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        reqwest::Url::parse(config.base_url())
            .map_err(|e| ApiClientError::Config(format!("master_url: {}", e)))?;
        let client = reqwest::Client::builder()
            .default_headers(default_headers())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            auth: config.auth.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(auth) => request.basic_auth(&auth.principal, Some(&auth.secret)),
            None => request,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        body: &serde_json::Value,
    ) -> Result<T, ApiClientError> {
        let request = self.client.post(self.url(OPERATOR_PATH)).json(body);
        let response = self.authorize(request).send().await?;
        parse_response(response).await
    }
}

#[async_trait]
impl MasterApi for MasterClient {
    async fn subscribe(&self) -> Result<EventStream, ApiClientError> {
        let request = self
            .client
            .post(self.url(OPERATOR_PATH))
            .header(ACCEPT, "application/recordio")
            .header("Message-Accept", "application/json")
            .json(&json!({ "type": "SUBSCRIBE" }));
        let response = check_status(self.authorize(request).send().await?).await?;
        Ok(recordio::decode_stream(response.bytes_stream()))
    }

    async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, ApiClientError> {
        let request = self.client.get(self.url(METRICS_PATH));
        let response = self.authorize(request).send().await?;
        parse_response(response).await
    }

    async fn flags(&self) -> Result<MasterFlags, ApiClientError> {
        let response: GetFlagsResponse = self.call(&json!({ "type": "GET_FLAGS" })).await?;
        Ok(MasterFlags::from_response(response))
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(ApiClientError::Unauthorized {
            status: status.as_u16(),
        });
    }
    let body = response.text().await?;
    Err(ApiClientError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiClientError> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
