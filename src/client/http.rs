// reqwest-backed transport with boundary error classification
use async_trait::async_trait;

use super::{ApiConfig, ApiError, ApiRequest, ApiResponse, Transport};

/// HTTP transport for the upstream API. Connection and timeout failures,
/// and non-success statuses, are turned into `ApiError` here so the retry
/// layer only ever sees classified errors.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;
        Ok(Self { client })
    }
}

fn classify(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_connect() {
        ApiError::Connect(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(ApiError::Status(status));
        }

        let body = response.bytes().await.map_err(classify)?.to_vec();
        Ok(ApiResponse { status, body })
    }
}
