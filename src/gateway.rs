//! Remote Generation Gateway
//!
//! A gateway takes one generation request, performs a single authenticated POST, and
//! hands back the raw response body for the stream parser. No retries, no backoff:
//! every failure goes straight back to the caller.
//!
//! Two implementations are provided: `BackendGateway` posts to the hosted generation
//! function, `DirectGateway` builds the prompt itself and talks to the provider's
//! chat-completions API.

use crate::context::{GenerationContext, Provider};
use crate::error::ApiError;
use crate::sse::ByteStream;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub mod backend;
pub mod direct;
pub mod prompt;

pub use backend::BackendGateway;
pub use direct::{DirectGateway, ProviderEndpoint};

/// Body of a generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub product_input: String,
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_context: Option<String>,
    pub provider: Provider,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_context: Option<GenerationContext>,
}

/// Opens a streamed generation
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Issue the request and return the response body as a byte stream.
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, ApiError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streaming client: connect timeout only, a long generation must not be cut off.
pub(crate) fn build_http_client() -> Result<Client, ApiError> {
    Client::builder()
        .no_proxy()
        .connect_timeout(HTTP_CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))
}

pub(crate) fn map_http_error(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Transport(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        ApiError::Transport(format!("Connection error: {}", error))
    } else {
        ApiError::Transport(format!("HTTP error: {}", error))
    }
}

/// Turn a response into a body stream, or the matching failure.
pub(crate) async fn into_byte_stream(response: Response) -> Result<ByteStream, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(ApiError::RequestRejected {
            status: status.as_u16(),
            message,
        });
    }
    if response.content_length() == Some(0) {
        return Err(ApiError::StreamUnavailable);
    }
    Ok(response
        .bytes_stream()
        .map(|chunk| chunk.map_err(map_http_error))
        .boxed())
}

/// Server-supplied error text: `{"error": "..."}` or `{"error": {"message": "..."}}`,
/// falling back to the raw body.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let error = value.get("error");
        if let Some(message) = error.and_then(Value::as_str) {
            return Some(message.to_string());
        }
        if let Some(message) = error
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
        {
            return Some(message.to_string());
        }
    }
    Some(trimmed.to_string())
}
