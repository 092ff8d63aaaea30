//! Gateway that calls an OpenAI-compatible chat-completions API directly.
//!
//! Both supported providers speak the same streaming wire format, so the response body
//! feeds the same stream parser as the hosted backend.

use crate::catalog::StepCatalog;
use crate::context::Provider;
use crate::error::ApiError;
use crate::gateway::prompt::{build_messages, ChatMessage};
use crate::gateway::{
    build_http_client, into_byte_stream, map_http_error, GenerationGateway, GenerationRequest,
};
use crate::sse::ByteStream;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Where and how to reach one provider
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

pub struct DirectGateway {
    client: Client,
    catalog: StepCatalog,
    endpoints: HashMap<Provider, ProviderEndpoint>,
}

impl DirectGateway {
    pub fn new(
        catalog: StepCatalog,
        endpoints: HashMap<Provider, ProviderEndpoint>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: build_http_client()?,
            catalog,
            endpoints,
        })
    }

    fn endpoint(&self, provider: Provider) -> Result<&ProviderEndpoint, ApiError> {
        self.endpoints.get(&provider).ok_or_else(|| {
            ApiError::ConfigError(format!("Provider '{}' is not configured", provider))
        })
    }
}

#[async_trait]
impl GenerationGateway for DirectGateway {
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, ApiError> {
        let endpoint = self.endpoint(request.provider)?;
        let api_key = endpoint
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ApiError::Unauthenticated)?;
        let (_, step) = self.catalog.require(&request.step)?;

        let body = ChatCompletionRequest {
            model: &endpoint.model,
            messages: build_messages(step, request),
            temperature: endpoint.temperature,
            max_tokens: endpoint.max_tokens,
            stream: true,
        };

        let url = format!("{}/chat/completions", endpoint.base_url.trim_end_matches('/'));
        debug!(url = %url, model = %endpoint.model, step = %request.step, "Opening provider stream");
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        into_byte_stream(response).await
    }

    fn name(&self) -> &str {
        "direct"
    }
}
