//! Gateway to the hosted generation function.

use crate::error::ApiError;
use crate::gateway::{
    build_http_client, into_byte_stream, map_http_error, GenerationGateway, GenerationRequest,
};
use crate::session::Session;
use crate::sse::ByteStream;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

pub struct BackendGateway {
    client: Client,
    endpoint: String,
    session: Session,
}

impl BackendGateway {
    pub fn new(endpoint: impl Into<String>, session: Session) -> Result<Self, ApiError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "Generation endpoint cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            client: build_http_client()?,
            endpoint,
            session,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl GenerationGateway for BackendGateway {
    async fn open(&self, request: &GenerationRequest) -> Result<ByteStream, ApiError> {
        // Without a credential the request is never sent.
        let token = self.session.bearer_token().await?;

        debug!(
            endpoint = %self.endpoint,
            step = %request.step,
            provider = %request.provider,
            "Posting generation request"
        );
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(map_http_error)?;

        into_byte_stream(response).await
    }

    fn name(&self) -> &str {
        "backend"
    }
}
