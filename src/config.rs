//! Configuration System
//!
//! Layered configuration for gateways, providers, generation defaults, the session
//! credential, and logging. Later layers override earlier ones: built-in defaults, the
//! global config file, workspace config files, then `COPYCHAIN__*` environment variables.

use crate::context::{GenerationContext, Provider};
use crate::error::ApiError;
use crate::gateway::ProviderEndpoint;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

mod merge {
    pub mod merge_policy;
}
mod sources {
    pub mod environment;
    pub mod global_file;
    pub mod workspace_file;
}

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyChainConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    /// POST to the hosted generation function
    #[default]
    Backend,
    /// Call the provider's chat-completions API directly
    Direct,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub mode: GatewayMode,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    merge::merge_policy::DEFAULT_ENDPOINT.to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mode: GatewayMode::default(),
            endpoint: default_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub model: String,
    /// Inline key; prefer `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ProviderSettings {
    fn deepseek() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
            api_key_env: Some("DEEPSEEK_API_KEY".to_string()),
            temperature: Some(0.8),
            max_tokens: Some(4096),
        }
    }

    fn openai() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            temperature: Some(0.8),
            max_tokens: Some(4096),
        }
    }

    /// Inline key first, then the named environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| {
                self.api_key_env
                    .as_deref()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|k| !k.trim().is_empty())
            })
    }

    pub fn to_endpoint(&self) -> ProviderEndpoint {
        ProviderEndpoint {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            api_key: self.resolve_api_key(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.trim().is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("Model cannot be empty".to_string());
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(format!("Temperature {} is outside 0.0-2.0", t));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "ProviderSettings::deepseek")]
    pub deepseek: ProviderSettings,
    #[serde(default = "ProviderSettings::openai")]
    pub openai: ProviderSettings,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            deepseek: ProviderSettings::deepseek(),
            openai: ProviderSettings::openai(),
        }
    }
}

impl ProvidersConfig {
    pub fn get(&self, provider: Provider) -> &ProviderSettings {
        match provider {
            Provider::DeepSeek => &self.deepseek,
            Provider::OpenAI => &self.openai,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub context: GenerationContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "COPYCHAIN_TOKEN".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: default_token_env(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Gateway(String),
    Provider(String, String),
    Session(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Gateway(msg) => write!(f, "Gateway: {}", msg),
            ValidationError::Provider(name, msg) => write!(f, "Provider '{}': {}", name, msg),
            ValidationError::Session(msg) => write!(f, "Session: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl CopyChainConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.gateway.mode == GatewayMode::Backend {
            let endpoint = self.gateway.endpoint.trim();
            if endpoint.is_empty() {
                errors.push(ValidationError::Gateway(
                    "Endpoint cannot be empty in backend mode".to_string(),
                ));
            } else if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                errors.push(ValidationError::Gateway(format!(
                    "Endpoint '{}' must be an http(s) URL",
                    endpoint
                )));
            }
            if self.session.token.is_none() && self.session.token_env.trim().is_empty() {
                errors.push(ValidationError::Session(
                    "Either token or token_env must be set in backend mode".to_string(),
                ));
            }
        }

        for provider in [Provider::DeepSeek, Provider::OpenAI] {
            if let Err(e) = self.providers.get(provider).validate() {
                errors.push(ValidationError::Provider(provider.to_string(), e));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one configuration error.
    pub fn validated(self) -> Result<Self, ApiError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }
}

/// Loads `CopyChainConfig` from the layered sources.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, workspace files, environment.
    pub fn load(workspace_root: &Path) -> Result<CopyChainConfig, ApiError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        let builder = sources::environment::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Defaults, the given file, environment.
    pub fn load_from_file(path: &Path) -> Result<CopyChainConfig, ApiError> {
        if !path.exists() {
            return Err(ApiError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let builder = merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true));
        let builder = sources::environment::add_to_builder(builder);
        Ok(builder.build()?.try_deserialize()?)
    }
}
