//! Generation context and provider selection.
//!
//! Both are plain values copied into every outbound request, so a request in flight is
//! unaffected by later edits.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tone of the generated copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToneFormality {
    Casual,
    #[default]
    Neutral,
    Formal,
}

impl ToneFormality {
    pub fn as_str(self) -> &'static str {
        match self {
            ToneFormality::Casual => "casual",
            ToneFormality::Neutral => "neutral",
            ToneFormality::Formal => "formal",
        }
    }
}

impl FromStr for ToneFormality {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "casual" => Ok(ToneFormality::Casual),
            "neutral" => Ok(ToneFormality::Neutral),
            "formal" => Ok(ToneFormality::Formal),
            other => Err(ApiError::ConfigError(format!(
                "Invalid tone '{}' (must be casual, neutral or formal)",
                other
            ))),
        }
    }
}

/// Language, region and tone applied to every generation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationContext {
    #[serde(default = "default_language_code")]
    pub language_code: String,
    #[serde(default = "default_cultural_region")]
    pub cultural_region: String,
    #[serde(default)]
    pub tone_formality: ToneFormality,
    #[serde(default)]
    pub avoid_real_names: bool,
}

fn default_language_code() -> String {
    "en".to_string()
}

fn default_cultural_region() -> String {
    "US".to_string()
}

impl Default for GenerationContext {
    fn default() -> Self {
        Self {
            language_code: default_language_code(),
            cultural_region: default_cultural_region(),
            tone_formality: ToneFormality::default(),
            avoid_real_names: false,
        }
    }
}

/// Upstream LLM backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Provider {
    #[default]
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openai")]
    OpenAI,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::DeepSeek => "deepseek",
            Provider::OpenAI => "openai",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deepseek" => Ok(Provider::DeepSeek),
            "openai" => Ok(Provider::OpenAI),
            other => Err(ApiError::ConfigError(format!(
                "Invalid provider '{}' (must be deepseek or openai)",
                other
            ))),
        }
    }
}
