//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:54321/functions/v1/generate-copy";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("gateway.mode", "backend")?
        .set_default("gateway.endpoint", DEFAULT_ENDPOINT)?
        .set_default("session.token_env", "COPYCHAIN_TOKEN")?
        .set_default("generation.provider", "deepseek")
}
