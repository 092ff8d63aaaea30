//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::ApiError;

/// Map domain/service errors to a string for CLI output.
pub fn map_error(e: &ApiError) -> String {
    match e {
        ApiError::Unauthenticated => {
            "Login required. Set COPYCHAIN_TOKEN or session.token in the configuration.".to_string()
        }
        ApiError::RequestRejected { message, .. } => format!("Generation rejected: {}", message),
        other => other.to_string(),
    }
}
