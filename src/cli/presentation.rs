//! CLI presentation: text/json formatting for command results.

use crate::catalog::StepCatalog;
use crate::config::{CopyChainConfig, ValidationError};
use crate::error::ApiError;
use crate::pipeline::StepOutcome;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde_json::json;

pub fn format_steps_text(catalog: &StepCatalog) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Id", "Label", "Description"]);
    for (index, step) in catalog.iter().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            step.id.clone(),
            step.label.clone(),
            step.description.clone(),
        ]);
    }
    table.to_string()
}

pub fn format_steps_json(catalog: &StepCatalog) -> String {
    let steps: Vec<_> = catalog.iter().collect();
    let out = json!({ "steps": steps, "total": catalog.len() });
    serde_json::to_string_pretty(&out).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_config(config: &CopyChainConfig, format: &str) -> Result<String, ApiError> {
    match format {
        "json" => serde_json::to_string_pretty(config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to encode config: {}", e))),
        "toml" => toml::to_string_pretty(config)
            .map_err(|e| ApiError::ConfigError(format!("Failed to encode config: {}", e))),
        other => Err(ApiError::ConfigError(format!(
            "Invalid format: {} (must be 'toml' or 'json')",
            other
        ))),
    }
}

pub fn format_validation_result(result: &Result<(), Vec<ValidationError>>) -> String {
    match result {
        Ok(()) => "Configuration is valid.".to_string(),
        Err(errors) => {
            let mut output = format!("Configuration has {} problem(s):\n", errors.len());
            for error in errors {
                output.push_str(&format!("  - {}\n", error));
            }
            output
        }
    }
}

/// Heading printed before a step streams.
pub fn format_step_heading(label: &str, color: bool) -> String {
    let heading = format!("== {} ==", label);
    if color {
        heading.bold().cyan().to_string()
    } else {
        heading
    }
}

/// One line per step: what happened to it.
pub fn format_run_summary(outcomes: &[(String, StepOutcome)]) -> String {
    let mut output = String::new();
    for (step, outcome) in outcomes {
        let status = match outcome {
            StepOutcome::Completed(text) => format!("completed ({} bytes)", text.len()),
            StepOutcome::Cancelled => "stopped".to_string(),
            StepOutcome::Superseded => "superseded".to_string(),
            StepOutcome::Failed(err) => format!("failed: {}", err),
        };
        output.push_str(&format!("{:<12} {}\n", step, status));
    }
    output
}
