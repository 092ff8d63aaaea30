//! CLI domain: parse, route, output, and presentation only.
//! No pipeline orchestration here; a single route table dispatches to domain services.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, ConfigCommands, GenerationArgs};
pub use presentation::{
    format_config, format_run_summary, format_step_heading, format_steps_json,
    format_steps_text, format_validation_result,
};
pub use route::{build_gateway, build_session, resolve_input, resolve_settings, RunContext};
