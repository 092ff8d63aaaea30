//! CLI parse: clap types for copychain. No behavior; definitions only.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Copychain CLI - streaming step-chain marketing copy generation
#[derive(Parser)]
#[command(name = "copychain")]
#[command(about = "Generate marketing copy step by step with streaming LLM calls")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the pipeline steps
    Steps {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Generate a single step, streaming the copy to stdout
    Generate {
        /// Step id (see `copychain steps`)
        #[arg(long)]
        step: String,

        /// Resume from this partial text instead of starting fresh
        #[arg(long)]
        continue_from: Option<String>,

        /// Resume from the step's saved result in the project document
        #[arg(long, conflicts_with = "continue_from")]
        continue_saved: bool,

        #[command(flatten)]
        options: GenerationArgs,
    },
    /// Generate steps in order until the end of the pipeline
    Run {
        /// First step to generate (default: the first step)
        #[arg(long)]
        from: Option<String>,

        #[command(flatten)]
        options: GenerationArgs,
    },
    /// Configuration commands (show, validate)
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Options shared by generating commands
#[derive(Args, Debug, Clone, Default)]
pub struct GenerationArgs {
    /// Product description
    #[arg(long, conflicts_with = "input_file")]
    pub input: Option<String>,

    /// Read the product description from a file
    #[arg(long)]
    pub input_file: Option<PathBuf>,

    /// Project document holding earlier results (created if missing)
    #[arg(long)]
    pub project: Option<PathBuf>,

    /// Provider (deepseek or openai)
    #[arg(long)]
    pub provider: Option<String>,

    /// Target language code
    #[arg(long)]
    pub language: Option<String>,

    /// Cultural region
    #[arg(long)]
    pub region: Option<String>,

    /// Tone (casual, neutral, formal)
    #[arg(long)]
    pub tone: Option<String>,

    /// Use invented names instead of real people or brands
    #[arg(long)]
    pub avoid_real_names: bool,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Output format (toml or json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
    /// Validate the effective configuration
    Validate,
}
