//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::catalog::StepCatalog;
use crate::cli::parse::{Commands, ConfigCommands, GenerationArgs};
use crate::cli::presentation::{
    format_config, format_run_summary, format_step_heading, format_steps_json,
    format_steps_text, format_validation_result,
};
use crate::config::{ConfigLoader, CopyChainConfig, GatewayMode};
use crate::context::{GenerationContext, Provider};
use crate::error::ApiError;
use crate::gateway::{BackendGateway, DirectGateway, GenerationGateway};
use crate::pipeline::{PipelineEvent, StepOrchestrator, StepOutcome};
use crate::project::ProjectDocument;
use crate::session::{EnvCredential, Session};
use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runtime context for CLI execution: workspace and effective configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: CopyChainConfig,
}

/// Orchestrator plus the project document it mirrors.
struct Prepared {
    orchestrator: StepOrchestrator,
    project: Option<(PathBuf, ProjectDocument)>,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    pub fn from_config(workspace_root: PathBuf, config: CopyChainConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &CopyChainConfig {
        &self.config
    }

    /// Execute with generated copy on stdout and step headings on stderr.
    pub async fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        self.execute_to(command, &mut std::io::stdout(), &mut std::io::stderr())
            .await
    }

    /// Execute, writing generated copy to `out` and step headings to `headings`.
    pub async fn execute_to<W: Write, H: Write>(
        &self,
        command: &Commands,
        out: &mut W,
        headings: &mut H,
    ) -> Result<String, ApiError> {
        match command {
            Commands::Steps { format } => {
                let catalog = StepCatalog::copywriting();
                match format.as_str() {
                    "json" => Ok(format_steps_json(&catalog)),
                    "text" => Ok(format_steps_text(&catalog)),
                    other => Err(ApiError::ConfigError(format!(
                        "Invalid format: {} (must be 'text' or 'json')",
                        other
                    ))),
                }
            }
            Commands::Generate {
                step,
                continue_from,
                continue_saved,
                options,
            } => {
                self.generate(
                    step,
                    continue_from.clone(),
                    *continue_saved,
                    options,
                    Sink { out, headings },
                )
                .await
            }
            Commands::Run { from, options } => {
                self.run(from.as_deref(), options, Sink { out, headings })
                    .await
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show { format } => format_config(&self.config, format),
                ConfigCommands::Validate => {
                    let result = self.config.validate();
                    let text = format_validation_result(&result);
                    if result.is_ok() {
                        Ok(text)
                    } else {
                        Err(ApiError::ConfigError(text))
                    }
                }
            },
        }
    }

    async fn generate<W: Write, H: Write>(
        &self,
        step_id: &str,
        continue_from: Option<String>,
        continue_saved: bool,
        options: &GenerationArgs,
        sink: Sink<'_, W, H>,
    ) -> Result<String, ApiError> {
        let mut prepared = self.prepare(options)?;
        let orchestrator = prepared.orchestrator.clone();
        let (index, _) = orchestrator.catalog().require(step_id)?;

        let seed = if continue_saved {
            Some(orchestrator.result(step_id).ok_or_else(|| {
                ApiError::ConfigError(format!("No saved result for step '{}'", step_id))
            })?)
        } else {
            continue_from
        };

        let runner = orchestrator.clone();
        let outcome = self
            .stream_output(
                &orchestrator,
                async move { runner.generate_step(index, seed).await },
                sink,
            )
            .await;

        match outcome {
            StepOutcome::Completed(_) => self.save_project(&mut prepared),
            StepOutcome::Cancelled | StepOutcome::Superseded => {
                Ok("Generation stopped.".to_string())
            }
            StepOutcome::Failed(err) => Err(err),
        }
    }

    async fn run<W: Write, H: Write>(
        &self,
        from: Option<&str>,
        options: &GenerationArgs,
        sink: Sink<'_, W, H>,
    ) -> Result<String, ApiError> {
        let mut prepared = self.prepare(options)?;
        let orchestrator = prepared.orchestrator.clone();
        let start = match from {
            Some(step_id) => orchestrator.catalog().require(step_id)?.0,
            None => 0,
        };

        let runner = orchestrator.clone();
        let mut outcomes = self
            .stream_output(&orchestrator, async move { runner.run_from(start).await }, sink)
            .await;

        let saved = self.save_project(&mut prepared)?;
        let summary = format_run_summary(&outcomes);

        let failure = match outcomes.pop() {
            Some((_, StepOutcome::Failed(err))) => Some(err),
            _ => None,
        };
        if let Some(err) = failure {
            eprint!("{}", summary);
            return Err(err);
        }
        Ok(format!("{}{}", summary, saved))
    }

    /// Build the orchestrator for a generating command.
    fn prepare(&self, options: &GenerationArgs) -> Result<Prepared, ApiError> {
        let config = self.config.clone().validated()?;
        let catalog = StepCatalog::copywriting();
        let gateway = build_gateway(&config, &catalog)?;
        let (provider, generation_context) = resolve_settings(&config, options)?;
        let orchestrator =
            StepOrchestrator::with_settings(catalog, gateway, provider, generation_context);

        let mut project = match &options.project {
            Some(path) => {
                let path = self.resolve_path(path);
                let document = ProjectDocument::load_or_new(&path, "")?;
                orchestrator.restore_results(document.copy_results.clone());
                Some((path, document))
            }
            None => None,
        };

        let input = resolve_input(options, project.as_ref().map(|(_, doc)| doc))?;
        orchestrator.set_product_input(input.clone());
        if let Some((_, document)) = project.as_mut() {
            document.product_input = input;
        }

        debug!(
            provider = %provider,
            mode = ?config.gateway.mode,
            "Pipeline prepared"
        );
        Ok(Prepared {
            orchestrator,
            project,
        })
    }

    fn resolve_path(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn save_project(&self, prepared: &mut Prepared) -> Result<String, ApiError> {
        let Some((path, document)) = prepared.project.as_mut() else {
            return Ok(String::new());
        };
        document.merge_results(&prepared.orchestrator.results());
        document.save(path)?;
        info!(path = %path.display(), "Project saved");
        Ok(format!("Saved project: {}", path.display()))
    }

    /// Drive `work` while echoing every generated delta to the sink. Ctrl-C stops
    /// generation.
    async fn stream_output<T, W: Write, H: Write>(
        &self,
        orchestrator: &StepOrchestrator,
        work: impl Future<Output = T>,
        sink: Sink<'_, W, H>,
    ) -> T {
        let done = CancellationToken::new();
        let interrupt = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    orchestrator.stop_generation();
                }
            })
        };

        let events = orchestrator.events();
        let mut printer =
            StreamPrinter::new(orchestrator.catalog().clone(), self.config.logging.color, sink);
        let finished = done.clone();
        let (result, ()) = tokio::join!(
            async move {
                let result = work.await;
                finished.cancel();
                result
            },
            printer.follow(events, done)
        );
        interrupt.abort();
        result
    }
}

pub fn build_session(config: &CopyChainConfig) -> Session {
    match &config.session.token {
        Some(token) => Session::with_token(Some(token.clone())),
        None => Session::new(Arc::new(EnvCredential::new(config.session.token_env.clone()))),
    }
}

pub fn build_gateway(
    config: &CopyChainConfig,
    catalog: &StepCatalog,
) -> Result<Arc<dyn GenerationGateway>, ApiError> {
    match config.gateway.mode {
        GatewayMode::Backend => Ok(Arc::new(BackendGateway::new(
            config.gateway.endpoint.clone(),
            build_session(config),
        )?)),
        GatewayMode::Direct => {
            let endpoints: HashMap<_, _> = [Provider::DeepSeek, Provider::OpenAI]
                .into_iter()
                .map(|p| (p, config.providers.get(p).to_endpoint()))
                .collect();
            Ok(Arc::new(DirectGateway::new(catalog.clone(), endpoints)?))
        }
    }
}

/// Provider and generation context: configuration, then command-line overrides.
pub fn resolve_settings(
    config: &CopyChainConfig,
    options: &GenerationArgs,
) -> Result<(Provider, GenerationContext), ApiError> {
    let provider = match &options.provider {
        Some(name) => name.parse()?,
        None => config.generation.provider,
    };
    let mut context = config.generation.context.clone();
    if let Some(language) = &options.language {
        context.language_code = language.clone();
    }
    if let Some(region) = &options.region {
        context.cultural_region = region.clone();
    }
    if let Some(tone) = &options.tone {
        context.tone_formality = tone.parse()?;
    }
    if options.avoid_real_names {
        context.avoid_real_names = true;
    }
    Ok((provider, context))
}

/// Product input from `--input`, `--input-file`, or the project document.
pub fn resolve_input(
    options: &GenerationArgs,
    project: Option<&ProjectDocument>,
) -> Result<String, ApiError> {
    let input = if let Some(input) = &options.input {
        input.clone()
    } else if let Some(path) = &options.input_file {
        std::fs::read_to_string(path).map_err(|e| {
            ApiError::ConfigError(format!("Failed to read input file {:?}: {}", path, e))
        })?
    } else {
        project.map(|doc| doc.product_input.clone()).unwrap_or_default()
    };
    if input.trim().is_empty() {
        return Err(ApiError::ConfigError(
            "A product description is required (--input or --input-file)".to_string(),
        ));
    }
    Ok(input)
}

/// Where generated copy and step headings go.
struct Sink<'a, W: Write, H: Write> {
    out: &'a mut W,
    headings: &'a mut H,
}

/// Echoes generated copy as it arrives; one heading per generation.
struct StreamPrinter<'a, W: Write, H: Write> {
    catalog: StepCatalog,
    color: bool,
    sink: Sink<'a, W, H>,
    open: bool,
    closed_output: bool,
}

impl<'a, W: Write, H: Write> StreamPrinter<'a, W, H> {
    fn new(catalog: StepCatalog, color: bool, sink: Sink<'a, W, H>) -> Self {
        Self {
            catalog,
            color,
            sink,
            open: false,
            closed_output: false,
        }
    }

    async fn follow(
        &mut self,
        mut events: mpsc::UnboundedReceiver<PipelineEvent>,
        done: CancellationToken,
    ) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event),
                    None => return,
                },
                _ = done.cancelled() => break,
            }
        }
        while let Ok(event) = events.try_recv() {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Started { step_index, seed } => {
                self.close();
                self.heading(step_index);
                self.open = true;
                self.write(&seed);
            }
            PipelineEvent::Delta { text, .. } => self.write(&text),
            PipelineEvent::Completed { .. }
            | PipelineEvent::Failed { .. }
            | PipelineEvent::Stopped { .. } => self.close(),
        }
    }

    fn heading(&mut self, step_index: usize) {
        let label = self
            .catalog
            .get(step_index)
            .map(|s| s.label.as_str())
            .unwrap_or("?");
        let heading = format_step_heading(label, self.color);
        if let Err(e) = writeln!(self.sink.headings, "{}", heading) {
            debug!(error = %e, "Failed to write step heading");
        }
    }

    fn write(&mut self, text: &str) {
        if self.closed_output || text.is_empty() {
            return;
        }
        let result = self
            .sink
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.sink.out.flush());
        if let Err(e) = result {
            debug!(error = %e, "Output closed; no longer echoing generated copy");
            self.closed_output = true;
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.write("\n");
        }
    }
}
