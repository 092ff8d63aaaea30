//! Step orchestrator: drives streamed generations and owns the pipeline state.
//!
//! At most one generation is in flight. Starting a generation cancels the previous
//! one and bumps an epoch; a generation only touches the state while its epoch is the
//! active one, so a superseded stream can never write into its successor's buffer.
//! Deltas are applied in arrival order and the buffer is committed into `results`
//! only after the stream ends cleanly.

use crate::catalog::{StepCatalog, StepDefinition};
use crate::context::{GenerationContext, Provider};
use crate::error::ApiError;
use crate::gateway::{GenerationGateway, GenerationRequest};
use crate::pipeline::assembly::assemble_previous_context;
use crate::pipeline::navigation::{is_step_selectable, selectable_steps};
use crate::pipeline::state::{
    ActiveGeneration, PipelineEvent, PipelinePhase, PipelineSnapshot, PipelineState,
};
use crate::sse::{decode_stream, StreamEvent};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How one `generate_step` call ended
#[derive(Debug)]
pub enum StepOutcome {
    /// Stream ended cleanly; the text was committed.
    Completed(String),
    /// Stopped by `stop_generation`.
    Cancelled,
    /// A newer generation replaced this one.
    Superseded,
    /// Surfaced inline in place of the buffer.
    Failed(ApiError),
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed(_))
    }
}

struct Inner {
    catalog: StepCatalog,
    gateway: Arc<dyn GenerationGateway>,
    state: Mutex<PipelineState>,
    updates: watch::Sender<PipelineSnapshot>,
}

/// Shared handle to one pipeline.
#[derive(Clone)]
pub struct StepOrchestrator {
    inner: Arc<Inner>,
}

impl StepOrchestrator {
    pub fn new(catalog: StepCatalog, gateway: Arc<dyn GenerationGateway>) -> Self {
        Self::with_settings(catalog, gateway, Provider::default(), GenerationContext::default())
    }

    pub fn with_settings(
        catalog: StepCatalog,
        gateway: Arc<dyn GenerationGateway>,
        provider: Provider,
        generation_context: GenerationContext,
    ) -> Self {
        let state = PipelineState::new(provider, generation_context);
        let (updates, _) = watch::channel(state.view.clone());
        Self {
            inner: Arc::new(Inner {
                catalog,
                gateway,
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    pub fn catalog(&self) -> &StepCatalog {
        &self.inner.catalog
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        self.inner.state.lock().view.clone()
    }

    /// Live view, updated on every transition and delta.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.inner.updates.subscribe()
    }

    /// Every event from now on, in order. Unlike `subscribe`, nothing is coalesced,
    /// so a reader sees each delta of each step.
    pub fn events(&self) -> mpsc::UnboundedReceiver<PipelineEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.state.lock().listeners.push(tx);
        rx
    }

    pub fn set_product_input(&self, input: impl Into<String>) {
        let mut state = self.inner.state.lock();
        state.view.product_input = input.into();
        self.publish(&state);
    }

    /// Back to the input phase. Committed results are kept.
    pub fn return_to_input(&self) {
        let mut state = self.inner.state.lock();
        if let Some(step_index) = state.cancel_active() {
            state.emit(PipelineEvent::Stopped { step_index });
        }
        state.view.current_step = None;
        state.view.is_generating = false;
        state.view.streaming_buffer.clear();
        state.view.error = None;
        state.view.phase = PipelinePhase::Input;
        self.publish(&state);
    }

    /// Applies from the next generation on; a request in flight keeps its copy.
    pub fn set_generation_context(&self, context: GenerationContext) {
        self.inner.state.lock().generation_context = context;
    }

    pub fn generation_context(&self) -> GenerationContext {
        self.inner.state.lock().generation_context.clone()
    }

    pub fn set_provider(&self, provider: Provider) {
        self.inner.state.lock().provider = provider;
    }

    pub fn provider(&self) -> Provider {
        self.inner.state.lock().provider
    }

    /// Seed committed results, e.g. from a saved project document.
    ///
    /// The step pointer moves to the last catalog step that has a result.
    pub fn restore_results(&self, results: impl IntoIterator<Item = (String, String)>) {
        let mut state = self.inner.state.lock();
        state.view.results.extend(results);
        let last_done = (0..self.inner.catalog.len()).rev().find(|&i| {
            self.inner
                .catalog
                .get(i)
                .is_some_and(|s| state.view.results.contains_key(&s.id))
        });
        if let Some(index) = last_done {
            state.view.current_step = Some(index);
            state.view.phase = PipelinePhase::Completed { step_index: index };
        }
        self.publish(&state);
    }

    pub fn results(&self) -> BTreeMap<String, String> {
        self.inner.state.lock().view.results.clone()
    }

    pub fn result(&self, step_id: &str) -> Option<String> {
        self.inner.state.lock().view.results.get(step_id).cloned()
    }

    pub fn is_step_selectable(&self, index: usize) -> bool {
        let state = self.inner.state.lock();
        is_step_selectable(index, &self.inner.catalog, &state.view)
    }

    pub fn selectable_steps(&self) -> Vec<usize> {
        let state = self.inner.state.lock();
        selectable_steps(&self.inner.catalog, &state.view)
    }

    /// Cancel the in-flight generation. No-op when nothing is running.
    pub fn stop_generation(&self) {
        let mut state = self.inner.state.lock();
        let Some(step_index) = state.cancel_active() else {
            return;
        };
        state.view.is_generating = false;
        state.view.streaming_buffer.clear();
        state.view.phase = PipelinePhase::Stopped { step_index };
        state.emit(PipelineEvent::Stopped { step_index });
        self.publish(&state);
        debug!(step_index, "Generation stopped");
    }

    /// Generate one step, optionally resuming from `continue_from`.
    ///
    /// Any generation already in flight is cancelled first.
    pub async fn generate_step(&self, step_index: usize, continue_from: Option<String>) -> StepOutcome {
        let Some(step) = self.inner.catalog.get(step_index).cloned() else {
            return StepOutcome::Failed(ApiError::StepIndexOutOfRange(step_index));
        };

        let (epoch, token, request) = self.begin(step_index, &step, continue_from);
        debug!(
            step = %step.id,
            epoch,
            provider = %request.provider,
            gateway = self.inner.gateway.name(),
            "Step generation started"
        );

        self.drive(epoch, &token, &step, &request).await
    }

    /// Regenerate a step, appending to its committed text.
    pub async fn continue_step(&self, step_index: usize) -> StepOutcome {
        let seed = self
            .inner
            .catalog
            .get(step_index)
            .and_then(|step| self.result(&step.id));
        self.generate_step(step_index, seed).await
    }

    /// Generate consecutive steps from `start_index` to the end of the catalog,
    /// stopping at the first step that does not complete.
    pub async fn run_from(&self, start_index: usize) -> Vec<(String, StepOutcome)> {
        let mut outcomes = Vec::new();
        for index in start_index..self.inner.catalog.len() {
            let step_id = match self.inner.catalog.get(index) {
                Some(step) => step.id.clone(),
                None => break,
            };
            let outcome = self.generate_step(index, None).await;
            let done = outcome.is_completed();
            outcomes.push((step_id, outcome));
            if !done {
                break;
            }
        }
        outcomes
    }

    fn begin(
        &self,
        step_index: usize,
        step: &StepDefinition,
        continue_from: Option<String>,
    ) -> (u64, CancellationToken, GenerationRequest) {
        let mut state = self.inner.state.lock();
        if let Some(previous) = state.cancel_active() {
            state.emit(PipelineEvent::Stopped {
                step_index: previous,
            });
            debug!(previous, "Superseding in-flight generation");
        }
        state.next_epoch += 1;
        let epoch = state.next_epoch;
        let token = CancellationToken::new();
        state.active = Some(ActiveGeneration {
            epoch,
            step_index,
            token: token.clone(),
        });

        let request = GenerationRequest {
            product_input: state.view.product_input.clone(),
            step: step.id.clone(),
            previous_context: assemble_previous_context(
                &self.inner.catalog,
                step_index,
                &state.view.results,
            ),
            provider: state.provider,
            continue_from: continue_from.clone(),
            generation_context: Some(state.generation_context.clone()),
        };

        state.view.current_step = Some(step_index);
        state.view.streaming_buffer = continue_from.unwrap_or_default();
        state.view.is_generating = true;
        state.view.error = None;
        state.view.phase = PipelinePhase::Streaming { step_index };
        let seed = state.view.streaming_buffer.clone();
        state.emit(PipelineEvent::Started { step_index, seed });
        self.publish(&state);

        (epoch, token, request)
    }

    async fn drive(
        &self,
        epoch: u64,
        token: &CancellationToken,
        step: &StepDefinition,
        request: &GenerationRequest,
    ) -> StepOutcome {
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return self.finish_interrupted(epoch),
            opened = self.inner.gateway.open(request) => opened,
        };
        let body = match opened {
            Ok(body) => body,
            Err(err) => return self.finish_failed(epoch, err),
        };

        let mut events = decode_stream(body);
        let mut truncated = false;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return self.finish_interrupted(epoch),
                next = events.next() => next,
            };
            match next {
                Some(Ok(StreamEvent::Delta(text))) => {
                    if !self.apply_delta(epoch, &text) {
                        return self.finish_interrupted(epoch);
                    }
                }
                Some(Ok(event)) => truncated = event.is_truncation(),
                Some(Err(err)) => return self.finish_failed(epoch, err),
                None => break,
            }
        }

        self.commit(epoch, step, truncated)
    }

    fn apply_delta(&self, epoch: u64, text: &str) -> bool {
        let mut state = self.inner.state.lock();
        let Some(step_index) = state.active_step(epoch) else {
            return false;
        };
        state.view.streaming_buffer.push_str(text);
        state.emit(PipelineEvent::Delta {
            step_index,
            text: text.to_string(),
        });
        self.publish(&state);
        true
    }

    fn commit(&self, epoch: u64, step: &StepDefinition, truncated: bool) -> StepOutcome {
        let mut state = self.inner.state.lock();
        let Some(active) = state.active.take_if_epoch(epoch) else {
            return Self::interrupted_outcome(&state);
        };
        let text = state.view.streaming_buffer.clone();
        state
            .view
            .results
            .insert(step.id.clone(), text.clone());
        if truncated {
            state.view.truncated_steps.insert(step.id.clone());
        } else {
            state.view.truncated_steps.remove(&step.id);
        }
        state.view.is_generating = false;
        state.view.phase = PipelinePhase::Completed {
            step_index: active.step_index,
        };
        state.emit(PipelineEvent::Completed {
            step_index: active.step_index,
        });
        self.publish(&state);
        info!(step = %step.id, bytes = text.len(), truncated, "Step generation completed");
        StepOutcome::Completed(text)
    }

    fn finish_failed(&self, epoch: u64, err: ApiError) -> StepOutcome {
        if err.is_cancelled() {
            return self.finish_interrupted(epoch);
        }
        let mut state = self.inner.state.lock();
        let Some(active) = state.active.take_if_epoch(epoch) else {
            return Self::interrupted_outcome(&state);
        };
        let message = err.user_message();
        state.view.is_generating = false;
        state.view.streaming_buffer = message.clone();
        state.view.error = Some(message.clone());
        state.view.phase = PipelinePhase::Failed {
            step_index: active.step_index,
            message: message.clone(),
        };
        state.emit(PipelineEvent::Failed {
            step_index: active.step_index,
            message,
        });
        self.publish(&state);
        warn!(step_index = active.step_index, error = %err, "Step generation failed");
        StepOutcome::Failed(err)
    }

    fn finish_interrupted(&self, epoch: u64) -> StepOutcome {
        let mut state = self.inner.state.lock();
        if let Some(active) = state.active.take_if_epoch(epoch) {
            // Cancelled through the token without going through stop_generation.
            state.view.is_generating = false;
            state.view.streaming_buffer.clear();
            state.view.phase = PipelinePhase::Stopped {
                step_index: active.step_index,
            };
            state.emit(PipelineEvent::Stopped {
                step_index: active.step_index,
            });
            self.publish(&state);
            return StepOutcome::Cancelled;
        }
        Self::interrupted_outcome(&state)
    }

    fn interrupted_outcome(state: &PipelineState) -> StepOutcome {
        if state.active.is_some() {
            StepOutcome::Superseded
        } else {
            debug!("Generation cancelled");
            StepOutcome::Cancelled
        }
    }

    fn publish(&self, state: &PipelineState) {
        self.inner.updates.send_replace(state.view.clone());
    }
}

trait TakeIfEpoch {
    fn take_if_epoch(&mut self, epoch: u64) -> Option<ActiveGeneration>;
}

impl TakeIfEpoch for Option<ActiveGeneration> {
    fn take_if_epoch(&mut self, epoch: u64) -> Option<ActiveGeneration> {
        if self.as_ref().is_some_and(|a| a.epoch == epoch) {
            self.take()
        } else {
            None
        }
    }
}
