//! Pipeline state and its read-only snapshot.

use crate::context::{GenerationContext, Provider};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum PipelinePhase {
    /// Editing the product input, before any step (step index -1)
    Input,
    Streaming {
        step_index: usize,
    },
    Completed {
        step_index: usize,
    },
    Failed {
        step_index: usize,
        message: String,
    },
    /// Stopped by the user; nothing was committed
    Stopped {
        step_index: usize,
    },
}

/// What observers see. Published on every transition and every delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub product_input: String,
    /// `None` is the input phase.
    pub current_step: Option<usize>,
    /// Committed output per step id.
    pub results: BTreeMap<String, String>,
    pub streaming_buffer: String,
    pub is_generating: bool,
    pub phase: PipelinePhase,
    pub error: Option<String>,
    /// Steps whose last completion ran out of output tokens.
    pub truncated_steps: BTreeSet<String>,
}

impl PipelineSnapshot {
    pub fn new(product_input: String) -> Self {
        Self {
            product_input,
            current_step: None,
            results: BTreeMap::new(),
            streaming_buffer: String::new(),
            is_generating: false,
            phase: PipelinePhase::Input,
            error: None,
            truncated_steps: BTreeSet::new(),
        }
    }

    /// Step pointer in the -1..N-1 convention.
    pub fn current_step_index(&self) -> i64 {
        self.current_step.map_or(-1, |i| i as i64)
    }

    pub fn result(&self, step_id: &str) -> Option<&str> {
        self.results.get(step_id).map(String::as_str)
    }
}

/// One step of the output stream, delivered in order and never coalesced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A generation began; `seed` is the continuation text it starts from.
    Started { step_index: usize, seed: String },
    Delta { step_index: usize, text: String },
    Completed { step_index: usize },
    Failed { step_index: usize, message: String },
    /// Stopped by the user or replaced by a newer generation.
    Stopped { step_index: usize },
}

/// The generation currently allowed to touch the state.
pub(crate) struct ActiveGeneration {
    pub epoch: u64,
    pub step_index: usize,
    pub token: CancellationToken,
}

/// Orchestrator-owned mutable state.
pub(crate) struct PipelineState {
    pub view: PipelineSnapshot,
    pub provider: Provider,
    pub generation_context: GenerationContext,
    pub active: Option<ActiveGeneration>,
    pub next_epoch: u64,
    pub listeners: Vec<mpsc::UnboundedSender<PipelineEvent>>,
}

impl PipelineState {
    pub fn new(provider: Provider, generation_context: GenerationContext) -> Self {
        Self {
            view: PipelineSnapshot::new(String::new()),
            provider,
            generation_context,
            active: None,
            next_epoch: 0,
            listeners: Vec::new(),
        }
    }

    /// Deliver to every listener; closed receivers are dropped.
    pub fn emit(&mut self, event: PipelineEvent) {
        self.listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    /// Step of the generation with this epoch, if it is still the active one.
    pub fn active_step(&self, epoch: u64) -> Option<usize> {
        self.active
            .as_ref()
            .filter(|a| a.epoch == epoch)
            .map(|a| a.step_index)
    }

    /// Invalidate the in-flight generation, if any.
    pub fn cancel_active(&mut self) -> Option<usize> {
        self.active.take().map(|active| {
            active.token.cancel();
            active.step_index
        })
    }
}
