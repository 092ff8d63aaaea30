//! Step pipeline: state, navigation policy, upstream context assembly, and the
//! orchestrator that drives one streamed generation at a time.

pub mod assembly;
pub mod navigation;
pub mod orchestrator;
pub mod state;

pub use assembly::{assemble_previous_context, labeled_result, CONTEXT_SEPARATOR};
pub use navigation::{is_step_selectable, selectable_steps};
pub use orchestrator::{StepOrchestrator, StepOutcome};
pub use state::{PipelineEvent, PipelinePhase, PipelineSnapshot};
