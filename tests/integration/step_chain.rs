//! Step chain: commit, cancellation, context assembly, and failure scoping

use super::test_utils::{abc_catalog, split_every, sse_payload, whole, Reply, ScriptedGateway};
use copychain::error::ApiError;
use copychain::pipeline::{PipelinePhase, StepOrchestrator, StepOutcome};

fn orchestrator(gateway: std::sync::Arc<ScriptedGateway>) -> StepOrchestrator {
    let orchestrator = StepOrchestrator::new(abc_catalog(), gateway);
    orchestrator.set_product_input("Noise-cancelling earbuds");
    orchestrator
}

#[tokio::test]
async fn commit_equals_concatenated_deltas_for_any_chunking() {
    let payload = sse_payload(&["Comm", "uters ", "who ", "hate ", "noise ✓"]);
    for size in [1, 2, 5, 17, payload.len()] {
        let gateway = ScriptedGateway::new();
        gateway.push("a", Reply::Body(split_every(&payload, size)));
        let orch = orchestrator(gateway);

        let outcome = orch.generate_step(0, None).await;
        assert!(outcome.is_completed(), "chunk size {}", size);
        assert_eq!(
            orch.result("a").as_deref(),
            Some("Commuters who hate noise ✓"),
            "chunk size {}",
            size
        );
    }
}

#[tokio::test]
async fn continuation_seed_is_kept_as_prefix() {
    let gateway = ScriptedGateway::new();
    gateway.push("a", Reply::Body(whole(&sse_payload(&[" and runners."]))));
    let orch = orchestrator(gateway.clone());

    let outcome = orch.generate_step(0, Some("Commuters".to_string())).await;
    assert!(matches!(outcome, StepOutcome::Completed(ref t) if t == "Commuters and runners."));
    assert_eq!(
        gateway.last_request().continue_from.as_deref(),
        Some("Commuters")
    );
}

#[tokio::test]
async fn stop_before_end_leaves_results_untouched() {
    let gateway = ScriptedGateway::new();
    gateway.push("a", Reply::Body(whole(&sse_payload(&["committed"]))));
    gateway.push(
        "a",
        Reply::Stalled(whole(&super::test_utils::delta_record("replacement"))),
    );
    let orch = orchestrator(gateway);
    assert!(orch.generate_step(0, None).await.is_completed());

    let mut updates = orch.subscribe();
    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.generate_step(0, None).await });
    updates
        .wait_for(|view| view.streaming_buffer == "replacement")
        .await
        .unwrap();
    orch.stop_generation();

    assert!(matches!(handle.await.unwrap(), StepOutcome::Cancelled));
    let view = orch.snapshot();
    assert_eq!(view.result("a"), Some("committed"));
    assert!(!view.is_generating);
    assert_eq!(view.error, None);
    assert_eq!(view.phase, PipelinePhase::Stopped { step_index: 0 });
}

#[tokio::test]
async fn stop_on_never_completed_step_leaves_it_undefined() {
    let gateway = ScriptedGateway::new();
    gateway.push(
        "a",
        Reply::Stalled(whole(&super::test_utils::delta_record("partial"))),
    );
    let orch = orchestrator(gateway);

    let mut updates = orch.subscribe();
    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.generate_step(0, None).await });
    updates.wait_for(|view| view.is_generating).await.unwrap();
    orch.stop_generation();

    assert!(matches!(handle.await.unwrap(), StepOutcome::Cancelled));
    assert_eq!(orch.result("a"), None);
}

#[tokio::test]
async fn context_follows_catalog_order_not_completion_order() {
    let gateway = ScriptedGateway::new();
    gateway.push("a", Reply::Body(whole(&sse_payload(&["A1"]))));
    gateway.push("b", Reply::Body(whole(&sse_payload(&["B1"]))));
    gateway.push("a", Reply::Body(whole(&sse_payload(&["A2"]))));
    gateway.push("c", Reply::Body(whole(&sse_payload(&["C1"]))));
    let orch = orchestrator(gateway.clone());

    assert!(orch.generate_step(0, None).await.is_completed());
    assert!(orch.generate_step(1, None).await.is_completed());
    // A re-runs after B completed.
    assert!(orch.generate_step(0, None).await.is_completed());
    assert!(orch.generate_step(2, None).await.is_completed());

    assert_eq!(
        gateway.last_request().previous_context.as_deref(),
        Some("## Step A\n\nA2\n\n---\n\n## Step B\n\nB1")
    );
}

#[tokio::test]
async fn context_skips_steps_without_results() {
    let gateway = ScriptedGateway::new();
    gateway.push("b", Reply::Body(whole(&sse_payload(&["B only"]))));
    gateway.push("c", Reply::Body(whole(&sse_payload(&["C"]))));
    let orch = orchestrator(gateway.clone());

    assert!(orch.generate_step(1, None).await.is_completed());
    assert!(orch.generate_step(2, None).await.is_completed());
    assert_eq!(
        gateway.last_request().previous_context.as_deref(),
        Some("## Step B\n\nB only")
    );
}

#[tokio::test]
async fn rejection_is_shown_inline_and_scoped_to_one_step() {
    let gateway = ScriptedGateway::new();
    gateway.push("a", Reply::Body(whole(&sse_payload(&["kept"]))));
    gateway.push("b", Reply::Reject(429, "Rate limit exceeded".to_string()));
    let orch = orchestrator(gateway);

    assert!(orch.generate_step(0, None).await.is_completed());
    let outcome = orch.generate_step(1, None).await;
    assert!(matches!(
        outcome,
        StepOutcome::Failed(ApiError::RequestRejected { status: 429, .. })
    ));

    let view = orch.snapshot();
    assert_eq!(view.streaming_buffer, "Error: Rate limit exceeded");
    assert!(!view.is_generating);
    assert_eq!(view.result("a"), Some("kept"));
    assert_eq!(view.result("b"), None);
    assert!(matches!(view.phase, PipelinePhase::Failed { step_index: 1, .. }));
}

#[tokio::test]
async fn missing_body_fails_the_step() {
    let orch = orchestrator(ScriptedGateway::new());
    let outcome = orch.generate_step(0, None).await;
    assert!(matches!(outcome, StepOutcome::Failed(ApiError::StreamUnavailable)));
    assert_eq!(orch.result("a"), None);
}

#[tokio::test]
async fn run_from_generates_to_the_end() {
    let gateway = ScriptedGateway::new();
    for (step, text) in [("a", "A"), ("b", "B"), ("c", "C")] {
        gateway.push(step, Reply::Body(whole(&sse_payload(&[text]))));
    }
    let orch = orchestrator(gateway);

    let outcomes = orch.run_from(0).await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|(_, o)| o.is_completed()));
    assert_eq!(orch.results().len(), 3);
    assert_eq!(orch.snapshot().phase, PipelinePhase::Completed { step_index: 2 });
}
