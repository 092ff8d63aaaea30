//! Sequential gating of step selection

use super::test_utils::{abc_catalog, sse_payload, whole, Reply, ScriptedGateway};
use copychain::pipeline::StepOrchestrator;

#[tokio::test]
async fn steps_unlock_one_at_a_time() {
    let gateway = ScriptedGateway::new();
    gateway.push("a", Reply::Body(whole(&sse_payload(&["A"]))));
    gateway.push("b", Reply::Body(whole(&sse_payload(&["B"]))));
    let orch = StepOrchestrator::new(abc_catalog(), gateway);
    orch.set_product_input("Travel mug");

    assert!(orch.is_step_selectable(0));
    assert!(!orch.is_step_selectable(2));

    assert!(orch.generate_step(0, None).await.is_completed());
    assert!(orch.is_step_selectable(1));
    assert!(!orch.is_step_selectable(2));

    assert!(orch.generate_step(1, None).await.is_completed());
    assert!(orch.is_step_selectable(2));
    assert_eq!(orch.selectable_steps(), vec![0, 1, 2]);
}

#[tokio::test]
async fn no_step_opens_while_the_first_one_streams() {
    let gateway = ScriptedGateway::new();
    gateway.push(
        "a",
        Reply::Stalled(whole(&super::test_utils::delta_record("..."))),
    );
    let orch = StepOrchestrator::new(abc_catalog(), gateway);
    let mut updates = orch.subscribe();

    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.generate_step(0, None).await });
    updates.wait_for(|view| view.is_generating).await.unwrap();

    assert!(!orch.is_step_selectable(0));
    assert!(!orch.is_step_selectable(1));
    assert!(!orch.is_step_selectable(2));
    assert!(orch.selectable_steps().is_empty());

    orch.stop_generation();
    handle.await.unwrap();
    assert!(orch.is_step_selectable(0));
    assert!(orch.is_step_selectable(1));
    assert!(!orch.is_step_selectable(2));
}

#[tokio::test]
async fn third_step_stays_closed_without_committed_results() {
    let gateway = ScriptedGateway::new();
    gateway.push(
        "b",
        Reply::Stalled(whole(&super::test_utils::delta_record("..."))),
    );
    let orch = StepOrchestrator::new(abc_catalog(), gateway);
    let mut updates = orch.subscribe();

    let runner = orch.clone();
    let handle = tokio::spawn(async move { runner.generate_step(1, None).await });
    updates.wait_for(|view| view.is_generating).await.unwrap();
    assert!(!orch.is_step_selectable(2));

    orch.stop_generation();
    handle.await.unwrap();
    assert!(orch.results().is_empty());
}

#[tokio::test]
async fn returning_to_input_keeps_completed_steps_selectable() {
    let gateway = ScriptedGateway::new();
    gateway.push("a", Reply::Body(whole(&sse_payload(&["A"]))));
    gateway.push("b", Reply::Body(whole(&sse_payload(&["B"]))));
    let orch = StepOrchestrator::new(abc_catalog(), gateway);
    assert!(orch.generate_step(0, None).await.is_completed());
    assert!(orch.generate_step(1, None).await.is_completed());

    orch.return_to_input();
    assert_eq!(orch.snapshot().current_step_index(), -1);
    assert!(orch.is_step_selectable(0));
    assert!(orch.is_step_selectable(1));
    assert!(!orch.is_step_selectable(2));
}
