//! Upstream context: the committed outputs of earlier steps, in catalog order.

use crate::catalog::{StepCatalog, StepDefinition};
use std::collections::BTreeMap;

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub fn labeled_result(step: &StepDefinition, text: &str) -> String {
    format!("## {}\n\n{}", step.label, text)
}

/// Join the results of every step before `step_index` that has one.
///
/// Steps without a result are skipped. Returns `None` when nothing precedes.
pub fn assemble_previous_context(
    catalog: &StepCatalog,
    step_index: usize,
    results: &BTreeMap<String, String>,
) -> Option<String> {
    let sections: Vec<String> = catalog
        .preceding(step_index)
        .iter()
        .filter_map(|step| {
            results
                .get(&step.id)
                .map(|text| labeled_result(step, text))
        })
        .collect();
    if sections.is_empty() {
        None
    } else {
        Some(sections.join(CONTEXT_SEPARATOR))
    }
}
