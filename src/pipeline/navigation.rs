//! Which steps a user may select.
//!
//! Completed steps can always be revisited. Otherwise, and only while nothing is
//! streaming, steps up to one past the current step are reachable.

use crate::catalog::StepCatalog;
use crate::pipeline::state::PipelineSnapshot;

pub fn is_step_selectable(index: usize, catalog: &StepCatalog, view: &PipelineSnapshot) -> bool {
    let Some(step) = catalog.get(index) else {
        return false;
    };
    if view.results.contains_key(&step.id) {
        return true;
    }
    !view.is_generating && (index as i64) <= view.current_step_index() + 1
}

pub fn selectable_steps(catalog: &StepCatalog, view: &PipelineSnapshot) -> Vec<usize> {
    (0..catalog.len())
        .filter(|&index| is_step_selectable(index, catalog, view))
        .collect()
}
