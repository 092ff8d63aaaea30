//! Step catalog: the ordered, immutable stages of the copywriting pipeline.
//!
//! Order is precedence. A step may draw on the output of any step before it and never
//! on a step after it.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// One stage of the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub id: String,
    pub label: String,
    pub icon: String,
    pub description: String,
}

impl StepDefinition {
    pub fn new(id: &str, label: &str, icon: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            icon: icon.to_string(),
            description: description.to_string(),
        }
    }
}

/// Fixed ordered sequence of steps, cheap to clone and share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCatalog {
    steps: Arc<[StepDefinition]>,
}

impl StepCatalog {
    /// Build a catalog, rejecting empty catalogs and blank or duplicate ids.
    pub fn new(steps: Vec<StepDefinition>) -> Result<Self, ApiError> {
        if steps.is_empty() {
            return Err(ApiError::ConfigError(
                "Step catalog must contain at least one step".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if step.id.trim().is_empty() {
                return Err(ApiError::ConfigError(
                    "Step id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(ApiError::ConfigError(format!(
                    "Duplicate step id '{}'",
                    step.id
                )));
            }
        }
        Ok(Self {
            steps: steps.into(),
        })
    }

    /// The built-in marketing copy pipeline.
    pub fn copywriting() -> Self {
        let steps = vec![
            StepDefinition::new(
                "avatar",
                "Customer Avatar",
                "user",
                "Ideal customer profile: demographics, pains, desires, objections and buying triggers.",
            ),
            StepDefinition::new(
                "usp",
                "Unique Selling Proposition",
                "sparkles",
                "The single promise that separates the product from every alternative.",
            ),
            StepDefinition::new(
                "offer",
                "Irresistible Offer",
                "gift",
                "Core offer stack with bonuses, guarantee, scarcity and price anchoring.",
            ),
            StepDefinition::new(
                "sales_page",
                "Sales Page",
                "file-text",
                "Long-form sales page from headline to final call to action.",
            ),
            StepDefinition::new(
                "upsells",
                "Upsells",
                "trending-up",
                "Order bump, one-time offer and downsell that complement the core offer.",
            ),
            StepDefinition::new(
                "vsl",
                "Video Sales Letter",
                "video",
                "Scene-by-scene video sales letter script with spoken lines.",
            ),
            StepDefinition::new(
                "ads",
                "Ads",
                "megaphone",
                "Ad variations with hooks, primary text and headlines for paid social.",
            ),
        ];
        Self {
            steps: steps.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Resolve a step id or fail with `UnknownStep`.
    pub fn require(&self, id: &str) -> Result<(usize, &StepDefinition), ApiError> {
        self.steps
            .iter()
            .enumerate()
            .find(|(_, s)| s.id == id)
            .ok_or_else(|| ApiError::UnknownStep(id.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter()
    }

    /// Steps strictly before `index`, in catalog order.
    pub fn preceding(&self, index: usize) -> &[StepDefinition] {
        &self.steps[..index.min(self.steps.len())]
    }
}

impl Default for StepCatalog {
    fn default() -> Self {
        Self::copywriting()
    }
}
