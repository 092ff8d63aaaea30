//! Project document: a project's accumulated step outputs (`copy_results`) on disk.

use crate::error::StorageError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub product_input: String,
    #[serde(default)]
    pub copy_results: BTreeMap<String, String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ProjectDocument {
    pub fn new(name: impl Into<String>, product_input: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            product_input: product_input.into(),
            copy_results: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::DocumentNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Load the document, or start a new one named after the file.
    pub fn load_or_new(path: &Path, product_input: &str) -> Result<Self, StorageError> {
        match Self::load(path) {
            Err(StorageError::DocumentNotFound(_)) => {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                Ok(Self::new(name, product_input))
            }
            other => other,
        }
    }

    /// Merge committed results; entries for other steps are left alone.
    pub fn merge_results(&mut self, results: &BTreeMap<String, String>) {
        for (step, text) in results {
            self.copy_results.insert(step.clone(), text.clone());
        }
        self.updated_at = Utc::now();
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, encoded)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
