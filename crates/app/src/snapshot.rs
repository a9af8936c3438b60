use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use wbs_engine::{LineItem, Percent, ProjectOverrides};

use crate::error::Result;

/// What a project persists: the flat line item list plus project-level values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Takes precedence over the configured default when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bdi: Option<Percent>,
    #[serde(default)]
    pub overrides: ProjectOverrides,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl ProjectSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        fs::write(path, json)?;
        tracing::info!(path = %path.display(), items = self.items.len(), "snapshot written");
        Ok(())
    }
}
