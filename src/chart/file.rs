//! Chart declarations stored in TOML or JSON files
//!
//! The file mirrors the declarative items: every entry carries a description
//! string, optional documentation, aliases, triggers, monitors and nested
//! states. Decoding goes through the same [`StateDecl`] builder as code
//! declarations, so the same construction errors apply.

use super::declaration::{Item, Monitor, StateDecl, alias, on};
use super::model::StateChart;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One declared state and its subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSpec {
    /// `NAME` or `NAME -> INITIAL`
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    /// Action name to target name (`recall(NAME)` allowed)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub triggers: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub monitors: Vec<Monitor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<StateSpec>,
}

/// Root of a chart file; the root entry is the chart itself
pub type ChartFile = StateSpec;

impl StateSpec {
    /// Convert into a validated declaration
    pub fn to_decl(&self) -> Result<StateDecl> {
        let mut items: Vec<Item> = Vec::new();
        if let Some(doc) = &self.doc {
            items.push(Item::Doc(doc.clone()));
        }
        items.extend(self.aliases.iter().map(|name| alias(name.as_str())));
        items.extend(
            self.triggers
                .iter()
                .map(|(action, target)| Item::from(on(action.as_str()).goto(target.as_str()))),
        );
        items.extend(self.monitors.iter().cloned().map(Item::Monitor));
        for state in &self.states {
            items.push(Item::State(state.to_decl()?));
        }
        StateDecl::new(&self.description, items)
    }

    /// Decode and build a chart
    pub fn build(&self) -> Result<StateChart> {
        StateChart::build(&self.to_decl()?)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Read a chart file, choosing the format by extension (`.json` or TOML)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::declaration(format!("Failed to read chart file {:?}: {}", path, e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_toml(&contents),
        }
    }
}

/// Load and build the chart declared in `path`
pub fn load_chart(path: impl AsRef<Path>) -> Result<StateChart> {
    let path = path.as_ref();
    let chart = StateSpec::from_file(path)?.build()?;
    tracing::info!(
        "Loaded chart {} ({} states) from {:?}",
        chart.state(chart.root()).name(),
        chart.len(),
        path
    );
    Ok(chart)
}
