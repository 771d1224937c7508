//! Startup configuration: encoding tables, clip thresholds and the schema descriptor.
//!
//! Everything here is loaded once, before the first request, and is read-only
//! afterwards. [`ConfigStore`] owns the loaded documents behind `Arc` so a
//! single store can back any number of pipelines and threads.
//!
//! ```no_run
//! use housing_features::config::{ConfigPaths, ConfigStore};
//!
//! let store = ConfigStore::load(&ConfigPaths::from_dir("config"))?;
//! println!("{} schema columns", store.schema.len());
//! # Ok::<(), housing_features::error::PipelineError>(())
//! ```

pub mod schema;
pub mod tables;

pub use schema::{ColumnType, SchemaDescriptor, SchemaField};
pub use tables::{ClipThresholds, EncodingTable, ExpansionTable, ScalarTable};

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const TITLE_FILE: &str = "title.json";
pub const STATE_FILE: &str = "state_target_enc.json";
pub const TOWN_FILE: &str = "town_freq_enc.json";
pub const SCHEMA_FILE: &str = "training_columns.json";
pub const CLIP_FILE: &str = "clip_thresholds.json";

/// Locations of every configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub title: PathBuf,
    pub state: PathBuf,
    pub town: PathBuf,
    pub schema: PathBuf,
    pub clip_thresholds: PathBuf,
}

impl ConfigPaths {
    /// Standard file names inside a single config directory.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            title: dir.join(TITLE_FILE),
            state: dir.join(STATE_FILE),
            town: dir.join(TOWN_FILE),
            schema: dir.join(SCHEMA_FILE),
            clip_thresholds: dir.join(CLIP_FILE),
        }
    }
}

/// Immutable configuration shared by all transform calls.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    pub title: Arc<ExpansionTable>,
    pub state: Arc<ScalarTable>,
    pub town: Arc<ScalarTable>,
    pub schema: Arc<SchemaDescriptor>,
    pub clip_thresholds: Arc<ClipThresholds>,
}

impl ConfigStore {
    /// Load every document named by `paths`.
    ///
    /// # Errors
    ///
    /// `ConfigLoad` if any file is missing or is not the expected JSON object.
    pub fn load(paths: &ConfigPaths) -> Result<Self> {
        let store = Self {
            title: Arc::new(ExpansionTable::load(&paths.title)?),
            state: Arc::new(ScalarTable::load(&paths.state)?),
            town: Arc::new(ScalarTable::load(&paths.town)?),
            schema: Arc::new(SchemaDescriptor::load(&paths.schema)?),
            clip_thresholds: Arc::new(ClipThresholds::load(&paths.clip_thresholds)?),
        };

        tracing::info!(
            titles = store.title.len(),
            states = store.state.len(),
            towns = store.town.len(),
            schema_columns = store.schema.len(),
            "Loaded pipeline configuration"
        );

        Ok(store)
    }

    /// Assemble a store from already-built parts.
    pub fn from_parts(
        title: ExpansionTable,
        state: ScalarTable,
        town: ScalarTable,
        schema: SchemaDescriptor,
        clip_thresholds: ClipThresholds,
    ) -> Self {
        Self {
            title: Arc::new(title),
            state: Arc::new(state),
            town: Arc::new(town),
            schema: Arc::new(schema),
            clip_thresholds: Arc::new(clip_thresholds),
        }
    }

    /// Same tables, different output contract.
    #[must_use]
    pub fn with_schema(&self, schema: SchemaDescriptor) -> Self {
        Self {
            schema: Arc::new(schema),
            ..self.clone()
        }
    }
}

fn read_json_object(
    source: &str,
    json: &str,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| PipelineError::config(source, format!("invalid JSON: {e}")))?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(PipelineError::config(
            source,
            format!("expected a JSON object, found {}", json_kind(&other)),
        )),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
