//! Encoding tables and clip thresholds.

use super::read_json_object;
use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Immutable category lookup loaded from a JSON object document.
///
/// `V` is the encoded value: a target column name for expansion tables, a
/// numeric code for scalar tables.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingTable<V> {
    name: String,
    entries: BTreeMap<String, V>,
}

/// Category -> boolean output column name.
pub type ExpansionTable = EncodingTable<String>;

/// Category -> numeric code (frequency or target encoding).
pub type ScalarTable = EncodingTable<f64>;

impl<V> EncodingTable<V> {
    pub fn new(name: impl Into<String>, entries: BTreeMap<String, V>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, category: &str) -> Option<&V> {
        self.entries.get(category)
    }

    pub fn contains(&self, category: &str) -> bool {
        self.entries.contains_key(category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl ExpansionTable {
    /// Read a table from a JSON object file.
    ///
    /// # Errors
    ///
    /// `ConfigLoad` naming `path` if the file cannot be read or any entry is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = table_name(path);
        Self::from_json(&name, &read_source(path)?)
            .map_err(|e| relabel(e, &path.display().to_string()))
    }

    /// # Errors
    ///
    /// `ConfigLoad` if `json` is not an object or a value is not a column name.
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let object = read_json_object(name, json)?;
        let mut entries = BTreeMap::new();
        for (category, value) in object {
            let column = value.as_str().ok_or_else(|| {
                PipelineError::config(
                    name,
                    format!("value for category '{category}' must be a column name string"),
                )
            })?;
            entries.insert(category, column.to_owned());
        }
        Ok(Self::new(name, entries))
    }

    /// Distinct output columns, each with the categories that map to it.
    ///
    /// Ordered by column name so the produced frame layout is stable.
    pub fn target_columns(&self) -> Vec<(&str, Vec<&str>)> {
        let mut grouped: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (category, column) in &self.entries {
            grouped
                .entry(column.as_str())
                .or_default()
                .push(category.as_str());
        }
        grouped.into_iter().collect()
    }
}

impl ScalarTable {
    /// Read a table from a JSON object file.
    ///
    /// # Errors
    ///
    /// `ConfigLoad` naming `path` if the file cannot be read or any entry is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = table_name(path);
        Self::from_json(&name, &read_source(path)?)
            .map_err(|e| relabel(e, &path.display().to_string()))
    }

    /// # Errors
    ///
    /// `ConfigLoad` if `json` is not an object or a value is not a number.
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let object = read_json_object(name, json)?;
        let mut entries = BTreeMap::new();
        for (category, value) in object {
            let code = value.as_f64().ok_or_else(|| {
                PipelineError::config(
                    name,
                    format!("value for category '{category}' must be a number"),
                )
            })?;
            entries.insert(category, code);
        }
        Ok(Self::new(name, entries))
    }
}

/// Upper bounds for outlier clipping, computed offline from the reference population.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipThresholds {
    bounds: BTreeMap<String, f64>,
}

impl ClipThresholds {
    pub fn new(bounds: BTreeMap<String, f64>) -> Self {
        Self { bounds }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Self::from_json(&path.display().to_string(), &read_source(path)?)
    }

    pub fn from_json(source: &str, json: &str) -> Result<Self> {
        let object = read_json_object(source, json)?;
        let mut bounds = BTreeMap::new();
        for (column, value) in object {
            let bound = value
                .as_f64()
                .filter(|b| b.is_finite())
                .ok_or_else(|| {
                    PipelineError::config(
                        source,
                        format!("threshold for '{column}' must be a finite number"),
                    )
                })?;
            bounds.insert(column, bound);
        }
        Ok(Self { bounds })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.bounds)?)
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.bounds.get(column).copied()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.bounds.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.bounds.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        PipelineError::config(path.display().to_string(), format!("cannot read file: {e}"))
    })
}

fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Report load failures against the file path rather than the table name.
fn relabel(err: PipelineError, source: &str) -> PipelineError {
    match err {
        PipelineError::ConfigLoad { reason, .. } => PipelineError::config(source, reason),
        other => other,
    }
}
