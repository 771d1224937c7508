//! Request-side data model: raw records in, feature vectors out.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One raw field value as it arrives from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// One unvalidated input row. Extra and missing fields are allowed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, RawValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Records decoded from a request payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordBatch {
    pub records: Vec<Record>,
}

impl RecordBatch {
    /// Decode the payload shapes the dashboard and endpoint exchange:
    ///
    /// - `[{...}, {...}]`: list of records
    /// - `{"bedrooms": [3, 4], ...}`: column-oriented lists
    /// - `{"bedrooms": {"0": 3, "1": 4}, ...}`: pandas `to_dict()` layout
    /// - `{"bedrooms": 3, ...}`: a single record
    ///
    /// # Errors
    ///
    /// `Payload` if the value is neither an object nor an array of objects,
    /// column lists differ in length, or a field holds a nested value.
    pub fn from_json(payload: &serde_json::Value) -> Result<Self> {
        match payload {
            serde_json::Value::Array(items) => {
                let records = items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| {
                        serde_json::from_value::<Record>(item.clone()).map_err(|e| {
                            PipelineError::Payload(format!("record {idx} is not an object: {e}"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Self { records })
            }
            serde_json::Value::Object(map) if map.is_empty() => Ok(Self::default()),
            serde_json::Value::Object(map) => {
                if map.values().all(serde_json::Value::is_array) {
                    Self::from_columns(map)
                } else if map.values().all(serde_json::Value::is_object) {
                    Self::from_indexed_columns(map)
                } else {
                    let record = serde_json::from_value::<Record>(payload.clone())?;
                    Ok(Self {
                        records: vec![record],
                    })
                }
            }
            _ => Err(PipelineError::Payload(
                "expected a JSON object or array of objects".to_owned(),
            )),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    fn from_columns(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut height = None;
        let mut records = Vec::new();
        for (name, values) in map {
            let values = values.as_array().map(Vec::as_slice).unwrap_or_default();
            match height {
                None => {
                    height = Some(values.len());
                    records = vec![Record::new(); values.len()];
                }
                Some(h) if h != values.len() => {
                    return Err(PipelineError::Payload(format!(
                        "column '{name}' has {} values, expected {h}",
                        values.len()
                    )));
                }
                Some(_) => {}
            }
            for (record, value) in records.iter_mut().zip(values) {
                record.insert(name.clone(), decode_value(name, value)?);
            }
        }
        Ok(Self { records })
    }

    fn from_indexed_columns(map: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        let mut rows: BTreeMap<RowKey, Record> = BTreeMap::new();
        for (name, values) in map {
            let Some(values) = values.as_object() else {
                continue;
            };
            for (index, value) in values {
                rows.entry(RowKey::parse(index))
                    .or_default()
                    .insert(name.clone(), decode_value(name, value)?);
            }
        }
        Ok(Self {
            records: rows.into_values().collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_frame(&self) -> Result<DataFrame> {
        records_to_frame(&self.records)
    }
}

/// pandas index keys: numeric indices sort numerically, anything else after them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum RowKey {
    Position(u64),
    Label(String),
}

impl RowKey {
    fn parse(s: &str) -> Self {
        s.parse::<u64>()
            .map_or_else(|_| Self::Label(s.to_owned()), Self::Position)
    }
}

fn decode_value(field: &str, value: &serde_json::Value) -> Result<RawValue> {
    serde_json::from_value(value.clone()).map_err(|_| {
        PipelineError::Payload(format!(
            "field '{field}' must be a number, string or null, found {value}"
        ))
    })
}

/// Column type inferred from the values a field takes across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredKind {
    Int,
    Float,
    Text,
}

/// Build one frame from a batch of records.
///
/// Each field becomes a column. Integer-only fields are Int64, numeric fields
/// with any float are Float64, anything containing a string is String.
/// Records lacking a field contribute a null.
///
/// # Errors
///
/// `Payload` for an empty batch, `Data` if the frame cannot be assembled.
pub fn records_to_frame(records: &[Record]) -> Result<DataFrame> {
    if records.is_empty() {
        return Err(PipelineError::Payload("no records".to_owned()));
    }

    let names: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.fields.keys().map(String::as_str))
        .collect();

    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let values: Vec<Option<&RawValue>> = records
            .iter()
            .map(|r| r.get(name).filter(|v| !matches!(v, RawValue::Null)))
            .collect();

        let kind = values
            .iter()
            .flatten()
            .fold(InferredKind::Int, |kind, value| match (kind, value) {
                (_, RawValue::Text(_)) | (InferredKind::Text, _) => InferredKind::Text,
                (_, RawValue::Float(_)) | (InferredKind::Float, _) => InferredKind::Float,
                _ => kind,
            });

        let series = match kind {
            InferredKind::Int => Series::new(
                name.into(),
                values
                    .iter()
                    .map(|v| match v {
                        Some(RawValue::Int(i)) => Some(*i),
                        _ => None,
                    })
                    .collect::<Vec<Option<i64>>>(),
            ),
            InferredKind::Float => Series::new(
                name.into(),
                values
                    .iter()
                    .map(|v| match v {
                        Some(RawValue::Int(i)) => Some(*i as f64),
                        Some(RawValue::Float(f)) => Some(*f),
                        _ => None,
                    })
                    .collect::<Vec<Option<f64>>>(),
            ),
            InferredKind::Text => Series::new(
                name.into(),
                values
                    .iter()
                    .map(|v| match v {
                        Some(RawValue::Int(i)) => Some(i.to_string()),
                        Some(RawValue::Float(f)) => Some(f.to_string()),
                        Some(RawValue::Text(s)) => Some(s.clone()),
                        _ => None,
                    })
                    .collect::<Vec<Option<String>>>(),
            ),
        };
        columns.push(Column::from(series));
    }

    Ok(DataFrame::new(columns)?)
}

/// Pipeline output: columns exactly match the schema descriptor, no missing values.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    frame: DataFrame,
}

impl FeatureVector {
    pub(crate) fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Row-major numeric matrix in schema column order (booleans become 0/1).
    ///
    /// # Errors
    ///
    /// `Data` if a column cannot be cast to Float64.
    pub fn to_rows(&self) -> Result<Vec<Vec<f64>>> {
        let mut rows = vec![Vec::with_capacity(self.frame.width()); self.frame.height()];
        for column in self.frame.get_columns() {
            let values = column
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            for (row, value) in rows.iter_mut().zip(values.f64()?) {
                row.push(value.unwrap_or(f64::NAN));
            }
        }
        Ok(rows)
    }
}
