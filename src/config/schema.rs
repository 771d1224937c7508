//! Target schema descriptor: the ordered, typed column contract of the model.

use super::read_json_object;
use crate::error::{PipelineError, Result};
use polars::prelude::DataType;
use std::path::Path;

/// Declared type of an output column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
}

impl ColumnType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "int32" => Some(Self::Int32),
            "int" | "int64" => Some(Self::Int64),
            "float32" => Some(Self::Float32),
            "float" | "float64" => Some(Self::Float64),
            "bool" | "boolean" => Some(Self::Bool),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bool => "bool",
        }
    }

    pub fn dtype(self) -> DataType {
        match self {
            Self::Int32 => DataType::Int32,
            Self::Int64 => DataType::Int64,
            Self::Float32 => DataType::Float32,
            Self::Float64 => DataType::Float64,
            Self::Bool => DataType::Boolean,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub dtype: ColumnType,
}

/// Ordered (column, type) pairs. The output frame must match this exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    fields: Vec<SchemaField>,
}

impl SchemaDescriptor {
    /// Build a descriptor, rejecting empty or duplicated column lists.
    pub fn new(fields: Vec<SchemaField>) -> Result<Self> {
        if fields.is_empty() {
            return Err(PipelineError::config("schema", "schema has no columns"));
        }
        for (idx, field) in fields.iter().enumerate() {
            if fields.iter().skip(idx + 1).any(|f| f.name == field.name) {
                return Err(PipelineError::config(
                    "schema",
                    format!("column '{}' is declared twice", field.name),
                ));
            }
        }
        Ok(Self { fields })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let json = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::config(&source, format!("cannot read file: {e}")))?;
        Self::from_json(&source, &json)
    }

    /// Parse `{"column": "dtype", ...}`; key order is the column order.
    pub fn from_json(source: &str, json: &str) -> Result<Self> {
        let object = read_json_object(source, json)?;
        let mut fields = Vec::with_capacity(object.len());
        for (name, value) in object {
            let declared = value.as_str().ok_or_else(|| {
                PipelineError::config(source, format!("type of '{name}' must be a string"))
            })?;
            let dtype = ColumnType::parse(declared).ok_or_else(|| {
                PipelineError::config(source, format!("unknown type '{declared}' for '{name}'"))
            })?;
            fields.push(SchemaField { name, dtype });
        }
        Self::new(fields).map_err(|e| match e {
            PipelineError::ConfigLoad { reason, .. } => PipelineError::config(source, reason),
            other => other,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), serde_json::Value::from(f.dtype.as_str())))
            .collect();
        Ok(serde_json::to_string_pretty(&object)?)
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.dtype)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_order_is_preserved() {
        let schema = SchemaDescriptor::from_json(
            "schema",
            r#"{"town_encoded": "float64", "bedrooms": "int64", "Flat": "bool"}"#,
        )
        .expect("schema parses");
        assert_eq!(schema.column_names(), vec!["town_encoded", "bedrooms", "Flat"]);
        assert_eq!(schema.get("Flat"), Some(ColumnType::Bool));
    }

    #[test]
    fn test_type_aliases() {
        assert_eq!(ColumnType::parse("int"), Some(ColumnType::Int64));
        assert_eq!(ColumnType::parse("Float"), Some(ColumnType::Float64));
        assert_eq!(ColumnType::parse("boolean"), Some(ColumnType::Bool));
        assert_eq!(ColumnType::parse("object"), None);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = SchemaDescriptor::from_json("cols.json", r#"{"title": "object"}"#).unwrap_err();
        assert_eq!(err.kind(), "config_load");
        assert!(err.to_string().contains("object"));
    }

    #[test]
    fn test_empty_schema_rejected() {
        let err = SchemaDescriptor::from_json("cols.json", "{}").unwrap_err();
        assert_eq!(err.field(), Some("cols.json"));
    }

    #[test]
    fn test_round_trip_keeps_order() {
        let json = r#"{"b": "int32", "a": "float32"}"#;
        let schema = SchemaDescriptor::from_json("schema", json).expect("schema parses");
        let again =
            SchemaDescriptor::from_json("schema", &schema.to_json().expect("serializes"))
                .expect("reparses");
        assert_eq!(schema, again);
    }
}
