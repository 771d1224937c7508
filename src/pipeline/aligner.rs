//! Final alignment against the schema descriptor.

use super::{Stage, cast_column};
use crate::config::SchemaDescriptor;
use crate::error::Result;
use polars::prelude::*;
use std::sync::Arc;

/// Emits exactly the descriptor's columns, in its order, cast to the declared types.
///
/// Declared columns missing from the input become all-null placeholders, which
/// [`DropMissing`] then removes row by row. Undeclared columns are dropped.
#[derive(Debug, Clone)]
pub struct SchemaAligner {
    schema: Arc<SchemaDescriptor>,
}

impl SchemaAligner {
    pub const NAME: &'static str = "align_schema";

    pub fn new(schema: Arc<SchemaDescriptor>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }
}

impl Stage for SchemaAligner {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let height = df.height();
        let mut columns = Vec::with_capacity(self.schema.len());

        for field in self.schema.fields() {
            let dtype = field.dtype.dtype();
            let series = if let Ok(existing) = df.column(&field.name) {
                cast_column(existing, &dtype, field.dtype.as_str())?
            } else {
                tracing::debug!(column = %field.name, "Schema column absent, adding placeholder");
                Series::full_null(field.name.as_str().into(), height, &dtype)
            };
            columns.push(Column::from(series));
        }

        if tracing::enabled!(tracing::Level::DEBUG) {
            let dropped: Vec<String> = df
                .get_column_names()
                .iter()
                .filter(|n| self.schema.get(n.as_str()).is_none())
                .map(|n| n.to_string())
                .collect();
            if !dropped.is_empty() {
                tracing::debug!(?dropped, "Dropping columns outside the schema");
            }
        }

        Ok(DataFrame::new(columns)?)
    }

    fn description(&self) -> String {
        format!("Align to {} schema columns", self.schema.len())
    }
}

/// Drops every row that still holds a null, or a NaN in a float column.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropMissing;

impl DropMissing {
    pub const NAME: &'static str = "drop_missing";
}

impl Stage for DropMissing {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut keep = vec![true; df.height()];

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            if series.null_count() > 0 {
                let nulls = series.is_null();
                for (flag, is_null) in keep.iter_mut().zip(&nulls) {
                    if is_null == Some(true) {
                        *flag = false;
                    }
                }
            }
            if series.dtype().is_float() {
                let values = series.cast(&DataType::Float64)?;
                for (flag, value) in keep.iter_mut().zip(values.f64()?) {
                    if value.is_some_and(f64::is_nan) {
                        *flag = false;
                    }
                }
            }
        }

        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return Ok(df.clone());
        }

        tracing::warn!(dropped, rows = df.height(), "Dropping rows with missing values");
        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        Ok(df.filter(&mask)?)
    }

    fn description(&self) -> String {
        "Drop rows with missing values".to_owned()
    }
}
