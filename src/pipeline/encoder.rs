//! Categorical encoders.
//!
//! Two policies, chosen per column:
//!
//! - [`ExpansionEncoder`]: one boolean column per known category (one-hot).
//!   An **unseen category encodes as all-false**. This is the one deliberate
//!   silent degradation in the pipeline; a property type the model never saw
//!   simply contributes no title signal.
//! - [`ScalarEncoder`]: direct lookup of a numeric code. Unseen categories
//!   follow an [`UnknownCategoryPolicy`], and a pipeline applies the same
//!   policy to every scalar-encoded field.
//!
//! Category values are compared by their string form, so a numeric town code
//! arriving as `101` (or `101.0`) matches a table key `"101"`.

use super::{Stage, has_column, replace_series, require_column};
use crate::config::{ExpansionTable, ScalarTable};
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

/// What a scalar encoder does with a category missing from its table.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UnknownCategoryPolicy {
    /// Reject the request with `UnknownCategory`, including a null category
    #[default]
    Reject,
    /// Encode as the given code. A null category stays null and its row is
    /// removed by the final missing-value stage.
    Fallback(f64),
}

/// Category values as text. Whole-number floats drop their fraction, so
/// `5.0` reads as `"5"` the way an integer code would.
fn category_text(column: &Column) -> Result<Series> {
    let series = column.as_materialized_series();
    if !series.dtype().is_float() {
        return Ok(series.cast(&DataType::String)?);
    }
    let values = series.cast(&DataType::Float64)?;
    let text: StringChunked = values
        .f64()?
        .into_iter()
        .map(|v| v.map(|x| x.to_string()))
        .collect();
    Ok(text.with_name(series.name().clone()).into_series())
}

/// One-hot encoder driven by an [`ExpansionTable`].
#[derive(Debug, Clone)]
pub struct ExpansionEncoder {
    column: String,
    aliases: Vec<String>,
    table: Arc<ExpansionTable>,
}

impl ExpansionEncoder {
    pub const NAME: &'static str = "expand_category";

    /// # Errors
    ///
    /// `EmptyTable` if the table has no categories.
    pub fn new(column: impl Into<String>, table: Arc<ExpansionTable>) -> Result<Self> {
        if table.is_empty() {
            return Err(PipelineError::EmptyTable {
                table: table.name().to_owned(),
            });
        }
        Ok(Self {
            column: column.into(),
            aliases: Vec::new(),
            table,
        })
    }

    /// Accept `alias` as the source column when `column` itself is absent.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Boolean columns this encoder produces.
    pub fn output_columns(&self) -> Vec<&str> {
        self.table
            .target_columns()
            .into_iter()
            .map(|(column, _)| column)
            .collect()
    }

    fn source_column<'a>(&'a self, df: &DataFrame) -> Result<&'a str> {
        std::iter::once(&self.column)
            .chain(&self.aliases)
            .find(|name| has_column(df, name))
            .map(String::as_str)
            .ok_or_else(|| PipelineError::missing_column(&self.column))
    }
}

impl Stage for ExpansionEncoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let source = self.source_column(df)?;
        let df = replace_series(df, category_text(require_column(df, source)?)?)?;
        let targets = self.table.target_columns();
        let produced: HashSet<&str> = targets.iter().map(|(column, _)| *column).collect();

        let category = col(source);
        let mut exprs: Vec<Expr> = df
            .get_column_names()
            .iter()
            .map(|name| name.as_str())
            .filter(|name| *name != source && !produced.contains(name))
            .map(col)
            .collect();

        for (target, categories) in targets {
            let matched = categories
                .iter()
                .map(|c| category.clone().eq(lit(*c)))
                .reduce(|a, b| a.or(b))
                .unwrap_or_else(|| lit(false));
            // a null category compares as null and falls through to false
            exprs.push(
                when(matched)
                    .then(lit(true))
                    .otherwise(lit(false))
                    .alias(target),
            );
        }

        Ok(df.lazy().select(exprs).collect()?)
    }

    fn description(&self) -> String {
        format!(
            "One-hot encode '{}' into {} columns",
            self.column,
            self.output_columns().len()
        )
    }
}

/// Replaces a categorical column, in place, with its numeric code.
#[derive(Debug, Clone)]
pub struct ScalarEncoder {
    column: String,
    output: String,
    table: Arc<ScalarTable>,
    policy: UnknownCategoryPolicy,
}

impl ScalarEncoder {
    pub const NAME: &'static str = "encode_scalar";

    /// # Errors
    ///
    /// `EmptyTable` if the table has no categories.
    pub fn new(
        column: impl Into<String>,
        output: impl Into<String>,
        table: Arc<ScalarTable>,
        policy: UnknownCategoryPolicy,
    ) -> Result<Self> {
        if table.is_empty() {
            return Err(PipelineError::EmptyTable {
                table: table.name().to_owned(),
            });
        }
        Ok(Self {
            column: column.into(),
            output: output.into(),
            table,
            policy,
        })
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    /// Code for a single category under this encoder's policy.
    ///
    /// # Errors
    ///
    /// `UnknownCategory` if `category` is not in the table and the policy is
    /// [`UnknownCategoryPolicy::Reject`].
    pub fn encode(&self, category: &str) -> Result<f64> {
        match (self.table.get(category), self.policy) {
            (Some(code), _) => Ok(*code),
            (None, UnknownCategoryPolicy::Fallback(code)) => Ok(code),
            (None, UnknownCategoryPolicy::Reject) => Err(PipelineError::UnknownCategory {
                column: self.column.clone(),
                value: category.to_owned(),
            }),
        }
    }
}

impl Stage for ScalarEncoder {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let source = require_column(df, &self.column)?;
        let categories = category_text(source)?;

        let mut codes: Vec<Option<f64>> = Vec::with_capacity(categories.len());
        for category in categories.str()? {
            let code = match (category, self.policy) {
                (Some(c), _) => Some(self.encode(c)?),
                (None, UnknownCategoryPolicy::Reject) => {
                    return Err(PipelineError::UnknownCategory {
                        column: self.column.clone(),
                        value: "null".to_owned(),
                    });
                }
                (None, UnknownCategoryPolicy::Fallback(_)) => None,
            };
            codes.push(code);
        }
        let encoded = Column::from(Series::new(self.output.as_str().into(), codes));

        let columns: Vec<Column> = df
            .get_columns()
            .iter()
            .filter(|c| c.name().as_str() == self.column || c.name().as_str() != self.output)
            .map(|c| {
                if c.name().as_str() == self.column {
                    encoded.clone()
                } else {
                    c.clone()
                }
            })
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    fn description(&self) -> String {
        format!(
            "Encode '{}' as '{}' using {} codes",
            self.column,
            self.output,
            self.table.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::collections::BTreeMap;

    fn title_table() -> Arc<ExpansionTable> {
        let entries: BTreeMap<String, String> =
            ["Detached Duplex", "Block of Flats", "Terraced Duplexes"]
                .into_iter()
                .map(|t| (t.to_owned(), t.to_owned()))
                .collect();
        Arc::new(ExpansionTable::new("title", entries))
    }

    fn town_table() -> Arc<ScalarTable> {
        let entries: BTreeMap<String, f64> =
            [("Ikeja".to_owned(), 0.04), ("Lekki".to_owned(), 0.29)].into_iter().collect();
        Arc::new(ScalarTable::new("town", entries))
    }

    fn bools(df: &DataFrame, name: &str) -> Vec<Option<bool>> {
        df.column(name)
            .expect("column present")
            .as_materialized_series()
            .bool()
            .expect("bool column")
            .into_iter()
            .collect()
    }

    fn frame(column: &str, values: &[Option<&str>]) -> DataFrame {
        DataFrame::new(vec![
            Column::from(Series::new("bedrooms".into(), vec![1i64; values.len()])),
            Column::from(Series::new(column.into(), values)),
        ])
        .expect("valid frame")
    }

    #[test]
    fn test_known_category_sets_exactly_one_column() -> Result<()> {
        let encoder = ExpansionEncoder::new("title", title_table())?;
        let out = encoder.apply(&frame("title", &[Some("Detached Duplex")]))?;

        assert!(out.column("title").is_err(), "source column is removed");
        assert_eq!(bools(&out, "Detached Duplex"), vec![Some(true)]);
        assert_eq!(bools(&out, "Block of Flats"), vec![Some(false)]);
        assert_eq!(bools(&out, "Terraced Duplexes"), vec![Some(false)]);
        Ok(())
    }

    #[test]
    fn test_unseen_category_encodes_as_all_false() -> Result<()> {
        let encoder = ExpansionEncoder::new("title", title_table())?;
        let out = encoder.apply(&frame("title", &[Some("Treehouse"), None]))?;

        for column in encoder.output_columns() {
            assert_eq!(bools(&out, column), vec![Some(false), Some(false)]);
        }
        assert_eq!(out.height(), 2);
        Ok(())
    }

    #[test]
    fn test_expansion_accepts_alias() -> Result<()> {
        let encoder = ExpansionEncoder::new("title", title_table())?.with_alias("property_type");
        let out = encoder.apply(&frame("property_type", &[Some("Block of Flats")]))?;
        assert_eq!(bools(&out, "Block of Flats"), vec![Some(true)]);
        assert!(out.column("property_type").is_err());
        Ok(())
    }

    #[test]
    fn test_expansion_missing_column() -> Result<()> {
        let encoder = ExpansionEncoder::new("title", title_table())?;
        let err = encoder.apply(&frame("state", &[Some("Lagos")])).unwrap_err();
        assert_eq!(err.kind(), "missing_column");
        assert_eq!(err.field(), Some("title"));
        Ok(())
    }

    #[test]
    fn test_empty_tables_rejected_at_construction() {
        let empty = Arc::new(ExpansionTable::new("title", BTreeMap::new()));
        let err = ExpansionEncoder::new("title", empty).unwrap_err();
        assert_eq!(err.kind(), "empty_table");

        let empty = Arc::new(ScalarTable::new("town", BTreeMap::new()));
        let err = ScalarEncoder::new("town", "town_encoded", empty, UnknownCategoryPolicy::Reject)
            .unwrap_err();
        assert_eq!(err.field(), Some("town"));
    }

    #[test]
    fn test_scalar_replaces_in_place() -> Result<()> {
        let encoder = ScalarEncoder::new(
            "town",
            "town_encoded",
            town_table(),
            UnknownCategoryPolicy::Reject,
        )?;
        let df = DataFrame::new(vec![
            Column::from(Series::new("town".into(), &["Lekki", "Ikeja"])),
            Column::from(Series::new("bedrooms".into(), &[2i64, 3])),
        ])?;
        let out = encoder.apply(&df)?;

        let names: Vec<String> = out.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["town_encoded", "bedrooms"]);
        let codes: Vec<Option<f64>> = out
            .column("town_encoded")?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(codes, vec![Some(0.29), Some(0.04)]);
        Ok(())
    }

    #[test]
    fn test_scalar_encoding_is_pure() -> Result<()> {
        let encoder = ScalarEncoder::new(
            "town",
            "town_encoded",
            town_table(),
            UnknownCategoryPolicy::Reject,
        )?;
        let first = encoder.encode("Ikeja")?;
        for _ in 0..3 {
            assert_eq!(encoder.encode("Ikeja")?.to_bits(), first.to_bits());
        }
        Ok(())
    }

    #[test]
    fn test_scalar_unknown_rejected() -> Result<()> {
        let encoder = ScalarEncoder::new(
            "town",
            "town_encoded",
            town_table(),
            UnknownCategoryPolicy::Reject,
        )?;
        let err = encoder
            .apply(&frame("town", &[Some("Ikeja"), Some("Atlantis")]))
            .unwrap_err();
        match err {
            PipelineError::UnknownCategory { column, value } => {
                assert_eq!(column, "town");
                assert_eq!(value, "Atlantis");
            }
            other => panic!("expected UnknownCategory, got {other}"),
        }
        Ok(())
    }

    #[test]
    fn test_scalar_unknown_fallback() -> Result<()> {
        let encoder = ScalarEncoder::new(
            "town",
            "town_encoded",
            town_table(),
            UnknownCategoryPolicy::Fallback(-1.0),
        )?;
        let out = encoder.apply(&frame("town", &[Some("Atlantis"), None]))?;
        let codes: Vec<Option<f64>> = out
            .column("town_encoded")?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(codes, vec![Some(-1.0), None]);
        Ok(())
    }

    #[test]
    fn test_scalar_matches_numeric_categories_by_text() -> Result<()> {
        let entries: BTreeMap<String, f64> = [("101".to_owned(), 7.0)].into_iter().collect();
        let encoder = ScalarEncoder::new(
            "town",
            "town_encoded",
            Arc::new(ScalarTable::new("town", entries)),
            UnknownCategoryPolicy::Reject,
        )?;
        let df = DataFrame::new(vec![Column::from(Series::new("town".into(), &[101i64]))])?;
        let out = encoder.apply(&df)?;
        let code = out.column("town_encoded")?.as_materialized_series().f64()?.get(0);
        assert_eq!(code, Some(7.0));
        Ok(())
    }

    #[test]
    fn test_scalar_whole_float_matches_integer_key() -> Result<()> {
        let entries: BTreeMap<String, f64> =
            [("5".to_owned(), 0.5), ("5.5".to_owned(), 0.55)].into_iter().collect();
        let encoder = ScalarEncoder::new(
            "town",
            "town_encoded",
            Arc::new(ScalarTable::new("town", entries)),
            UnknownCategoryPolicy::Reject,
        )?;
        let df = DataFrame::new(vec![Column::from(Series::new("town".into(), &[5.0f64, 5.5]))])?;
        let out = encoder.apply(&df)?;
        let codes: Vec<Option<f64>> = out
            .column("town_encoded")?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(codes, vec![Some(0.5), Some(0.55)]);
        Ok(())
    }

    #[test]
    fn test_expansion_whole_float_matches_integer_key() -> Result<()> {
        let entries: BTreeMap<String, String> =
            [("3".to_owned(), "Flat".to_owned())].into_iter().collect();
        let table = Arc::new(ExpansionTable::new("title", entries));
        let encoder = ExpansionEncoder::new("title", table)?;
        let df = DataFrame::new(vec![Column::from(Series::new("title".into(), &[3.0f64, 4.0]))])?;
        let out = encoder.apply(&df)?;
        assert_eq!(bools(&out, "Flat"), vec![Some(true), Some(false)]);
        Ok(())
    }

    #[test]
    fn test_scalar_null_rejected() -> Result<()> {
        let encoder = ScalarEncoder::new(
            "town",
            "town_encoded",
            town_table(),
            UnknownCategoryPolicy::Reject,
        )?;
        let err = encoder.apply(&frame("town", &[Some("Ikeja"), None])).unwrap_err();
        assert_eq!(err.kind(), "unknown_category");
        assert_eq!(err.field(), Some("town"));
        assert_eq!(err.to_string(), "Unknown category 'null' in column 'town'");
        Ok(())
    }
}
