//! Row cleanup and derived numeric features.

use super::{
    BATHROOMS, BEDROOMS, COUNT_COLUMNS, PARKING_SPACE, PRICE, PRICE_PER_BEDROOM,
    ROOM_TO_PARKING, Stage, TOILETS, TOTAL_ROOMS, cast_column, replace_series, require_column,
};
use crate::error::{PipelineError, Result};
use polars::prelude::*;

/// Casts the room and parking counts to Int64.
///
/// Floats truncate and numeric strings parse. Missing or non-numeric values
/// reject the request.
#[derive(Debug, Clone)]
pub struct CastCounts {
    columns: Vec<String>,
}

impl CastCounts {
    pub const NAME: &'static str = "cast_counts";

    pub fn new(columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for CastCounts {
    fn default() -> Self {
        Self::new(COUNT_COLUMNS)
    }
}

impl Stage for CastCounts {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for name in &self.columns {
            let column = require_column(df, name)?;
            let missing = column.null_count();
            if missing > 0 {
                return Err(PipelineError::type_cast(
                    name,
                    "int64",
                    format!("{missing} missing value(s)"),
                ));
            }
            out.with_column(cast_column(column, &DataType::Int64, "int64")?)?;
        }
        Ok(out)
    }

    fn description(&self) -> String {
        format!("Cast {} count columns to int64", self.columns.len())
    }
}

/// Drops exact duplicate rows, keeping the first occurrence in input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deduplicate;

impl Deduplicate {
    pub const NAME: &'static str = "deduplicate";
}

impl Stage for Deduplicate {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        if df.height() < 2 {
            return Ok(df.clone());
        }
        Ok(df
            .clone()
            .lazy()
            .unique_stable(None, UniqueKeepStrategy::First)
            .collect()?)
    }

    fn description(&self) -> String {
        "Drop duplicate rows".to_owned()
    }
}

/// `price = ln(1 + price)`, training mode only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPrice;

impl LogPrice {
    pub const NAME: &'static str = "log_price";
}

impl Stage for LogPrice {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let price = cast_column(require_column(df, PRICE)?, &DataType::Float64, "float64")?;
        let logged: Float64Chunked = price
            .f64()?
            .into_iter()
            .map(|v| v.map(f64::ln_1p))
            .collect();
        replace_series(df, logged.with_name(PRICE.into()).into_series())
    }

    fn description(&self) -> String {
        "Log-transform price as ln(1 + price)".to_owned()
    }
}

/// Derives the engineered columns:
///
/// - `price_per_bedroom = price / (bedrooms + 1)` (training mode)
/// - `total_rooms = bedrooms + bathrooms + toilets`
/// - `room_to_parking = total_rooms / (parking_space + 1)`
///
/// The `+ 1` keeps zero-bedroom and zero-parking rows finite.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEngineer {
    price_per_bedroom: bool,
}

impl FeatureEngineer {
    pub const NAME: &'static str = "engineer_features";

    pub fn new(price_per_bedroom: bool) -> Self {
        Self { price_per_bedroom }
    }

    /// Columns this stage adds, in the order it adds them.
    pub fn output_columns(&self) -> Vec<&'static str> {
        let mut out = Vec::with_capacity(3);
        if self.price_per_bedroom {
            out.push(PRICE_PER_BEDROOM);
        }
        out.extend([TOTAL_ROOMS, ROOM_TO_PARKING]);
        out
    }

    fn required_columns(&self) -> Vec<&'static str> {
        let mut required = vec![BEDROOMS, BATHROOMS, TOILETS, PARKING_SPACE];
        if self.price_per_bedroom {
            required.push(PRICE);
        }
        required
    }
}

fn float(name: &str) -> Expr {
    col(name).cast(DataType::Float64)
}

impl Stage for FeatureEngineer {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        for name in self.required_columns() {
            require_column(df, name)?;
        }

        let mut lf = df.clone().lazy();
        if self.price_per_bedroom {
            lf = lf.with_column(
                (float(PRICE) / (float(BEDROOMS) + lit(1.0))).alias(PRICE_PER_BEDROOM),
            );
        }
        lf = lf
            .with_column((float(BEDROOMS) + float(BATHROOMS) + float(TOILETS)).alias(TOTAL_ROOMS))
            .with_column(
                (col(TOTAL_ROOMS) / (float(PARKING_SPACE) + lit(1.0))).alias(ROOM_TO_PARKING),
            );

        Ok(lf.collect()?)
    }

    fn description(&self) -> String {
        format!("Derive {}", self.output_columns().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn counts(
        bedrooms: &[i64],
        bathrooms: &[i64],
        toilets: &[i64],
        parking: &[i64],
    ) -> DataFrame {
        DataFrame::new(vec![
            Column::from(Series::new(BEDROOMS.into(), bedrooms)),
            Column::from(Series::new(BATHROOMS.into(), bathrooms)),
            Column::from(Series::new(TOILETS.into(), toilets)),
            Column::from(Series::new(PARKING_SPACE.into(), parking)),
        ])
        .expect("valid frame")
    }

    fn f64_at(df: &DataFrame, name: &str, idx: usize) -> Option<f64> {
        df.column(name)
            .ok()?
            .as_materialized_series()
            .f64()
            .ok()?
            .get(idx)
    }

    #[test]
    fn test_total_rooms_is_exact_sum() -> Result<()> {
        let df = counts(&[0, 3, 10], &[0, 2, 7], &[0, 2, 9], &[0, 1, 4]);
        let out = FeatureEngineer::new(false).apply(&df)?;
        for (idx, expected) in [0.0, 7.0, 26.0].into_iter().enumerate() {
            assert_eq!(f64_at(&out, TOTAL_ROOMS, idx), Some(expected));
        }
        Ok(())
    }

    #[test]
    fn test_room_to_parking_guards_zero() -> Result<()> {
        let df = counts(&[3, 1], &[2, 0], &[2, 0], &[1, 0]);
        let out = FeatureEngineer::new(false).apply(&df)?;
        assert_eq!(f64_at(&out, ROOM_TO_PARKING, 0), Some(3.5));
        assert_eq!(f64_at(&out, ROOM_TO_PARKING, 1), Some(1.0));
        assert!(!has_price_per_bedroom(&out));
        Ok(())
    }

    fn has_price_per_bedroom(df: &DataFrame) -> bool {
        df.column(PRICE_PER_BEDROOM).is_ok()
    }

    #[test]
    fn test_price_per_bedroom_uses_plus_one() -> Result<()> {
        let mut df = counts(&[0, 3], &[1, 2], &[1, 2], &[0, 1]);
        df.with_column(Series::new(PRICE.into(), &[10.0, 20.0]))?;
        let out = FeatureEngineer::new(true).apply(&df)?;
        assert_eq!(f64_at(&out, PRICE_PER_BEDROOM, 0), Some(10.0));
        assert_eq!(f64_at(&out, PRICE_PER_BEDROOM, 1), Some(5.0));
        Ok(())
    }

    #[test]
    fn test_missing_base_column() {
        let df = DataFrame::new(vec![Column::from(Series::new(BEDROOMS.into(), &[1i64]))])
            .expect("valid frame");
        let err = FeatureEngineer::new(false).apply(&df).unwrap_err();
        assert_eq!(err.field(), Some(BATHROOMS));
    }

    #[test]
    fn test_price_required_for_price_per_bedroom() {
        let df = counts(&[1], &[1], &[1], &[1]);
        let err = FeatureEngineer::new(true).apply(&df).unwrap_err();
        assert_eq!(err.kind(), "missing_column");
        assert_eq!(err.field(), Some(PRICE));
    }

    #[test]
    fn test_cast_counts_truncates_and_parses() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::from(Series::new(BEDROOMS.into(), &[3.9, 2.0])),
            Column::from(Series::new(BATHROOMS.into(), &["2", "1"])),
            Column::from(Series::new(TOILETS.into(), &[2i64, 1])),
            Column::from(Series::new(PARKING_SPACE.into(), &[1i64, 0])),
        ])?;
        let out = CastCounts::default().apply(&df)?;
        let bedrooms = out.column(BEDROOMS)?.as_materialized_series().i64()?.clone();
        assert_eq!(bedrooms.get(0), Some(3));
        let bathrooms = out.column(BATHROOMS)?.as_materialized_series().i64()?.clone();
        assert_eq!(bathrooms.get(0), Some(2));
        Ok(())
    }

    #[test]
    fn test_cast_counts_rejects_text_and_nulls() -> Result<()> {
        let bad_text = DataFrame::new(vec![
            Column::from(Series::new(BEDROOMS.into(), &["three"])),
            Column::from(Series::new(BATHROOMS.into(), &[1i64])),
            Column::from(Series::new(TOILETS.into(), &[1i64])),
            Column::from(Series::new(PARKING_SPACE.into(), &[1i64])),
        ])?;
        let err = CastCounts::default().apply(&bad_text).unwrap_err();
        assert_eq!(err.kind(), "type_cast");
        assert_eq!(err.field(), Some(BEDROOMS));

        let with_null = DataFrame::new(vec![
            Column::from(Series::new(BEDROOMS.into(), &[Some(1i64), None])),
            Column::from(Series::new(BATHROOMS.into(), &[1i64, 1])),
            Column::from(Series::new(TOILETS.into(), &[1i64, 1])),
            Column::from(Series::new(PARKING_SPACE.into(), &[1i64, 1])),
        ])?;
        let err = CastCounts::default().apply(&with_null).unwrap_err();
        assert!(err.to_string().contains("missing value"));
        Ok(())
    }

    #[test]
    fn test_deduplicate_keeps_first_in_order() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::from(Series::new(BEDROOMS.into(), &[3i64, 1, 3, 2])),
            Column::from(Series::new("town".into(), &["Ikeja", "Lekki", "Ikeja", "Ajah"])),
        ])?;
        let out = Deduplicate.apply(&df)?;
        assert_eq!(out.height(), 3);
        let towns = out.column("town")?.as_materialized_series().str()?.clone();
        let towns: Vec<_> = towns.into_iter().flatten().collect();
        assert_eq!(towns, vec!["Ikeja", "Lekki", "Ajah"]);
        Ok(())
    }

    #[test]
    fn test_log_price() -> Result<()> {
        let prices = Series::new(PRICE.into(), &[0i64, 50_000_000]);
        let df = DataFrame::new(vec![Column::from(prices)])?;
        let out = LogPrice.apply(&df)?;
        assert_eq!(f64_at(&out, PRICE, 0), Some(0.0));
        let logged = f64_at(&out, PRICE, 1).expect("price present");
        assert!((logged - 50_000_001f64.ln()).abs() < 1e-12);
        // input frame untouched
        assert_eq!(df.column(PRICE)?.dtype(), &DataType::Int64);
        Ok(())
    }
}
