//! Upper-quantile outlier clipping.
//!
//! Thresholds are computed once from the reference (training) population with
//! [`OutlierClipper::fit`] and shipped as configuration. Requests only apply
//! them; a quantile over a single request row would be meaningless.

use super::{PARKING_SPACE, Stage, TOILETS, cast_column, replace_series, require_column};
use crate::config::ClipThresholds;
use crate::error::{PipelineError, Result};
use polars::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Quantile used for the reference thresholds.
pub const DEFAULT_QUANTILE: f64 = 0.99;

/// Columns clipped by the reference model.
pub const DEFAULT_CLIP_COLUMNS: [&str; 2] = [TOILETS, PARKING_SPACE];

/// Caps configured columns at their threshold. A ceiling, not a filter: no rows are dropped.
#[derive(Debug, Clone)]
pub struct OutlierClipper {
    thresholds: Arc<ClipThresholds>,
}

impl OutlierClipper {
    pub const NAME: &'static str = "clip_outliers";

    pub fn new(thresholds: Arc<ClipThresholds>) -> Self {
        Self { thresholds }
    }

    /// Compute thresholds from a reference population.
    ///
    /// Uses linear interpolation between the closest ranks, matching the
    /// quantiles the model was trained with.
    ///
    /// # Errors
    ///
    /// `MissingColumn` for absent columns, `TypeCast` for non-numeric ones,
    /// `ConfigLoad` if `quantile` is outside `[0, 1]` or a column has no values.
    pub fn fit(reference: &DataFrame, columns: &[&str], quantile: f64) -> Result<ClipThresholds> {
        if !(0.0..=1.0).contains(&quantile) {
            return Err(PipelineError::config(
                "quantile",
                format!("quantile must be within [0, 1], got {quantile}"),
            ));
        }

        let mut bounds = BTreeMap::new();
        for &name in columns {
            let column = require_column(reference, name)?;
            let values = cast_column(column, &DataType::Float64, "float64")?;
            let bound = values
                .f64()?
                .quantile(quantile, QuantileMethod::Linear)?
                .ok_or_else(|| {
                    PipelineError::config(name, "reference column has no values to fit")
                })?;
            tracing::debug!(column = name, quantile, bound, "Fitted clip threshold");
            bounds.insert(name.to_owned(), bound);
        }

        Ok(ClipThresholds::new(bounds))
    }

    pub fn thresholds(&self) -> &ClipThresholds {
        &self.thresholds
    }
}

fn clip_upper(values: &Float64Chunked, bound: f64) -> Float64Chunked {
    values
        .into_iter()
        .map(|v| v.map(|x| if x > bound { bound } else { x }))
        .collect()
}

impl Stage for OutlierClipper {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut out = df.clone();
        for (name, bound) in self.thresholds.iter() {
            let values = cast_column(require_column(df, name)?, &DataType::Float64, "float64")?;
            let clipped = clip_upper(values.f64()?, bound).with_name(name.into());
            out = replace_series(&out, clipped.into_series())?;
        }
        Ok(out)
    }

    fn description(&self) -> String {
        let columns: Vec<&str> = self.thresholds.columns().collect();
        format!("Clip {} at their reference thresholds", columns.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn clipper(bounds: &[(&str, f64)]) -> OutlierClipper {
        let bounds = bounds.iter().map(|(k, v)| ((*k).to_owned(), *v)).collect();
        OutlierClipper::new(Arc::new(ClipThresholds::new(bounds)))
    }

    fn values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
        df.column(name)
            .expect("column present")
            .as_materialized_series()
            .f64()
            .expect("float column")
            .into_iter()
            .collect()
    }

    #[test]
    fn test_clips_only_above_bound() -> Result<()> {
        let df = DataFrame::new(vec![
            Column::from(Series::new(TOILETS.into(), &[Some(1i64), Some(8), Some(15), None])),
            Column::from(Series::new("bedrooms".into(), &[1i64, 2, 3, 4])),
        ])?;
        let out = clipper(&[(TOILETS, 8.0)]).apply(&df)?;
        assert_eq!(
            values(&out, TOILETS),
            vec![Some(1.0), Some(8.0), Some(8.0), None]
        );
        assert_eq!(out.height(), 4, "clipping never drops rows");
        assert_eq!(out.column("bedrooms")?.dtype(), &DataType::Int64);
        Ok(())
    }

    #[test]
    fn test_clipping_is_idempotent() -> Result<()> {
        let df = DataFrame::new(vec![Column::from(Series::new(
            PARKING_SPACE.into(),
            &[0.0, 4.5, 9.0, 12.0, 100.0],
        ))])?;
        let stage = clipper(&[(PARKING_SPACE, 9.0)]);
        let once = stage.apply(&df)?;
        let twice = stage.apply(&once)?;
        assert_eq!(values(&once, PARKING_SPACE), values(&twice, PARKING_SPACE));
        assert!(once.equals_missing(&twice));
        Ok(())
    }

    #[test]
    fn test_missing_clip_column() {
        let df = DataFrame::new(vec![Column::from(Series::new(TOILETS.into(), &[1i64]))])
            .expect("valid frame");
        let err = clipper(&[(PARKING_SPACE, 3.0)]).apply(&df).unwrap_err();
        assert_eq!(err.field(), Some(PARKING_SPACE));
    }

    #[test]
    fn test_fit_linear_quantile() -> Result<()> {
        let reference = DataFrame::new(vec![
            Column::from(Series::new(TOILETS.into(), &[1i64, 2, 3, 4, 5])),
            Column::from(Series::new(PARKING_SPACE.into(), &[0i64, 0, 0, 0, 10])),
        ])?;
        let thresholds = OutlierClipper::fit(&reference, &DEFAULT_CLIP_COLUMNS, 0.5)?;
        assert_eq!(thresholds.get(TOILETS), Some(3.0));

        let thresholds = OutlierClipper::fit(&reference, &DEFAULT_CLIP_COLUMNS, 0.99)?;
        // 0.99 * (5 - 1) = 3.96 -> 4 + 0.96 * (5 - 4)
        let toilets = thresholds.get(TOILETS).expect("fitted");
        assert!((toilets - 4.96).abs() < 1e-9);
        let parking = thresholds.get(PARKING_SPACE).expect("fitted");
        assert!((parking - 9.6).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_fit_rejects_bad_quantile() {
        let reference = DataFrame::new(vec![Column::from(Series::new(TOILETS.into(), &[1i64]))])
            .expect("valid frame");
        assert!(OutlierClipper::fit(&reference, &[TOILETS], 1.5).is_err());
    }
}
