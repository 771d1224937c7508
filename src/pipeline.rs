//! Feature-transformation pipeline.
//!
//! Converts raw property records into the exact feature frame the price model
//! was trained on. The stage order is fixed:
//!
//! ```text
//! cast counts -> deduplicate -> log price* -> clip outliers -> derive features
//!   -> encode title (expansion) -> encode state (scalar) -> encode town (scalar)
//!   -> align to schema -> drop missing
//!
//! * training mode only
//! ```
//!
//! Every stage implements [`Stage`]: it borrows the incoming frame and returns
//! a new one, so the caller's data is never modified. The first failing stage
//! ends the run and its error is returned as is.
//!
//! # Example
//!
//! ```no_run
//! use housing_features::config::{ConfigPaths, ConfigStore};
//! use housing_features::pipeline::{Pipeline, PipelineOptions, Record};
//!
//! let store = ConfigStore::load(&ConfigPaths::from_dir("config"))?;
//! let pipeline = Pipeline::new(&store, PipelineOptions::default())?;
//!
//! let record = Record::new()
//!     .with("bedrooms", 3)
//!     .with("bathrooms", 2)
//!     .with("toilets", 2)
//!     .with("parking_space", 1)
//!     .with("title", "Detached Duplex")
//!     .with("state", "Lagos")
//!     .with("town", "Ikeja");
//!
//! let features = pipeline.transform(&record)?;
//! println!("{:?}", features.to_rows()?);
//! # Ok::<(), housing_features::error::PipelineError>(())
//! ```

pub mod aligner;
pub mod clipper;
pub mod encoder;
pub mod engineer;
pub mod executor;
pub mod record;
pub mod validation;


pub use aligner::{DropMissing, SchemaAligner};
pub use clipper::{DEFAULT_CLIP_COLUMNS, DEFAULT_QUANTILE, OutlierClipper};
pub use encoder::{ExpansionEncoder, ScalarEncoder, UnknownCategoryPolicy};
pub use engineer::{CastCounts, Deduplicate, FeatureEngineer, LogPrice};
pub use executor::{Mode, Pipeline, PipelineOptions, StageOutcome, TransformReport};
pub use record::{FeatureVector, RawValue, Record, RecordBatch, records_to_frame};
pub use validation::validate_assembly;

use crate::error::{PipelineError, Result};
use polars::prelude::*;

pub const BEDROOMS: &str = "bedrooms";
pub const BATHROOMS: &str = "bathrooms";
pub const TOILETS: &str = "toilets";
pub const PARKING_SPACE: &str = "parking_space";
pub const PRICE: &str = "price";
pub const TITLE: &str = "title";
pub const PROPERTY_TYPE: &str = "property_type";
pub const STATE: &str = "state";
pub const TOWN: &str = "town";

pub const PRICE_PER_BEDROOM: &str = "price_per_bedroom";
pub const TOTAL_ROOMS: &str = "total_rooms";
pub const ROOM_TO_PARKING: &str = "room_to_parking";
pub const STATE_ENCODED: &str = "state_encoded";
pub const TOWN_ENCODED: &str = "town_encoded";

/// Base count columns, cast to integers before anything else runs.
pub const COUNT_COLUMNS: [&str; 4] = [BEDROOMS, BATHROOMS, TOILETS, PARKING_SPACE];

/// One step of the pipeline.
///
/// Implementations must be deterministic and must not keep per-call state:
/// the same pipeline value serves concurrent requests.
pub trait Stage: Send + Sync + std::fmt::Debug {
    /// Short stable identifier used in logs and reports
    fn name(&self) -> &'static str;

    /// Produce a new frame from `df`
    fn apply(&self, df: &DataFrame) -> Result<DataFrame>;

    /// Human readable summary of what the stage does
    fn description(&self) -> String;
}

pub(crate) fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name).map_err(|_| PipelineError::missing_column(name))
}

pub(crate) fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|n| n.as_str() == name)
}

/// Copy of `df` with `series` replacing the column of the same name.
pub(crate) fn replace_series(df: &DataFrame, series: Series) -> Result<DataFrame> {
    let mut out = df.clone();
    out.with_column(series)?;
    Ok(out)
}

/// Strict cast that reports the offending column instead of a bare engine error.
pub(crate) fn cast_column(column: &Column, dtype: &DataType, label: &str) -> Result<Series> {
    let series = column.as_materialized_series();
    series
        .strict_cast(dtype)
        .map_err(|e| PipelineError::type_cast(series.name().as_str(), label, e.to_string()))
}
