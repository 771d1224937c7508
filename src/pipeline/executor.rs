//! Pipeline assembly and execution.
//!
//! A [`Pipeline`] is built once from a [`ConfigStore`] and then serves any
//! number of transform calls, from any number of threads.

use super::{
    CastCounts, Deduplicate, DropMissing, ExpansionEncoder, FeatureEngineer, FeatureVector,
    LogPrice, OutlierClipper, PROPERTY_TYPE, Record, STATE, STATE_ENCODED, ScalarEncoder,
    SchemaAligner, Stage, TITLE, TOWN, TOWN_ENCODED, UnknownCategoryPolicy, records_to_frame,
    validate_assembly,
};
use crate::config::{ConfigStore, SchemaDescriptor};
use crate::error::Result;
use polars::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Whether the target column travels with the features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Serving requests: no `price` expected
    #[default]
    Inference,
    /// Building a training set: `price` is required, log-transformed and
    /// used for `price_per_bedroom`
    Training,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Inference => "inference",
            Self::Training => "training",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    pub mode: Mode,
    /// Applied to every scalar-encoded field
    pub unknown_category: UnknownCategoryPolicy,
}

/// Shape of the frame after one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub name: &'static str,
    pub rows: usize,
    pub columns: usize,
}

/// Per-stage trace of a single transform call.
#[derive(Debug, Clone)]
pub struct TransformReport {
    /// Rows received
    pub rows_in: usize,

    /// Rows in the feature frame
    pub rows_out: usize,

    /// One entry per stage, in execution order
    pub stages: Vec<StageOutcome>,

    /// Wall time for the whole run
    pub duration: Duration,
}

impl TransformReport {
    /// Create a summary message
    pub fn summary(&self) -> String {
        let columns = self.stages.last().map_or(0, |s| s.columns);
        format!(
            "Transformed {} → {} rows into {} feature columns through {} stages in {:.2}ms",
            self.rows_in,
            self.rows_out,
            columns,
            self.stages.len(),
            self.duration.as_secs_f64() * 1000.0
        )
    }

    /// Rows removed by the named stage, zero if it did not run.
    pub fn rows_removed_by(&self, stage: &str) -> usize {
        let mut previous = self.rows_in;
        for outcome in &self.stages {
            if outcome.name == stage {
                return previous.saturating_sub(outcome.rows);
            }
            previous = outcome.rows;
        }
        0
    }
}

/// The assembled feature transform.
#[derive(Debug)]
pub struct Pipeline {
    options: PipelineOptions,
    stages: Vec<Box<dyn Stage>>,
    schema: Arc<SchemaDescriptor>,
}

impl Pipeline {
    /// Assemble the fixed stage sequence over `store`.
    ///
    /// # Errors
    ///
    /// `ConfigLoad` if the schema cannot be produced in `options.mode`,
    /// `EmptyTable` if an encoding table has no entries.
    pub fn new(store: &ConfigStore, options: PipelineOptions) -> Result<Self> {
        validate_assembly(store, options.mode)?;

        let training = options.mode == Mode::Training;
        let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(10);
        stages.push(Box::new(CastCounts::default()));
        stages.push(Box::new(Deduplicate));
        if training {
            stages.push(Box::new(LogPrice));
        }
        stages.push(Box::new(OutlierClipper::new(Arc::clone(&store.clip_thresholds))));
        stages.push(Box::new(FeatureEngineer::new(training)));
        stages.push(Box::new(
            ExpansionEncoder::new(TITLE, Arc::clone(&store.title))?.with_alias(PROPERTY_TYPE),
        ));
        stages.push(Box::new(ScalarEncoder::new(
            STATE,
            STATE_ENCODED,
            Arc::clone(&store.state),
            options.unknown_category,
        )?));
        stages.push(Box::new(ScalarEncoder::new(
            TOWN,
            TOWN_ENCODED,
            Arc::clone(&store.town),
            options.unknown_category,
        )?));
        stages.push(Box::new(SchemaAligner::new(Arc::clone(&store.schema))));
        stages.push(Box::new(DropMissing));

        tracing::debug!(
            mode = options.mode.as_str(),
            stages = stages.len(),
            "Assembled feature pipeline"
        );

        Ok(Self {
            options,
            stages,
            schema: Arc::clone(&store.schema),
        })
    }

    /// Transform a single record.
    ///
    /// # Errors
    ///
    /// The first stage error, unchanged: `MissingColumn`, `TypeCast` or
    /// `UnknownCategory` for bad input, `Data` for engine failures.
    pub fn transform(&self, record: &Record) -> Result<FeatureVector> {
        self.transform_records(std::slice::from_ref(record))
    }

    /// Transform a batch of records in one pass.
    ///
    /// # Errors
    ///
    /// `Payload` for an empty batch, otherwise see [`Pipeline::transform`].
    pub fn transform_records(&self, records: &[Record]) -> Result<FeatureVector> {
        let df = records_to_frame(records)?;
        self.transform_frame(&df)
    }

    /// Transform an already-built frame. `df` is left untouched.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::transform`].
    pub fn transform_frame(&self, df: &DataFrame) -> Result<FeatureVector> {
        self.transform_with_report(df).map(|(features, _)| features)
    }

    /// Transform and trace the frame shape after every stage.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::transform`]. No report is produced for a failed run.
    pub fn transform_with_report(
        &self,
        df: &DataFrame,
    ) -> Result<(FeatureVector, TransformReport)> {
        let start = Instant::now();
        let mut outcomes = Vec::with_capacity(self.stages.len());

        let mut current = df.clone();
        for stage in &self.stages {
            current = stage.apply(&current).inspect_err(|e| {
                tracing::debug!(stage = stage.name(), error = %e, "Stage failed");
            })?;
            tracing::debug!(
                stage = stage.name(),
                rows = current.height(),
                columns = current.width(),
                "Stage applied"
            );
            outcomes.push(StageOutcome {
                name: stage.name(),
                rows: current.height(),
                columns: current.width(),
            });
        }

        let report = TransformReport {
            rows_in: df.height(),
            rows_out: current.height(),
            stages: outcomes,
            duration: start.elapsed(),
        };
        tracing::debug!("{}", report.summary());

        Ok((FeatureVector::new(current), report))
    }

    /// Stage identifiers in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// One line per stage, for the CLI.
    pub fn describe(&self) -> Vec<String> {
        self.stages
            .iter()
            .enumerate()
            .map(|(idx, s)| format!("{}. {}: {}", idx + 1, s.name(), s.description()))
            .collect()
    }

    pub fn options(&self) -> PipelineOptions {
        self.options
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }
}

const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Pipeline>();
};
