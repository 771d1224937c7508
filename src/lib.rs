//! # housing-features
//!
//! Feature transformation for the housing price model. Raw property records
//! (room counts, title, state, town) go in; a frame whose columns, order and
//! types match the model's training schema comes out.
//!
//! ## Quick Start
//!
//! ```no_run
//! use housing_features::config::{ConfigPaths, ConfigStore};
//! use housing_features::pipeline::{Pipeline, PipelineOptions, RecordBatch};
//!
//! // Load encoding tables, clip thresholds and the schema once
//! let store = ConfigStore::load(&ConfigPaths::from_dir("config"))?;
//! let pipeline = Pipeline::new(&store, PipelineOptions::default())?;
//!
//! // Dashboard payloads arrive as JSON
//! let batch = RecordBatch::from_json_str(r#"{"bedrooms": 3, "bathrooms": 2,
//!     "toilets": 2, "parking_space": 1, "title": "Detached Duplex",
//!     "state": "Lagos", "town": "Ikeja"}"#)?;
//! let features = pipeline.transform_records(&batch.records)?;
//! println!("{:?}", features.column_names());
//! # Ok::<(), housing_features::error::PipelineError>(())
//! ```
//!
//! ## Core Modules
//!
//! - [`config`]: Startup configuration (encoding tables, clip thresholds, schema)
//! - [`pipeline`]: Transformation stages and the [`pipeline::Pipeline`] orchestrator
//! - [`error`]: Error taxonomy shared by every stage
//! - [`logging`]: `tracing` subscriber setup
//!
//! ## Key Concepts
//!
//! ### Immutable configuration
//!
//! Configuration is read once into a [`config::ConfigStore`] and shared behind
//! `Arc`. A pipeline never reads a file after construction, so one pipeline can
//! serve every request thread.
//!
//! ### Pure stages
//!
//! Stages take a `&DataFrame` and return a new one. Polars columns are
//! reference counted, so untouched columns are shared rather than copied.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::{ConfigPaths, ConfigStore};
pub use error::{PipelineError, Result};
pub use pipeline::{FeatureVector, Mode, Pipeline, PipelineOptions, Record, RecordBatch};
