//! Assembly-time validation.
//!
//! Walks the fixed stage order over the set of column names each stage would
//! see, without touching any data. A configuration whose schema asks for a
//! column no stage can produce is rejected before the first request.

use super::{
    COUNT_COLUMNS, FeatureEngineer, Mode, PRICE, STATE, STATE_ENCODED, TITLE, TOWN, TOWN_ENCODED,
};
use crate::config::ConfigStore;
use crate::error::{PipelineError, Result};
use std::collections::BTreeSet;

const SOURCE: &str = "pipeline assembly";

/// Check that `store` describes a pipeline that can run in `mode`.
///
/// # Errors
///
/// `ConfigLoad` naming the first inconsistency found:
///
/// - a clip threshold for anything other than a count column
/// - an expansion target that collides with another column
/// - a schema column that no stage produces
pub fn validate_assembly(store: &ConfigStore, mode: Mode) -> Result<()> {
    let mut columns: BTreeSet<String> = COUNT_COLUMNS.iter().map(|c| (*c).to_owned()).collect();
    columns.extend([TITLE, STATE, TOWN].map(str::to_owned));
    if mode == Mode::Training {
        columns.insert(PRICE.to_owned());
    }

    for column in store.clip_thresholds.columns() {
        if !COUNT_COLUMNS.contains(&column) {
            return Err(PipelineError::config(
                SOURCE,
                format!("clip threshold set for '{column}', which is not a count column"),
            ));
        }
    }

    let engineer = FeatureEngineer::new(mode == Mode::Training);
    columns.extend(engineer.output_columns().into_iter().map(str::to_owned));

    columns.remove(TITLE);
    for (target, _) in store.title.target_columns() {
        if !columns.insert(target.to_owned()) {
            return Err(PipelineError::config(
                SOURCE,
                format!("title category column '{target}' collides with an existing column"),
            ));
        }
    }

    for (source, output) in [(STATE, STATE_ENCODED), (TOWN, TOWN_ENCODED)] {
        columns.remove(source);
        columns.insert(output.to_owned());
    }

    let missing: Vec<&str> = store
        .schema
        .column_names()
        .into_iter()
        .filter(|name| !columns.contains(*name))
        .collect();

    if !missing.is_empty() {
        return Err(PipelineError::config(
            SOURCE,
            format!(
                "schema columns not produced in {} mode: {}",
                mode.as_str(),
                missing.join(", ")
            ),
        ));
    }

    tracing::debug!(
        mode = mode.as_str(),
        produced = columns.len(),
        schema_columns = store.schema.len(),
        "Pipeline assembly validated"
    );
    Ok(())
}
