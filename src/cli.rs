use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use housing_features::config::{ConfigPaths, ConfigStore, SchemaDescriptor};
use housing_features::logging::LogOptions;
use housing_features::pipeline::{
    DEFAULT_CLIP_COLUMNS, DEFAULT_QUANTILE, Mode, OutlierClipper, Pipeline, PipelineOptions,
    RecordBatch, UnknownCategoryPolicy,
};
use polars::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "housing-features",
    about = "Feature transformation for the housing price model"
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to daily rotated files
    #[arg(long, global = true)]
    pub log_file: bool,

    /// Directory for log files. Defaults to the platform data directory.
    #[arg(long, global = true, env = "HOUSING_FEATURES_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            verbose: self.verbose,
            file_logging: self.log_file,
            log_dir: self.log_dir.clone(),
        }
    }
}

/// Configuration file locations. Per-file flags win over `--config-dir`.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory holding the standard configuration files
    #[arg(long, default_value = "config", env = "HOUSING_FEATURES_CONFIG_DIR")]
    pub config_dir: PathBuf,

    /// Title category to column mapping
    #[arg(long, env = "TITLE_CONFIG")]
    pub title_config: Option<PathBuf>,

    /// State target-encoding table
    #[arg(long, env = "STATE_CONFIG")]
    pub state_config: Option<PathBuf>,

    /// Town frequency-encoding table
    #[arg(long, env = "TOWN_CONFIG")]
    pub town_config: Option<PathBuf>,

    /// Ordered training column descriptor
    #[arg(long, env = "TRAINING_COLUMNS_CONFIG")]
    pub schema_config: Option<PathBuf>,

    /// Outlier clip thresholds
    #[arg(long, env = "CLIP_CONFIG")]
    pub clip_config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn paths(&self) -> ConfigPaths {
        let defaults = ConfigPaths::from_dir(&self.config_dir);
        ConfigPaths {
            title: self.title_config.clone().unwrap_or(defaults.title),
            state: self.state_config.clone().unwrap_or(defaults.state),
            town: self.town_config.clone().unwrap_or(defaults.town),
            schema: self.schema_config.clone().unwrap_or(defaults.schema),
            clip_thresholds: self.clip_config.clone().unwrap_or(defaults.clip_thresholds),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum ModeArg {
    #[default]
    Inference,
    Training,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Inference => Self::Inference,
            ModeArg::Training => Self::Training,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transform raw property records into model features
    Transform {
        /// Input records: CSV with a header row, or a JSON payload
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (.csv or .json). Prints CSV to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,

        /// Inference drops the target; training keeps and log-transforms `price`
        #[arg(long, value_enum, default_value_t)]
        mode: ModeArg,

        /// Encode unknown states and towns with this code instead of rejecting them
        #[arg(long)]
        fallback_code: Option<f64>,

        /// Print the per-stage row and column counts
        #[arg(long)]
        report: bool,
    },
    /// Compute clip thresholds from a reference dataset
    FitThresholds {
        /// Reference (training) CSV
        #[arg(short, long)]
        reference: PathBuf,

        /// Columns to fit
        #[arg(
            long,
            value_delimiter = ',',
            default_values_t = DEFAULT_CLIP_COLUMNS.map(str::to_owned)
        )]
        columns: Vec<String>,

        /// Upper quantile used as the ceiling
        #[arg(long, default_value_t = DEFAULT_QUANTILE)]
        quantile: f64,

        /// Where to write the thresholds JSON. Prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the schema descriptor the pipeline aligns to
    Schema {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

pub fn run_command(command: Commands) -> Result<()> {
    match command {
        Commands::Transform {
            input,
            output,
            config,
            mode,
            fallback_code,
            report,
        } => {
            let options = PipelineOptions {
                mode: mode.into(),
                unknown_category: fallback_code
                    .map_or(UnknownCategoryPolicy::Reject, UnknownCategoryPolicy::Fallback),
            };
            handle_transform(&input, output.as_deref(), &config, options, report)
        }
        Commands::FitThresholds {
            reference,
            columns,
            quantile,
            output,
        } => handle_fit_thresholds(&reference, &columns, quantile, output.as_deref()),
        Commands::Schema { config } => handle_schema(&config),
    }
}

fn handle_transform(
    input: &Path,
    output: Option<&Path>,
    config: &ConfigArgs,
    options: PipelineOptions,
    report: bool,
) -> Result<()> {
    let store = ConfigStore::load(&config.paths()).context("Failed to load configuration")?;
    let pipeline = Pipeline::new(&store, options).context("Failed to assemble pipeline")?;

    let df = load_records(input)?;
    tracing::info!(
        rows = df.height(),
        mode = %options.mode,
        input = %input.display(),
        "Transforming records"
    );

    let (features, run) = pipeline
        .transform_with_report(&df)
        .inspect_err(|e| {
            if let Ok(json) = serde_json::to_string(&e.to_report()) {
                tracing::error!(report = %json, "Transform rejected");
            }
        })
        .context("Transform failed")?;

    if report {
        println!("{}", run.summary());
        for (stage, description) in run.stages.iter().zip(pipeline.describe()) {
            println!("  {description} -> {} rows x {} columns", stage.rows, stage.columns);
        }
    }

    let mut frame = features.into_frame();
    match output {
        Some(path) => {
            save_features(&mut frame, path)?;
            tracing::info!(rows = frame.height(), output = %path.display(), "Features written");
        }
        None => {
            CsvWriter::new(std::io::stdout())
                .include_header(true)
                .finish(&mut frame)
                .context("Failed to write features to stdout")?;
        }
    }

    Ok(())
}

fn handle_fit_thresholds(
    reference: &Path,
    columns: &[String],
    quantile: f64,
    output: Option<&Path>,
) -> Result<()> {
    let df = load_csv(reference)?;
    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
    let thresholds = OutlierClipper::fit(&df, &columns, quantile)
        .with_context(|| format!("Failed to fit thresholds from {}", reference.display()))?;
    let json = thresholds.to_json()?;

    match output {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "Fitted {} thresholds at q={quantile} from {} rows -> {}",
                columns.len(),
                df.height(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn handle_schema(config: &ConfigArgs) -> Result<()> {
    let path = config.paths().schema;
    let schema = SchemaDescriptor::load(&path).context("Failed to load schema descriptor")?;
    println!("{} ({} columns)", path.display(), schema.len());
    for (idx, field) in schema.fields().iter().enumerate() {
        println!("{:>3}  {:<24} {}", idx + 1, field.name, field.dtype.as_str());
    }
    Ok(())
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn load_csv(path: &Path) -> Result<DataFrame> {
    LazyCsvReader::new(path)
        .with_infer_schema_length(Some(10000))
        .with_has_header(true)
        .finish()?
        .collect()
        .with_context(|| format!("Failed to read CSV {}", path.display()))
}

fn load_records(path: &Path) -> Result<DataFrame> {
    match extension(path).as_str() {
        "csv" => load_csv(path),
        "json" => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let batch = RecordBatch::from_json_str(&json).context("Failed to decode payload")?;
            Ok(batch.to_frame()?)
        }
        ext => Err(anyhow::anyhow!("Unsupported input extension: {ext}")),
    }
}

fn save_features(df: &mut DataFrame, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    if extension(path) == "json" {
        JsonWriter::new(file)
            .with_json_format(JsonFormat::Json)
            .finish(df)
            .context("Failed to write JSON file")?;
    } else {
        CsvWriter::new(file)
            .include_header(true)
            .finish(df)
            .context("Failed to write CSV file")?;
    }
    Ok(())
}
