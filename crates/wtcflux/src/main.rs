use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;
use wtcflux_core::config::ExperimentConfig;
use wtcflux_core::outputs::{write_frame, OutputFormat};
use wtcflux_core::pipelines::{
    all_pipelines, ExecutionContext, PipelineRunSummary, PreparedInput,
};

#[derive(Debug, Clone, PartialEq)]
struct RunnerSettings {
    input: PathBuf,
    config: Option<PathBuf>,
    output_dir: PathBuf,
    format: OutputFormat,
}

impl RunnerSettings {
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let input = lookup("WTCFLUX_INPUT")
            .filter(|value| !value.trim().is_empty())
            .context("WTCFLUX_INPUT must point at a chamber flux table")?;
        let config = lookup("WTCFLUX_CONFIG")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let output_dir = lookup("WTCFLUX_OUTPUT_DIR").unwrap_or_else(|| "outputs".to_string());
        let format = match lookup("WTCFLUX_OUTPUT_FORMAT") {
            Some(value) => value
                .parse::<OutputFormat>()
                .context("invalid WTCFLUX_OUTPUT_FORMAT")?,
            None => OutputFormat::default(),
        };

        Ok(Self {
            input: PathBuf::from(input),
            config,
            output_dir: PathBuf::from(output_dir),
            format,
        })
    }
}

#[derive(Debug, Serialize)]
struct RunSummary {
    input: PathBuf,
    source_hash: String,
    readings: usize,
    chamber_bins: BTreeMap<String, usize>,
    bin_width_minutes: u32,
    window_start: String,
    window_end: String,
    finished_at: String,
    pipelines: Vec<PipelineRunSummary>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let settings = RunnerSettings::from_env()?;
    let summary = run(&settings)?;

    fs::create_dir_all(&settings.output_dir)
        .with_context(|| format!("failed to create {}", settings.output_dir.display()))?;
    let summary_path = settings.output_dir.join("summary.json");
    let json = serde_json::to_string_pretty(&summary).context("failed to serialise run summary")?;
    fs::write(&summary_path, json)
        .with_context(|| format!("failed to write {}", summary_path.display()))?;

    info!(
        summary = %summary_path.display(),
        pipelines = summary.pipelines.len(),
        "run complete"
    );
    Ok(())
}

fn run(settings: &RunnerSettings) -> Result<RunSummary> {
    let config = match &settings.config {
        Some(path) => ExperimentConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => {
            info!("no WTCFLUX_CONFIG set, using the 2016 heatwave campaign defaults");
            ExperimentConfig::default()
        }
    };
    let context = ExecutionContext::new(config).context("invalid experiment configuration")?;

    let content = fs::read_to_string(&settings.input)
        .with_context(|| format!("failed to read {}", settings.input.display()))?;
    let input = PreparedInput::from_csv(&content, &context)
        .with_context(|| format!("failed to prepare {}", settings.input.display()))?;

    let mut pipelines = Vec::new();
    for pipeline in all_pipelines() {
        let code = pipeline.code_identifier();
        let pipeline_settings = context.settings(code);
        info!(
            pipeline = code,
            version = pipeline.version(),
            bin_width = %pipeline_settings.bin_width,
            "running pipeline"
        );
        let output = pipeline
            .run(&context, &input)
            .with_context(|| format!("pipeline {code} failed"))?;

        let dir = settings.output_dir.join(code);
        let mut tables = Vec::with_capacity(output.tables.len());
        for table in &output.tables {
            let written = write_frame(&table.dataframe, &dir, table.name, settings.format)
                .with_context(|| format!("failed to write {} for {code}", table.name))?;
            tables.push(written);
        }

        pipelines.push(PipelineRunSummary {
            pipeline: code,
            version: pipeline.version(),
            bin_width_minutes: pipeline_settings.bin_width.minutes(),
            window_start: pipeline_settings.window.start().to_string(),
            window_end: pipeline_settings.window.end().to_string(),
            tables,
        });
    }

    Ok(RunSummary {
        input: settings.input.clone(),
        source_hash: input.source_hash.clone(),
        readings: input.reading_count,
        chamber_bins: input
            .chamber_bins
            .iter()
            .map(|(width, rows)| (width.to_string(), rows.len()))
            .collect(),
        bin_width_minutes: context.bin_width.minutes(),
        window_start: context.window.start().to_string(),
        window_end: context.window.end().to_string(),
        finished_at: Utc::now().to_rfc3339(),
        pipelines,
    })
}
