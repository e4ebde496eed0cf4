use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use once_cell::sync::Lazy;
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::info;
use wtcflux_parser::{Channel, WtcFluxParser};

use crate::aggregator::{
    aggregate_by_heatwave, aggregate_chambers, aggregate_treatments, series_for,
    ChamberBinRecord, TreatmentBinRecord,
};
use crate::binning::{bin_readings, BinWidth};
use crate::config::ExperimentConfig;
use crate::error::{PipelineError, Result};
use crate::light::restrict_to_high_par;
use crate::outputs::WrittenOutput;
use crate::reindex::reconstruct_index;
use crate::render::{
    chamber_frame, indexed_points, prediction_frame, series_frame, ChannelSeries,
};
use crate::resolver::resolve_treatments;
use crate::solver::{predict_leaf_fluxes, EvaluationMode, LeafGasExchange};
use crate::treatments::{CompositeTreatment, HeatwaveTreatment};
use crate::window::{select_window, DateWindow};

/// Leaf gas-exchange predictions need a solver, so they run outside the registry.
pub const LEAF_GAS_EXCHANGE_CODE: &str = "leaf_gas_exchange_v1";

/// Cadence and window one pipeline runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub bin_width: BinWidth,
    pub window: DateWindow,
}

/// Validated configuration shared by every pipeline in a run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub config: ExperimentConfig,
    pub bin_width: BinWidth,
    pub window: DateWindow,
    overrides: BTreeMap<String, PipelineSettings>,
}

impl ExecutionContext {
    pub fn new(config: ExperimentConfig) -> Result<Self> {
        config.validate()?;
        let bin_width = config.bin_width()?;
        let window = config.window()?;

        let mut overrides = BTreeMap::new();
        for code in config.pipelines.keys() {
            if code != LEAF_GAS_EXCHANGE_CODE && find_pipeline(code).is_none() {
                return Err(PipelineError::Config(format!(
                    "pipelines.{code} does not name a known pipeline"
                )));
            }
            let settings = PipelineSettings {
                bin_width: config.bin_width_for(code)?,
                window: config.window_for(code)?,
            };
            overrides.insert(code.clone(), settings);
        }

        Ok(Self {
            config,
            bin_width,
            window,
            overrides,
        })
    }

    pub fn settings(&self, code: &str) -> PipelineSettings {
        self.overrides.get(code).copied().unwrap_or(PipelineSettings {
            bin_width: self.bin_width,
            window: self.window,
        })
    }

    /// Every cadence some pipeline asks for.
    pub fn bin_widths(&self) -> BTreeSet<BinWidth> {
        std::iter::once(self.bin_width)
            .chain(self.overrides.values().map(|settings| settings.bin_width))
            .collect()
    }
}

/// The flux table after loading and treatment resolution, binned and put through Stage A
/// once for each cadence the run needs.
#[derive(Debug, Clone)]
pub struct PreparedInput {
    pub source_hash: String,
    pub reading_count: usize,
    pub chamber_bins: BTreeMap<BinWidth, Vec<ChamberBinRecord>>,
}

impl PreparedInput {
    pub fn from_csv(content: &str, context: &ExecutionContext) -> Result<Self> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(content.as_bytes());
        let source_hash = hasher.finalize().to_hex().to_string();

        let parsed = WtcFluxParser::new(context.config.columns.clone()).parse(content)?;
        let reading_count = parsed.len();
        let columns = parsed.columns.len();
        let resolved = resolve_treatments(parsed.readings, &context.config.chambers)?;

        let mut chamber_bins = BTreeMap::new();
        for width in context.bin_widths() {
            let binned = bin_readings(resolved.clone(), width);
            let rows = aggregate_chambers(&binned);
            info!(bin_width = %width, chamber_bins = rows.len(), "binned flux table");
            chamber_bins.insert(width, rows);
        }

        info!(
            source_hash = %source_hash,
            readings = reading_count,
            columns,
            cadences = chamber_bins.len(),
            "prepared flux table"
        );

        Ok(Self {
            source_hash,
            reading_count,
            chamber_bins,
        })
    }

    /// Stage A rows at `width`.
    pub fn chamber_bins_at(&self, width: BinWidth) -> Result<&[ChamberBinRecord]> {
        self.chamber_bins
            .get(&width)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                PipelineError::Config(format!("flux table was not prepared at {width}"))
            })
    }
}

pub struct OutputTable {
    pub name: &'static str,
    pub dataframe: DataFrame,
}

pub struct PipelineBatchOutput {
    pub tables: Vec<OutputTable>,
}

pub trait ProcessingPipeline: Send + Sync {
    fn code_identifier(&self) -> &'static str;
    fn version(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn run(
        &self,
        context: &ExecutionContext,
        input: &PreparedInput,
    ) -> Result<PipelineBatchOutput>;
}

static PIPELINE_IMPLEMENTATIONS: Lazy<Vec<&'static dyn ProcessingPipeline>> = Lazy::new(|| {
    vec![
        &TreatmentTimeseriesPipeline as &dyn ProcessingPipeline,
        &HighParChambersPipeline as &dyn ProcessingPipeline,
    ]
});

pub fn all_pipelines() -> &'static [&'static dyn ProcessingPipeline] {
    PIPELINE_IMPLEMENTATIONS.as_slice()
}

pub fn find_pipeline(code: &str) -> Option<&'static dyn ProcessingPipeline> {
    all_pipelines()
        .iter()
        .copied()
        .find(|pipeline| pipeline.code_identifier() == code)
}

/// Windowed treatment means and standard errors for the experiment time-course figures.
struct TreatmentTimeseriesPipeline;

impl ProcessingPipeline for TreatmentTimeseriesPipeline {
    fn code_identifier(&self) -> &'static str {
        "treatment_timeseries_v1"
    }

    fn version(&self) -> &'static str {
        "0.1.0"
    }

    fn description(&self) -> &'static str {
        "Composite and heatwave treatment means with standard errors over the analysis window"
    }

    fn run(
        &self,
        context: &ExecutionContext,
        input: &PreparedInput,
    ) -> Result<PipelineBatchOutput> {
        let settings = context.settings(self.code_identifier());
        let chamber_bins = input.chamber_bins_at(settings.bin_width)?;
        let composite = select_window(aggregate_treatments(chamber_bins), &settings.window);
        let heatwave = select_window(aggregate_by_heatwave(chamber_bins), &settings.window);

        let composite_frame =
            indexed_frame(&composite, &CompositeTreatment::ALL, settings, context)?;
        let heatwave_frame = indexed_frame(&heatwave, &HeatwaveTreatment::ALL, settings, context)?;

        info!(
            pipeline = self.code_identifier(),
            bin_width = %settings.bin_width,
            composite_rows = composite.len(),
            heatwave_rows = heatwave.len(),
            "treatment time series ready"
        );

        Ok(PipelineBatchOutput {
            tables: vec![
                OutputTable {
                    name: "composite_treatment_timeseries",
                    dataframe: composite_frame,
                },
                OutputTable {
                    name: "heatwave_treatment_timeseries",
                    dataframe: heatwave_frame,
                },
            ],
        })
    }
}

/// Windowed chamber bins under strong light, for canopy temperature against flux.
struct HighParChambersPipeline;

impl ProcessingPipeline for HighParChambersPipeline {
    fn code_identifier(&self) -> &'static str {
        "high_par_chambers_v1"
    }

    fn version(&self) -> &'static str {
        "0.1.0"
    }

    fn description(&self) -> &'static str {
        "Per-chamber bin means inside the analysis window with PAR above the threshold"
    }

    fn run(
        &self,
        context: &ExecutionContext,
        input: &PreparedInput,
    ) -> Result<PipelineBatchOutput> {
        let settings = context.settings(self.code_identifier());
        let chamber_bins = input.chamber_bins_at(settings.bin_width)?;
        let windowed = select_window(chamber_bins.to_vec(), &settings.window);
        let bright = restrict_to_high_par(windowed, context.config.par_threshold);

        info!(
            pipeline = self.code_identifier(),
            bin_width = %settings.bin_width,
            rows = bright.len(),
            par_threshold = context.config.par_threshold,
            "high PAR chamber bins ready"
        );

        Ok(PipelineBatchOutput {
            tables: vec![OutputTable {
                name: "high_par_chamber_bins",
                dataframe: chamber_frame(&bright)?,
            }],
        })
    }
}

/// Rebuilds each group's index with the configured mode before flattening to the long layout.
fn indexed_frame<K>(
    rows: &[TreatmentBinRecord<K>],
    keys: &[K],
    settings: PipelineSettings,
    context: &ExecutionContext,
) -> Result<DataFrame>
where
    K: PartialEq + Display,
{
    let mut series: Vec<ChannelSeries> = Channel::ALL
        .iter()
        .map(|channel| ChannelSeries {
            channel: *channel,
            points: Vec::new(),
        })
        .collect();

    for key in keys {
        let group = series_for(rows, key);
        let index = reconstruct_index(&group, settings.bin_width, context.config.reindex)?;
        for s in &mut series {
            s.points.extend(indexed_points(&group, &index, s.channel));
        }
    }

    series_frame(&series)
}

/// Solver predictions for heatwave chambers under strong light inside the window.
pub fn run_leaf_gas_exchange(
    solver: &dyn LeafGasExchange,
    mode: EvaluationMode,
    context: &ExecutionContext,
    input: &PreparedInput,
) -> Result<PipelineBatchOutput> {
    let settings = context.settings(LEAF_GAS_EXCHANGE_CODE);
    let chamber_bins = input.chamber_bins_at(settings.bin_width)?;
    let windowed = select_window(chamber_bins.to_vec(), &settings.window);
    let heatwave: Vec<ChamberBinRecord> =
        restrict_to_high_par(windowed, context.config.par_threshold)
            .into_iter()
            .filter(|row| row.heatwave == HeatwaveTreatment::Heatwave)
            .collect();

    let predictions = predict_leaf_fluxes(solver, &heatwave, &context.config.solver, mode)?;

    info!(
        pipeline = LEAF_GAS_EXCHANGE_CODE,
        bin_width = %settings.bin_width,
        rows = heatwave.len(),
        predictions = predictions.len(),
        "leaf gas exchange predictions ready"
    );

    Ok(PipelineBatchOutput {
        tables: vec![OutputTable {
            name: "heatwave_leaf_predictions",
            dataframe: prediction_frame(&predictions)?,
        }],
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunSummary {
    pub pipeline: &'static str,
    pub version: &'static str,
    pub bin_width_minutes: u32,
    pub window_start: String,
    pub window_end: String,
    pub tables: Vec<WrittenOutput>,
}
