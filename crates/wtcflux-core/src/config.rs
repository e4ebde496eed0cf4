use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::info;
use wtcflux_parser::formats::TIMESTAMP_FORMATS;
use wtcflux_parser::ColumnNames;

use crate::binning::BinWidth;
use crate::error::{PipelineError, Result};
use crate::reindex::ReindexMode;
use crate::treatments::ChamberTreatmentMap;
use crate::window::DateWindow;

/// Everything one analysis run needs to know about the experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub bin_width_minutes: u32,
    pub par_threshold: f64,
    pub window: WindowConfig,
    pub chambers: ChamberTreatmentMap,
    pub columns: ColumnNames,
    pub solver: SolverConfig,
    pub reindex: ReindexMode,
    /// Cadence and window overrides keyed by pipeline code.
    pub pipelines: BTreeMap<String, PipelineOverride>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            bin_width_minutes: 60,
            par_threshold: 600.0,
            window: WindowConfig::default(),
            chambers: ChamberTreatmentMap::heatwave_2016(),
            columns: ColumnNames::default(),
            solver: SolverConfig::default(),
            reindex: ReindexMode::default(),
            pipelines: default_pipeline_overrides(),
        }
    }
}

/// The light-response and modelling analyses of the 2016 campaign ran at half-hourly
/// resolution over the whole heatwave period.
fn default_pipeline_overrides() -> BTreeMap<String, PipelineOverride> {
    let campaign = PipelineOverride {
        bin_width_minutes: Some(30),
        window: Some(WindowConfig {
            start: "2016-10-20 00:00:00".to_string(),
            end: "2016-11-11 20:00:00".to_string(),
        }),
    };
    ["high_par_chambers_v1", "leaf_gas_exchange_v1"]
        .into_iter()
        .map(|code| (code.to_string(), campaign.clone()))
        .collect()
}

/// Per-pipeline replacement for the shared cadence and window. Unset fields inherit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineOverride {
    pub bin_width_minutes: Option<u32>,
    pub window: Option<WindowConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    /// `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`; a bare date means midnight.
    pub start: String,
    pub end: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: "2016-10-30".to_string(),
            end: "2016-11-05".to_string(),
        }
    }
}

/// Fixed drivers handed to the leaf gas-exchange solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub ambient_co2_umol_mol: f64,
    pub wind_speed_m_s: f64,
    pub pressure_kpa: f64,
    /// Prefer the chamber's measured wind speed and pressure, falling back to the fixed
    /// values above when a bin has none.
    pub use_measured_wind_and_pressure: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            ambient_co2_umol_mol: 400.0,
            wind_speed_m_s: 8.0,
            pressure_kpa: 100.0,
            use_measured_wind_and_pressure: false,
        }
    }
}

impl ExperimentConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ExperimentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            path = %path.display(),
            chambers = config.chambers.len(),
            bin_width_minutes = config.bin_width_minutes,
            "loaded experiment configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bin_width()?;
        self.window()?;
        for code in self.pipelines.keys() {
            self.bin_width_for(code)?;
            self.window_for(code)?;
        }

        if !self.par_threshold.is_finite() {
            return Err(PipelineError::Config(
                "par_threshold must be a finite number".to_string(),
            ));
        }
        if self.chambers.is_empty() {
            return Err(PipelineError::Config(
                "at least one chamber treatment assignment is required".to_string(),
            ));
        }

        let solver = &self.solver;
        for (name, value) in [
            ("solver.ambient_co2_umol_mol", solver.ambient_co2_umol_mol),
            ("solver.wind_speed_m_s", solver.wind_speed_m_s),
            ("solver.pressure_kpa", solver.pressure_kpa),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PipelineError::Config(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        Ok(())
    }

    pub fn bin_width(&self) -> Result<BinWidth> {
        BinWidth::from_minutes(self.bin_width_minutes)
    }

    pub fn window(&self) -> Result<DateWindow> {
        self.window.to_window("window")
    }

    pub fn bin_width_for(&self, code: &str) -> Result<BinWidth> {
        match self.pipelines.get(code).and_then(|o| o.bin_width_minutes) {
            Some(minutes) => BinWidth::from_minutes(minutes).map_err(|err| {
                PipelineError::Config(format!("pipelines.{code}.bin_width_minutes: {err}"))
            }),
            None => self.bin_width(),
        }
    }

    pub fn window_for(&self, code: &str) -> Result<DateWindow> {
        match self.pipelines.get(code).and_then(|o| o.window.as_ref()) {
            Some(window) => window.to_window(&format!("pipelines.{code}.window")),
            None => self.window(),
        }
    }
}

impl WindowConfig {
    fn to_window(&self, field: &str) -> Result<DateWindow> {
        let start = parse_window_bound(&format!("{field}.start"), &self.start)?;
        let end = parse_window_bound(&format!("{field}.end"), &self.end)?;
        DateWindow::new(start, end)
    }
}

fn parse_window_bound(field: &str, value: &str) -> Result<NaiveDateTime> {
    let trimmed = value.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(PipelineError::Config(format!(
        "{field} '{value}' is not a date or timestamp"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::treatments::HeatwaveTreatment;

    #[test]
    fn default_config_is_valid() {
        let config = ExperimentConfig::default();
        config.validate().unwrap();
        assert_eq!(config.bin_width().unwrap(), BinWidth::HOURLY);
        let window = config.window().unwrap();
        assert_eq!(window.start().to_string(), "2016-10-30 00:00:00");
        assert_eq!(window.end().to_string(), "2016-11-05 00:00:00");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            bin_width_minutes = 30

            [window]
            start = "2016-10-20 00:00:00"
            end = "2016-11-11 20:00:00"
            "#,
        )
        .unwrap();

        assert_eq!(config.bin_width().unwrap(), BinWidth::HALF_HOURLY);
        assert_eq!(config.par_threshold, 600.0);
        assert_eq!(config.chambers, ChamberTreatmentMap::heatwave_2016());
        assert_eq!(config.window().unwrap().end().to_string(), "2016-11-11 20:00:00");
    }

    #[test]
    fn chamber_table_accepts_long_and_short_labels() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            [chambers]
            C01 = "C"
            C02 = "Heatwave"
            "#,
        )
        .unwrap();
        assert_eq!(config.chambers.len(), 2);
        assert_eq!(config.chambers.get("C02"), Some(HeatwaveTreatment::Heatwave));
    }

    #[test]
    fn reindex_mode_is_tagged() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            [reindex]
            mode = "anchor_stride"
            strict = true
            "#,
        )
        .unwrap();
        assert_eq!(config.reindex, ReindexMode::AnchorStride { strict: true });
        assert_eq!(ExperimentConfig::default().reindex, ReindexMode::Retained);
    }

    #[test]
    fn rejects_bad_bin_width() {
        let err = ExperimentConfig::from_toml_str("bin_width_minutes = 45").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn rejects_unparsable_window() {
        let err = ExperimentConfig::from_toml_str(
            r#"
            [window]
            start = "30/10/2016"
            end = "2016-11-05"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Config(ref msg) if msg.contains("window.start")));
    }

    #[test]
    fn campaign_defaults_run_light_analyses_half_hourly() {
        let config = ExperimentConfig::default();
        assert_eq!(config.bin_width_for("treatment_timeseries_v1").unwrap(), BinWidth::HOURLY);
        assert_eq!(
            config.bin_width_for("high_par_chambers_v1").unwrap(),
            BinWidth::HALF_HOURLY
        );
        let window = config.window_for("leaf_gas_exchange_v1").unwrap();
        assert_eq!(window.start().to_string(), "2016-10-20 00:00:00");
        assert_eq!(window.end().to_string(), "2016-11-11 20:00:00");
    }

    #[test]
    fn pipeline_overrides_inherit_unset_fields() {
        let config = ExperimentConfig::from_toml_str(
            r#"
            [pipelines.high_par_chambers_v1]
            bin_width_minutes = 15
            "#,
        )
        .unwrap();
        assert_eq!(config.pipelines.len(), 1);
        assert_eq!(config.bin_width_for("high_par_chambers_v1").unwrap().minutes(), 15);
        assert_eq!(config.window_for("high_par_chambers_v1").unwrap(), config.window().unwrap());
        assert_eq!(config.bin_width_for("leaf_gas_exchange_v1").unwrap(), BinWidth::HOURLY);
    }

    #[test]
    fn rejects_bad_pipeline_override() {
        let err = ExperimentConfig::from_toml_str(
            r#"
            [pipelines.high_par_chambers_v1]
            bin_width_minutes = 45
            "#,
        )
        .unwrap_err();
        assert!(
            matches!(err, PipelineError::Config(ref msg) if msg.contains("high_par_chambers_v1"))
        );
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = ExperimentConfig::from_toml_str("bin_width = 60").unwrap_err();
        assert!(matches!(err, PipelineError::Toml(_)));
    }
}
