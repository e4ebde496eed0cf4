use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use wtcflux_parser::Channel;

use crate::aggregator::ChamberBinRecord;
use crate::binning::TimeBin;
use crate::config::SolverConfig;
use crate::error::Result;

const KPA_TO_PA: f64 = 1000.0;
const MOL_TO_MMOL: f64 = 1000.0;

/// Whether the solver should iterate to convergence or take its fast approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    #[default]
    Exact,
    Fast,
}

/// Scalar drivers for one leaf-level evaluation, in the solver's units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeafDrivers {
    pub air_temperature_c: f64,
    pub leaf_temperature_c: f64,
    pub par_umol_m2_s: f64,
    pub vpd_pa: f64,
    pub wind_speed_m_s: f64,
    pub pressure_pa: f64,
    pub ambient_co2_umol_mol: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LeafFluxes {
    pub net_assimilation: f64,
    pub stomatal_conductance: f64,
    /// mol m-2 s-1 as returned by a solver; [`LeafPrediction`] carries mmol.
    pub transpiration: f64,
    pub latent_heat: f64,
}

/// Coupled photosynthesis / stomatal conductance / energy balance model. Implementations
/// must be pure: the same drivers and mode always give the same fluxes.
pub trait LeafGasExchange {
    fn solve(&self, drivers: &LeafDrivers, mode: EvaluationMode) -> Result<LeafFluxes>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafPrediction {
    pub bin: TimeBin,
    pub chamber: String,
    pub drivers: LeafDrivers,
    pub net_assimilation: f64,
    pub stomatal_conductance: f64,
    /// mmol m-2 s-1
    pub transpiration_mmol: f64,
    pub latent_heat: f64,
}

/// Turns a chamber bin into solver drivers, or `None` when a measured driver is missing.
pub fn drivers_for(row: &ChamberBinRecord, settings: &SolverConfig) -> Option<LeafDrivers> {
    let means = &row.means;
    let (wind_speed_m_s, pressure_kpa) = if settings.use_measured_wind_and_pressure {
        (
            means
                .get(Channel::WindSpeed)
                .unwrap_or(settings.wind_speed_m_s),
            means.get(Channel::Pressure).unwrap_or(settings.pressure_kpa),
        )
    } else {
        (settings.wind_speed_m_s, settings.pressure_kpa)
    };

    Some(LeafDrivers {
        air_temperature_c: means.get(Channel::AirTemperature)?,
        leaf_temperature_c: means.get(Channel::CanopyTemperature)?,
        par_umol_m2_s: means.get(Channel::Par)?,
        vpd_pa: means.get(Channel::Vpd)? * KPA_TO_PA,
        wind_speed_m_s,
        pressure_pa: pressure_kpa * KPA_TO_PA,
        ambient_co2_umol_mol: settings.ambient_co2_umol_mol,
    })
}

/// Runs `solver` once per chamber bin. Bins lacking a driver are skipped; a solver failure
/// stops the run.
pub fn predict_leaf_fluxes<S>(
    solver: &S,
    rows: &[ChamberBinRecord],
    settings: &SolverConfig,
    mode: EvaluationMode,
) -> Result<Vec<LeafPrediction>>
where
    S: LeafGasExchange + ?Sized,
{
    let mut predictions = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(drivers) = drivers_for(row, settings) else {
            debug!(
                chamber = %row.chamber,
                bin = %row.bin,
                "skipping bin with missing solver drivers"
            );
            continue;
        };

        let fluxes = solver.solve(&drivers, mode)?;
        predictions.push(LeafPrediction {
            bin: row.bin,
            chamber: row.chamber.clone(),
            drivers,
            net_assimilation: fluxes.net_assimilation,
            stomatal_conductance: fluxes.stomatal_conductance,
            transpiration_mmol: fluxes.transpiration * MOL_TO_MMOL,
            latent_heat: fluxes.latent_heat,
        });
    }

    info!(
        rows = rows.len(),
        predictions = predictions.len(),
        ?mode,
        "evaluated leaf gas exchange"
    );
    Ok(predictions)
}
