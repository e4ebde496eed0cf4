use tracing::debug;
use wtcflux_parser::RawReading;

use crate::error::{PipelineError, Result};
use crate::treatments::{ChamberTreatmentMap, CompositeTreatment, HeatwaveTreatment};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReading {
    pub reading: RawReading,
    pub heatwave: HeatwaveTreatment,
    pub composite: CompositeTreatment,
}

/// Attaches the heatwave assignment and composite key to every reading.
///
/// The output has exactly one entry per input reading, in input order. A chamber that the
/// map does not know about aborts resolution instead of being dropped or defaulted.
pub fn resolve_treatments(
    readings: Vec<RawReading>,
    map: &ChamberTreatmentMap,
) -> Result<Vec<ResolvedReading>> {
    let mut resolved = Vec::with_capacity(readings.len());

    for reading in readings {
        let heatwave = map
            .get(&reading.chamber)
            .ok_or_else(|| PipelineError::UnknownChamber {
                chamber: reading.chamber.clone(),
                line_index: reading.line_index,
            })?;
        let composite = CompositeTreatment::new(reading.temperature_treatment, heatwave);
        resolved.push(ResolvedReading {
            reading,
            heatwave,
            composite,
        });
    }

    debug!(rows = resolved.len(), "resolved chamber treatments");
    Ok(resolved)
}
