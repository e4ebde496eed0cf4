use tracing::debug;
use wtcflux_parser::Channel;

use crate::aggregator::ChamberBinRecord;

/// Keeps chamber bins whose mean PAR is strictly above `threshold`. Bins without a PAR
/// value are dropped.
pub fn restrict_to_high_par(rows: Vec<ChamberBinRecord>, threshold: f64) -> Vec<ChamberBinRecord> {
    let before = rows.len();
    let kept: Vec<ChamberBinRecord> = rows
        .into_iter()
        .filter(|row| matches!(row.means.get(Channel::Par), Some(par) if par > threshold))
        .collect();
    debug!(before, after = kept.len(), threshold, "applied PAR filter");
    kept
}
