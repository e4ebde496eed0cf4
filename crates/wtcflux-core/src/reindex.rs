use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::binning::{BinWidth, Binned};
use crate::error::{PipelineError, Result};

/// How a windowed series gets its chronological index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ReindexMode {
    /// Use each row's own bin and check that consecutive bins are one width apart.
    #[default]
    Retained,
    /// Midnight of the first row's date plus `i` widths for row `i`. With `strict` the
    /// generated index must agree with the rows' bins; without it gaps go unnoticed.
    AnchorStride { strict: bool },
}

/// Builds the time index for a single grouped series (one chamber or one treatment key).
///
/// The result has one timestamp per row, strictly increasing at `width` spacing, unless
/// `AnchorStride { strict: false }` was asked for, in which case it is whatever the anchor
/// and stride produce.
pub fn reconstruct_index<T: Binned>(
    rows: &[T],
    width: BinWidth,
    mode: ReindexMode,
) -> Result<Vec<NaiveDateTime>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let index = match mode {
        ReindexMode::Retained => {
            let bins: Vec<NaiveDateTime> = rows.iter().map(|row| row.time_bin().start()).collect();
            for (idx, pair) in bins.windows(2).enumerate() {
                let expected = pair[0] + width.duration();
                if pair[1] != expected {
                    return Err(contiguity_error(idx + 1, expected, pair[1]));
                }
            }
            bins
        }
        ReindexMode::AnchorStride { strict } => {
            let anchor = first.time_bin().start().date().and_time(NaiveTime::MIN);
            let index = (0..rows.len())
                .map(|i| {
                    let steps = i32::try_from(i).map_err(|_| {
                        PipelineError::Config(format!(
                            "series of {} rows is too long to index",
                            rows.len()
                        ))
                    })?;
                    Ok(anchor + width.duration() * steps)
                })
                .collect::<Result<Vec<NaiveDateTime>>>()?;
            if strict {
                for (idx, (row, expected)) in rows.iter().zip(&index).enumerate() {
                    let found = row.time_bin().start();
                    if found != *expected {
                        return Err(contiguity_error(idx, *expected, found));
                    }
                }
            }
            index
        }
    };

    debug!(rows = index.len(), ?mode, width = %width, "reconstructed series index");
    Ok(index)
}

fn contiguity_error(index: usize, expected: NaiveDateTime, found: NaiveDateTime) -> PipelineError {
    warn!(index, %expected, %found, "series is not contiguous");
    PipelineError::Contiguity {
        index,
        expected,
        found,
    }
}
