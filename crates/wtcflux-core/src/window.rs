use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use tracing::debug;

use crate::binning::{Binned, TimeBin};
use crate::error::{PipelineError, Result};

/// Inclusive `[start, end]` analysis range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(PipelineError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Bare dates mean midnight on both ends, so `end` admits only the first bin of its day.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        Self::new(start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn contains(&self, bin: TimeBin) -> bool {
        let at = bin.start();
        self.start <= at && at <= self.end
    }
}

/// Keeps the rows whose bin lies inside `window`, in their original order.
pub fn select_window<T: Binned>(rows: Vec<T>, window: &DateWindow) -> Vec<T> {
    let before = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .filter(|row| window.contains(row.time_bin()))
        .collect();
    debug!(
        before,
        after = kept.len(),
        start = %window.start,
        end = %window.end,
        "applied analysis window"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2016, 11, d).unwrap()
    }

    #[test]
    fn rejects_inverted_window() {
        let err = DateWindow::from_dates(date(5), date(1)).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidWindow { .. }));
    }

    #[test]
    fn single_instant_window_is_allowed() {
        let window = DateWindow::from_dates(date(2), date(2)).unwrap();
        assert_eq!(window.start(), window.end());
    }
}
