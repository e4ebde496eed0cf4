use std::cmp::Ordering;
use std::fmt;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Serialize, Serializer};
use wtcflux_parser::CalendarFields;

use crate::error::{PipelineError, Result};
use crate::resolver::ResolvedReading;

const MINUTES_PER_HOUR: u32 = 60;
const MINUTES_PER_HALF_DAY: u32 = 12 * MINUTES_PER_HOUR;
const MINUTES_PER_DAY: u32 = 24 * MINUTES_PER_HOUR;
const SECONDS_PER_DAY: i64 = 86_400;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;

/// Analysis cadence. Either a divisor of an hour or a whole number of hours dividing twelve,
/// so every day holds an even number of bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BinWidth {
    minutes: u32,
}

impl BinWidth {
    pub const HALF_HOURLY: BinWidth = BinWidth { minutes: 30 };
    pub const HOURLY: BinWidth = BinWidth { minutes: 60 };

    pub fn from_minutes(minutes: u32) -> Result<Self> {
        let divides_hour = minutes > 0 && MINUTES_PER_HOUR % minutes == 0;
        let hours_dividing_half_day = minutes > 0
            && minutes % MINUTES_PER_HOUR == 0
            && MINUTES_PER_HALF_DAY % minutes == 0;
        if !divides_hour && !hours_dividing_half_day {
            return Err(PipelineError::Config(format!(
                "bin width of {minutes} minutes must divide an hour or be whole hours dividing 12"
            )));
        }
        Ok(Self { minutes })
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    pub fn duration(&self) -> TimeDelta {
        TimeDelta::minutes(i64::from(self.minutes))
    }

    pub fn bins_per_day(&self) -> u32 {
        MINUTES_PER_DAY / self.minutes
    }
}

impl fmt::Display for BinWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}min", self.minutes)
    }
}

/// A timestamp rounded onto the analysis cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBin(NaiveDateTime);

impl TimeBin {
    pub fn start(&self) -> NaiveDateTime {
        self.0
    }

    pub fn calendar(&self) -> CalendarFields {
        CalendarFields::from_datetime(&self.0)
    }
}

impl fmt::Display for TimeBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

impl From<TimeBin> for NaiveDateTime {
    fn from(bin: TimeBin) -> Self {
        bin.0
    }
}

impl Serialize for TimeBin {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Anything that carries a time bin: binned readings and both aggregate stages.
pub trait Binned {
    fn time_bin(&self) -> TimeBin;
}

impl<T: Binned + ?Sized> Binned for &T {
    fn time_bin(&self) -> TimeBin {
        (**self).time_bin()
    }
}

/// Rounds `timestamp` to the nearest bin boundary of its day.
///
/// Exact midpoints go to the even bin index, so `00:30` becomes `00:00` and `01:30` becomes
/// `02:00` at an hourly cadence. Parity is taken on the bin index counted from the Unix
/// epoch. Offsets past the last boundary roll over to the next midnight.
pub fn bin_timestamp(timestamp: NaiveDateTime, width: BinWidth) -> TimeBin {
    let midnight = timestamp.date().and_time(NaiveTime::MIN);
    let days_since_epoch = midnight.and_utc().timestamp().div_euclid(SECONDS_PER_DAY);
    let offset_ns = i64::from(timestamp.num_seconds_from_midnight()) * NANOS_PER_SECOND
        + i64::from(timestamp.nanosecond());
    let width_ns = i64::from(width.minutes) * NANOS_PER_MINUTE;

    let quotient = offset_ns / width_ns;
    let remainder = offset_ns % width_ns;
    let epoch_quotient = days_since_epoch * i64::from(width.bins_per_day()) + quotient;
    let index = match (2 * remainder).cmp(&width_ns) {
        Ordering::Less => quotient,
        Ordering::Greater => quotient + 1,
        Ordering::Equal if epoch_quotient.rem_euclid(2) == 0 => quotient,
        Ordering::Equal => quotient + 1,
    };

    TimeBin(midnight + TimeDelta::minutes(index * i64::from(width.minutes)))
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinnedReading {
    pub bin: TimeBin,
    pub resolved: ResolvedReading,
}

impl Binned for BinnedReading {
    fn time_bin(&self) -> TimeBin {
        self.bin
    }
}

pub fn bin_readings(resolved: Vec<ResolvedReading>, width: BinWidth) -> Vec<BinnedReading> {
    resolved
        .into_iter()
        .map(|resolved| BinnedReading {
            bin: bin_timestamp(resolved.reading.timestamp, width),
            resolved,
        })
        .collect()
}
