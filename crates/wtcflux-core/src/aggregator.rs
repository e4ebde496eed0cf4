use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;
use wtcflux_parser::{Channel, ChannelValues, TemperatureTreatment};

use crate::binning::{Binned, BinnedReading, TimeBin};
use crate::treatments::{CompositeTreatment, HeatwaveTreatment};

/// Stage A row: one chamber's mean of every channel within one bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChamberBinRecord {
    pub bin: TimeBin,
    pub chamber: String,
    pub temperature: TemperatureTreatment,
    pub heatwave: HeatwaveTreatment,
    pub composite: CompositeTreatment,
    pub means: ChannelValues,
    /// Raw readings folded into this row.
    pub reading_count: usize,
}

impl Binned for ChamberBinRecord {
    fn time_bin(&self) -> TimeBin {
        self.bin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChannelStats {
    pub mean: Option<f64>,
    pub standard_error: Option<f64>,
    /// Chambers that had a value for this channel.
    pub count: usize,
}

impl ChannelStats {
    /// Mean and standard error of the mean. A single value has a standard error of zero.
    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        if count == 0 {
            return Self::default();
        }

        let n = count as f64;
        let mean = values.iter().sum::<f64>() / n;
        let standard_error = if count == 1 {
            0.0
        } else {
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
            variance.sqrt() / n.sqrt()
        };

        Self {
            mean: Some(mean),
            standard_error: Some(standard_error),
            count,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ChannelSummary([ChannelStats; Channel::COUNT]);

impl ChannelSummary {
    pub fn get(&self, channel: Channel) -> &ChannelStats {
        &self.0[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, stats: ChannelStats) {
        self.0[channel.index()] = stats;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &ChannelStats)> + '_ {
        Channel::ALL.iter().map(move |channel| (*channel, self.get(*channel)))
    }
}

/// Stage B row: statistics across the chambers sharing a key within one bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentBinRecord<K> {
    pub bin: TimeBin,
    pub key: K,
    pub chamber_count: usize,
    pub stats: ChannelSummary,
}

impl<K> TreatmentBinRecord<K> {
    pub fn stats(&self, channel: Channel) -> &ChannelStats {
        self.stats.get(channel)
    }
}

impl<K> Binned for TreatmentBinRecord<K> {
    fn time_bin(&self) -> TimeBin {
        self.bin
    }
}

/// The rows of one group, in bin order, ready for index reconstruction.
pub fn series_for<'a, K: PartialEq>(
    rows: &'a [TreatmentBinRecord<K>],
    key: &K,
) -> Vec<&'a TreatmentBinRecord<K>> {
    rows.iter().filter(|row| &row.key == key).collect()
}

pub type CompositeBinRecord = TreatmentBinRecord<CompositeTreatment>;
pub type HeatwaveBinRecord = TreatmentBinRecord<HeatwaveTreatment>;

struct ChamberAccumulator {
    heatwave: HeatwaveTreatment,
    composite: CompositeTreatment,
    sums: [f64; Channel::COUNT],
    counts: [usize; Channel::COUNT],
    readings: usize,
}

impl ChamberAccumulator {
    fn new(heatwave: HeatwaveTreatment, composite: CompositeTreatment) -> Self {
        Self {
            heatwave,
            composite,
            sums: [0.0; Channel::COUNT],
            counts: [0; Channel::COUNT],
            readings: 0,
        }
    }

    fn push(&mut self, values: &ChannelValues) {
        self.readings += 1;
        for (channel, value) in values.iter() {
            if let Some(value) = value {
                self.sums[channel.index()] += value;
                self.counts[channel.index()] += 1;
            }
        }
    }

    fn means(&self) -> ChannelValues {
        let mut means = ChannelValues::default();
        for channel in Channel::ALL {
            let idx = channel.index();
            if self.counts[idx] > 0 {
                means.set(channel, Some(self.sums[idx] / self.counts[idx] as f64));
            }
        }
        means
    }
}

/// Stage A: averages each chamber's readings within a bin.
///
/// Rows come back sorted by bin, then chamber id, then temperature treatment.
pub fn aggregate_chambers(readings: &[BinnedReading]) -> Vec<ChamberBinRecord> {
    let mut groups: BTreeMap<(TimeBin, &str, TemperatureTreatment), ChamberAccumulator> =
        BTreeMap::new();

    for binned in readings {
        let resolved = &binned.resolved;
        let key = (
            binned.bin,
            resolved.reading.chamber.as_str(),
            resolved.reading.temperature_treatment,
        );
        groups
            .entry(key)
            .or_insert_with(|| ChamberAccumulator::new(resolved.heatwave, resolved.composite))
            .push(&resolved.reading.channels);
    }

    let records: Vec<ChamberBinRecord> = groups
        .into_iter()
        .map(|((bin, chamber, temperature), acc)| ChamberBinRecord {
            bin,
            chamber: chamber.to_string(),
            temperature,
            heatwave: acc.heatwave,
            composite: acc.composite,
            means: acc.means(),
            reading_count: acc.readings,
        })
        .collect();

    debug!(
        readings = readings.len(),
        rows = records.len(),
        "aggregated readings per chamber"
    );
    records
}

/// Stage B over an arbitrary grouping key.
///
/// One row per distinct `(bin, key)` present in `rows`, sorted by bin then key. Missing
/// chamber means are skipped per channel.
pub fn aggregate_by<K, F>(rows: &[ChamberBinRecord], key_fn: F) -> Vec<TreatmentBinRecord<K>>
where
    K: Ord + Copy,
    F: Fn(&ChamberBinRecord) -> K,
{
    let mut groups: BTreeMap<(TimeBin, K), Vec<&ChamberBinRecord>> = BTreeMap::new();
    for row in rows {
        groups.entry((row.bin, key_fn(row))).or_default().push(row);
    }

    groups
        .into_iter()
        .map(|((bin, key), members)| {
            let mut stats = ChannelSummary::default();
            for channel in Channel::ALL {
                let values: Vec<f64> = members
                    .iter()
                    .filter_map(|row| row.means.get(channel))
                    .collect();
                stats.set(channel, ChannelStats::from_values(&values));
            }
            TreatmentBinRecord {
                bin,
                key,
                chamber_count: members.len(),
                stats,
            }
        })
        .collect()
}

/// Stage B keyed by composite treatment.
pub fn aggregate_treatments(rows: &[ChamberBinRecord]) -> Vec<CompositeBinRecord> {
    let records = aggregate_by(rows, |row| row.composite);
    debug!(rows = records.len(), "aggregated chambers per composite treatment");
    records
}

/// Stage B keyed by heatwave treatment only (Control vs Heatwave).
pub fn aggregate_by_heatwave(rows: &[ChamberBinRecord]) -> Vec<HeatwaveBinRecord> {
    let records = aggregate_by(rows, |row| row.heatwave);
    debug!(rows = records.len(), "aggregated chambers per heatwave treatment");
    records
}
