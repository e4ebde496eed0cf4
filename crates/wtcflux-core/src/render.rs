use std::fmt::Display;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::Serialize;
use wtcflux_parser::Channel;

use crate::aggregator::{ChamberBinRecord, TreatmentBinRecord};
use crate::error::{PipelineError, Result};
use crate::solver::LeafPrediction;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub time: NaiveDateTime,
    pub group: String,
    pub mean: Option<f64>,
    pub standard_error: Option<f64>,
    pub n: usize,
}

/// One channel's `(time, group, mean, standard error)` tuples, in row order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSeries {
    pub channel: Channel,
    pub points: Vec<SeriesPoint>,
}

pub fn channel_series<K: Display>(
    rows: &[TreatmentBinRecord<K>],
    channel: Channel,
) -> ChannelSeries {
    let points = rows
        .iter()
        .map(|row| series_point(row, row.bin.start(), channel))
        .collect();
    ChannelSeries { channel, points }
}

/// Points for one group whose time index was rebuilt separately, paired positionally.
pub fn indexed_points<K: Display>(
    rows: &[&TreatmentBinRecord<K>],
    index: &[NaiveDateTime],
    channel: Channel,
) -> Vec<SeriesPoint> {
    rows.iter()
        .zip(index)
        .map(|(row, time)| series_point(row, *time, channel))
        .collect()
}

fn series_point<K: Display>(
    row: &TreatmentBinRecord<K>,
    time: NaiveDateTime,
    channel: Channel,
) -> SeriesPoint {
    let stats = row.stats(channel);
    SeriesPoint {
        time,
        group: row.key.to_string(),
        mean: stats.mean,
        standard_error: stats.standard_error,
        n: stats.count,
    }
}

pub fn all_channel_series<K: Display>(rows: &[TreatmentBinRecord<K>]) -> Vec<ChannelSeries> {
    Channel::ALL
        .iter()
        .map(|channel| channel_series(rows, *channel))
        .collect()
}

/// Long layout: one row per (time, group, channel).
pub fn series_frame(series: &[ChannelSeries]) -> Result<DataFrame> {
    let total: usize = series.iter().map(|s| s.points.len()).sum();
    let mut times = Vec::with_capacity(total);
    let mut groups = Vec::with_capacity(total);
    let mut channels = Vec::with_capacity(total);
    let mut means = Vec::with_capacity(total);
    let mut standard_errors = Vec::with_capacity(total);
    let mut counts = Vec::with_capacity(total);

    for s in series {
        for point in &s.points {
            times.push(to_micros(point.time));
            groups.push(point.group.as_str());
            channels.push(s.channel.canonical_name());
            means.push(point.mean);
            standard_errors.push(point.standard_error);
            counts.push(count_u32(point.n)?);
        }
    }

    let df = DataFrame::new(vec![
        datetime_series("time", times)?.into(),
        Series::new("group".into(), groups).into(),
        Series::new("channel".into(), channels).into(),
        Series::new("mean".into(), means).into(),
        Series::new("standard_error".into(), standard_errors).into(),
        Series::new("n".into(), counts).into(),
    ])?;
    Ok(df)
}

pub fn treatment_frame<K: Display>(rows: &[TreatmentBinRecord<K>]) -> Result<DataFrame> {
    series_frame(&all_channel_series(rows))
}

/// Wide layout of Stage A rows: identifying columns then one column per channel mean.
pub fn chamber_frame(rows: &[ChamberBinRecord]) -> Result<DataFrame> {
    let times: Vec<i64> = rows.iter().map(|row| to_micros(row.bin.start())).collect();
    let chambers: Vec<&str> = rows.iter().map(|row| row.chamber.as_str()).collect();
    let temperature: Vec<&str> = rows.iter().map(|row| row.temperature.as_str()).collect();
    let heatwave: Vec<&str> = rows.iter().map(|row| row.heatwave.as_str()).collect();
    let composite: Vec<&str> = rows.iter().map(|row| row.composite.as_str()).collect();
    let reading_counts = rows
        .iter()
        .map(|row| count_u32(row.reading_count))
        .collect::<Result<Vec<u32>>>()?;

    let mut columns: Vec<Column> = vec![
        datetime_series("time", times)?.into(),
        Series::new("chamber".into(), chambers).into(),
        Series::new("temperature_treatment".into(), temperature).into(),
        Series::new("heatwave_treatment".into(), heatwave).into(),
        Series::new("composite_treatment".into(), composite).into(),
        Series::new("reading_count".into(), reading_counts).into(),
    ];
    for channel in Channel::ALL {
        let values: Vec<Option<f64>> = rows.iter().map(|row| row.means.get(channel)).collect();
        columns.push(Series::new(channel.canonical_name().into(), values).into());
    }

    Ok(DataFrame::new(columns)?)
}

pub fn prediction_frame(predictions: &[LeafPrediction]) -> Result<DataFrame> {
    let times: Vec<i64> = predictions.iter().map(|p| to_micros(p.bin.start())).collect();
    let chambers: Vec<&str> = predictions.iter().map(|p| p.chamber.as_str()).collect();
    let an: Vec<f64> = predictions.iter().map(|p| p.net_assimilation).collect();
    let gsw: Vec<f64> = predictions.iter().map(|p| p.stomatal_conductance).collect();
    let et: Vec<f64> = predictions.iter().map(|p| p.transpiration_mmol).collect();
    let le: Vec<f64> = predictions.iter().map(|p| p.latent_heat).collect();

    Ok(DataFrame::new(vec![
        datetime_series("time", times)?.into(),
        Series::new("chamber".into(), chambers).into(),
        Series::new("net_assimilation".into(), an).into(),
        Series::new("stomatal_conductance".into(), gsw).into(),
        Series::new("transpiration_mmol".into(), et).into(),
        Series::new("latent_heat".into(), le).into(),
    ])?)
}

fn datetime_series(name: &str, micros: Vec<i64>) -> Result<Series> {
    Ok(Series::new(name.into(), micros)
        .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?)
}

fn count_u32(count: usize) -> Result<u32> {
    u32::try_from(count)
        .map_err(|_| PipelineError::Config(format!("count {count} does not fit a u32 column")))
}

fn to_micros(dt: NaiveDateTime) -> i64 {
    dt.and_utc().timestamp_micros()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{ChannelStats, ChannelSummary};
    use crate::binning::{bin_timestamp, BinWidth};
    use crate::treatments::HeatwaveTreatment;
    use chrono::NaiveDate;
    use polars::prelude::*;

    fn bin(hour: u32) -> crate::binning::TimeBin {
        let ts = NaiveDate::from_ymd_opt(2016, 11, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap();
        bin_timestamp(ts, BinWidth::HOURLY)
    }

    fn record(hour: u32, key: HeatwaveTreatment) -> TreatmentBinRecord<HeatwaveTreatment> {
        TreatmentBinRecord {
            bin: bin(hour),
            key,
            chamber_count: 6,
            stats: ChannelSummary::default(),
        }
    }

    #[test]
    fn channel_series_follows_row_order() {
        let rows = vec![
            record(10, HeatwaveTreatment::Control),
            record(10, HeatwaveTreatment::Heatwave),
            record(11, HeatwaveTreatment::Control),
        ];
        let series = channel_series(&rows, Channel::Photo);
        let groups: Vec<&str> = series.points.iter().map(|p| p.group.as_str()).collect();
        assert_eq!(groups, ["C", "HW", "C"]);
        assert_eq!(series.points[2].time, bin(11).start());
        assert_eq!(series.points[0].mean, None);
        assert_eq!(series.points[0].n, 0);
    }

    #[test]
    fn treatment_frame_is_long_over_channels() {
        let rows = vec![record(10, HeatwaveTreatment::Control)];
        let df = treatment_frame(&rows).unwrap();
        assert_eq!(df.height(), Channel::COUNT);
        let channels: Vec<Option<&str>> =
            df.column("channel").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(channels[0], Some("par"));
        assert_eq!(channels[Channel::COUNT - 1], Some("wind_speed"));
        assert_eq!(df.column("mean").unwrap().null_count(), Channel::COUNT);
    }

    #[test]
    fn indexed_points_take_their_time_from_the_index() {
        let rows = [record(10, HeatwaveTreatment::Heatwave)];
        let refs: Vec<&TreatmentBinRecord<HeatwaveTreatment>> = rows.iter().collect();
        let replacement = bin(0).start();
        let points = indexed_points(&refs, &[replacement], Channel::Trans);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].time, replacement);
        assert_eq!(points[0].group, "HW");
    }

    #[test]
    fn stats_flow_into_the_frame() {
        let mut row = record(12, HeatwaveTreatment::Heatwave);
        row.stats.set(Channel::Photo, ChannelStats::from_values(&[6.0, 7.0]));

        let df = series_frame(&[channel_series(&[row], Channel::Photo)]).unwrap();
        let expected = df![
            "group" => &["HW"],
            "channel" => &["photo"],
            "mean" => &[6.5f64],
            "n" => &[2u32],
        ]
        .unwrap();
        assert!(df
            .select(["group", "channel", "mean", "n"])
            .unwrap()
            .equals(&expected));
        let se = df.column("standard_error").unwrap().f64().unwrap().get(0);
        let se = se.unwrap();
        assert!((se - 0.5).abs() < 1e-12);
    }

    #[test]
    fn prediction_frame_has_one_row_per_prediction() {
        let prediction = LeafPrediction {
            bin: bin(13),
            chamber: "C07".to_string(),
            drivers: crate::solver::LeafDrivers {
                air_temperature_c: 40.0,
                leaf_temperature_c: 42.0,
                par_umol_m2_s: 1800.0,
                vpd_pa: 5000.0,
                wind_speed_m_s: 8.0,
                pressure_pa: 100_000.0,
                ambient_co2_umol_mol: 400.0,
            },
            net_assimilation: 9.0,
            stomatal_conductance: 0.1,
            transpiration_mmol: 3.2,
            latent_heat: 140.0,
        };
        let df = prediction_frame(&[prediction]).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(
            df.column("transpiration_mmol").unwrap().f64().unwrap().get(0),
            Some(3.2)
        );
    }

    #[test]
    fn counts_beyond_u32_are_rejected() {
        assert_eq!(count_u32(7).unwrap(), 7);
        let too_many = usize::try_from(u64::from(u32::MAX) + 1).unwrap();
        assert!(matches!(count_u32(too_many), Err(PipelineError::Config(_))));
    }
}
