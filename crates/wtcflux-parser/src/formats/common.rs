use chrono::NaiveDateTime;

use crate::errors::ParserError;
use crate::model::{Channel, ColumnNames, TemperatureTreatment};

pub const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Timestamp,
    Chamber,
    TemperatureTreatment,
    Channel(Channel),
}

/// Header position of every required column.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    pub timestamp: usize,
    pub chamber: usize,
    pub temperature_treatment: usize,
    pub channels: [usize; Channel::COUNT],
}

impl ColumnLayout {
    pub fn resolve(header: &csv::StringRecord, names: &ColumnNames) -> Result<Self, ParserError> {
        let find = |wanted: &str| header.iter().position(|found| found.trim() == wanted);

        // Without a time axis nothing downstream can be placed, so this is a parse failure
        // rather than a schema gap.
        let timestamp = find(&names.timestamp).ok_or_else(|| {
            ParserError::parse(1, &names.timestamp, "timestamp column missing from header")
        })?;

        let mut missing = Vec::new();
        let chamber = find(&names.chamber);
        if chamber.is_none() {
            missing.push(names.chamber.clone());
        }
        let temperature_treatment = find(&names.temperature_treatment);
        if temperature_treatment.is_none() {
            missing.push(names.temperature_treatment.clone());
        }

        let mut channels = [0usize; Channel::COUNT];
        for (slot, channel) in channels.iter_mut().zip(Channel::ALL.iter()) {
            match find(names.channel(*channel)) {
                Some(idx) => *slot = idx,
                None => missing.push(names.channel(*channel).to_string()),
            }
        }

        match (chamber, temperature_treatment) {
            (Some(chamber), Some(temperature_treatment)) if missing.is_empty() => Ok(Self {
                timestamp,
                chamber,
                temperature_treatment,
                channels,
            }),
            _ => Err(ParserError::Schema { missing }),
        }
    }

    pub fn roles(&self) -> Vec<(usize, ColumnRole)> {
        let mut roles = vec![
            (self.timestamp, ColumnRole::Timestamp),
            (self.chamber, ColumnRole::Chamber),
            (self.temperature_treatment, ColumnRole::TemperatureTreatment),
        ];
        for (idx, channel) in self.channels.iter().zip(Channel::ALL.iter()) {
            roles.push((*idx, ColumnRole::Channel(*channel)));
        }
        roles
    }
}

pub fn parse_timestamp(
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<NaiveDateTime, ParserError> {
    let trimmed = value.trim();
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Ok(dt);
        }
    }
    Err(ParserError::parse(
        line_index,
        column,
        format!("invalid timestamp '{trimmed}', expected YYYY-MM-DD HH:MM:SS"),
    ))
}

pub fn parse_optional_f64(
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<Option<f64>, ParserError> {
    let trimmed = value.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("na")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return Ok(None);
    }

    let parsed = trimmed.parse::<f64>().map_err(|err| {
        ParserError::parse(line_index, column, format!("failed to parse as float: {err}"))
    })?;

    if parsed.is_finite() {
        Ok(Some(parsed))
    } else {
        Ok(None)
    }
}

pub fn parse_chamber(value: &str, line_index: usize, column: &str) -> Result<String, ParserError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ParserError::parse(line_index, column, "chamber id is empty"));
    }
    Ok(trimmed.to_string())
}

pub fn parse_temperature_treatment(
    value: &str,
    line_index: usize,
    column: &str,
) -> Result<TemperatureTreatment, ParserError> {
    TemperatureTreatment::try_from(value)
        .map_err(|message| ParserError::parse(line_index, column, message))
}
