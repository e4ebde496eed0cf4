use std::fmt;

use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureTreatment {
    Ambient,
    Elevated,
}

impl TemperatureTreatment {
    pub const ALL: [TemperatureTreatment; 2] =
        [TemperatureTreatment::Ambient, TemperatureTreatment::Elevated];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureTreatment::Ambient => "ambient",
            TemperatureTreatment::Elevated => "elevated",
        }
    }
}

impl fmt::Display for TemperatureTreatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TemperatureTreatment {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ambient" | "amb" => Ok(TemperatureTreatment::Ambient),
            "elevated" | "elev" | "warmed" => Ok(TemperatureTreatment::Elevated),
            other => Err(format!("unknown temperature treatment '{other}'")),
        }
    }
}

/// Numeric channels carried by every reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Par,
    Vpd,
    Photo,
    Trans,
    AirTemperature,
    CanopyTemperature,
    Pressure,
    WindSpeed,
}

impl Channel {
    pub const COUNT: usize = 8;

    pub const ALL: [Channel; Channel::COUNT] = [
        Channel::Par,
        Channel::Vpd,
        Channel::Photo,
        Channel::Trans,
        Channel::AirTemperature,
        Channel::CanopyTemperature,
        Channel::Pressure,
        Channel::WindSpeed,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            Channel::Par => "par",
            Channel::Vpd => "vpd",
            Channel::Photo => "photo",
            Channel::Trans => "trans",
            Channel::AirTemperature => "air_temperature",
            Channel::CanopyTemperature => "canopy_temperature",
            Channel::Pressure => "pressure",
            Channel::WindSpeed => "wind_speed",
        }
    }

    /// Position of the channel in [`Channel::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelValues([Option<f64>; Channel::COUNT]);

impl ChannelValues {
    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.0[channel.index()]
    }

    pub fn set(&mut self, channel: Channel, value: Option<f64>) {
        self.0[channel.index()] = value;
    }

    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.set(channel, Some(value));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, Option<f64>)> + '_ {
        Channel::ALL.iter().map(move |channel| (*channel, self.get(*channel)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarFields {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub day_of_year: u32,
    pub hour: u32,
}

impl CalendarFields {
    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            day_of_year: dt.ordinal(),
            hour: dt.hour(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawReading {
    /// 1-based line in the source table, header included.
    pub line_index: usize,
    pub chamber: String,
    pub timestamp: NaiveDateTime,
    pub temperature_treatment: TemperatureTreatment,
    pub channels: ChannelValues,
    pub calendar: CalendarFields,
}

impl RawReading {
    pub fn new(
        line_index: usize,
        chamber: impl Into<String>,
        timestamp: NaiveDateTime,
        temperature_treatment: TemperatureTreatment,
        channels: ChannelValues,
    ) -> Self {
        Self {
            line_index,
            chamber: chamber.into(),
            timestamp,
            temperature_treatment,
            channels,
            calendar: CalendarFields::from_datetime(&timestamp),
        }
    }
}

/// Header names for the required columns of a chamber flux export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub timestamp: String,
    pub chamber: String,
    pub temperature_treatment: String,
    pub par: String,
    pub vpd: String,
    pub photo: String,
    pub trans: String,
    pub air_temperature: String,
    pub canopy_temperature: String,
    pub pressure: String,
    pub wind_speed: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            timestamp: "DateTime_hr".to_string(),
            chamber: "chamber".to_string(),
            temperature_treatment: "T_treatment".to_string(),
            par: "PAR".to_string(),
            vpd: "VPD".to_string(),
            photo: "Photo".to_string(),
            trans: "Trans".to_string(),
            air_temperature: "Tair_al".to_string(),
            canopy_temperature: "TargTempC_Avg".to_string(),
            pressure: "Patm".to_string(),
            wind_speed: "WS".to_string(),
        }
    }
}

impl ColumnNames {
    pub fn channel(&self, channel: Channel) -> &str {
        match channel {
            Channel::Par => &self.par,
            Channel::Vpd => &self.vpd,
            Channel::Photo => &self.photo,
            Channel::Trans => &self.trans,
            Channel::AirTemperature => &self.air_temperature,
            Channel::CanopyTemperature => &self.canopy_temperature,
            Channel::Pressure => &self.pressure,
            Channel::WindSpeed => &self.wind_speed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub readings: Vec<RawReading>,
}

impl ParsedTable {
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}
