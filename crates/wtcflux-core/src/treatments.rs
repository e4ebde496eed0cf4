use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use wtcflux_parser::TemperatureTreatment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HeatwaveTreatment {
    #[serde(rename = "C", alias = "Control", alias = "control")]
    Control,
    #[serde(rename = "HW", alias = "Heatwave", alias = "heatwave")]
    Heatwave,
}

impl HeatwaveTreatment {
    pub const ALL: [HeatwaveTreatment; 2] =
        [HeatwaveTreatment::Control, HeatwaveTreatment::Heatwave];

    pub fn as_str(&self) -> &'static str {
        match self {
            HeatwaveTreatment::Control => "C",
            HeatwaveTreatment::Heatwave => "HW",
        }
    }
}

impl fmt::Display for HeatwaveTreatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for HeatwaveTreatment {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "c" | "control" => Ok(HeatwaveTreatment::Control),
            "hw" | "heatwave" => Ok(HeatwaveTreatment::Heatwave),
            other => Err(format!("unknown heatwave treatment '{other}'")),
        }
    }
}

/// Temperature treatment crossed with heatwave treatment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeTreatment {
    pub temperature: TemperatureTreatment,
    pub heatwave: HeatwaveTreatment,
}

impl CompositeTreatment {
    pub const ALL: [CompositeTreatment; 4] = [
        CompositeTreatment::new(TemperatureTreatment::Ambient, HeatwaveTreatment::Control),
        CompositeTreatment::new(TemperatureTreatment::Ambient, HeatwaveTreatment::Heatwave),
        CompositeTreatment::new(TemperatureTreatment::Elevated, HeatwaveTreatment::Control),
        CompositeTreatment::new(TemperatureTreatment::Elevated, HeatwaveTreatment::Heatwave),
    ];

    pub const fn new(temperature: TemperatureTreatment, heatwave: HeatwaveTreatment) -> Self {
        Self {
            temperature,
            heatwave,
        }
    }

    pub fn as_str(&self) -> &'static str {
        use HeatwaveTreatment::*;
        use TemperatureTreatment::*;
        match (self.temperature, self.heatwave) {
            (Ambient, Control) => "ambient_C",
            (Ambient, Heatwave) => "ambient_HW",
            (Elevated, Control) => "elevated_C",
            (Elevated, Heatwave) => "elevated_HW",
        }
    }
}

impl fmt::Display for CompositeTreatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CompositeTreatment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Fixed chamber → heatwave assignment for one experimental layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChamberTreatmentMap(BTreeMap<String, HeatwaveTreatment>);

impl ChamberTreatmentMap {
    /// Twelve-chamber layout of the 2016 heatwave campaign.
    pub fn heatwave_2016() -> Self {
        use HeatwaveTreatment::{Control as C, Heatwave as HW};
        [
            ("C01", C),
            ("C02", C),
            ("C03", HW),
            ("C04", HW),
            ("C05", C),
            ("C06", C),
            ("C07", HW),
            ("C08", HW),
            ("C09", HW),
            ("C10", HW),
            ("C11", C),
            ("C12", C),
        ]
        .into_iter()
        .collect()
    }

    pub fn get(&self, chamber: &str) -> Option<HeatwaveTreatment> {
        self.0.get(chamber).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, HeatwaveTreatment)> {
        self.0.iter().map(|(chamber, hw)| (chamber.as_str(), *hw))
    }
}

impl<S: Into<String>> FromIterator<(S, HeatwaveTreatment)> for ChamberTreatmentMap {
    fn from_iter<I: IntoIterator<Item = (S, HeatwaveTreatment)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(chamber, hw)| (chamber.into(), hw))
                .collect(),
        )
    }
}
