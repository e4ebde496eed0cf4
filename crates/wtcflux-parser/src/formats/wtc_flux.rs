use std::io::Read;

use tracing::{debug, warn};

use crate::errors::ParserError;
use crate::model::{ChannelValues, ColumnNames, ParsedTable, RawReading};

use super::common::{
    parse_chamber, parse_optional_f64, parse_temperature_treatment, parse_timestamp, ColumnLayout,
    ColumnRole,
};

/// Reader for the per-chamber canopy flux table exported by the chamber logging system.
#[derive(Debug, Clone)]
pub struct WtcFluxParser {
    columns: ColumnNames,
    delimiter: u8,
}

impl Default for WtcFluxParser {
    fn default() -> Self {
        Self::new(ColumnNames::default())
    }
}

impl WtcFluxParser {
    pub fn new(columns: ColumnNames) -> Self {
        Self {
            columns,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(true).delimiter(self.delimiter);
        builder
    }

    pub fn parse(&self, content: &str) -> Result<ParsedTable, ParserError> {
        self.parse_reader(content.as_bytes())
    }

    pub fn parse_reader<R: Read>(&self, source: R) -> Result<ParsedTable, ParserError> {
        let mut reader = self.reader_builder().from_reader(source);

        let header = reader.headers()?.clone();
        let layout = ColumnLayout::resolve(&header, &self.columns)?;
        let roles = layout.roles();

        let mut readings = Vec::new();

        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let line_index = record
                .position()
                .map(|pos| pos.line() as usize)
                .unwrap_or(row_idx + 2);

            let mut timestamp = None;
            let mut chamber = None;
            let mut temperature_treatment = None;
            let mut channels = ChannelValues::default();

            for (idx, role) in &roles {
                let value = record.get(*idx).unwrap_or("");
                let column = header.get(*idx).unwrap_or("");
                match role {
                    ColumnRole::Timestamp => {
                        timestamp = Some(parse_timestamp(value, line_index, column)?);
                    }
                    ColumnRole::Chamber => {
                        chamber = Some(parse_chamber(value, line_index, column)?);
                    }
                    ColumnRole::TemperatureTreatment => {
                        temperature_treatment =
                            Some(parse_temperature_treatment(value, line_index, column)?);
                    }
                    ColumnRole::Channel(channel) => {
                        channels.set(*channel, parse_optional_f64(value, line_index, column)?);
                    }
                }
            }

            // Every role is visited exactly once per row, so all three are populated here.
            if let (Some(timestamp), Some(chamber), Some(temperature_treatment)) =
                (timestamp, chamber, temperature_treatment)
            {
                readings.push(RawReading::new(
                    line_index,
                    chamber,
                    timestamp,
                    temperature_treatment,
                    channels,
                ));
            }
        }

        if readings.is_empty() {
            warn!("flux table contained a header but no data rows");
        } else {
            debug!(rows = readings.len(), "parsed chamber flux table");
        }

        Ok(ParsedTable {
            columns: header.iter().map(|name| name.trim().to_string()).collect(),
            readings,
        })
    }
}
