pub mod errors;
pub mod formats;
pub mod model;

use std::io::Read;

pub use errors::ParserError;
pub use formats::WtcFluxParser;
pub use model::{
    CalendarFields, Channel, ChannelValues, ColumnNames, ParsedTable, RawReading,
    TemperatureTreatment,
};

/// Parses a comma-delimited flux export using the default column names.
pub fn parse_wtc_flux_file(content: &str) -> Result<ParsedTable, ParserError> {
    WtcFluxParser::default().parse(content)
}

pub fn parse_wtc_flux_reader<R: Read>(
    source: R,
    columns: &ColumnNames,
) -> Result<ParsedTable, ParserError> {
    WtcFluxParser::new(columns.clone()).parse_reader(source)
}

#[cfg(test)]
mod tests;
