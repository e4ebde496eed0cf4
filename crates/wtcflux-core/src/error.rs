// crates/wtcflux-core/src/error.rs

use chrono::NaiveDateTime;
use thiserror::Error;
use wtcflux_parser::ParserError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Flux table could not be read: {0}")]
    Parser(#[from] ParserError),

    #[error("Chamber '{chamber}' (line {line_index}) has no heatwave treatment assignment")]
    UnknownChamber { chamber: String, line_index: usize },

    #[error("Series is not contiguous at row {index}: expected {expected}, found {found}")]
    Contiguity {
        index: usize,
        expected: NaiveDateTime,
        found: NaiveDateTime,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid analysis window: start {start} is after end {end}")]
    InvalidWindow {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("Leaf gas-exchange solver failed: {0}")]
    Solver(String),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
