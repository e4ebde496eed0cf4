use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    /// Malformed or unreadable input. A missing timestamp column is reported here
    /// (with `line_index` 1) because no reading can be placed in time without it.
    #[error("line {line_index} column '{column}' invalid: {message}")]
    Parse {
        line_index: usize,
        column: String,
        message: String,
    },

    #[error("CSV error: {source}")]
    Csv {
        #[source]
        source: csv::Error,
    },

    #[error("missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },
}

impl ParserError {
    pub(crate) fn parse(line_index: usize, column: &str, message: impl Into<String>) -> Self {
        ParserError::Parse {
            line_index,
            column: column.to_string(),
            message: message.into(),
        }
    }
}

impl From<csv::Error> for ParserError {
    fn from(source: csv::Error) -> Self {
        ParserError::Csv { source }
    }
}
