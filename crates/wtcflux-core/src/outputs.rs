use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::{CsvWriter, DataFrame, SerWriter};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "parquet" => Ok(OutputFormat::Parquet),
            other => Err(PipelineError::Config(format!(
                "unsupported output format '{other}' (expected csv or parquet)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: usize,
    pub blake3: String,
}

/// Serialises `df` in memory so the written file and its recorded hash always agree.
pub fn encode_frame(df: &DataFrame, format: OutputFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let mut clone = df.clone();
        match format {
            OutputFormat::Csv => {
                CsvWriter::new(&mut cursor)
                    .include_header(true)
                    .finish(&mut clone)?;
            }
            OutputFormat::Parquet => {
                ParquetWriter::new(&mut cursor)
                    .with_compression(ParquetCompression::Zstd(None))
                    .with_statistics(StatisticsOptions::default())
                    .finish(&mut clone)?;
            }
        }
    }
    Ok(buffer)
}

/// Writes `df` to `<dir>/<stem>.<ext>`, creating `dir` when needed.
pub fn write_frame(
    df: &DataFrame,
    dir: &Path,
    stem: &str,
    format: OutputFormat,
) -> Result<WrittenOutput> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{stem}.{}", format.extension()));
    let bytes = encode_frame(df, format)?;
    let hash = blake3::hash(&bytes).to_hex().to_string();
    fs::write(&path, &bytes)?;

    info!(
        path = %path.display(),
        rows = df.height(),
        bytes = bytes.len(),
        %format,
        "wrote output table"
    );

    Ok(WrittenOutput {
        path,
        rows: df.height(),
        bytes: bytes.len(),
        blake3: hash,
    })
}
