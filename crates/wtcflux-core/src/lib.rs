pub mod aggregator;
pub mod binning;
pub mod config;
pub mod error;
pub mod light;
pub mod outputs;
pub mod pipelines;
pub mod reindex;
pub mod render;
pub mod resolver;
pub mod solver;
pub mod treatments;
pub mod window;

pub use error::{PipelineError, Result};
pub use wtcflux_parser;
