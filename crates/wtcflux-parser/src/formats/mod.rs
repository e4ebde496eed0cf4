mod common;
mod wtc_flux;

pub use common::TIMESTAMP_FORMATS;
pub use wtc_flux::WtcFluxParser;
