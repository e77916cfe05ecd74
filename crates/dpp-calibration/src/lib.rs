//! The two-stage analog/digital calibration engine run in place of the
//! pipeline while the user calibrates (§4.5).

mod engine;
mod error;

pub use engine::{
    CalibrationEngine, CalibrationReport, ChannelCalibrationSummary, SourceCapabilities,
};
pub use error::CalibrationError;
