//! Calibration-specific errors. All of these abort calibration and leave
//! the controller in `Idle`, per §7's configuration-error propagation
//! policy.

use thiserror::Error;

/// Errors the calibration engine can surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    /// A sample arrived for a channel the engine was not told about.
    #[error("calibration received a sample for unconfigured channel {channel}")]
    UnknownChannel {
        /// The offending channel index.
        channel: u8,
    },

    /// `finalize` was asked to calibrate a source no channel observation
    /// referenced.
    #[error("calibration has no channel observations for source {source}")]
    UnknownSource {
        /// The offending source index.
        source: u8,
    },

    /// A source's published gain table was empty; there is nothing to
    /// select an `opamp_gain` index from.
    #[error("source {source} published an empty opamp gain table")]
    EmptyGainTable {
        /// The offending source index.
        source: u8,
    },
}
