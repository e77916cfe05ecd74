//! Errors the acquisition controller can surface, grouped by the
//! taxonomy in §7: configuration, protocol, resource, and runtime.

use thiserror::Error;

use dpp_calibration::CalibrationError;
use dpp_pipeline::{ConfigError, RuntimeError};

/// Top-level controller error. Configuration and resource errors leave
/// the controller in `Idle`; runtime errors are fatal and halt it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// An operation was requested in a state that does not permit it
    /// (e.g. `start_acquisition` while already `Active`).
    #[error("cannot {operation} while controller is {state}")]
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The controller's current state.
        state: &'static str,
    },

    /// The pipeline resolver rejected the requested setup.
    #[error("pipeline configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The calibration engine rejected its inputs.
    #[error("calibration configuration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// A setup index named by the caller does not exist.
    #[error("unknown setup index {index}")]
    UnknownSetup {
        /// The out-of-range index.
        index: usize,
    },

    /// A sample arrived for a channel the active engine was not told
    /// to expect.
    #[error("sample arrived for unconfigured channel {channel}")]
    UnconfiguredChannel {
        /// The offending channel index.
        channel: u8,
    },

    /// A per-sample runtime assertion failed. This indicates a
    /// programming error in the resolver's sizing guarantees and halts
    /// the controller; see §7.
    #[error("fatal runtime error, controller halted: {0}")]
    Runtime(#[from] RuntimeError),
}
