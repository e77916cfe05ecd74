//! The acquisition controller (§4.6): the single state machine that
//! owns the active pipeline or calibration engine and the device
//! handle, serialising every external interaction through its public
//! methods (or, equivalently, the [`ControllerCommand`] mailbox).

mod controller;
mod error;
mod messages;

pub use controller::{
    AcquisitionController, ControllerState, UserConfig, DEFAULT_ABORT_TIMEOUT,
    DEFAULT_CHANNEL_BACKLOG,
};
pub use error::ControllerError;
pub use messages::{ControllerCommand, ControllerEvent, ControllerOutcome, DispatchContext};
