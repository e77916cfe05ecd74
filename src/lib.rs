//! Host-side library backing the `dpp-host` binary: application
//! configuration and the device transport abstraction. The actual wire
//! codec, pipeline engine, calibration engine, and acquisition
//! controller live in their own crates (`dpp_wire`, `dpp_pipeline`,
//! `dpp_calibration`, `dpp_controller`); this crate only wires them to a
//! process.

pub mod config;
pub mod transport;

pub use config::{AppConfig, ConfigError};
pub use transport::{MockTransport, Transport};
