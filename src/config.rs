//! Host application configuration, loaded from a TOML file with
//! `DPP_`-prefixed environment variable overrides.
//!
//! Configuration here is strictly the *host runner's* concerns (log
//! level, device path, default acquisition parameters) — the
//! declarative pipeline spec (filters, pipelines, setups) is a separate
//! YAML document loaded independently, per its own `serde` shape in
//! `dpp_pipeline`.

use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading or validating [`AppConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment failed to merge or extract the configuration.
    #[error("configuration load error: {0}")]
    Load(#[from] figment::Error),
    /// The configuration loaded but failed a semantic check.
    #[error("configuration validation error: {0}")]
    Validation(String),
}

/// Top-level host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Process-wide application settings.
    pub application: ApplicationConfig,
    /// Default acquisition parameters and resource sizing.
    pub acquisition: AcquisitionConfig,
}

/// Process-wide application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// `tracing` env-filter directive (e.g. `"info"`, `"dpp=debug"`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Default acquisition parameters and resource sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Path to the serial device the real transport would open. Unused
    /// while only the mock transport is implemented; kept so a future
    /// transport has somewhere to read it from.
    #[serde(default)]
    pub device_path: Option<String>,
    /// Sample frequency (Hz) used for `Start` frames unless overridden
    /// per-run.
    #[serde(default = "default_frequency")]
    pub default_frequency: u16,
    /// How long the controller waits for the device's `Abort`
    /// acknowledgement before forcing a hard teardown.
    #[serde(default = "default_abort_timeout_ms")]
    pub abort_timeout_ms: u64,
    /// Depth of each channel's reassembly FIFO.
    #[serde(default = "default_channel_backlog")]
    pub channel_backlog: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_frequency() -> u16 {
    100
}

fn default_abort_timeout_ms() -> u64 {
    10_000
}

fn default_channel_backlog() -> usize {
    64
}

impl AppConfig {
    /// Load configuration from `path`, overridden by any `DPP_`-prefixed
    /// environment variables, then validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DPP_").split("_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants a malformed or hand-edited file could violate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let directive = self
            .application
            .log_level
            .split(&['=', ','][..])
            .last()
            .unwrap_or(&self.application.log_level);
        if !valid_levels.contains(&directive) {
            return Err(ConfigError::Validation(format!(
                "invalid log_level '{}': must be one of {}, or a tracing env-filter directive ending in one",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }
        if self.acquisition.default_frequency == 0 {
            return Err(ConfigError::Validation(
                "acquisition.default_frequency must be nonzero".to_string(),
            ));
        }
        if self.acquisition.channel_backlog == 0 {
            return Err(ConfigError::Validation(
                "acquisition.channel_backlog must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> AppConfig {
        AppConfig {
            application: ApplicationConfig {
                log_level: "info".to_string(),
            },
            acquisition: AcquisitionConfig {
                device_path: None,
                default_frequency: 100,
                abort_timeout_ms: 10_000,
                channel_backlog: 64,
            },
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn module_scoped_directive_is_accepted() {
        let mut config = valid_config();
        config.application.log_level = "dpp_controller=debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut config = valid_config();
        config.application.log_level = "deafening".to_string();
        let err = config.validate().expect_err("must reject");
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let mut config = valid_config();
        config.acquisition.default_frequency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn load_from_toml_with_env_override() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        writeln!(
            file,
            r#"
            [application]
            log_level = "info"

            [acquisition]
            default_frequency = 200
            "#
        )
        .expect("write");

        std::env::set_var("DPP_ACQUISITION_DEFAULT_FREQUENCY", "250");
        let config = AppConfig::load(file.path()).expect("load");
        std::env::remove_var("DPP_ACQUISITION_DEFAULT_FREQUENCY");

        assert_eq!(config.acquisition.default_frequency, 250);
    }
}
