//! Configuration System using Figment
//!
//! Configuration is layered, later sources overriding earlier ones:
//! 1. Built-in defaults (`Default` impls)
//! 2. A TOML file (default `config/ptc.toml`, missing file is fine)
//! 3. Environment variables prefixed with `PTC_`, nested keys split on `__`
//!
//! The sweep options also accept their historical upper-case names
//! (`NRFRAMES`, `MINIMUMEXPOSURE`, `MAXIMUMEXPOSURE`, `NREXPOSURES`).
//!
//! # Example
//! ```no_run
//! use ptc_tools::config::PtcConfig;
//!
//! let config = PtcConfig::load()?;
//! config.validate()?;
//! println!("frames per burst: {}", config.sweep.nr_frames);
//! # Ok::<(), ptc_tools::error::PtcError>(())
//! ```
//!
//! Environment override: `PTC_SWEEP__NR_FRAMES=20`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PtcError, PtcResult};
use crate::hardware::mock::{MockCameraConfig, MockMode};
use crate::ptc::schedule::ExposureSchedule;

/// Upper bound on `frame_timeout`; anything longer is a configuration mistake.
pub const MAX_FRAME_TIMEOUT: Duration = Duration::from_secs(3600);

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/ptc.toml";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtcConfig {
    /// Sweep parameters
    pub sweep: SweepSettings,
    /// Simulated camera
    pub camera: MockCameraConfig,
    /// Log output
    pub logging: LoggingConfig,
    /// Result files
    pub output: OutputConfig,
}

/// Parameters of one photon transfer sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Frames per burst
    #[serde(alias = "NRFRAMES", alias = "nrframes")]
    pub nr_frames: usize,
    /// Shortest exposure in the sweep, seconds. Also used for the dark pass.
    #[serde(alias = "MINIMUMEXPOSURE", alias = "minimumexposure")]
    pub minimum_exposure: f64,
    /// Longest exposure in the sweep, seconds
    #[serde(alias = "MAXIMUMEXPOSURE", alias = "maximumexposure")]
    pub maximum_exposure: f64,
    /// Number of log-spaced exposures
    #[serde(alias = "NREXPOSURES", alias = "nrexposures")]
    pub nr_exposures: usize,
    /// Extra wait allowed per frame on top of its exposure
    #[serde(with = "humantime_serde")]
    pub frame_timeout: Duration,
    /// Requested spacing between frames in a sequence, milliseconds
    pub interval_ms: f64,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            nr_frames: 100,
            minimum_exposure: 0.1,
            maximum_exposure: 100.0,
            nr_exposures: 30,
            frame_timeout: Duration::from_secs(10),
            interval_ms: 0.0,
        }
    }
}

impl SweepSettings {
    /// Check everything that can be checked before touching hardware.
    pub fn validate(&self) -> PtcResult<()> {
        if self.nr_frames == 0 {
            return Err(PtcError::InvalidConfiguration(
                "nr_frames must be at least 1".into(),
            ));
        }
        if self.interval_ms < 0.0 || !self.interval_ms.is_finite() {
            return Err(PtcError::InvalidConfiguration(format!(
                "interval_ms must be a non-negative number, got {}",
                self.interval_ms
            )));
        }
        if self.frame_timeout > MAX_FRAME_TIMEOUT {
            return Err(PtcError::InvalidConfiguration(format!(
                "frame_timeout {:?} exceeds {:?}",
                self.frame_timeout, MAX_FRAME_TIMEOUT
            )));
        }
        self.schedule().map(|_| ())
    }

    /// The log-spaced exposure schedule described by these settings.
    pub fn schedule(&self) -> PtcResult<ExposureSchedule> {
        ExposureSchedule::log_spaced(
            self.minimum_exposure,
            self.maximum_exposure,
            self.nr_exposures,
        )
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (pretty, compact, json)
    pub format: String,
    /// Log span close events, which carry per-pass timings
    pub span_events: bool,
    /// Include source file and line
    pub file_and_line: bool,
    /// Include thread names
    pub thread_names: bool,
    /// ANSI colors in pretty output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            span_events: false,
            file_and_line: false,
            thread_names: false,
            ansi: true,
        }
    }
}

/// Where and how results are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory for result files
    pub directory: PathBuf,
    /// Write the results table as CSV
    pub csv: bool,
    /// Write a JSON summary of the sweep
    pub summary_json: bool,
    /// Decimal places in the printed results table
    pub precision: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("ptc_output"),
            csv: true,
            summary_json: true,
            precision: 4,
        }
    }
}

impl PtcConfig {
    /// Load configuration from `config/ptc.toml` and environment variables
    pub fn load() -> PtcResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> PtcResult<Self> {
        let config = Self::figment(path.as_ref()).extract()?;
        Ok(config)
    }

    fn figment(path: &Path) -> Figment {
        // Defaults come from `#[serde(default)]`, so upper-case aliases in the
        // file never collide with a default key.
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PTC_").split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> PtcResult<()> {
        self.sweep.validate()?;

        self.camera
            .validate()
            .map_err(|e| PtcError::InvalidConfiguration(e.to_string()))?;

        if self.sweep.minimum_exposure < self.camera.min_exposure_s
            || self.sweep.maximum_exposure > self.camera.max_exposure_s
        {
            return Err(PtcError::InvalidConfiguration(format!(
                "exposure range [{}, {}]s exceeds camera range [{}, {}]s",
                self.sweep.minimum_exposure,
                self.sweep.maximum_exposure,
                self.camera.min_exposure_s,
                self.camera.max_exposure_s
            )));
        }

        // Instant mode produces frames faster than any consumer drains them.
        if self.camera.mode == MockMode::Instant && self.sweep.nr_frames > self.camera.buffer_frames {
            return Err(PtcError::InvalidConfiguration(format!(
                "nr_frames {} exceeds the camera buffer of {} frames",
                self.sweep.nr_frames, self.camera.buffer_frames
            )));
        }

        crate::logging::TracingConfig::from_logging_config(&self.logging)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = PtcConfig::default();
        assert_eq!(config.sweep.nr_frames, 100);
        assert_eq!(config.sweep.minimum_exposure, 0.1);
        assert_eq!(config.sweep.maximum_exposure, 100.0);
        assert_eq!(config.sweep.nr_exposures, 30);
        assert_eq!(config.output.precision, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = PtcConfig::load_from("does-not-exist.toml").map_err(|e| e.to_string())?;
            assert_eq!(config, PtcConfig::default());
            Ok(())
        });
    }

    #[test]
    fn test_file_accepts_historical_option_names() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ptc.toml",
                r#"
                [sweep]
                NRFRAMES = 4
                MINIMUMEXPOSURE = 1.0
                MAXIMUMEXPOSURE = 8.0
                NREXPOSURES = 4
                frame_timeout = "250ms"
                "#,
            )?;

            let config = PtcConfig::load_from("ptc.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.sweep.nr_frames, 4);
            assert_eq!(config.sweep.minimum_exposure, 1.0);
            assert_eq!(config.sweep.maximum_exposure, 8.0);
            assert_eq!(config.sweep.nr_exposures, 4);
            assert_eq!(config.sweep.frame_timeout, Duration::from_millis(250));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("ptc.toml", "[sweep]\nnr_frames = 4\n")?;
            jail.set_env("PTC_SWEEP__NR_FRAMES", "12");
            jail.set_env("PTC_LOGGING__LEVEL", "debug");

            let config = PtcConfig::load_from("ptc.toml").map_err(|e| e.to_string())?;
            assert_eq!(config.sweep.nr_frames, 12);
            assert_eq!(config.logging.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn test_rejects_bad_sweep_before_acquisition() {
        let mut config = PtcConfig::default();
        config.sweep.nr_exposures = 1;
        assert!(matches!(
            config.validate(),
            Err(PtcError::InvalidConfiguration(_))
        ));

        let mut config = PtcConfig::default();
        config.sweep.nr_frames = 0;
        assert!(config.validate().is_err());

        let mut config = PtcConfig::default();
        config.sweep.maximum_exposure = config.sweep.minimum_exposure;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_range_outside_camera() {
        let mut config = PtcConfig::default();
        config.camera.max_exposure_s = 10.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level_and_format() {
        let mut config = PtcConfig::default();
        config.logging.level = "loud".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log level 'loud'"), "{err}");

        let mut config = PtcConfig::default();
        config.logging.level = "WARN".into();
        config.logging.format = "xml".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Invalid log format 'xml'"), "{err}");
    }

    #[test]
    fn test_frame_timeout_is_capped() {
        let mut config = PtcConfig::default();
        config.sweep.frame_timeout = MAX_FRAME_TIMEOUT;
        assert!(config.validate().is_ok());

        config.sweep.frame_timeout = Duration::MAX;
        assert!(matches!(
            config.validate(),
            Err(PtcError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_logging_switches_load_from_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ptc.toml",
                "[logging]\nspan_events = true\nansi = false\n",
            )?;
            let config = PtcConfig::load_from("ptc.toml").map_err(|e| e.to_string())?;
            assert!(config.logging.span_events);
            assert!(!config.logging.ansi);
            assert!(!config.logging.file_and_line);
            Ok(())
        });
    }
}
