//! Run configuration.
//!
//! A run is described by [`PipelineConfig`], loaded from a YAML or JSON file
//! (selected by extension) and then overridden from the command line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::registration::RegistrationConfig;
use crate::scene::SceneFilterConfig;
use crate::thermal::{Colormap, DEFAULT_DELIMITER};
use crate::timestamp::TimestampFormat;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported config file '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: common::FileExtensionError,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: common::SerdeFormatError,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            message: message.into(),
        }
    }
}

/// Everything a pairing-and-alignment run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Visible-sensor images, the geometric reference.
    pub primary_dir: PathBuf,
    /// Thermal-sensor grids, warped onto the primary images.
    pub secondary_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Largest accepted capture time difference, inclusive.
    pub time_window_minutes: u32,
    /// Best cross-checked matches handed to the robust fit.
    pub max_correspondences: usize,
    /// Reprojection distance in pixels under which a match counts as an inlier.
    pub inlier_threshold: f64,
    /// When set, one `primary;secondary` line is written per resolved pair.
    pub pairs_report: Option<PathBuf>,
    pub primary_extensions: Vec<String>,
    pub secondary_extensions: Vec<String>,
    /// Walk input directories recursively.
    pub recursive: bool,
    pub colormap: Colormap,
    pub timestamp: TimestampFormat,
    /// Field delimiter of the thermal grids.
    pub grid_delimiter: char,
    /// Pairs aligned at once; 0 uses one per worker thread.
    pub max_concurrent: usize,
    /// Wall-clock budget for one registration, after which it fails.
    pub pair_timeout_secs: Option<f64>,
    /// Screen out obscured primary scenes before registration.
    pub scene_filter: Option<SceneFilterConfig>,
    /// Engine tunables. `max_correspondences` and `inlier_threshold` above
    /// take precedence over the values nested here.
    pub registration: RegistrationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let registration = RegistrationConfig::default();
        Self {
            primary_dir: PathBuf::from("data/visible"),
            secondary_dir: PathBuf::from("data/thermal"),
            output_dir: PathBuf::from("data/aligned"),
            time_window_minutes: 20,
            max_correspondences: registration.max_correspondences,
            inlier_threshold: registration.ransac.inlier_threshold,
            pairs_report: None,
            primary_extensions: common::file_utils::IMAGE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            secondary_extensions: common::file_utils::GRID_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            recursive: false,
            colormap: Colormap::default(),
            timestamp: TimestampFormat::default(),
            grid_delimiter: DEFAULT_DELIMITER as char,
            max_concurrent: 0,
            pair_timeout_secs: None,
            scene_filter: None,
            registration,
        }
    }
}

impl PipelineConfig {
    /// Reads a config file. The format follows the file extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let format = common::FileFormat::from_file_name(&path.to_string_lossy()).map_err(
            |source| ConfigError::Format {
                path: path.to_path_buf(),
                source,
            },
        )?;
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            common::deserialize(&text, format).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn time_window(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::minutes(i64::from(self.time_window_minutes))
    }

    pub fn pair_timeout(&self) -> Option<std::time::Duration> {
        self.pair_timeout_secs
            .and_then(|secs| std::time::Duration::try_from_secs_f64(secs).ok())
    }

    /// Delimiter as the byte the grid reader expects.
    pub fn grid_delimiter_byte(&self) -> u8 {
        self.grid_delimiter as u8
    }

    /// Engine configuration with the top-level overrides applied.
    pub fn registration_config(&self) -> RegistrationConfig {
        let mut config = self.registration.clone();
        config.max_correspondences = self.max_correspondences;
        config.ransac.inlier_threshold = self.inlier_threshold;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_window_minutes == 0 {
            tracing::warn!("Time window of 0 minutes only pairs identical capture times");
        }
        if !self.grid_delimiter.is_ascii() || self.grid_delimiter.is_ascii_alphanumeric() {
            return Err(ConfigError::invalid(
                "grid_delimiter",
                format!("'{}' is not an ASCII separator", self.grid_delimiter),
            ));
        }
        if self.primary_extensions.is_empty() {
            return Err(ConfigError::invalid("primary_extensions", "must not be empty"));
        }
        if self.secondary_extensions.is_empty() {
            return Err(ConfigError::invalid(
                "secondary_extensions",
                "must not be empty",
            ));
        }
        if let Some(secs) = self.pair_timeout_secs {
            if !(secs.is_finite() && secs > 0.0) {
                return Err(ConfigError::invalid(
                    "pair_timeout_secs",
                    format!("must be positive, got {secs}"),
                ));
            }
            if let Err(err) = std::time::Duration::try_from_secs_f64(secs) {
                return Err(ConfigError::invalid("pair_timeout_secs", err.to_string()));
            }
        }
        if self.timestamp.century > 99 {
            return Err(ConfigError::invalid(
                "timestamp.century",
                format!("must be at most 99, got {}", self.timestamp.century),
            ));
        }
        if self.timestamp.min_base_len < self.timestamp.tag_len + 10 {
            return Err(ConfigError::invalid(
                "timestamp.min_base_len",
                "must cover the tag and five two-digit fields",
            ));
        }
        if let Some(filter) = &self.scene_filter {
            filter.validate()?;
        }
        self.registration_config().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_window(), chrono::TimeDelta::minutes(20));
        assert_eq!(config.grid_delimiter_byte(), b';');
        assert_eq!(config.registration_config(), RegistrationConfig::default());
    }

    #[test]
    fn test_top_level_options_are_forwarded() {
        let config = PipelineConfig {
            max_correspondences: 30,
            inlier_threshold: 5.0,
            ..PipelineConfig::default()
        };
        let registration = config.registration_config();
        assert_eq!(registration.max_correspondences, 30);
        assert_eq!(registration.ransac.inlier_threshold, 5.0);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let too_few = PipelineConfig {
            max_correspondences: 2,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            too_few.validate(),
            Err(ConfigError::Invalid { .. })
        ));

        let bad_timeout = PipelineConfig {
            pair_timeout_secs: Some(-1.0),
            ..PipelineConfig::default()
        };
        assert!(bad_timeout.validate().is_err());

        let bad_delimiter = PipelineConfig {
            grid_delimiter: '7',
            ..PipelineConfig::default()
        };
        assert!(bad_delimiter.validate().is_err());
    }

    #[test]
    fn test_out_of_range_timeout_and_century_are_rejected() {
        let huge_timeout = PipelineConfig {
            pair_timeout_secs: Some(1e30),
            ..PipelineConfig::default()
        };
        assert!(matches!(
            huge_timeout.validate(),
            Err(ConfigError::Invalid { field: "pair_timeout_secs", .. })
        ));
        assert_eq!(huge_timeout.pair_timeout(), None);

        let huge_century = PipelineConfig {
            timestamp: crate::timestamp::TimestampFormat {
                century: 50_000_000,
                ..Default::default()
            },
            ..PipelineConfig::default()
        };
        assert!(huge_century.validate().is_err());

        let minute = PipelineConfig {
            pair_timeout_secs: Some(60.0),
            ..PipelineConfig::default()
        };
        assert!(minute.validate().is_ok());
        assert_eq!(minute.pair_timeout(), Some(std::time::Duration::from_secs(60)));
    }

    #[test]
    fn test_load_yaml_with_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = common::test_utils::write_fixture(
            dir.path(),
            "run.yaml",
            b"primary_dir: /data/v\nsecondary_dir: /data/m\ntime_window_minutes: 10\ncolormap: thermal_ramp\nregistration:\n  ransac:\n    seed: 7\n",
        );

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.primary_dir, PathBuf::from("/data/v"));
        assert_eq!(config.time_window_minutes, 10);
        assert_eq!(config.colormap, Colormap::ThermalRamp);
        assert_eq!(config.registration.ransac.seed, Some(7));
        assert_eq!(config.max_correspondences, 50);
        assert_eq!(config.timestamp, TimestampFormat::default());
    }

    #[test]
    fn test_load_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = common::test_utils::write_fixture(
            dir.path(),
            "run.json",
            br#"{"output_dir": "out", "inlier_threshold": 4.5, "scene_filter": {}}"#,
        );

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.registration_config().ransac.inlier_threshold, 4.5);
        assert_eq!(config.scene_filter, Some(SceneFilterConfig::default()));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PipelineConfig::load(&dir.path().join("run.toml")),
            Err(ConfigError::Format { .. })
        ));
        assert!(matches!(
            PipelineConfig::load(&dir.path().join("absent.yaml")),
            Err(ConfigError::Read { .. })
        ));
        let broken = common::test_utils::write_fixture(dir.path(), "broken.json", b"{ not json");
        assert!(matches!(
            PipelineConfig::load(&broken),
            Err(ConfigError::Parse { .. })
        ));
    }
}
