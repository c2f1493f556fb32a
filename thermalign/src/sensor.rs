//! Sensor file references.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::timestamp::{CaptureTimestamp, TimestampFormat};

/// Imaging modality of a sensor stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Visible-spectrum camera, stored as conventional raster images.
    Visible,
    /// Thermal camera, stored as delimited text grids of temperatures.
    Thermal,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Visible => write!(f, "visible"),
            Modality::Thermal => write!(f, "thermal"),
        }
    }
}

/// A file from one sensor together with the capture time decoded from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorFile {
    path: PathBuf,
    name: String,
    timestamp: Option<CaptureTimestamp>,
    modality: Modality,
}

impl SensorFile {
    pub fn new(path: impl Into<PathBuf>, modality: Modality, format: &TimestampFormat) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let timestamp = format.parse(&name);
        Self {
            path,
            name,
            timestamp,
            modality,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name without directories.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> Option<CaptureTimestamp> {
        self.timestamp
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }
}

impl std::fmt::Display for SensorFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensor_file_decodes_name_not_directory() {
        let format = TimestampFormat::default();
        let file = SensorFile::new(
            "/data/v999999999999/m201017021000594.csv",
            Modality::Thermal,
            &format,
        );
        assert_eq!(file.name(), "m201017021000594.csv");
        assert_eq!(file.timestamp().unwrap().to_string(), "2020-10-17 02:10");
        assert_eq!(file.modality(), Modality::Thermal);
    }

    #[test]
    fn test_sensor_file_without_timestamp() {
        let file = SensorFile::new("notes.jpg", Modality::Visible, &TimestampFormat::default());
        assert!(file.timestamp().is_none());
    }
}
