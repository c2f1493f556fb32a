//! Per-pair outcomes and run summary.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::registration::{RegistrationError, RegistrationResult};
use crate::thermal::GridError;

/// Failure of a single pair. Never aborts the run.
#[derive(Debug, thiserror::Error)]
pub enum PairError {
    #[error("Failed to load image '{path}': {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    GridDecode(#[from] GridError),

    #[error(
        "Scene in '{path}' looks obscured \
         (edge density {edge_density:.1}, color variance {color_variance:.0})"
    )]
    SceneRejected {
        path: PathBuf,
        edge_density: f64,
        color_variance: f64,
    },

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error("Failed to write aligned image '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// What happened to one primary file.
#[derive(Debug)]
pub enum PairStatus {
    /// The primary file name does not encode a capture time.
    NoTimestamp,
    /// No secondary file lies within the time window.
    NoMatch,
    Aligned {
        output: PathBuf,
        registration: RegistrationResult,
    },
    Failed(PairError),
}

#[derive(Debug)]
pub struct PairReport {
    pub primary: PathBuf,
    pub secondary: Option<PathBuf>,
    /// Capture time difference in minutes, for matched pairs.
    pub delta_minutes: Option<i64>,
    pub status: PairStatus,
}

impl PairReport {
    pub fn is_aligned(&self) -> bool {
        matches!(self.status, PairStatus::Aligned { .. })
    }

    pub fn error(&self) -> Option<&PairError> {
        match &self.status {
            PairStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Counts over all primary files of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub primaries: usize,
    pub unparseable: usize,
    pub unmatched: usize,
    pub aligned: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_items(items: &[PairReport]) -> Self {
        let mut summary = Self {
            primaries: items.len(),
            ..Self::default()
        };
        for item in items {
            match item.status {
                PairStatus::NoTimestamp => summary.unparseable += 1,
                PairStatus::NoMatch => summary.unmatched += 1,
                PairStatus::Aligned { .. } => summary.aligned += 1,
                PairStatus::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    /// Pairs that reached registration.
    pub fn paired(&self) -> usize {
        self.aligned + self.failed
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} primaries: {} aligned, {} failed, {} without partner, {} without timestamp",
            self.primaries, self.aligned, self.failed, self.unmatched, self.unparseable
        )
    }
}

#[derive(Debug)]
pub struct RunReport {
    /// One entry per primary file, in file name order.
    pub items: Vec<PairReport>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(items: Vec<PairReport>) -> Self {
        let summary = RunSummary::from_items(&items);
        Self { items, summary }
    }

    pub fn failures(&self) -> impl Iterator<Item = &PairReport> {
        self.items.iter().filter(|item| item.error().is_some())
    }
}

/// Writes one `primary;secondary` line per pair.
pub fn write_pairs_report<'a>(
    path: &Path,
    pairs: impl IntoIterator<Item = (&'a Path, &'a Path)>,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = std::io::BufWriter::new(std::fs::File::create(path)?);
    for (primary, secondary) in pairs {
        writeln!(writer, "{};{}", primary.display(), secondary.display())?;
    }
    writer.flush()
}
