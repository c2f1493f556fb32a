//! Pairing-and-alignment orchestrator.
//!
//! A run lists both sensor directories, pairs every primary file with its
//! temporal partner through a [`CandidateIndex`] built once, and then aligns
//! the resolved pairs in parallel. Only missing inputs, an unwritable output
//! directory or an invalid configuration abort the run. Everything that goes
//! wrong with a single pair is recorded in its [`PairReport`] and the run
//! moves on.

mod report;


use std::collections::HashSet;
use std::path::{Path, PathBuf};

use image::ImageFormat;

pub use report::{PairError, PairReport, PairStatus, RunReport, RunSummary};

use crate::config::{ConfigError, PipelineConfig};
use crate::registration::{RegistrationResult, Registrator};
use crate::scene::{self, SceneClass};
use crate::sensor::{Modality, SensorFile};
use crate::temporal::{pair_all, CandidateIndex, FilePairing, PairingOutcome};
use crate::thermal;
use crate::timestamp::base_name;

/// Run-level failures.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{role} directory '{path}' does not exist")]
    MissingDirectory { role: &'static str, path: PathBuf },

    #[error("Failed to list {role} directory '{path}': {source}")]
    ListDirectory {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output directory '{path}': {source}")]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write pairs report '{path}': {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A resolved pair waiting for alignment.
#[derive(Debug)]
struct AlignJob {
    primary: SensorFile,
    secondary: SensorFile,
    output: PathBuf,
}

#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    registrator: Registrator,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let registrator = Registrator::new(config.registration_config());
        Self {
            config,
            registrator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self) -> Result<RunReport, PipelineError> {
        self.config.validate()?;

        let primaries = self.list_sensor_files(
            "primary",
            &self.config.primary_dir,
            &self.config.primary_extensions,
            Modality::Visible,
        )?;
        let secondaries = self.list_sensor_files(
            "secondary",
            &self.config.secondary_dir,
            &self.config.secondary_extensions,
            Modality::Thermal,
        )?;

        std::fs::create_dir_all(&self.config.output_dir).map_err(|source| {
            PipelineError::CreateOutputDir {
                path: self.config.output_dir.clone(),
                source,
            }
        })?;

        let index = CandidateIndex::build(secondaries, &self.config.timestamp);
        tracing::info!(
            "Pairing {} primary files against {} secondary files in {} groups",
            primaries.len(),
            index.len(),
            index.group_count()
        );

        let pairings = pair_all(&primaries, &index, self.config.time_window());
        let outputs = output_paths(&pairings, &self.config.output_dir);

        if let Some(report_path) = &self.config.pairs_report {
            let pairs = pairings.iter().filter_map(|p| {
                p.matched
                    .as_ref()
                    .map(|secondary| (p.primary.path(), secondary.path()))
            });
            report::write_pairs_report(report_path, pairs).map_err(|source| {
                PipelineError::Report {
                    path: report_path.clone(),
                    source,
                }
            })?;
        }

        let jobs: Vec<(usize, AlignJob)> = pairings
            .iter()
            .zip(outputs)
            .enumerate()
            .filter_map(|(i, (pairing, output))| {
                let secondary = pairing.matched.clone()?;
                Some((
                    i,
                    AlignJob {
                        primary: pairing.primary.clone(),
                        secondary,
                        output: output?,
                    },
                ))
            })
            .collect();

        let concurrency = common::parallel::effective_concurrency(self.config.max_concurrent);
        tracing::info!(
            "Aligning {} pairs, {} at a time",
            jobs.len(),
            concurrency
        );
        let mut results: Vec<Option<PairStatus>> = (0..pairings.len()).map(|_| None).collect();
        let statuses = common::parallel::par_map_limited(&jobs, concurrency, |(_, job)| {
            self.process(job)
        });
        for ((i, _), status) in jobs.iter().zip(statuses) {
            results[*i] = Some(status);
        }

        let items: Vec<PairReport> = pairings
            .into_iter()
            .zip(results)
            .map(|(pairing, status)| {
                let status = status.unwrap_or_else(|| match pairing.outcome() {
                    PairingOutcome::NoTimestamp => PairStatus::NoTimestamp,
                    _ => PairStatus::NoMatch,
                });
                PairReport {
                    primary: pairing.primary.path().to_path_buf(),
                    secondary: pairing.matched.map(|s| s.path().to_path_buf()),
                    delta_minutes: pairing.delta.map(|d| d.num_minutes()),
                    status,
                }
            })
            .collect();

        let report = RunReport::new(items);
        tracing::info!("{}", report.summary);
        Ok(report)
    }

    /// Aligns one pair and writes the result to `output`.
    pub fn align_pair(
        &self,
        primary: &SensorFile,
        secondary: &SensorFile,
        output: &Path,
    ) -> Result<RegistrationResult, PairError> {
        let primary_image = image::open(primary.path())
            .map_err(|source| PairError::ImageLoad {
                path: primary.path().to_path_buf(),
                source,
            })?
            .to_rgb8();

        if let Some(filter) = &self.config.scene_filter {
            let (assessment, class) = scene::assess(&primary_image, filter);
            if class == SceneClass::Obscured {
                return Err(PairError::SceneRejected {
                    path: primary.path().to_path_buf(),
                    edge_density: assessment.edge_density,
                    color_variance: assessment.color_variance,
                });
            }
        }

        let grid = thermal::read_grid(secondary.path(), self.config.grid_delimiter_byte())?;
        let secondary_image = thermal::decode(&grid, self.config.colormap);

        let aligned = self.registrator.align_within(
            &primary_image,
            &secondary_image,
            self.config.pair_timeout(),
        )?;

        aligned
            .image
            .save_with_format(output, ImageFormat::Png)
            .map_err(|source| PairError::Write {
                path: output.to_path_buf(),
                source,
            })?;

        Ok(aligned.result)
    }

    fn process(&self, job: &AlignJob) -> PairStatus {
        match self.align_pair(&job.primary, &job.secondary, &job.output) {
            Ok(registration) => {
                tracing::info!(
                    "Aligned {} onto {}: {} of {} inliers, rms {:.2} px, {:.0} ms",
                    job.secondary.name(),
                    job.primary.name(),
                    registration.inlier_count(),
                    registration.correspondences,
                    registration.rms_error,
                    registration.elapsed_ms
                );
                PairStatus::Aligned {
                    output: job.output.clone(),
                    registration,
                }
            }
            Err(err) => {
                tracing::warn!(
                    "Pair {} / {} failed: {}",
                    job.primary.name(),
                    job.secondary.name(),
                    err
                );
                PairStatus::Failed(err)
            }
        }
    }

    fn list_sensor_files(
        &self,
        role: &'static str,
        dir: &Path,
        extensions: &[String],
        modality: Modality,
    ) -> Result<Vec<SensorFile>, PipelineError> {
        if !dir.is_dir() {
            return Err(PipelineError::MissingDirectory {
                role,
                path: dir.to_path_buf(),
            });
        }

        let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
        let paths = common::file_utils::files_with_extensions(dir, &extensions, self.config.recursive)
            .map_err(|source| PipelineError::ListDirectory {
                role,
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(paths
            .into_iter()
            .map(|path| SensorFile::new(path, modality, &self.config.timestamp))
            .collect())
    }
}

/// Output file for every matched pairing, `None` for unmatched ones.
///
/// The first pairing of a secondary file gets `<stem>_aligned.png`. Later
/// pairings that would land on an already taken path add the primary base
/// name, and a counter if that is still taken.
fn output_paths(pairings: &[FilePairing], output_dir: &Path) -> Vec<Option<PathBuf>> {
    let mut taken: HashSet<PathBuf> = HashSet::new();

    pairings
        .iter()
        .map(|pairing| {
            let secondary = pairing.matched.as_ref()?;
            let stem = secondary
                .path()
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| secondary.name().to_string());

            let mut path = output_dir.join(format!("{stem}_aligned.png"));
            if taken.contains(&path) {
                let primary = base_name(pairing.primary.name());
                path = output_dir.join(format!("{stem}_{primary}_aligned.png"));
                let mut n = 2;
                while taken.contains(&path) {
                    path = output_dir.join(format!("{stem}_{primary}_{n}_aligned.png"));
                    n += 1;
                }
            }
            taken.insert(path.clone());
            Some(path)
        })
        .collect()
}
