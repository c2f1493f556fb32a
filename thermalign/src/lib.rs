//! Thermalign - pairing and registration of thermal and visible sensor images.
//!
//! Two unsynchronized cameras write one file per frame. Files are paired by the
//! capture time encoded in their names, the thermal grid is rendered to a
//! false-color image, and that image is warped onto the visible frame through a
//! homography estimated from ORB feature matches.
//!
//! ```rust,ignore
//! use thermalign::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load("run.yaml".as_ref())?;
//! let report = Pipeline::new(config).run()?;
//! println!("{}", report.summary);
//! ```

pub mod config;
pub mod math;
pub mod pipeline;
pub mod registration;
pub mod scene;
pub mod sensor;
pub mod temporal;
pub mod thermal;
pub mod timestamp;

pub use config::{ConfigError, PipelineConfig};
pub use pipeline::{
    PairError, PairReport, PairStatus, Pipeline, PipelineError, RunReport, RunSummary,
};
pub use registration::{
    align, AlignedImage, FailureReason, RegistrationConfig, RegistrationError,
    RegistrationResult, Registrator,
};
pub use scene::{SceneAssessment, SceneClass, SceneFilterConfig};
pub use sensor::{Modality, SensorFile};
pub use temporal::{find_nearest, CandidateIndex, FilePairing, PairingOutcome};
pub use thermal::{decode, read_grid, Colormap, GridError, ThermalGrid};
pub use timestamp::{CaptureTimestamp, TimestampFormat};
