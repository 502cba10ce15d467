pub mod runner;
pub mod step;

pub use crate::domain::model::{ArtifactNaming, ArtifactSet, Identifier, RunReport, StepOutput};
pub use crate::domain::ports::{ConfigProvider, PipelineStep, StepCommand, Storage};
pub use crate::utils::error::Result;
