pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::toml_config::TomlConfig;

pub use core::{
    runner::{PipelineRunner, Progress},
    step::ProcessStep,
};
pub use domain::model::{ArtifactNaming, ArtifactSet, Identifier, RunPlan, RunReport};
pub use domain::ports::{ConfigProvider, PipelineStep, StepCommand, Storage};
pub use utils::error::{PipelineError, Result};
