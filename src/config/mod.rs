pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use crate::utils::validation::Validate;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "network-regen")]
#[command(about = "Generate a CPF network CSV, convert it for Cosmograph and verify both files")]
pub struct CliConfig {
    /// Taxpayer identifier passed to both collaborators [default: 00640854737]
    #[arg(long)]
    pub cpf: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory the artifacts are expected in
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Directory the collaborators run in
    #[arg(long)]
    pub working_dir: Option<String>,

    /// Interpreter used to launch both collaborator scripts
    #[arg(long)]
    pub python: Option<String>,

    /// Per-step timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[arg(long, help = "Log process resource usage after each step")]
    pub monitor: bool,

    /// Show the commands and expected files without running anything
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, help = "Print the run report as JSON on success")]
    pub json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the config file (or defaults), applies command-line overrides
    /// and validates the result.
    pub fn resolve(&self) -> Result<TomlConfig> {
        let mut config = match &self.config {
            Some(path) => TomlConfig::from_file(path)?,
            None => TomlConfig::default(),
        };

        if let Some(cpf) = &self.cpf {
            config.pipeline.cpf = cpf.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.pipeline.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = &self.working_dir {
            config.pipeline.working_dir = PathBuf::from(dir);
        }
        if let Some(python) = &self.python {
            config.set_interpreter(python);
        }
        if let Some(timeout) = self.timeout {
            config.pipeline.timeout_seconds = Some(timeout);
        }

        config.validate()?;
        Ok(config)
    }
}
