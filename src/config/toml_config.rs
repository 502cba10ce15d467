use crate::domain::model::{ArtifactNaming, Identifier};
use crate::domain::ports::{ConfigProvider, StepCommand};
use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Identifier used when neither the command line nor the config file names one.
pub const DEFAULT_CPF: &str = "00640854737";

pub const GENERATOR_STEP: &str = "network generator";
pub const CONVERTER_STEP: &str = "format converter";

/// Pipeline configuration. Every section is optional; an empty file yields
/// the stock `python3 generate_network_cpf.py` / `convert_cpf_to_cosmograph.py`
/// pipeline writing into `output/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default = "default_generator")]
    pub generator: StepConfig,
    #[serde(default = "default_converter")]
    pub converter: StepConfig,
    #[serde(default)]
    pub artifacts: ArtifactNaming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cpf: String,
    /// Directory both collaborators run in; relative paths resolve against it.
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Per-step limit. Unset waits for as long as the collaborator takes.
    pub timeout_seconds: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cpf: DEFAULT_CPF.to_string(),
            working_dir: PathBuf::from("."),
            output_dir: PathBuf::from("output"),
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

fn default_generator() -> StepConfig {
    StepConfig {
        program: "python3".to_string(),
        args: vec!["generate_network_cpf.py".to_string()],
    }
}

fn default_converter() -> StepConfig {
    StepConfig {
        program: "python3".to_string(),
        args: vec!["convert_cpf_to_cosmograph.py".to_string()],
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            generator: default_generator(),
            converter: default_converter(),
            artifacts: ArtifactNaming::default(),
        }
    }
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PipelineError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PipelineError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PipelineError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// Points both steps at another interpreter, keeping their script arguments.
    pub fn set_interpreter(&mut self, program: &str) {
        self.generator.program = program.to_string();
        self.converter.program = program.to_string();
    }

    pub fn validate_config(&self) -> Result<()> {
        Identifier::new(self.pipeline.cpf.as_str())?;

        validate_path(
            "pipeline.working_dir",
            &self.pipeline.working_dir.to_string_lossy(),
        )?;
        validate_path(
            "pipeline.output_dir",
            &self.pipeline.output_dir.to_string_lossy(),
        )?;

        if let Some(timeout) = self.pipeline.timeout_seconds {
            validate_positive_number("pipeline.timeout_seconds", timeout, 1)?;
        }

        validate_non_empty_string("generator.program", &self.generator.program)?;
        validate_non_empty_string("converter.program", &self.converter.program)?;

        self.artifacts.validate()
    }
}

impl ConfigProvider for TomlConfig {
    fn identifier(&self) -> &str {
        &self.pipeline.cpf
    }

    fn working_dir(&self) -> &Path {
        &self.pipeline.working_dir
    }

    fn output_dir(&self) -> &Path {
        &self.pipeline.output_dir
    }

    fn timeout(&self) -> Option<Duration> {
        self.pipeline.timeout_seconds.map(Duration::from_secs)
    }

    fn artifact_naming(&self) -> &ArtifactNaming {
        &self.artifacts
    }

    fn generator(&self) -> StepCommand {
        StepCommand {
            name: GENERATOR_STEP.to_string(),
            program: self.generator.program.clone(),
            args: self.generator.args.clone(),
        }
    }

    fn converter(&self) -> StepCommand {
        StepCommand {
            name: CONVERTER_STEP.to_string(),
            program: self.converter.program.clone(),
            args: self.converter.args.clone(),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
