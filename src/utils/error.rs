use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{step} exited with {}: {stderr}", describe_exit(.exit_code))]
    StepFailed {
        step: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Expected output files not found: {}", join_paths(.missing))]
    ArtifactsMissing { missing: Vec<PathBuf> },

    #[error("Failed to start {step} ({program} in {}): {source}", .working_dir.display())]
    SpawnFailed {
        step: String,
        program: String,
        working_dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} did not finish within {timeout:?}")]
    StepTimedOut { step: String, timeout: Duration },

    #[error("Run interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field} ({value:?}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Collaborator,
    Verification,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PipelineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::StepFailed { .. } | Self::SpawnFailed { .. } | Self::StepTimedOut { .. } => {
                ErrorCategory::Collaborator
            }
            Self::ArtifactsMissing { .. } => ErrorCategory::Verification,
            Self::ConfigValidationError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorCategory::Configuration
            }
            Self::Interrupted | Self::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Interrupted => ErrorSeverity::Medium,
            Self::StepTimedOut { .. } => ErrorSeverity::Medium,
            Self::StepFailed { .. } | Self::ArtifactsMissing { .. } => ErrorSeverity::High,
            Self::ConfigValidationError { .. } | Self::InvalidConfigValueError { .. } => {
                ErrorSeverity::High
            }
            Self::SpawnFailed { .. } | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// Process exit status for this failure. Every pipeline failure maps to 1;
    /// an interrupted run follows the shell convention for SIGINT.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => 130,
            _ => 1,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::StepFailed { step, .. } => {
                format!("Check the {step} output above and run it by hand to reproduce")
            }
            Self::ArtifactsMissing { .. } => {
                "Make sure the output directory and naming templates match what the collaborators write"
                    .to_string()
            }
            Self::SpawnFailed {
                program,
                working_dir,
                ..
            } => format!(
                "Make sure `{program}` is installed and on PATH and that the working directory {} exists",
                working_dir.display()
            ),
            Self::StepTimedOut { .. } => {
                "Raise timeout_seconds or remove it to wait indefinitely".to_string()
            }
            Self::Interrupted => "Re-run the pipeline when ready".to_string(),
            Self::ConfigValidationError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration file or command-line flags".to_string()
            }
            Self::IoError(_) => "Check file permissions and the working directory".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::StepFailed { step, stderr, .. } => {
                let stderr = stderr.trim();
                if stderr.is_empty() {
                    format!("Error running {step} (no error output captured)")
                } else {
                    format!("Error running {step}: {stderr}")
                }
            }
            Self::ArtifactsMissing { missing } => {
                let mut message = String::from("Error: Expected output files not found:");
                for path in missing {
                    message.push_str(&format!("\n   Missing: {}", path.display()));
                }
                message
            }
            other => other.to_string(),
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
