use crate::utils::error::{PipelineError, Result};
use crate::utils::validation::{validate_file_template, Validate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder replaced by the identifier in artifact file name templates.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Opaque taxpayer identifier threaded through both steps and the artifact names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        let reason = if value.trim().is_empty() {
            Some("Identifier cannot be empty")
        } else if value.contains(['/', '\\', '\0']) {
            Some("Identifier must not contain path separators or null bytes")
        } else if value == "." || value == ".." {
            Some("Identifier must not be a relative path component")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(PipelineError::InvalidConfigValueError {
                field: "cpf".to_string(),
                value,
                reason: reason.to_string(),
            }),
            None => Ok(Self(value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File name templates for the two artifacts. Each must contain `{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactNaming {
    pub csv: String,
    pub json: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self {
            csv: "network_{id}.csv".to_string(),
            json: "network_{id}_cosmograph.json".to_string(),
        }
    }
}

impl ArtifactNaming {
    pub fn resolve(&self, output_dir: &Path, id: &Identifier) -> ArtifactSet {
        ArtifactSet {
            csv: output_dir.join(self.csv.replace(ID_PLACEHOLDER, id.as_str())),
            json: output_dir.join(self.json.replace(ID_PLACEHOLDER, id.as_str())),
        }
    }
}

impl Validate for ArtifactNaming {
    fn validate(&self) -> Result<()> {
        validate_file_template("artifacts.csv", &self.csv, ID_PLACEHOLDER)?;
        validate_file_template("artifacts.json", &self.json, ID_PLACEHOLDER)?;
        Ok(())
    }
}

/// The two files a successful run is expected to leave behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    pub csv: PathBuf,
    pub json: PathBuf,
}

impl ArtifactSet {
    /// CSV first, then JSON.
    pub fn paths(&self) -> [&Path; 2] {
        [&self.csv, &self.json]
    }
}

/// What a collaborator left behind once it exited.
#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    /// `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl StepOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub name: String,
    pub command: String,
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub identifier: Identifier,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u128,
    pub steps: Vec<StepSummary>,
    pub artifacts: ArtifactSet,
}

/// What a run would do, without doing it.
#[derive(Debug, Clone, Serialize)]
pub struct RunPlan {
    pub identifier: Identifier,
    pub commands: Vec<String>,
    pub artifacts: ArtifactSet,
}
