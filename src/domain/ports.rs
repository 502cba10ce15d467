use crate::domain::model::{ArtifactNaming, Identifier, StepOutput};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// One unit of pipeline work, normally an external collaborator program.
#[async_trait]
pub trait PipelineStep: Send + Sync {
    fn name(&self) -> &str;

    /// Human-readable command line, used for dry runs and reports.
    fn command_line(&self, id: &Identifier) -> String;

    /// Runs to completion. A non-zero exit is still `Ok`; only failures to
    /// start or finish the step are errors.
    async fn execute(&self, id: &Identifier) -> Result<StepOutput>;
}

pub trait Storage: Send + Sync {
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// A single collaborator invocation: `<program> <args...> <identifier>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCommand {
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
}

pub trait ConfigProvider: Send + Sync {
    fn identifier(&self) -> &str;
    fn working_dir(&self) -> &Path;
    fn output_dir(&self) -> &Path;
    fn timeout(&self) -> Option<Duration>;
    fn artifact_naming(&self) -> &ArtifactNaming;
    fn generator(&self) -> StepCommand;
    fn converter(&self) -> StepCommand;
}
