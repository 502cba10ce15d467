use crate::core::step::ProcessStep;
use crate::domain::model::{
    ArtifactNaming, ArtifactSet, Identifier, RunPlan, RunReport, StepSummary,
};
use crate::domain::ports::{ConfigProvider, PipelineStep, Storage};
use crate::utils::error::{PipelineError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Where operator progress text goes. `Stderr` keeps stdout free for a
/// machine-readable report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Progress {
    #[default]
    Stdout,
    Stderr,
    Silent,
}

impl Progress {
    fn emit(self, text: &str) {
        match self {
            Self::Stdout => println!("{}", text),
            Self::Stderr => eprintln!("{}", text),
            Self::Silent => {}
        }
    }
}

/// Runs the generator, then the converter, then checks that both artifacts
/// exist. Stops at the first failure.
pub struct PipelineRunner<S: Storage> {
    generator: Box<dyn PipelineStep>,
    converter: Box<dyn PipelineStep>,
    storage: S,
    naming: ArtifactNaming,
    output_dir: PathBuf,
    monitor: Arc<SystemMonitor>,
    progress: Progress,
}

impl<S: Storage> PipelineRunner<S> {
    pub fn new(
        generator: Box<dyn PipelineStep>,
        converter: Box<dyn PipelineStep>,
        storage: S,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            generator,
            converter,
            storage,
            naming: ArtifactNaming::default(),
            output_dir: output_dir.into(),
            monitor: Arc::new(SystemMonitor::default()),
            progress: Progress::default(),
        }
    }

    /// Wires two [`ProcessStep`]s from the configured commands. Both steps
    /// report their child processes to `monitor`.
    pub fn from_config<C: ConfigProvider>(
        config: &C,
        storage: S,
        monitor: Arc<SystemMonitor>,
    ) -> Self {
        let process_step = |command| {
            ProcessStep::new(command)
                .with_working_dir(config.working_dir())
                .with_timeout(config.timeout())
                .with_monitor(monitor.clone())
        };

        Self::new(
            Box::new(process_step(config.generator())),
            Box::new(process_step(config.converter())),
            storage,
            config.output_dir(),
        )
        .with_naming(config.artifact_naming().clone())
        .with_monitor(monitor)
    }

    pub fn with_naming(mut self, naming: ArtifactNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<SystemMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    pub fn artifacts(&self, id: &Identifier) -> ArtifactSet {
        self.naming.resolve(&self.output_dir, id)
    }

    pub fn plan(&self, id: &Identifier) -> RunPlan {
        RunPlan {
            identifier: id.clone(),
            commands: vec![
                self.generator.command_line(id),
                self.converter.command_line(id),
            ],
            artifacts: self.artifacts(id),
        }
    }

    pub async fn run(&self, id: &Identifier) -> Result<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.progress
            .emit(&format!("Regenerating network for identifier {}...", id));
        tracing::info!("🚀 Starting pipeline for {}", id);

        let mut steps = Vec::with_capacity(2);
        for (index, step) in [&self.generator, &self.converter].into_iter().enumerate() {
            self.progress
                .emit(&format!("\nStep {}: running {}...", index + 1, step.name()));
            steps.push(self.run_step(step.as_ref(), id).await?);
        }

        let artifacts = self.artifacts(id);
        let missing = self.missing_artifacts(&artifacts).await?;
        // the caller reports the missing paths from the error
        if !missing.is_empty() {
            tracing::error!("{} expected artifact(s) missing", missing.len());
            return Err(PipelineError::ArtifactsMissing { missing });
        }

        self.progress.emit(&format!(
            "\n✅ Successfully generated network files:\n   CSV: {}\n   JSON: {}",
            artifacts.csv.display(),
            artifacts.json.display()
        ));

        self.monitor.log_final_stats();
        tracing::info!("✅ Pipeline finished in {:?}", start.elapsed());

        Ok(RunReport {
            identifier: id.clone(),
            started_at,
            duration_ms: start.elapsed().as_millis(),
            steps,
            artifacts,
        })
    }

    async fn run_step(&self, step: &dyn PipelineStep, id: &Identifier) -> Result<StepSummary> {
        let output = step.execute(id).await?;

        if !output.success() {
            tracing::error!("{} failed with exit code {:?}", step.name(), output.exit_code);
            return Err(PipelineError::StepFailed {
                step: step.name().to_string(),
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        self.progress.emit(output.stdout.trim_end());
        tracing::info!("{} completed in {:?}", step.name(), output.duration);

        Ok(StepSummary {
            name: step.name().to_string(),
            command: step.command_line(id),
            exit_code: output.exit_code,
            duration_ms: output.duration.as_millis(),
        })
    }

    async fn missing_artifacts(&self, artifacts: &ArtifactSet) -> Result<Vec<PathBuf>> {
        let mut missing = Vec::new();
        for path in artifacts.paths() {
            if !self.storage.exists(path).await? {
                missing.push(path.to_path_buf());
            }
        }
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::StepOutput;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeStep {
        name: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl FakeStep {
        fn ok(name: &str) -> Self {
            Self {
                name: name.to_string(),
                exit_code: Some(0),
                stdout: format!("{name} done"),
                stderr: String::new(),
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(name: &str, stderr: &str) -> Self {
            Self {
                exit_code: Some(1),
                stderr: stderr.to_string(),
                ..Self::ok(name)
            }
        }
    }

    #[async_trait]
    impl PipelineStep for FakeStep {
        fn name(&self) -> &str {
            &self.name
        }

        fn command_line(&self, id: &Identifier) -> String {
            format!("fake-{} {}", self.name, id)
        }

        async fn execute(&self, id: &Identifier) -> Result<StepOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(id.to_string());
            Ok(StepOutput {
                exit_code: self.exit_code,
                stdout: self.stdout.clone(),
                stderr: self.stderr.clone(),
                ..StepOutput::default()
            })
        }
    }

    #[derive(Default)]
    struct FakeStorage {
        present: HashSet<PathBuf>,
    }

    impl FakeStorage {
        fn with(paths: &[&str]) -> Self {
            Self {
                present: paths.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl Storage for FakeStorage {
        async fn exists(&self, path: &Path) -> Result<bool> {
            Ok(self.present.contains(path))
        }
    }

    const CSV: &str = "output/network_00640854737.csv";
    const JSON: &str = "output/network_00640854737_cosmograph.json";

    fn id() -> Identifier {
        Identifier::new("00640854737").unwrap()
    }

    fn runner(generator: FakeStep, converter: FakeStep, storage: FakeStorage) -> PipelineRunner<FakeStorage> {
        PipelineRunner::new(Box::new(generator), Box::new(converter), storage, "output")
            .with_progress(Progress::Silent)
    }

    #[tokio::test]
    async fn test_success_when_both_steps_pass_and_artifacts_exist() {
        let generator = FakeStep::ok("generator");
        let converter = FakeStep::ok("converter");
        let gen_seen = generator.seen.clone();
        let conv_seen = converter.seen.clone();

        let report = runner(generator, converter, FakeStorage::with(&[CSV, JSON]))
            .run(&id())
            .await
            .unwrap();

        assert_eq!(report.identifier, id());
        assert_eq!(report.artifacts.csv, PathBuf::from(CSV));
        assert_eq!(report.artifacts.json, PathBuf::from(JSON));
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.steps[0].name, "generator");
        assert_eq!(report.steps[1].command, "fake-converter 00640854737");
        assert_eq!(*gen_seen.lock().unwrap(), vec!["00640854737".to_string()]);
        assert_eq!(*conv_seen.lock().unwrap(), vec!["00640854737".to_string()]);
    }

    #[tokio::test]
    async fn test_generator_failure_skips_converter() {
        let converter = FakeStep::ok("converter");
        let converter_calls = converter.calls.clone();

        let err = runner(
            FakeStep::failing("generator", "generator exploded"),
            converter,
            FakeStorage::with(&[CSV, JSON]),
        )
        .run(&id())
        .await
        .unwrap_err();

        assert_eq!(converter_calls.load(Ordering::SeqCst), 0);
        match err {
            PipelineError::StepFailed { step, stderr, exit_code } => {
                assert_eq!(step, "generator");
                assert_eq!(stderr, "generator exploded");
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_converter_failure_reports_converter_stderr() {
        let generator = FakeStep {
            stderr: "generator warning".to_string(),
            ..FakeStep::ok("generator")
        };

        let err = runner(
            generator,
            FakeStep::failing("converter", "converter exploded"),
            FakeStorage::with(&[CSV, JSON]),
        )
        .run(&id())
        .await
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("converter exploded"));
        assert!(!message.contains("generator warning"));
        assert!(err.user_friendly_message().contains("converter exploded"));
    }

    #[tokio::test]
    async fn test_missing_csv_is_named_alone() {
        let err = runner(
            FakeStep::ok("generator"),
            FakeStep::ok("converter"),
            FakeStorage::with(&[JSON]),
        )
        .run(&id())
        .await
        .unwrap_err();

        match err {
            PipelineError::ArtifactsMissing { missing } => {
                assert_eq!(missing, vec![PathBuf::from(CSV)]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_both_missing_are_named() {
        let err = runner(
            FakeStep::ok("generator"),
            FakeStep::ok("converter"),
            FakeStorage::default(),
        )
        .run(&id())
        .await
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains(CSV));
        assert!(message.contains(JSON));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_plan_does_not_execute() {
        let generator = FakeStep::ok("generator");
        let calls = generator.calls.clone();
        let runner = runner(generator, FakeStep::ok("converter"), FakeStorage::default());

        let plan = runner.plan(&id());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            plan.commands,
            vec![
                "fake-generator 00640854737".to_string(),
                "fake-converter 00640854737".to_string()
            ]
        );
        assert_eq!(plan.artifacts.csv, PathBuf::from(CSV));
    }

    #[tokio::test]
    async fn test_custom_naming_is_used_for_verification() {
        let naming = ArtifactNaming {
            csv: "{id}.csv".to_string(),
            json: "{id}.json".to_string(),
        };
        let report = runner(
            FakeStep::ok("generator"),
            FakeStep::ok("converter"),
            FakeStorage::with(&["output/00640854737.csv", "output/00640854737.json"]),
        )
        .with_naming(naming)
        .run(&id())
        .await
        .unwrap();

        assert_eq!(report.artifacts.json, PathBuf::from("output/00640854737.json"));
    }
}
