use crate::domain::model::{Identifier, StepOutput};
use crate::domain::ports::{PipelineStep, StepCommand};
use crate::utils::error::{PipelineError, Result};
use crate::utils::monitor::{SystemMonitor, SystemStats, SAMPLE_INTERVAL};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

/// Runs an external program with the identifier appended as the last argument
/// and captures both output streams.
#[derive(Clone)]
pub struct ProcessStep {
    command: StepCommand,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
    monitor: Arc<SystemMonitor>,
}

impl ProcessStep {
    pub fn new(command: StepCommand) -> Self {
        Self {
            command,
            working_dir: None,
            timeout: None,
            monitor: Arc::new(SystemMonitor::default()),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_monitor(mut self, monitor: Arc<SystemMonitor>) -> Self {
        self.monitor = monitor;
        self
    }

    fn build_command(&self, id: &Identifier) -> Command {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg(id.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the future (timeout, Ctrl-C) must not leave the child running
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Waits for the child, sampling its PID on every tick when monitoring is on.
    async fn wait_sampled(&self, child: Child) -> std::io::Result<Output> {
        let pid = child.id();
        let wait = child.wait_with_output();
        tokio::pin!(wait);

        if !self.monitor.is_enabled() {
            return wait.await;
        }
        let Some(pid) = pid else {
            return wait.await;
        };

        let started = Instant::now();
        let mut peak = SystemStats::default();
        let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
        loop {
            tokio::select! {
                output = &mut wait => {
                    peak.elapsed_time = started.elapsed();
                    self.monitor.log_step_stats(self.name(), &peak);
                    return output;
                }
                _ = ticker.tick() => {
                    if let Some(stats) = self.monitor.sample(pid) {
                        peak.cpu_usage = peak.cpu_usage.max(stats.cpu_usage);
                        peak.memory_bytes = peak.memory_bytes.max(stats.memory_bytes);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl PipelineStep for ProcessStep {
    fn name(&self) -> &str {
        &self.command.name
    }

    fn command_line(&self, id: &Identifier) -> String {
        let mut parts = Vec::with_capacity(self.command.args.len() + 2);
        parts.push(self.command.program.as_str());
        parts.extend(self.command.args.iter().map(String::as_str));
        parts.push(id.as_str());
        parts.join(" ")
    }

    async fn execute(&self, id: &Identifier) -> Result<StepOutput> {
        tracing::debug!("Running {}: {}", self.name(), self.command_line(id));

        let start = Instant::now();
        let child = self
            .build_command(id)
            .spawn()
            .map_err(|source| PipelineError::SpawnFailed {
                step: self.name().to_string(),
                program: self.command.program.clone(),
                working_dir: self.working_dir.clone().unwrap_or_else(|| PathBuf::from(".")),
                source,
            })?;

        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.wait_sampled(child)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("{} exceeded {:?}, killing it", self.name(), limit);
                    return Err(PipelineError::StepTimedOut {
                        step: self.name().to_string(),
                        timeout: limit,
                    });
                }
            },
            None => self.wait_sampled(child).await,
        };
        let output = waited?;

        let result = StepOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        };

        tracing::debug!(
            "{} finished with {:?} in {:?}",
            self.name(),
            result.exit_code,
            result.duration
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id() -> Identifier {
        Identifier::new("00640854737").unwrap()
    }

    fn sh(name: &str, script: &str) -> ProcessStep {
        // `sh -c script id` binds the identifier to $0
        ProcessStep::new(StepCommand {
            name: name.to_string(),
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
        })
    }

    #[test]
    fn test_command_line_appends_identifier() {
        let step = ProcessStep::new(StepCommand {
            name: "generator".to_string(),
            program: "python3".to_string(),
            args: vec!["generate_network_cpf.py".to_string()],
        });
        assert_eq!(
            step.command_line(&id()),
            "python3 generate_network_cpf.py 00640854737"
        );
        assert_eq!(step.name(), "generator");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_captures_streams_and_exit_code() {
        let step = sh("generator", "echo \"out $0\"; echo \"err $0\" >&2; exit 3");
        let output = step.execute(&id()).await.unwrap();

        assert_eq!(output.exit_code, Some(3));
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out 00640854737");
        assert_eq!(output.stderr.trim(), "err 00640854737");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_success() {
        let output = sh("converter", "echo done").execute(&id()).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "done\n");
        assert!(output.stderr.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_execute_runs_in_working_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let step = sh("generator", "touch \"marker_$0\"").with_working_dir(dir.path());
        let output = step.execute(&id()).await.unwrap();

        assert!(output.success());
        assert!(dir.path().join("marker_00640854737").exists());
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_failure() {
        let step = ProcessStep::new(StepCommand {
            name: "generator".to_string(),
            program: "definitely-not-a-real-program-xyz".to_string(),
            args: vec![],
        });
        let err = step.execute(&id()).await.unwrap_err();
        assert!(matches!(err, PipelineError::SpawnFailed { ref step, .. } if step == "generator"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_slow_step() {
        let step = sh("generator", "sleep 5").with_timeout(Some(Duration::from_millis(200)));
        let started = Instant::now();
        let err = step.execute(&id()).await.unwrap_err();

        assert!(matches!(err, PipelineError::StepTimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_working_dir_is_spawn_failure() {
        let step = sh("generator", "true").with_working_dir("/nonexistent/network-regen");
        let err = step.execute(&id()).await.unwrap_err();

        assert!(matches!(err, PipelineError::SpawnFailed { .. }));
        assert!(err.recovery_suggestion().contains("/nonexistent/network-regen"));
    }

    #[cfg(all(unix, feature = "cli"))]
    #[tokio::test]
    async fn test_monitor_samples_the_child() {
        let monitor = Arc::new(SystemMonitor::new(true));
        let step = sh("generator", "sleep 0.6").with_monitor(monitor.clone());

        let output = step.execute(&id()).await.unwrap();

        assert!(output.success());
        assert!(monitor.peak_memory_bytes() > 0);
    }
}
