use std::time::Duration;
#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::Instant;
#[cfg(feature = "cli")]
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// How often a running collaborator is sampled.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Default)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_bytes: u64,
    pub elapsed_time: Duration,
}

/// Samples collaborator processes by PID while they run and keeps the
/// peak resident memory seen over the whole pipeline.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    start_time: Instant,
    peak_memory: Mutex<u64>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        Self {
            system: Mutex::new(System::new()),
            start_time: Instant::now(),
            peak_memory: Mutex::new(0),
            enabled,
        }
    }

    /// Refreshes one process. `None` when disabled or the process is gone.
    pub fn sample(&self, pid: u32) -> Option<SystemStats> {
        if !self.enabled {
            return None;
        }
        let pid = Pid::from_u32(pid);

        let mut system = self.system.lock().ok()?;
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::everything(),
        );
        let process = system.process(pid)?;

        let stats = SystemStats {
            cpu_usage: process.cpu_usage(),
            memory_bytes: process.memory(),
            elapsed_time: self.start_time.elapsed(),
        };

        let mut peak = self.peak_memory.lock().ok()?;
        *peak = (*peak).max(stats.memory_bytes);

        Some(stats)
    }

    pub fn peak_memory_bytes(&self) -> u64 {
        self.peak_memory.lock().map(|p| *p).unwrap_or(0)
    }

    pub fn log_step_stats(&self, step: &str, peak: &SystemStats) {
        if !self.enabled {
            return;
        }
        tracing::info!(
            "📊 {} - CPU: {:.1}%, Peak memory: {:.1}MB, Time: {:?}",
            step,
            peak.cpu_usage,
            to_mb(peak.memory_bytes),
            peak.elapsed_time
        );
    }

    pub fn log_final_stats(&self) {
        if !self.enabled {
            return;
        }
        tracing::info!(
            "📊 Final Stats - Total Time: {:?}, Peak collaborator memory: {:.1}MB",
            self.start_time.elapsed(),
            to_mb(self.peak_memory_bytes())
        );
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(feature = "cli")]
fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0 / 1024.0
}

// no-op when built without the cli feature
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn sample(&self, _pid: u32) -> Option<SystemStats> {
        None
    }

    pub fn peak_memory_bytes(&self) -> u64 {
        0
    }

    pub fn log_step_stats(&self, _step: &str, _peak: &SystemStats) {}

    pub fn log_final_stats(&self) {}

    pub fn is_enabled(&self) -> bool {
        false
    }
}
