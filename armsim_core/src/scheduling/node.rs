//! Periodic task abstraction and per-task bookkeeping

use crate::error::ArmResult;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lifecycle of a periodic task
#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    Uninitialized,
    Running,
    Stopping,
    Stopped,
    Error(String),
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::Uninitialized => write!(f, "Uninitialized"),
            TaskState::Running => write!(f, "Running"),
            TaskState::Stopping => write!(f, "Stopping"),
            TaskState::Stopped => write!(f, "Stopped"),
            TaskState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Execution metrics for one task
#[derive(Debug, Clone, Default)]
pub struct TaskMetrics {
    pub total_ticks: u64,
    pub successful_ticks: u64,
    pub failed_ticks: u64,
    pub panics: u64,
    pub avg_tick_duration_us: f64,
    pub max_tick_duration_us: f64,
    pub last_tick_duration_us: f64,
    pub last_error: Option<String>,
}

/// Externally visible state of one task
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub name: &'static str,
    pub interval: Duration,
    pub state: TaskState,
    pub metrics: TaskMetrics,
}

impl TaskReport {
    pub fn new(name: &'static str, interval: Duration) -> Self {
        Self {
            name,
            interval,
            state: TaskState::Uninitialized,
            metrics: TaskMetrics::default(),
        }
    }
}

/// Context handed to a task on every call.
///
/// Owned by the task's thread; every update is mirrored into a shared
/// [`TaskReport`] so the engine can read metrics without stopping the task.
pub struct TaskInfo {
    name: &'static str,
    report: Arc<Mutex<TaskReport>>,
    tick_start_time: Option<Instant>,
}

impl TaskInfo {
    pub fn new(name: &'static str, report: Arc<Mutex<TaskReport>>) -> Self {
        Self {
            name,
            report,
            tick_start_time: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> TaskState {
        self.report.lock().state.clone()
    }

    pub fn set_state(&mut self, state: TaskState) {
        self.report.lock().state = state;
    }

    pub fn transition_to_error(&mut self, error_msg: String) {
        let mut report = self.report.lock();
        report.metrics.last_error = Some(error_msg.clone());
        report.state = TaskState::Error(error_msg);
    }

    pub fn metrics(&self) -> TaskMetrics {
        self.report.lock().metrics.clone()
    }

    pub fn start_tick(&mut self) {
        self.tick_start_time = Some(Instant::now());
    }

    fn take_duration_us(&mut self) -> f64 {
        self.tick_start_time
            .take()
            .map(|start| start.elapsed().as_secs_f64() * 1e6)
            .unwrap_or(0.0)
    }

    pub fn record_tick(&mut self) {
        let duration_us = self.take_duration_us();
        let mut report = self.report.lock();
        let metrics = &mut report.metrics;

        metrics.total_ticks += 1;
        metrics.successful_ticks += 1;
        metrics.last_tick_duration_us = duration_us;
        if duration_us > metrics.max_tick_duration_us {
            metrics.max_tick_duration_us = duration_us;
        }

        let total = metrics.avg_tick_duration_us * (metrics.successful_ticks - 1) as f64;
        metrics.avg_tick_duration_us = (total + duration_us) / metrics.successful_ticks as f64;
    }

    pub fn record_tick_failure(&mut self, error_msg: String) {
        let duration_us = self.take_duration_us();
        let mut report = self.report.lock();
        report.metrics.total_ticks += 1;
        report.metrics.failed_ticks += 1;
        report.metrics.last_tick_duration_us = duration_us;
        report.metrics.last_error = Some(error_msg);
    }

    pub fn record_panic(&mut self, panic_msg: String) {
        self.record_tick_failure(panic_msg);
        self.report.lock().metrics.panics += 1;
    }
}

/// One periodic stage of the simulation.
///
/// `tick` runs once per interval on the task's own thread. Errors are
/// recorded and the task keeps running.
pub trait SimNode: Send {
    fn name(&self) -> &'static str;

    fn init(&mut self, _info: &mut TaskInfo) -> ArmResult<()> {
        Ok(())
    }

    fn tick(&mut self, info: &mut TaskInfo) -> ArmResult<()>;

    fn shutdown(&mut self, _info: &mut TaskInfo) -> ArmResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_track_success_and_failure() {
        let report = Arc::new(Mutex::new(TaskReport::new("probe", Duration::from_millis(1))));
        let mut info = TaskInfo::new("probe", Arc::clone(&report));

        info.start_tick();
        info.record_tick();
        info.start_tick();
        info.record_tick_failure("boom".to_string());
        info.start_tick();
        info.record_panic("panicked".to_string());

        let metrics = report.lock().metrics.clone();
        assert_eq!(metrics.total_ticks, 3);
        assert_eq!(metrics.successful_ticks, 1);
        assert_eq!(metrics.failed_ticks, 2);
        assert_eq!(metrics.panics, 1);
        assert_eq!(metrics.last_error.as_deref(), Some("panicked"));
        assert!(metrics.avg_tick_duration_us >= 0.0);
    }

    #[test]
    fn test_state_transitions() {
        let report = Arc::new(Mutex::new(TaskReport::new("probe", Duration::from_millis(1))));
        let mut info = TaskInfo::new("probe", report);
        assert_eq!(info.state(), TaskState::Uninitialized);

        info.set_state(TaskState::Running);
        assert_eq!(info.state().to_string(), "Running");

        info.transition_to_error("bad init".to_string());
        assert_eq!(info.state(), TaskState::Error("bad init".to_string()));
        assert_eq!(info.metrics().last_error.as_deref(), Some("bad init"));
    }
}
