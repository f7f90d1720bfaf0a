//! Thread runner for periodic tasks

use super::node::{SimNode, TaskInfo, TaskReport, TaskState};
use crate::error::{ArmError, ArmResult};
use crossbeam::channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Spawn `node` on its own thread, ticking every `interval` until
/// `shutdown` is disconnected or receives a message.
pub(crate) fn spawn_periodic(
    node: Box<dyn SimNode>,
    interval: Duration,
    shutdown: Receiver<()>,
    report: Arc<Mutex<TaskReport>>,
) -> ArmResult<JoinHandle<()>> {
    let name = node.name();
    thread::Builder::new()
        .name(format!("armsim-{}", name))
        .spawn(move || run_periodic(node, interval, shutdown, report))
        .map_err(|source| ArmError::Spawn { name, source })
}

fn run_periodic(
    mut node: Box<dyn SimNode>,
    interval: Duration,
    shutdown: Receiver<()>,
    report: Arc<Mutex<TaskReport>>,
) {
    let name = node.name();
    let mut info = TaskInfo::new(name, report);

    if let Err(e) = node.init(&mut info) {
        error!(task = name, "init failed: {}", e);
        info.transition_to_error(e.to_string());
        return;
    }
    info.set_state(TaskState::Running);
    debug!(task = name, ?interval, "task started");

    loop {
        info.start_tick();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| node.tick(&mut info)));
        match outcome {
            Ok(Ok(())) => info.record_tick(),
            Ok(Err(e)) => {
                warn!(task = name, "tick failed: {}", e);
                info.record_tick_failure(e.to_string());
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(task = name, "tick panicked: {}", msg);
                info.record_panic(msg);
            }
        }

        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info.set_state(TaskState::Stopping);
    if let Err(e) = node.shutdown(&mut info) {
        warn!(task = name, "shutdown failed: {}", e);
    }
    info.set_state(TaskState::Stopped);
    debug!(task = name, "task stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::bounded;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Flaky {
        calls: Arc<AtomicU64>,
    }

    impl SimNode for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn tick(&mut self, _info: &mut TaskInfo) -> ArmResult<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match n % 3 {
                0 => Ok(()),
                1 => Err(ArmError::InvalidMotion("scripted failure".into())),
                _ => panic!("scripted panic"),
            }
        }
    }

    #[test]
    fn test_task_survives_errors_and_panics() {
        let calls = Arc::new(AtomicU64::new(0));
        let report = Arc::new(Mutex::new(TaskReport::new("flaky", Duration::from_millis(1))));
        let (tx, rx) = bounded::<()>(1);

        let handle = spawn_periodic(
            Box::new(Flaky {
                calls: Arc::clone(&calls),
            }),
            Duration::from_millis(1),
            rx,
            Arc::clone(&report),
        )
        .unwrap();

        while calls.load(Ordering::SeqCst) < 9 {
            thread::sleep(Duration::from_millis(1));
        }
        drop(tx);
        handle.join().unwrap();

        let report = report.lock();
        assert_eq!(report.state, TaskState::Stopped);
        assert!(report.metrics.successful_ticks >= 3);
        assert!(report.metrics.failed_ticks >= 6);
        assert!(report.metrics.panics >= 3);
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
