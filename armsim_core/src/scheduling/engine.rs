//! Threaded simulation engine
//!
//! Four periodic tasks share one [`SnapshotCell`]. Each task is the only
//! writer of its slice of the snapshot:
//!
//! | task       | writes                               | default interval |
//! |------------|--------------------------------------|------------------|
//! | motion     | joint angles, motion state           | 100 ms           |
//! | refresh    | tick, joint positions, trajectory    | 100 ms           |
//! | objectives | objective set, ready flag            | 10 ms            |
//! | distance   | distance report                      | 100 ms           |

use super::node::{SimNode, TaskInfo, TaskReport};
use super::runner::spawn_periodic;
use super::simulation::seeded_rng;
use super::snapshot::{SimSnapshot, SnapshotCell};
use crate::config::SimConfig;
use crate::error::{ArmError, ArmResult};
use crate::kinematics::{ChainMode, JointAngles, KinematicsModel};
use crate::motion::{GoalInterpolator, MotionState};
use crate::objectives::ObjectiveGenerator;
use crossbeam::channel::{bounded, Sender};
use parking_lot::Mutex;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

struct MotionNode {
    interpolator: Arc<Mutex<GoalInterpolator>>,
    cell: Arc<SnapshotCell>,
}

impl SimNode for MotionNode {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn tick(&mut self, _info: &mut TaskInfo) -> ArmResult<()> {
        let (angles, state) = {
            let mut interpolator = self.interpolator.lock();
            interpolator.advance();
            (interpolator.current(), interpolator.state())
        };
        self.cell.publish_with(|s| {
            if s.joint_angles == angles && s.motion == state {
                None
            } else {
                Some(s.with_motion(angles, state))
            }
        });
        Ok(())
    }
}

struct RefreshNode {
    cell: Arc<SnapshotCell>,
    model: KinematicsModel,
    mode: ChainMode,
}

impl SimNode for RefreshNode {
    fn name(&self) -> &'static str {
        "refresh"
    }

    fn tick(&mut self, _info: &mut TaskInfo) -> ArmResult<()> {
        self.cell
            .publish_with(|s| Some(s.refreshed(&self.model, self.mode)));
        Ok(())
    }
}

struct ObjectiveNode {
    cell: Arc<SnapshotCell>,
    generator: ObjectiveGenerator,
    rng: ChaCha8Rng,
    tolerance: f64,
}

impl SimNode for ObjectiveNode {
    fn name(&self) -> &'static str {
        "objectives"
    }

    fn tick(&mut self, _info: &mut TaskInfo) -> ArmResult<()> {
        // This task is the only writer of the objective set, so the emptiness
        // check cannot go stale before the new batch is installed.
        if self.cell.load().objectives.is_empty() {
            let set = self.generator.regenerate(&mut self.rng).map_err(|e| {
                error!("objective regeneration failed: {}", e);
                e
            })?;
            info!(
                generation = set.generation(),
                count = set.len(),
                "objectives regenerated"
            );
            self.cell.publish_with(|s| Some(s.with_objectives(set)));
        }

        let tolerance = self.tolerance;
        let mut removed = 0;
        let published = self.cell.publish_with(|s| {
            let (next, n) = s.pruned(tolerance)?;
            removed = n;
            Some(next)
        });
        if let Some(snapshot) = published {
            debug!(
                removed,
                remaining = snapshot.objectives.len(),
                tick = snapshot.tick,
                "objectives reached"
            );
        }
        Ok(())
    }
}

struct DistanceNode {
    cell: Arc<SnapshotCell>,
}

impl SimNode for DistanceNode {
    fn name(&self) -> &'static str {
        "distance"
    }

    fn tick(&mut self, _info: &mut TaskInfo) -> ArmResult<()> {
        let published = self.cell.publish_with(|s| {
            if s.distances_current() {
                None
            } else {
                Some(s.with_distances())
            }
        });
        if let Some(snapshot) = published {
            if let Some((index, distance)) = snapshot.distances.nearest() {
                debug!(
                    tick = snapshot.tick,
                    objectives = snapshot.distances.len(),
                    nearest = index,
                    distance,
                    "distance report"
                );
            }
        }
        Ok(())
    }
}

/// Concurrent simulation with an explicit start/stop lifecycle.
///
/// Dropping the engine stops it.
///
/// ```no_run
/// use armsim_core::{JointAngles, SimConfig, SimulationEngine};
/// use std::time::Duration;
///
/// let mut engine = SimulationEngine::new(SimConfig::default())?;
/// engine.start()?;
/// engine.move_to(JointAngles::new([0.0, 90.0, 0.0, 0.0]), 50)?;
/// engine.wait_for_motion(Duration::from_secs(10));
/// println!("end effector at {}", engine.snapshot().end_effector());
/// engine.stop();
/// # Ok::<(), armsim_core::ArmError>(())
/// ```
pub struct SimulationEngine {
    config: SimConfig,
    model: KinematicsModel,
    mode: ChainMode,
    cell: Arc<SnapshotCell>,
    interpolator: Arc<Mutex<GoalInterpolator>>,
    shutdown_tx: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
    reports: Vec<Arc<Mutex<TaskReport>>>,
}

impl SimulationEngine {
    /// Validate `config` and publish the tick-0 snapshot. No task runs until
    /// [`start`](Self::start).
    pub fn new(config: SimConfig) -> ArmResult<Self> {
        config.validate()?;
        let mode = ChainMode::new(config.kinematics.chain_mode)?;
        let model = KinematicsModel::new(config.kinematics.links);
        let interpolator = GoalInterpolator::new(
            JointAngles::new(config.motion.initial_angles),
            config.motion.policy,
        );
        let cell = SnapshotCell::new(SimSnapshot::initial(&config, &model, mode));

        Ok(Self {
            config,
            model,
            mode,
            cell: Arc::new(cell),
            interpolator: Arc::new(Mutex::new(interpolator)),
            shutdown_tx: None,
            handles: Vec::new(),
            reports: Vec::new(),
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Spawn the four periodic tasks
    pub fn start(&mut self) -> ArmResult<()> {
        if self.is_running() {
            return Err(ArmError::AlreadyRunning);
        }

        let mut generator = ObjectiveGenerator::from_config(&self.config);
        generator.resume_after(self.cell.load().objectives.generation());

        let timing = &self.config.timing;
        let nodes: Vec<(Box<dyn SimNode>, Duration)> = vec![
            (
                Box::new(MotionNode {
                    interpolator: Arc::clone(&self.interpolator),
                    cell: Arc::clone(&self.cell),
                }),
                timing.motion_interval(),
            ),
            (
                Box::new(RefreshNode {
                    cell: Arc::clone(&self.cell),
                    model: self.model.clone(),
                    mode: self.mode,
                }),
                timing.refresh_interval(),
            ),
            (
                Box::new(ObjectiveNode {
                    cell: Arc::clone(&self.cell),
                    generator,
                    rng: seeded_rng(self.config.seed),
                    tolerance: self.config.objectives.prune_tolerance,
                }),
                timing.objective_interval(),
            ),
            (
                Box::new(DistanceNode {
                    cell: Arc::clone(&self.cell),
                }),
                timing.distance_interval(),
            ),
        ];

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);
        self.reports.clear();

        for (node, interval) in nodes {
            let report = Arc::new(Mutex::new(TaskReport::new(node.name(), interval)));
            match spawn_periodic(node, interval, shutdown_rx.clone(), Arc::clone(&report)) {
                Ok(handle) => {
                    self.handles.push(handle);
                    self.reports.push(report);
                }
                Err(e) => {
                    error!("engine start aborted: {}", e);
                    self.stop();
                    return Err(e);
                }
            }
        }

        info!(
            chain_mode = self.mode.get(),
            radius = self.config.workspace.radius,
            "simulation engine started"
        );
        Ok(())
    }

    /// Signal every task and wait for them to exit. No-op when stopped.
    pub fn stop(&mut self) {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return;
        };
        drop(shutdown_tx);

        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("simulation task terminated abnormally");
            }
        }
        info!(version = self.cell.version(), "simulation engine stopped");
    }

    /// Latest consistent snapshot
    pub fn snapshot(&self) -> Arc<SimSnapshot> {
        self.cell.load()
    }

    /// Shared handle to the published state, for readers on other threads
    pub fn published(&self) -> Arc<SnapshotCell> {
        Arc::clone(&self.cell)
    }

    pub fn move_to(&self, target: JointAngles, steps: usize) -> ArmResult<()> {
        self.interpolator.lock().move_to(target, steps)?;
        info!(%target, steps, "motion commanded");
        Ok(())
    }

    pub fn cancel_motion(&self) {
        self.interpolator.lock().cancel();
    }

    /// Teleport the arm; the motion task publishes it on its next tick
    pub fn set_joint_angles(&self, angles: JointAngles) {
        self.interpolator.lock().set_current(angles);
    }

    pub fn motion_state(&self) -> MotionState {
        self.interpolator.lock().state()
    }

    pub fn joint_angles(&self) -> JointAngles {
        self.interpolator.lock().current()
    }

    /// Poll until `done` holds for the published snapshot
    pub fn wait_for<F>(&self, timeout: Duration, done: F) -> Option<Arc<SimSnapshot>>
    where
        F: Fn(&SimSnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let poll = self
            .config
            .timing
            .refresh_interval()
            .min(Duration::from_millis(5));
        loop {
            let snapshot = self.cell.load();
            if done(&snapshot) {
                return Some(snapshot);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(poll);
        }
    }

    /// Wait until the motion has finished and the published positions
    /// reflect the final angles. Returns false on timeout.
    pub fn wait_for_motion(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let (state, angles) = {
                let interpolator = self.interpolator.lock();
                (interpolator.state(), interpolator.current())
            };
            if state != MotionState::Moving {
                let remaining = deadline.saturating_duration_since(Instant::now());
                return self
                    .wait_for(remaining, |s| {
                        s.motion == state && s.kinematic_angles == angles
                    })
                    .is_some();
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Wait for the first objective batch
    pub fn wait_for_objectives(&self, timeout: Duration) -> bool {
        self.wait_for(timeout, |s| s.objectives_ready).is_some()
    }

    /// State and metrics of every task started by the last `start`
    pub fn task_reports(&self) -> Vec<TaskReport> {
        self.reports.iter().map(|r| r.lock().clone()).collect()
    }
}

impl Drop for SimulationEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
