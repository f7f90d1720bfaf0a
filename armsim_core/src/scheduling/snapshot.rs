//! Immutable simulation snapshots and the cell they are published through
//!
//! Every periodic task owns exactly one slice of the snapshot and moves it
//! forward with one of the stage transitions below. Transitions never mutate
//! the input snapshot; they return the next one, which the [`SnapshotCell`]
//! publishes atomically.

use crate::config::SimConfig;
use crate::distance::{DistanceReport, DistanceReporter};
use crate::kinematics::{ChainMode, JointAngles, JointPositions, KinematicsModel, Point};
use crate::motion::MotionState;
use crate::objectives::ObjectiveSet;
use crate::trajectory::TrajectoryLog;
use parking_lot::RwLock;
use std::sync::Arc;

/// Fully-formed view of the simulation at one publication
#[derive(Debug, Clone)]
pub struct SimSnapshot {
    /// Publication counter, bumped by every write to the cell
    pub version: u64,
    /// Refresh tick that produced `joint_positions`
    pub tick: u64,
    /// Latest angles written by the motion stage
    pub joint_angles: JointAngles,
    pub motion: MotionState,
    /// Angles `joint_positions` was computed from
    pub kinematic_angles: JointAngles,
    pub joint_positions: JointPositions,
    pub trajectory: Arc<TrajectoryLog>,
    pub objectives: Arc<ObjectiveSet>,
    /// True once the first objective batch has been generated
    pub objectives_ready: bool,
    pub distances: Arc<DistanceReport>,
    /// Objectives reached since start-up
    pub objectives_reached: u64,
}

impl SimSnapshot {
    /// Tick-0 snapshot: positions of the initial angles, no objectives yet
    pub fn initial(config: &SimConfig, model: &KinematicsModel, mode: ChainMode) -> Self {
        let angles = JointAngles::new(config.motion.initial_angles);
        let positions = model.forward(&angles, mode);
        let mut trajectory =
            TrajectoryLog::new(config.trajectory.capacity, config.trajectory.dedup_epsilon);
        trajectory.append(positions.end_effector());

        Self {
            version: 0,
            tick: 0,
            joint_angles: angles,
            motion: MotionState::Idle,
            kinematic_angles: angles,
            joint_positions: positions,
            trajectory: Arc::new(trajectory),
            objectives: Arc::new(ObjectiveSet::empty()),
            objectives_ready: false,
            distances: Arc::new(DistanceReport::default()),
            objectives_reached: 0,
        }
    }

    pub fn end_effector(&self) -> Point {
        self.joint_positions.end_effector()
    }

    /// Whether `distances` was computed from exactly this snapshot's
    /// positions and objectives
    pub fn distances_current(&self) -> bool {
        self.distances.tick == self.tick
            && self.distances.generation == self.objectives.generation()
            && self.distances.revision == self.objectives.revision()
    }

    /// Distance report for this snapshot, computed on the spot
    pub fn compute_distances(&self) -> DistanceReport {
        DistanceReporter::report(&self.end_effector(), &self.objectives, self.tick)
    }

    /// Motion stage: record freshly interpolated angles
    pub(crate) fn with_motion(&self, angles: JointAngles, motion: MotionState) -> Self {
        let mut next = self.clone();
        next.joint_angles = angles;
        next.motion = motion;
        next
    }

    /// Refresh stage: forward kinematics of the current angles
    pub(crate) fn refreshed(&self, model: &KinematicsModel, mode: ChainMode) -> Self {
        let mut next = self.clone();
        let positions = model.forward(&self.joint_angles, mode);
        next.tick = self.tick + 1;
        next.kinematic_angles = self.joint_angles;
        next.joint_positions = positions;

        let end_effector = positions.end_effector();
        if self.trajectory.last() != Some(&end_effector) {
            Arc::make_mut(&mut next.trajectory).append(end_effector);
        }
        next
    }

    /// Objective stage: install a freshly generated batch
    pub(crate) fn with_objectives(&self, objectives: ObjectiveSet) -> Self {
        let mut next = self.clone();
        next.objectives = Arc::new(objectives);
        next.objectives_ready = true;
        next
    }

    /// Objective stage: drop objectives reached by this snapshot's end
    /// effector. `None` when nothing was reached.
    pub(crate) fn pruned(&self, tolerance: f64) -> Option<(Self, usize)> {
        let end_effector = self.end_effector();
        let reached = self.objectives.reached_by(&end_effector, tolerance);
        if reached.is_empty() {
            return None;
        }

        let mut next = self.clone();
        let removed = Arc::make_mut(&mut next.objectives).remove_ids(&reached);
        next.objectives_reached += removed as u64;
        Some((next, removed))
    }

    /// Distance stage: report against this snapshot's positions and objectives
    pub(crate) fn with_distances(&self) -> Self {
        let mut next = self.clone();
        next.distances = Arc::new(self.compute_distances());
        next
    }

    /// Drop the trajectory history (episode reset)
    pub(crate) fn with_cleared_trajectory(&self) -> Self {
        let mut next = self.clone();
        let trajectory = Arc::make_mut(&mut next.trajectory);
        trajectory.clear();
        trajectory.append(self.end_effector());
        next
    }
}

/// Read-mostly cell holding the latest published snapshot.
///
/// Readers clone an `Arc` under a short read lock and then work on an
/// immutable value. Writers run one stage transition against the current
/// snapshot under the write lock, so concurrent stages never lose each
/// other's updates.
#[derive(Debug)]
pub struct SnapshotCell {
    current: RwLock<Arc<SimSnapshot>>,
}

impl SnapshotCell {
    pub fn new(initial: SimSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Latest published snapshot
    pub fn load(&self) -> Arc<SimSnapshot> {
        self.current.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.current.read().version
    }

    /// Publish the result of `stage` applied to the current snapshot.
    ///
    /// Returns the new snapshot, or `None` if `stage` declined to publish.
    pub fn publish_with<F>(&self, stage: F) -> Option<Arc<SimSnapshot>>
    where
        F: FnOnce(&SimSnapshot) -> Option<SimSnapshot>,
    {
        let mut current = self.current.write();
        let mut next = stage(&current)?;
        next.version = current.version + 1;
        let next = Arc::new(next);
        *current = Arc::clone(&next);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::ChainMode;

    fn initial() -> (SimSnapshot, KinematicsModel) {
        let model = KinematicsModel::default();
        let snapshot = SimSnapshot::initial(&SimConfig::default(), &model, ChainMode::FULL);
        (snapshot, model)
    }

    #[test]
    fn test_initial_snapshot_is_fully_formed() {
        let (snapshot, _) = initial();
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.tick, 0);
        assert_eq!(snapshot.joint_positions.as_slice().len(), 4);
        assert_eq!(snapshot.trajectory.len(), 1);
        assert!(!snapshot.objectives_ready);
        assert!(snapshot.distances_current());
    }

    #[test]
    fn test_refresh_follows_motion() {
        let (snapshot, model) = initial();
        let angles = JointAngles::new([0.0, 90.0, 0.0, 0.0]);
        let moved = snapshot.with_motion(angles, MotionState::Moving);
        // Positions lag until the refresh stage runs
        assert_eq!(moved.joint_positions, snapshot.joint_positions);

        let refreshed = moved.refreshed(&model, ChainMode::FULL);
        assert_eq!(refreshed.tick, 1);
        assert_eq!(refreshed.kinematic_angles, angles);
        assert!((refreshed.end_effector().x - 51.3).abs() < 1e-9);
        assert_eq!(refreshed.trajectory.len(), 2);
        // Input snapshot untouched
        assert_eq!(snapshot.trajectory.len(), 1);
    }

    #[test]
    fn test_refresh_without_motion_does_not_grow_trajectory() {
        let (snapshot, model) = initial();
        let next = snapshot.refreshed(&model, ChainMode::FULL);
        assert_eq!(next.tick, 1);
        assert_eq!(next.trajectory.len(), 1);
    }

    #[test]
    fn test_prune_and_distances() {
        let (snapshot, _) = initial();
        let ee = snapshot.end_effector();
        let set = ObjectiveSet::from_points(vec![ee, Point::new(51.3, 0.0, 0.0)], 1);
        let with_set = snapshot.with_objectives(set);
        assert!(with_set.objectives_ready);
        assert!(!with_set.distances_current());

        let (pruned, removed) = with_set.pruned(0.5).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(pruned.objectives.len(), 1);
        assert_eq!(pruned.objectives_reached, 1);
        assert!(pruned.pruned(0.5).is_none());

        let reported = pruned.with_distances();
        assert!(reported.distances_current());
        assert_eq!(reported.distances.len(), reported.objectives.len());
    }

    #[test]
    fn test_cell_versions_increase() {
        let (snapshot, model) = initial();
        let cell = SnapshotCell::new(snapshot);

        let first = cell.publish_with(|s| Some(s.refreshed(&model, ChainMode::FULL))).unwrap();
        assert_eq!(first.version, 1);
        assert!(cell.publish_with(|_| None).is_none());
        assert_eq!(cell.version(), 1);

        cell.publish_with(|s| Some(s.with_distances()));
        let latest = cell.load();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.tick, 1);
    }
}
