//! Synchronous driver: all four stages, in order, on the caller's thread

use super::snapshot::SimSnapshot;
use crate::config::SimConfig;
use crate::error::ArmResult;
use crate::kinematics::{ChainMode, JointAngles, KinematicsModel};
use crate::motion::{GoalInterpolator, MotionState};
use crate::objectives::ObjectiveGenerator;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Seeded RNG when `seed` is given, OS entropy otherwise
pub(crate) fn seeded_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// What one call to [`Simulation::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickSummary {
    pub tick: u64,
    /// Objectives pruned this tick
    pub reached: usize,
    /// Whether a fresh objective batch was installed
    pub regenerated: bool,
}

/// Deterministic, single-threaded simulation.
///
/// Runs the same stage transitions as [`SimulationEngine`](super::SimulationEngine)
/// (motion, refresh, objectives, distances), but one full round per
/// [`tick`](Self::tick). With a seed set, runs are reproducible.
pub struct Simulation {
    config: SimConfig,
    model: KinematicsModel,
    mode: ChainMode,
    interpolator: GoalInterpolator,
    generator: ObjectiveGenerator,
    rng: ChaCha8Rng,
    state: SimSnapshot,
}

impl Simulation {
    pub fn new(config: SimConfig) -> ArmResult<Self> {
        config.validate()?;
        let mode = ChainMode::new(config.kinematics.chain_mode)?;
        let model = KinematicsModel::new(config.kinematics.links);
        let interpolator = GoalInterpolator::new(
            JointAngles::new(config.motion.initial_angles),
            config.motion.policy,
        );
        let generator = ObjectiveGenerator::from_config(&config);
        let rng = seeded_rng(config.seed);
        let state = SimSnapshot::initial(&config, &model, mode);

        Ok(Self {
            config,
            model,
            mode,
            interpolator,
            generator,
            rng,
            state,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn snapshot(&self) -> &SimSnapshot {
        &self.state
    }

    pub fn joint_angles(&self) -> JointAngles {
        self.interpolator.current()
    }

    pub fn motion_state(&self) -> MotionState {
        self.interpolator.state()
    }

    pub fn rng_mut(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn move_to(&mut self, target: JointAngles, steps: usize) -> ArmResult<()> {
        self.interpolator.move_to(target, steps)
    }

    pub fn cancel_motion(&mut self) {
        self.interpolator.cancel();
    }

    /// Teleport the arm; positions follow on the next tick
    pub fn set_joint_angles(&mut self, angles: JointAngles) {
        self.interpolator.set_current(angles);
        let next = self
            .state
            .with_motion(angles, self.interpolator.state());
        self.publish(next);
    }

    fn publish(&mut self, mut next: SimSnapshot) {
        next.version = self.state.version + 1;
        self.state = next;
    }

    /// Replace the objective set with a fresh batch
    pub fn regenerate_objectives(&mut self) -> ArmResult<()> {
        let set = self.generator.regenerate(&mut self.rng)?;
        let next = self.state.with_objectives(set);
        self.publish(next);
        Ok(())
    }

    /// One round of every stage
    pub fn tick(&mut self) -> ArmResult<TickSummary> {
        let advanced = self.interpolator.advance().is_some();
        if advanced || self.state.motion != self.interpolator.state() {
            let next = self
                .state
                .with_motion(self.interpolator.current(), self.interpolator.state());
            self.publish(next);
        }

        let next = self.state.refreshed(&self.model, self.mode);
        self.publish(next);

        let mut summary = TickSummary::default();
        if self.state.objectives.is_empty() {
            self.regenerate_objectives()?;
            summary.regenerated = true;
        }
        if let Some((next, removed)) = self.state.pruned(self.config.objectives.prune_tolerance) {
            summary.reached = removed;
            self.publish(next);
        }

        if !self.state.distances_current() {
            let next = self.state.with_distances();
            self.publish(next);
        }

        summary.tick = self.state.tick;
        Ok(summary)
    }

    /// Start over at `angles`: motion cancelled, trajectory cleared, fresh
    /// objectives and distances.
    pub fn reset(&mut self, angles: JointAngles) -> ArmResult<()> {
        self.set_joint_angles(angles);
        let next = self
            .state
            .refreshed(&self.model, self.mode)
            .with_cleared_trajectory();
        self.publish(next);

        self.regenerate_objectives()?;
        let next = self.state.with_distances();
        self.publish(next);

        debug!(
            tick = self.state.tick,
            objectives = self.state.objectives.len(),
            "simulation reset"
        );
        Ok(())
    }
}
