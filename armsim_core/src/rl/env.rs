use super::{Action, Environment, EpisodeInfo, Observation, StepResult, TerminationReason};
use crate::config::SimConfig;
use crate::error::{ArmError, ArmResult};
use crate::kinematics::{JointAngles, JOINT_COUNT};
use crate::scheduling::{SimSnapshot, Simulation};
use rand::Rng;

/// Joint angles followed by the end-effector position
const OBSERVATION_SIZE: usize = JOINT_COUNT + 3;

/// Single-arm reaching environment.
///
/// Each step adds the (clamped) action to the joint angles and runs one
/// simulation tick. Reward is the negative distance to the nearest
/// objective plus a bonus for every objective reached during the step.
pub struct ArmEnv {
    sim: Simulation,
    episode: EpisodeInfo,
    episodes: u64,
    max_steps: usize,
    max_action_deg: f64,
    reach_bonus: f64,
    home: JointAngles,
}

impl ArmEnv {
    pub fn new(config: SimConfig) -> ArmResult<Self> {
        let max_steps = config.env.max_steps;
        let max_action_deg = config.env.max_action_deg;
        let reach_bonus = config.env.reach_bonus;
        let home = JointAngles::new(config.motion.initial_angles);

        Ok(Self {
            sim: Simulation::new(config)?,
            episode: EpisodeInfo::default(),
            episodes: 0,
            max_steps,
            max_action_deg,
            reach_bonus,
            home,
        })
    }

    pub fn snapshot(&self) -> &SimSnapshot {
        self.sim.snapshot()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Episodes started so far
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn episode_reward(&self) -> f64 {
        self.episode.total_reward
    }

    pub fn episode_length(&self) -> usize {
        self.episode.steps
    }

    fn clamp_action(&self, action: &Action) -> ArmResult<[f64; JOINT_COUNT]> {
        if action.len() != JOINT_COUNT {
            return Err(ArmError::ActionDimension {
                expected: JOINT_COUNT,
                got: action.len(),
            });
        }
        let mut deltas = [0.0; JOINT_COUNT];
        for (delta, value) in deltas.iter_mut().zip(&action.data) {
            if !value.is_finite() {
                return Err(ArmError::InvalidMotion(format!(
                    "action component {} is not finite",
                    value
                )));
            }
            *delta = value.clamp(-self.max_action_deg, self.max_action_deg);
        }
        Ok(deltas)
    }
}

impl Environment for ArmEnv {
    fn reset(&mut self) -> ArmResult<Observation> {
        self.sim.reset(self.home)?;
        self.episode = EpisodeInfo::default();
        self.episodes += 1;
        Ok(self.observation())
    }

    fn step(&mut self, action: &Action) -> ArmResult<StepResult> {
        let deltas = self.clamp_action(action)?;
        let target = self.sim.joint_angles().offset(&deltas);
        self.sim.set_joint_angles(target);
        let summary = self.sim.tick()?;

        let snapshot = self.sim.snapshot();
        let nearest = snapshot.distances.nearest().map(|(_, d)| d).unwrap_or(0.0);
        let reward = -nearest + self.reach_bonus * summary.reached as f64;

        self.episode.steps += 1;
        self.episode.total_reward += reward;
        self.episode.objectives_reached += summary.reached;

        let exhausted = snapshot.objectives.is_empty();
        let out_of_steps = self.episode.steps >= self.max_steps;
        self.episode.termination_reason = if exhausted {
            TerminationReason::ObjectivesExhausted
        } else if out_of_steps {
            TerminationReason::MaxSteps
        } else {
            TerminationReason::None
        };

        Ok(StepResult {
            observation: self.observation(),
            reward,
            done: exhausted || out_of_steps,
            truncated: out_of_steps && !exhausted,
            info: self.episode.clone(),
        })
    }

    fn observation(&self) -> Observation {
        let snapshot = self.sim.snapshot();
        let ee = snapshot.end_effector();
        let mut data = Vec::with_capacity(OBSERVATION_SIZE);
        data.extend(snapshot.kinematic_angles.iter());
        data.extend([ee.x, ee.y, ee.z]);
        Observation::new(data)
    }

    fn action_sample(&mut self) -> Action {
        let limit = self.max_action_deg;
        let rng = self.sim.rng_mut();
        Action::new((0..JOINT_COUNT).map(|_| rng.gen_range(-limit..=limit)).collect())
    }

    fn episode_info(&self) -> EpisodeInfo {
        self.episode.clone()
    }

    fn observation_size(&self) -> usize {
        OBSERVATION_SIZE
    }

    fn action_size(&self) -> usize {
        JOINT_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn env() -> ArmEnv {
        ArmEnv::new(SimConfig::default().with_seed(21)).unwrap()
    }

    #[test]
    fn test_reset_observation() {
        let mut env = env();
        let obs = env.reset().unwrap();
        assert_eq!(obs.len(), env.observation_size());
        assert_eq!(obs.shape, vec![7]);
        assert_eq!(&obs.data[..4], &[0.0; 4]);
        assert_relative_eq!(obs.data[6], 55.6, epsilon = 1e-9);
        assert!(env.snapshot().objectives_ready);
        assert_eq!(env.episodes(), 1);
    }

    #[test]
    fn test_step_applies_clamped_action() {
        let mut env = env();
        env.reset().unwrap();
        let result = env.step(&Action::from([2.0, -50.0, 0.0, 0.0])).unwrap();

        assert_eq!(&result.observation.data[..4], &[2.0, -5.0, 0.0, 0.0]);
        assert_eq!(result.info.steps, 1);
        assert_eq!(env.episode_length(), 1);
        assert!(result.reward < 0.0);
        assert!(!result.done);
    }

    #[test]
    fn test_reward_is_negative_nearest_distance() {
        let mut env = env();
        env.reset().unwrap();
        let result = env.step(&Action::from([0.0; 4])).unwrap();
        let snapshot = env.snapshot();
        let (_, nearest) = snapshot.distances.nearest().unwrap();
        assert_eq!(result.info.objectives_reached, 0);
        assert_relative_eq!(result.reward, -nearest);
        assert_relative_eq!(env.episode_reward(), result.reward);
    }

    #[test]
    fn test_episode_ends_at_step_budget() {
        let mut config = SimConfig::default().with_seed(2);
        config.env.max_steps = 3;
        let mut env = ArmEnv::new(config).unwrap();
        env.reset().unwrap();

        for _ in 0..2 {
            assert!(!env.step(&Action::from([0.0; 4])).unwrap().done);
        }
        let last = env.step(&Action::from([0.0; 4])).unwrap();
        assert!(last.done);
        assert!(last.truncated);
        assert_eq!(last.info.termination_reason, TerminationReason::MaxSteps);

        env.reset().unwrap();
        assert_eq!(env.episode_length(), 0);
        assert_eq!(env.episode_reward(), 0.0);
    }

    #[test]
    fn test_wrong_action_dimension() {
        let mut env = env();
        env.reset().unwrap();
        let err = env.step(&Action::new(vec![1.0, 2.0])).unwrap_err();
        assert!(matches!(err, ArmError::ActionDimension { expected: 4, got: 2 }));
        assert!(env.step(&Action::new(vec![f64::NAN, 0.0, 0.0, 0.0])).is_err());
    }

    #[test]
    fn test_action_sample_within_limits() {
        let mut env = env();
        for _ in 0..100 {
            let action = env.action_sample();
            assert_eq!(action.len(), env.action_size());
            assert!(action.data.iter().all(|a| a.abs() <= 5.0));
        }
    }

    #[test]
    fn test_random_rollout_runs_to_done() {
        let mut env = env();
        env.reset().unwrap();
        let mut steps = 0;
        loop {
            let action = env.action_sample();
            let result = env.step(&action).unwrap();
            steps += 1;
            if result.done {
                break;
            }
        }
        assert!(steps <= 100);
        assert_eq!(env.episode_info().steps, steps);
    }
}
