use super::{Action, ArmEnv, Environment, Observation, StepResult};
use crate::communication::{Frame, VizPublisher};
use crate::config::SimConfig;
use crate::error::{ArmError, ArmResult};
use tracing::{debug, warn};

/// What the visualizer has already been sent for one environment
#[derive(Debug, Clone, Copy, Default)]
struct StreamCursor {
    episode: u64,
    trajectory: Option<u64>,
}

/// Batch of independent [`ArmEnv`]s stepped in lockstep.
///
/// With a seed in the config, environment `i` is seeded with `seed + i`.
/// An attached [`VizPublisher`] receives one frame per environment on every
/// [`render`](Self::render).
pub struct MultiEnv {
    envs: Vec<ArmEnv>,
    objective_capacity: usize,
    max_trajectory_points: usize,
    publisher: Option<VizPublisher>,
    cursors: Vec<StreamCursor>,
}

impl MultiEnv {
    pub fn new(config: SimConfig, env_count: usize) -> ArmResult<Self> {
        if env_count == 0 {
            return Err(ArmError::InvalidConfig("env count must be positive".into()));
        }

        let envs = (0..env_count)
            .map(|i| {
                let mut env_config = config.clone();
                env_config.seed = config.seed.map(|seed| seed.wrapping_add(i as u64));
                ArmEnv::new(env_config)
            })
            .collect::<ArmResult<Vec<_>>>()?;

        Ok(Self {
            envs,
            objective_capacity: config.objectives.count_max + 1,
            max_trajectory_points: config.viz.max_trajectory_points,
            publisher: None,
            cursors: vec![StreamCursor::default(); env_count],
        })
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn envs(&self) -> &[ArmEnv] {
        &self.envs
    }

    pub fn env(&self, index: usize) -> Option<&ArmEnv> {
        self.envs.get(index)
    }

    pub fn reset_all(&mut self) -> ArmResult<Vec<Observation>> {
        self.envs.iter_mut().map(|env| env.reset()).collect()
    }

    pub fn reset(&mut self, index: usize) -> ArmResult<Observation> {
        let count = self.envs.len();
        let env = self.envs.get_mut(index).ok_or_else(|| {
            ArmError::InvalidConfig(format!("env index {} out of range ({} envs)", index, count))
        })?;
        env.reset()
    }

    /// Step every environment with its own action
    pub fn step(&mut self, actions: &[Action]) -> ArmResult<Vec<StepResult>> {
        if actions.len() != self.envs.len() {
            return Err(ArmError::ActionDimension {
                expected: self.envs.len(),
                got: actions.len(),
            });
        }
        self.envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| env.step(action))
            .collect()
    }

    pub fn action_sample(&mut self) -> Vec<Action> {
        self.envs.iter_mut().map(|env| env.action_sample()).collect()
    }

    /// Reward accumulated in each environment's current episode
    pub fn total_rewards(&self) -> Vec<f64> {
        self.envs.iter().map(|env| env.episode_reward()).collect()
    }

    /// Stream to `publisher` from now on; announces the buffer layout first
    pub fn attach_visualizer(&mut self, publisher: VizPublisher) -> ArmResult<()> {
        publisher.send_init(self.envs.len(), self.objective_capacity)?;
        debug!(remote = %publisher.remote_addr(), envs = self.envs.len(), "visualizer attached");
        self.publisher = Some(publisher);
        self.cursors = vec![StreamCursor::default(); self.envs.len()];
        Ok(())
    }

    pub fn has_visualizer(&self) -> bool {
        self.publisher.is_some()
    }

    /// Send one frame per environment. No-op without a visualizer.
    pub fn render(&mut self) -> ArmResult<()> {
        let Some(publisher) = &self.publisher else {
            return Ok(());
        };

        for (index, (env, cursor)) in self.envs.iter().zip(self.cursors.iter_mut()).enumerate() {
            let snapshot = env.snapshot();
            let since = if cursor.episode == env.episodes() {
                cursor.trajectory
            } else {
                None
            };
            let frame = Frame::from_snapshot(index, snapshot, since, self.max_trajectory_points);
            publisher.publish_frame(frame)?;

            cursor.episode = env.episodes();
            cursor.trajectory = Some(snapshot.trajectory.total_appended());
        }
        Ok(())
    }

    /// Tell the visualizer to shut down and detach it
    pub fn close(&mut self) {
        if let Some(publisher) = self.publisher.take() {
            if let Err(e) = publisher.send_shutdown(self.envs.len()) {
                warn!("failed to send visualizer shutdown: {}", e);
            }
        }
    }
}

impl Drop for MultiEnv {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::communication::{SceneEvent, VizReceiver, VizScene, WireMessage};
    use std::time::Duration;

    fn multi(n: usize) -> MultiEnv {
        MultiEnv::new(SimConfig::default().with_seed(100), n).unwrap()
    }

    #[test]
    fn test_envs_are_independently_seeded() {
        let mut envs = multi(3);
        envs.reset_all().unwrap();
        let first = envs.env(0).unwrap().snapshot().objectives.positions();
        let second = envs.env(1).unwrap().snapshot().objectives.positions();
        assert_ne!(first, second);
    }

    #[test]
    fn test_step_all() {
        let mut envs = multi(4);
        let observations = envs.reset_all().unwrap();
        assert_eq!(observations.len(), 4);

        let actions = envs.action_sample();
        let results = envs.step(&actions).unwrap();
        assert_eq!(results.len(), 4);
        let rewards = envs.total_rewards();
        for (result, total) in results.iter().zip(&rewards) {
            assert_eq!(result.reward, *total);
        }
    }

    #[test]
    fn test_action_count_mismatch() {
        let mut envs = multi(2);
        envs.reset_all().unwrap();
        let err = envs.step(&[Action::from([0.0; 4])]).unwrap_err();
        assert!(matches!(err, ArmError::ActionDimension { expected: 2, got: 1 }));
    }

    #[test]
    fn test_zero_envs_rejected() {
        assert!(MultiEnv::new(SimConfig::default(), 0).is_err());
    }

    #[test]
    fn test_render_streams_to_scene() {
        let receiver = VizReceiver::bind("127.0.0.1:0").unwrap();
        let mut envs = multi(2);
        envs.reset_all().unwrap();
        envs.attach_visualizer(VizPublisher::new(receiver.local_addr().unwrap()).unwrap())
            .unwrap();

        let mut scene = VizScene::new();
        let next = || {
            receiver
                .recv_timeout(Duration::from_secs(2))
                .unwrap()
                .unwrap()
        };
        assert_eq!(
            scene.apply(next()),
            SceneEvent::Initialized { env_count: 2 }
        );

        envs.render().unwrap();
        for _ in 0..2 {
            scene.apply(next());
        }
        envs.step(&[Action::from([5.0, 0.0, 0.0, 0.0]), Action::from([0.0, 5.0, 0.0, 0.0])])
            .unwrap();
        envs.render().unwrap();
        for _ in 0..2 {
            scene.apply(next());
        }

        for index in 0..2 {
            let env = envs.env(index).unwrap();
            let buffer = scene.env(index).unwrap();
            assert_eq!(buffer.frames, 2);
            assert_eq!(buffer.trajectory, env.snapshot().trajectory.to_vec());
            assert_eq!(buffer.objectives, env.snapshot().objectives.positions());
            assert_eq!(buffer.joints, env.snapshot().joint_positions.0.to_vec());
        }

        envs.close();
        assert!(matches!(
            next(),
            WireMessage::Control { .. }
        ));
        assert!(!envs.has_visualizer());
    }
}
