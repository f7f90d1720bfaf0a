//! Trainer interface: observations, actions and the environment loop

use crate::error::ArmResult;
use serde::{Deserialize, Serialize};

mod env;
mod vec_env;

pub use env::ArmEnv;
pub use vec_env::MultiEnv;

/// Observation handed to the trainer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Flat vector of observations
    pub data: Vec<f64>,
    /// Dimensions of observation (for reshaping)
    pub shape: Vec<usize>,
}

impl Observation {
    pub fn new(data: Vec<f64>) -> Self {
        let len = data.len();
        Self {
            data,
            shape: vec![len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Continuous action: one joint-angle delta per joint, in degrees
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub data: Vec<f64>,
}

impl Action {
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<[f64; 4]> for Action {
    fn from(deltas: [f64; 4]) -> Self {
        Self::new(deltas.to_vec())
    }
}

/// Why an episode ended
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    #[default]
    None,
    /// Step budget used up
    MaxSteps,
    /// Every objective of the batch was reached
    ObjectivesExhausted,
}

/// Running totals for the current episode
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub total_reward: f64,
    pub steps: usize,
    pub objectives_reached: usize,
    pub termination_reason: TerminationReason,
}

/// Result of a step in the environment
#[derive(Clone, Debug)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    /// Ended by the step budget rather than by the task
    pub truncated: bool,
    pub info: EpisodeInfo,
}

/// Episodic environment driven by a trainer
pub trait Environment {
    /// Start a new episode
    fn reset(&mut self) -> ArmResult<Observation>;

    /// Apply one action and advance the simulation by one tick
    fn step(&mut self, action: &Action) -> ArmResult<StepResult>;

    fn observation(&self) -> Observation;

    /// Uniformly random valid action
    fn action_sample(&mut self) -> Action;

    fn episode_info(&self) -> EpisodeInfo;

    fn observation_size(&self) -> usize;

    fn action_size(&self) -> usize;
}
