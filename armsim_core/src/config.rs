//! Simulation configuration
//!
//! Every tunable of the engine lives here: chain mode, DH table, workspace
//! radius, tick intervals, objective count range, prune tolerance, motion
//! policy and trainer parameters. Configurations load from TOML and are
//! validated before an engine or environment accepts them.
//!
//! ```toml
//! seed = 7
//!
//! [workspace]
//! radius = 55.6
//!
//! [objectives]
//! count_min = 5
//! count_max = 40
//!
//! [timing]
//! refresh_interval_ms = 50
//! ```

use crate::error::{ArmError, ArmResult};
use crate::kinematics::{DhLink, DEFAULT_DH_TABLE};
use crate::motion::MovePolicy;
use crate::objectives::WorkspaceShape;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub kinematics: KinematicsConfig,
    pub workspace: WorkspaceConfig,
    pub objectives: ObjectiveConfig,
    pub timing: TimingConfig,
    pub motion: MotionConfig,
    pub trajectory: TrajectoryConfig,
    pub env: EnvConfig,
    pub viz: VizConfig,
    /// RNG seed for objective generation and action sampling (None = entropy)
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KinematicsConfig {
    /// Number of DH links composed (1..=4)
    pub chain_mode: u8,
    pub links: [DhLink; 4],
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            chain_mode: 4,
            links: DEFAULT_DH_TABLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Reachability radius R
    pub radius: f64,
    pub shape: WorkspaceShape,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            radius: 51.3,
            shape: WorkspaceShape::Hemisphere,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveConfig {
    /// Inclusive lower bound of the random objective count
    pub count_min: usize,
    /// Inclusive upper bound of the random objective count
    pub count_max: usize,
    /// When true the drawn count includes the sentinel point
    pub count_includes_sentinel: bool,
    /// Seed the sentinel objective at (R, 0, 0) on every regeneration
    pub seed_sentinel: bool,
    /// Per-axis absolute tolerance for "objective reached"
    pub prune_tolerance: f64,
    /// Rejection-sampling budget per regeneration
    pub max_sample_attempts: u64,
}

impl Default for ObjectiveConfig {
    fn default() -> Self {
        Self {
            count_min: 5,
            count_max: 25,
            count_includes_sentinel: false,
            seed_sentinel: true,
            prune_tolerance: 0.5,
            max_sample_attempts: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub motion_interval_ms: u64,
    pub refresh_interval_ms: u64,
    pub objective_interval_ms: u64,
    pub distance_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            motion_interval_ms: 100,
            refresh_interval_ms: 100,
            objective_interval_ms: 10,
            distance_interval_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn motion_interval(&self) -> Duration {
        Duration::from_millis(self.motion_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn objective_interval(&self) -> Duration {
        Duration::from_millis(self.objective_interval_ms)
    }

    pub fn distance_interval(&self) -> Duration {
        Duration::from_millis(self.distance_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// What `move_to` does while a motion is in flight
    pub policy: MovePolicy,
    /// Joint angles (degrees) at start-up and after an episode reset
    pub initial_angles: [f64; 4],
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            policy: MovePolicy::Preempt,
            initial_angles: [0.0; 4],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Maximum retained points (None = unbounded)
    pub capacity: Option<usize>,
    /// Consecutive points closer than this on every axis are collapsed
    pub dedup_epsilon: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            dedup_epsilon: 1e-9,
        }
    }
}

/// Trainer-facing environment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Step budget per episode
    pub max_steps: usize,
    /// Largest joint delta (degrees) a single action may apply
    pub max_action_deg: f64,
    /// Reward added for every objective reached during a step
    pub reach_bonus: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            max_steps: 100,
            max_action_deg: 5.0,
            reach_bonus: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VizConfig {
    pub host: String,
    pub port: u16,
    /// Trajectory points carried by a single datagram
    pub max_trajectory_points: usize,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5003,
            max_trajectory_points: 64,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self::compact_arm()
    }
}

impl SimConfig {
    /// R = 51.3, 5..=25 objectives
    pub fn compact_arm() -> Self {
        Self {
            kinematics: KinematicsConfig::default(),
            workspace: WorkspaceConfig::default(),
            objectives: ObjectiveConfig::default(),
            timing: TimingConfig::default(),
            motion: MotionConfig::default(),
            trajectory: TrajectoryConfig::default(),
            env: EnvConfig::default(),
            viz: VizConfig::default(),
            seed: None,
        }
    }

    /// R = 55.6 (full reach of the default DH table), 5..=40 objectives
    pub fn extended_reach() -> Self {
        let mut config = Self::compact_arm();
        config.workspace.radius = 55.6;
        config.objectives.count_max = 40;
        config
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> ArmResult<Self> {
        match name {
            "compact" | "compact_arm" => Ok(Self::compact_arm()),
            "extended" | "extended_reach" => Ok(Self::extended_reach()),
            other => Err(ArmError::InvalidConfig(format!(
                "unknown preset '{}' (expected 'compact' or 'extended')",
                other
            ))),
        }
    }

    pub fn from_toml_str(text: &str) -> ArmResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> ArmResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_chain_mode(mut self, mode: u8) -> Self {
        self.kinematics.chain_mode = mode;
        self
    }

    pub fn with_objective_range(mut self, min: usize, max: usize) -> Self {
        self.objectives.count_min = min;
        self.objectives.count_max = max;
        self
    }

    pub fn with_motion_policy(mut self, policy: MovePolicy) -> Self {
        self.motion.policy = policy;
        self
    }

    /// Set all four task intervals at once
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        let ms = interval.as_millis().max(1) as u64;
        self.timing = TimingConfig {
            motion_interval_ms: ms,
            refresh_interval_ms: ms,
            objective_interval_ms: ms,
            distance_interval_ms: ms,
        };
        self
    }

    /// Reject configurations the engine cannot run
    pub fn validate(&self) -> ArmResult<()> {
        let invalid = |msg: String| Err(ArmError::InvalidConfig(msg));

        if !(1..=4).contains(&self.kinematics.chain_mode) {
            return Err(ArmError::InvalidChainMode(self.kinematics.chain_mode));
        }
        for (i, link) in self.kinematics.links.iter().enumerate() {
            if !link.is_finite() {
                return invalid(format!("DH link {} has non-finite parameters", i + 1));
            }
        }

        let radius = self.workspace.radius;
        if !radius.is_finite() || radius <= 0.0 {
            return invalid(format!("workspace radius must be positive, got {}", radius));
        }

        let objectives = &self.objectives;
        if objectives.count_min > objectives.count_max {
            return invalid(format!(
                "objective count range is empty: {}..={}",
                objectives.count_min, objectives.count_max
            ));
        }
        if objectives.count_includes_sentinel && objectives.seed_sentinel && objectives.count_min == 0
        {
            return invalid("count_min must be at least 1 when the count includes the sentinel".into());
        }
        if !objectives.prune_tolerance.is_finite() || objectives.prune_tolerance < 0.0 {
            return invalid(format!(
                "prune tolerance must be non-negative, got {}",
                objectives.prune_tolerance
            ));
        }
        if objectives.max_sample_attempts == 0 {
            return invalid("max_sample_attempts must be positive".into());
        }

        let timing = &self.timing;
        if timing.motion_interval_ms == 0
            || timing.refresh_interval_ms == 0
            || timing.objective_interval_ms == 0
            || timing.distance_interval_ms == 0
        {
            return invalid("task intervals must be at least 1 ms".into());
        }

        if self.motion.initial_angles.iter().any(|a| !a.is_finite()) {
            return invalid("initial joint angles must be finite".into());
        }

        if self.trajectory.capacity == Some(0) {
            return invalid("trajectory capacity must be positive when set".into());
        }
        if !self.trajectory.dedup_epsilon.is_finite() || self.trajectory.dedup_epsilon < 0.0 {
            return invalid("trajectory dedup epsilon must be non-negative".into());
        }

        if self.env.max_steps == 0 {
            return invalid("env.max_steps must be positive".into());
        }
        if !self.env.max_action_deg.is_finite() || self.env.max_action_deg <= 0.0 {
            return invalid("env.max_action_deg must be positive".into());
        }
        if self.viz.max_trajectory_points == 0 {
            return invalid("viz.max_trajectory_points must be positive".into());
        }

        Ok(())
    }
}
