//! Goal interpolation ("move to target") state machine
//!
//! `move_to` plans a linear table of joint-angle waypoints from the current
//! configuration to the target, both endpoints included. Every call to
//! [`GoalInterpolator::advance`] consumes one waypoint; the last one is the
//! target itself, so a finished motion lands on it exactly.

use crate::error::{ArmError, ArmResult};
use crate::kinematics::JointAngles;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Lifecycle of the interpolator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Idle,
    Moving,
    Done,
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotionState::Idle => write!(f, "Idle"),
            MotionState::Moving => write!(f, "Moving"),
            MotionState::Done => write!(f, "Done"),
        }
    }
}

/// What `move_to` does while another motion is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePolicy {
    /// Replan from the current angles, discarding the in-flight motion
    #[default]
    Preempt,
    /// Run after the in-flight motion (and any already queued) completes
    Queue,
    /// Refuse with [`ArmError::MotionInProgress`]
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MotionRequest {
    target: JointAngles,
    steps: usize,
}

/// Linear waypoint table with `steps` entries, endpoints included.
///
/// `steps == 1` yields just the target. The final entry is `target` itself
/// rather than a computed value.
pub fn interpolation_table(
    from: &JointAngles,
    target: &JointAngles,
    steps: usize,
) -> ArmResult<Vec<JointAngles>> {
    if steps == 0 {
        return Err(ArmError::InvalidMotion("steps must be at least 1".into()));
    }
    if !target.is_finite() {
        return Err(ArmError::InvalidMotion(format!(
            "target {} is not finite",
            target
        )));
    }

    let mut table = Vec::with_capacity(steps);
    let last = steps - 1;
    for i in 0..last {
        table.push(from.lerp(target, i as f64 / last as f64));
    }
    table.push(*target);
    Ok(table)
}

/// Paced joint-angle interpolator
#[derive(Debug, Clone)]
pub struct GoalInterpolator {
    current: JointAngles,
    state: MotionState,
    policy: MovePolicy,
    waypoints: VecDeque<JointAngles>,
    target: Option<JointAngles>,
    queued: VecDeque<MotionRequest>,
}

impl GoalInterpolator {
    pub fn new(initial: JointAngles, policy: MovePolicy) -> Self {
        Self {
            current: initial,
            state: MotionState::Idle,
            policy,
            waypoints: VecDeque::new(),
            target: None,
            queued: VecDeque::new(),
        }
    }

    pub fn current(&self) -> JointAngles {
        self.current
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn policy(&self) -> MovePolicy {
        self.policy
    }

    /// Target of the in-flight motion
    pub fn target(&self) -> Option<JointAngles> {
        self.target
    }

    /// Waypoints left in the in-flight motion
    pub fn remaining(&self) -> usize {
        self.waypoints.len()
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Command a motion to `target` over `steps` ticks.
    pub fn move_to(&mut self, target: JointAngles, steps: usize) -> ArmResult<()> {
        if self.state == MotionState::Moving {
            match self.policy {
                MovePolicy::Reject => {
                    return Err(ArmError::MotionInProgress {
                        remaining: self.waypoints.len(),
                    });
                }
                MovePolicy::Queue => {
                    // Validate now so a bad request fails at the call site
                    interpolation_table(&target, &target, steps)?;
                    self.queued.push_back(MotionRequest { target, steps });
                    return Ok(());
                }
                MovePolicy::Preempt => {}
            }
        }
        self.begin(MotionRequest { target, steps })
    }

    fn begin(&mut self, request: MotionRequest) -> ArmResult<()> {
        let table = interpolation_table(&self.current, &request.target, request.steps)?;
        self.waypoints = table.into();
        self.target = Some(request.target);
        self.state = MotionState::Moving;
        Ok(())
    }

    /// Consume the next waypoint. Returns the new angles while moving.
    pub fn advance(&mut self) -> Option<JointAngles> {
        if self.state != MotionState::Moving {
            return None;
        }
        let next = self.waypoints.pop_front()?;
        self.current = next;

        if self.waypoints.is_empty() {
            self.state = MotionState::Done;
            if let Some(request) = self.queued.pop_front() {
                // Validated when queued
                if let Err(e) = self.begin(request) {
                    tracing::warn!("dropping queued motion: {}", e);
                }
            }
        }
        Some(next)
    }

    /// Abort the motion and drop queued requests; angles stay where they are
    pub fn cancel(&mut self) {
        self.waypoints.clear();
        self.queued.clear();
        self.target = None;
        self.state = MotionState::Idle;
    }

    /// Teleport to `angles`, cancelling any motion
    pub fn set_current(&mut self, angles: JointAngles) {
        self.cancel();
        self.current = angles;
    }
}
