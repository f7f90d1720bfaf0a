//! # ARMSIM Core
//!
//! Kinematic simulation and objective-tracking engine for a 4-joint arm.
//!
//! - **Kinematics**: Denavit-Hartenberg forward kinematics with a selectable
//!   chain depth
//! - **Motion**: paced linear interpolation towards commanded joint angles
//! - **Objectives**: randomly generated reachable targets, pruned as the end
//!   effector reaches them
//! - **Scheduling**: four periodic tasks publishing immutable snapshots, plus
//!   a synchronous driver for deterministic runs
//! - **RL**: reset/step trainer interface over the synchronous driver
//! - **Communication**: JSON-over-UDP stream for an external visualizer
//!
//! ## Quick Start
//!
//! ```rust
//! use armsim_core::{ArmEnv, Action, Environment, SimConfig};
//!
//! let mut env = ArmEnv::new(SimConfig::default().with_seed(7))?;
//! let obs = env.reset()?;
//! assert_eq!(obs.len(), 7);
//!
//! let result = env.step(&Action::from([1.0, -2.0, 0.5, 0.0]))?;
//! println!("reward {:.2}, done {}", result.reward, result.done);
//! # Ok::<(), armsim_core::ArmError>(())
//! ```

pub mod communication;
pub mod config;
pub mod distance;
pub mod error;
pub mod kinematics;
pub mod motion;
pub mod objectives;
pub mod rl;
pub mod scheduling;
pub mod trajectory;

// Re-export commonly used types for easy access
pub use config::SimConfig;
pub use error::{ArmError, ArmResult};
pub use kinematics::{forward_kinematics, ChainMode, JointAngles, JointPositions, Point};
pub use motion::{MotionState, MovePolicy};
pub use objectives::{ObjectiveSet, WorkspaceShape};
pub use rl::{Action, ArmEnv, Environment, MultiEnv, Observation, StepResult};
pub use scheduling::{SimSnapshot, Simulation, SimulationEngine};
