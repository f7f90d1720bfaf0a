//! Shared-state coordination: snapshots, periodic tasks and the drivers
//! that run them

mod engine;
mod node;
mod runner;
mod simulation;
mod snapshot;

pub use engine::SimulationEngine;
pub use node::{SimNode, TaskInfo, TaskMetrics, TaskReport, TaskState};
pub use simulation::{Simulation, TickSummary};
pub use snapshot::{SimSnapshot, SnapshotCell};
