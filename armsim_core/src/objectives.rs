//! Reachable objectives and their spawn/prune cycle
//!
//! An [`ObjectiveSet`] is a batch of points inside the arm's workspace. The
//! objective task prunes points the end effector has reached and asks the
//! [`ObjectiveGenerator`] for a fresh batch once the set is exhausted.

use crate::config::SimConfig;
use crate::error::{ArmError, ArmResult};
use crate::kinematics::Point;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reachability metric: `sqrt(sqrt(dx² + dy²)² + dz²)`
pub fn workspace_distance(a: &Point, b: &Point) -> f64 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    let dz = (a.z - b.z).abs();
    let planar = (dx * dx + dy * dy).sqrt();
    (planar * planar + dz * dz).sqrt()
}

/// Shape of the reachable region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceShape {
    /// Ball of radius R above the base plane (z >= 0)
    Hemisphere,
    /// Full ball of radius R
    Sphere,
}

/// Reachability bound around the base origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Workspace {
    pub radius: f64,
    pub shape: WorkspaceShape,
}

impl Workspace {
    pub fn new(radius: f64, shape: WorkspaceShape) -> Self {
        Self { radius, shape }
    }

    pub fn contains(&self, point: &Point) -> bool {
        if self.shape == WorkspaceShape::Hemisphere && point.z < 0.0 {
            return false;
        }
        workspace_distance(point, &Point::origin()) <= self.radius
    }

    /// Fixed reference objective seeded into every batch
    pub fn sentinel(&self) -> Point {
        Point::new(self.radius, 0.0, 0.0)
    }
}

/// Opaque handle used to remove an objective by identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectiveId(u32);

/// A target point. Equality compares positions only.
#[derive(Debug, Clone, Copy)]
pub struct Objective {
    id: ObjectiveId,
    pub position: Point,
}

impl Objective {
    pub fn id(&self) -> ObjectiveId {
        self.id
    }

    /// Every axis within `tolerance` of `point`
    pub fn is_reached_by(&self, point: &Point, tolerance: f64) -> bool {
        (self.position.x - point.x).abs() <= tolerance
            && (self.position.y - point.y).abs() <= tolerance
            && (self.position.z - point.z).abs() <= tolerance
    }
}

impl PartialEq for Objective {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

/// One generation of objectives
#[derive(Debug, Clone, Default)]
pub struct ObjectiveSet {
    objectives: Vec<Objective>,
    generation: u64,
    revision: u64,
    initial_count: usize,
}

impl ObjectiveSet {
    /// Set that has never been generated
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_points(points: impl IntoIterator<Item = Point>, generation: u64) -> Self {
        let objectives: Vec<Objective> = points
            .into_iter()
            .enumerate()
            .map(|(i, position)| Objective {
                id: ObjectiveId(i as u32),
                position,
            })
            .collect();
        let initial_count = objectives.len();
        Self {
            objectives,
            generation,
            revision: 0,
            initial_count,
        }
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Objective> {
        self.objectives.iter()
    }

    pub fn positions(&self) -> Vec<Point> {
        self.objectives.iter().map(|o| o.position).collect()
    }

    /// Bumped every time a new batch is generated (0 = never generated)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bumped every time objectives are removed from this batch
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Size of the batch when it was generated
    pub fn initial_count(&self) -> usize {
        self.initial_count
    }

    pub fn contains_point(&self, point: &Point) -> bool {
        self.objectives.iter().any(|o| o.position == *point)
    }

    /// Ids of objectives reached by `end_effector`. Read-only.
    pub fn reached_by(&self, end_effector: &Point, tolerance: f64) -> Vec<ObjectiveId> {
        self.objectives
            .iter()
            .filter(|o| o.is_reached_by(end_effector, tolerance))
            .map(|o| o.id)
            .collect()
    }

    /// Remove objectives by identity, returning how many were present
    pub fn remove_ids(&mut self, ids: &[ObjectiveId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let before = self.objectives.len();
        self.objectives.retain(|o| !ids.contains(&o.id));
        let removed = before - self.objectives.len();
        if removed > 0 {
            self.revision += 1;
        }
        removed
    }

    /// Remove every objective reached by `end_effector`
    pub fn prune(&mut self, end_effector: &Point, tolerance: f64) -> usize {
        let reached = self.reached_by(end_effector, tolerance);
        self.remove_ids(&reached)
    }
}

/// Rejection sampler producing fresh objective batches
#[derive(Debug, Clone)]
pub struct ObjectiveGenerator {
    workspace: Workspace,
    count_min: usize,
    count_max: usize,
    count_includes_sentinel: bool,
    seed_sentinel: bool,
    max_attempts: u64,
    generation: u64,
}

impl ObjectiveGenerator {
    pub fn from_config(config: &SimConfig) -> Self {
        let objectives = &config.objectives;
        Self {
            workspace: Workspace::new(config.workspace.radius, config.workspace.shape),
            count_min: objectives.count_min,
            count_max: objectives.count_max,
            count_includes_sentinel: objectives.count_includes_sentinel,
            seed_sentinel: objectives.seed_sentinel,
            max_attempts: objectives.max_sample_attempts,
            generation: 0,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Generation of the most recent batch
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Continue numbering after `generation` (engine restart)
    pub fn resume_after(&mut self, generation: u64) {
        self.generation = self.generation.max(generation);
    }

    /// Draw a new batch.
    ///
    /// Fails with [`ArmError::SamplingExhausted`] when the attempt budget runs
    /// out before enough reachable points were found.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> ArmResult<ObjectiveSet> {
        let count = rng.gen_range(self.count_min..=self.count_max);
        let sentinel = self.workspace.sentinel();

        let mut points = Vec::with_capacity(count + 1);
        let mut wanted = count;
        if self.seed_sentinel {
            points.push(sentinel);
            if self.count_includes_sentinel {
                wanted = count.saturating_sub(1);
            }
        }

        let r = self.workspace.radius;
        let mut attempts: u64 = 0;
        let mut sampled = 0;
        while sampled < wanted {
            if attempts >= self.max_attempts {
                return Err(ArmError::SamplingExhausted {
                    attempts,
                    radius: r,
                });
            }
            attempts += 1;

            let candidate = Point::new(
                rng.gen_range(-r..=r),
                rng.gen_range(-r..=r),
                rng.gen_range(-r..=r),
            );
            if !self.workspace.contains(&candidate) {
                continue;
            }
            if self.seed_sentinel && candidate == sentinel {
                continue;
            }
            points.push(candidate);
            sampled += 1;
        }

        self.generation += 1;
        tracing::debug!(
            generation = self.generation,
            count = points.len(),
            attempts,
            "objective batch sampled"
        );
        Ok(ObjectiveSet::from_points(points, self.generation))
    }
}
