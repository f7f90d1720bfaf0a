//! Distance telemetry from the end effector to live objectives

use crate::kinematics::Point;
use crate::objectives::{workspace_distance, ObjectiveSet};

/// Distances from the end effector to every objective of one set.
///
/// The report remembers which refresh tick and which objective batch it was
/// computed against, so readers can tell whether it matches the snapshot it is
/// shown with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceReport {
    pub distances: Vec<f64>,
    /// Refresh tick of the end-effector position used
    pub tick: u64,
    /// Objective generation used
    pub generation: u64,
    /// Objective revision used
    pub revision: u64,
}

impl DistanceReport {
    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    /// Smallest distance and its index
    pub fn nearest(&self) -> Option<(usize, f64)> {
        self.distances
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn mean(&self) -> Option<f64> {
        if self.distances.is_empty() {
            None
        } else {
            Some(self.distances.iter().sum::<f64>() / self.distances.len() as f64)
        }
    }
}

/// Pure distance computation; never mutates its inputs
pub struct DistanceReporter;

impl DistanceReporter {
    pub fn report(end_effector: &Point, objectives: &ObjectiveSet, tick: u64) -> DistanceReport {
        DistanceReport {
            distances: objectives
                .iter()
                .map(|o| workspace_distance(end_effector, &o.position))
                .collect(),
            tick,
            generation: objectives.generation(),
            revision: objectives.revision(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_distance_per_objective() {
        let set = ObjectiveSet::from_points(
            vec![
                Point::new(3.0, 4.0, 0.0),
                Point::new(0.0, 0.0, 10.0),
                Point::new(1.0, 0.0, 0.0),
            ],
            4,
        );
        let report = DistanceReporter::report(&Point::origin(), &set, 17);

        assert_eq!(report.len(), set.len());
        assert_eq!(report.distances, vec![5.0, 10.0, 1.0]);
        assert_eq!(report.tick, 17);
        assert_eq!(report.generation, 4);
        assert_eq!(report.nearest(), Some((2, 1.0)));
        assert_eq!(report.mean(), Some(16.0 / 3.0));
    }

    #[test]
    fn test_empty_set() {
        let report = DistanceReporter::report(&Point::origin(), &ObjectiveSet::empty(), 0);
        assert!(report.is_empty());
        assert_eq!(report.nearest(), None);
        assert_eq!(report.mean(), None);
    }

    #[test]
    fn test_revision_tracks_pruning() {
        let mut set = ObjectiveSet::from_points(vec![Point::new(0.0, 0.0, 1.0), Point::new(9.0, 9.0, 9.0)], 1);
        set.prune(&Point::new(0.0, 0.0, 1.0), 0.5);
        let report = DistanceReporter::report(&Point::origin(), &set, 2);
        assert_eq!(report.revision, 1);
        assert_eq!(report.len(), 1);
    }
}
