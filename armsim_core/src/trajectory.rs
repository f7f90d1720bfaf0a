//! End-effector trajectory history

use crate::kinematics::Point;
use std::collections::VecDeque;

/// Deduplicated history of end-effector positions.
///
/// Consecutive points within `epsilon` on every axis collapse into one. With a
/// capacity set, the oldest points are dropped first.
#[derive(Debug, Clone)]
pub struct TrajectoryLog {
    points: VecDeque<Point>,
    capacity: Option<usize>,
    epsilon: f64,
    /// Points ever accepted, including dropped ones
    appended: u64,
}

impl Default for TrajectoryLog {
    fn default() -> Self {
        Self::new(None, 0.0)
    }
}

impl TrajectoryLog {
    pub fn new(capacity: Option<usize>, epsilon: f64) -> Self {
        Self {
            points: VecDeque::new(),
            capacity,
            epsilon,
            appended: 0,
        }
    }

    /// Append unless `point` duplicates the last logged position.
    /// Returns whether the point was kept.
    pub fn append(&mut self, point: Point) -> bool {
        if let Some(last) = self.points.back() {
            let eps = self.epsilon;
            if (last.x - point.x).abs() <= eps
                && (last.y - point.y).abs() <= eps
                && (last.z - point.z).abs() <= eps
            {
                return false;
            }
        }

        self.points.push_back(point);
        self.appended += 1;
        if let Some(cap) = self.capacity {
            while self.points.len() > cap {
                self.points.pop_front();
            }
        }
        true
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&Point> {
        self.points.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<Point> {
        self.points.iter().copied().collect()
    }

    /// Cursor value after the most recent point
    pub fn total_appended(&self) -> u64 {
        self.appended
    }

    /// Points appended after `cursor` that are still retained
    pub fn since(&self, cursor: u64) -> Vec<Point> {
        let dropped = self.appended - self.points.len() as u64;
        let start = cursor.max(dropped).min(self.appended);
        let skip = (start - dropped) as usize;
        self.points.iter().skip(skip).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_duplicates_collapse() {
        let mut log = TrajectoryLog::new(None, 1e-9);
        let a = Point::new(1.0, 2.0, 3.0);
        let b = Point::new(1.0, 2.0, 4.0);

        assert!(log.append(a));
        assert!(!log.append(a));
        assert!(log.append(b));
        // Non-consecutive repeats are kept
        assert!(log.append(a));
        assert_eq!(log.to_vec(), vec![a, b, a]);
    }

    #[test]
    fn test_near_duplicates_within_epsilon() {
        let mut log = TrajectoryLog::new(None, 0.01);
        log.append(Point::new(0.0, 0.0, 0.0));
        assert!(!log.append(Point::new(0.005, -0.005, 0.0)));
        assert!(log.append(Point::new(0.02, 0.0, 0.0)));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = TrajectoryLog::new(Some(3), 0.0);
        for i in 0..5 {
            log.append(Point::new(i as f64, 0.0, 0.0));
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().next().unwrap().x, 2.0);
        assert_eq!(log.total_appended(), 5);
    }

    #[test]
    fn test_since_cursor() {
        let mut log = TrajectoryLog::new(None, 0.0);
        for i in 0..4 {
            log.append(Point::new(i as f64, 0.0, 0.0));
        }
        let cursor = log.total_appended();
        assert!(log.since(cursor).is_empty());

        log.append(Point::new(9.0, 0.0, 0.0));
        assert_eq!(log.since(cursor), vec![Point::new(9.0, 0.0, 0.0)]);
        assert_eq!(log.since(0).len(), 5);
    }

    #[test]
    fn test_since_skips_dropped_points() {
        let mut log = TrajectoryLog::new(Some(2), 0.0);
        for i in 0..5 {
            log.append(Point::new(i as f64, 0.0, 0.0));
        }
        let xs: Vec<f64> = log.since(1).iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![3.0, 4.0]);
    }

    #[test]
    fn test_clear_keeps_cursor_monotonic() {
        let mut log = TrajectoryLog::new(None, 0.0);
        log.append(Point::new(1.0, 0.0, 0.0));
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.total_appended(), 1);

        log.append(Point::new(2.0, 0.0, 0.0));
        assert_eq!(log.since(1), vec![Point::new(2.0, 0.0, 0.0)]);
    }
}
