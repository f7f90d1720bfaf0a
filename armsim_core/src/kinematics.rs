//! Forward kinematics for the 4-joint arm
//!
//! The arm is described by a Denavit-Hartenberg table. Each link contributes
//! one homogeneous transform; composing the first `mode` of them left to right
//! gives the pose of the frame at the end of that chain.
//!
//! ```rust
//! use armsim_core::kinematics::{forward_kinematics, JointAngles};
//!
//! let positions = forward_kinematics(&JointAngles::zeros(), 1).unwrap();
//! assert_eq!(positions.end_effector().z, 4.3);
//! ```

use crate::error::{ArmError, ArmResult};
use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::fmt;

/// Cartesian point in workspace units
pub type Point = Point3<f64>;

/// 4x4 homogeneous transform
pub type Pose = Matrix4<f64>;

/// Number of actuated joints
pub const JOINT_COUNT: usize = 4;

/// Default DH table of the arm
pub const DEFAULT_DH_TABLE: [DhLink; 4] = [
    DhLink::new(0.0, -FRAC_PI_2, 4.3, 0.0),
    DhLink::new(0.0, FRAC_PI_2, 0.0, 0.0),
    DhLink::new(0.0, -FRAC_PI_2, 24.3, 0.0),
    DhLink::new(27.0, FRAC_PI_2, 0.0, -FRAC_PI_2),
];

/// Joint angles in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JointAngles(pub [f64; JOINT_COUNT]);

impl JointAngles {
    pub const fn new(angles: [f64; JOINT_COUNT]) -> Self {
        Self(angles)
    }

    pub const fn zeros() -> Self {
        Self([0.0; JOINT_COUNT])
    }

    pub fn as_array(&self) -> [f64; JOINT_COUNT] {
        self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().copied()
    }

    /// Point at fraction `t` of the way from `self` to `target`
    pub fn lerp(&self, target: &JointAngles, t: f64) -> JointAngles {
        let mut out = [0.0; JOINT_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.0[i] + (target.0[i] - self.0[i]) * t;
        }
        JointAngles(out)
    }

    /// Component-wise sum
    pub fn offset(&self, delta: &[f64; JOINT_COUNT]) -> JointAngles {
        let mut out = self.0;
        for (slot, d) in out.iter_mut().zip(delta) {
            *slot += d;
        }
        JointAngles(out)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|a| a.is_finite())
    }
}

impl From<[f64; JOINT_COUNT]> for JointAngles {
    fn from(angles: [f64; JOINT_COUNT]) -> Self {
        Self(angles)
    }
}

impl fmt::Display for JointAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.2}, {:.2}, {:.2}, {:.2}]",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// How many DH links are composed (1..=4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChainMode(u8);

impl ChainMode {
    pub const FULL: ChainMode = ChainMode(4);

    pub fn new(mode: u8) -> ArmResult<Self> {
        if (1..=4).contains(&mode) {
            Ok(Self(mode))
        } else {
            Err(ArmError::InvalidChainMode(mode))
        }
    }

    pub fn links(self) -> usize {
        self.0 as usize
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ChainMode {
    type Error = ArmError;

    fn try_from(mode: u8) -> ArmResult<Self> {
        Self::new(mode)
    }
}

/// One row of a DH table. Angles are radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DhLink {
    /// Link length
    pub a: f64,
    /// Link twist
    pub alfa: f64,
    /// Link offset
    pub d: f64,
    /// Added to the joint angle before building the transform
    #[serde(default)]
    pub theta_offset: f64,
}

impl DhLink {
    pub const fn new(a: f64, alfa: f64, d: f64, theta_offset: f64) -> Self {
        Self {
            a,
            alfa,
            d,
            theta_offset,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.a.is_finite() && self.alfa.is_finite() && self.d.is_finite() && self.theta_offset.is_finite()
    }
}

pub fn deg2rad(deg: f64) -> f64 {
    PI * deg / 180.0
}

pub fn rad2deg(rad: f64) -> f64 {
    180.0 * rad / PI
}

/// Homogeneous transform for one DH row
pub fn dh_transform(a: f64, alfa: f64, d: f64, theta: f64) -> Pose {
    let (st, ct) = theta.sin_cos();
    let (sa, ca) = alfa.sin_cos();
    Matrix4::new(
        ct, -st * ca, st * sa, a * ct,
        st, ct * ca, -ct * sa, a * st,
        0.0, sa, ca, d,
        0.0, 0.0, 0.0, 1.0,
    )
}

fn translation(pose: &Pose) -> Point {
    Point::new(pose[(0, 3)], pose[(1, 3)], pose[(2, 3)])
}

/// Positions of the base, the intermediate joints and the end effector.
///
/// Entry 0 is the base origin. Entry `i` (1..=3) is the frame reached after
/// `min(i + 1, mode)` links, so entry 3 is always the end of the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointPositions(pub [Point; 4]);

impl JointPositions {
    pub fn base(&self) -> Point {
        self.0[0]
    }

    pub fn end_effector(&self) -> Point {
        self.0[3]
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.0.iter()
    }
}

/// Forward kinematics over a fixed DH table
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicsModel {
    links: [DhLink; 4],
}

impl Default for KinematicsModel {
    fn default() -> Self {
        Self::new(DEFAULT_DH_TABLE)
    }
}

impl KinematicsModel {
    pub fn new(links: [DhLink; 4]) -> Self {
        Self { links }
    }

    pub fn links(&self) -> &[DhLink; 4] {
        &self.links
    }

    fn link_transform(&self, index: usize, angles: &JointAngles) -> Pose {
        let link = &self.links[index];
        let theta = deg2rad(angles.0[index]) + link.theta_offset;
        dh_transform(link.a, link.alfa, link.d, theta)
    }

    /// Cumulative transforms after 1..=mode links
    fn chain(&self, angles: &JointAngles, mode: ChainMode) -> [Pose; 4] {
        let mut frames = [Pose::identity(); 4];
        let mut m = Pose::identity();
        for (k, frame) in frames.iter_mut().enumerate().take(mode.links()) {
            m *= self.link_transform(k, angles);
            *frame = m;
        }
        frames
    }

    /// Full transform of the `mode`-link chain
    pub fn pose(&self, angles: &JointAngles, mode: ChainMode) -> Pose {
        self.chain(angles, mode)[mode.links() - 1]
    }

    pub fn forward(&self, angles: &JointAngles, mode: ChainMode) -> JointPositions {
        let frames = self.chain(angles, mode);
        let last = mode.links() - 1;
        let mut positions = [Point::origin(); 4];
        for (i, slot) in positions.iter_mut().enumerate().skip(1) {
            *slot = translation(&frames[i.min(last)]);
        }
        JointPositions(positions)
    }
}

/// Forward kinematics with the default DH table
pub fn forward_kinematics(angles: &JointAngles, mode: u8) -> ArmResult<JointPositions> {
    let mode = ChainMode::new(mode)?;
    Ok(KinematicsModel::default().forward(angles, mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_single_link_at_zero() {
        let positions = forward_kinematics(&JointAngles::zeros(), 1).unwrap();
        let ee = positions.end_effector();
        assert_eq!(ee, Point::new(0.0, 0.0, 4.3));
        assert_eq!(positions.base(), Point::origin());
    }

    #[test]
    fn test_full_chain_at_zero_points_straight_up() {
        let positions = forward_kinematics(&JointAngles::zeros(), 4).unwrap();

        assert_relative_eq!(positions.0[1], Point::new(0.0, 0.0, 4.3), epsilon = 1e-9);
        assert_relative_eq!(positions.0[2], Point::new(0.0, 0.0, 28.6), epsilon = 1e-9);
        assert_relative_eq!(positions.0[3], Point::new(0.0, 0.0, 55.6), epsilon = 1e-9);
    }

    #[test]
    fn test_shoulder_at_ninety_reaches_horizontally() {
        let angles = JointAngles::new([0.0, 90.0, 0.0, 0.0]);
        let positions = forward_kinematics(&angles, 4).unwrap();

        assert_relative_eq!(positions.0[2], Point::new(24.3, 0.0, 4.3), epsilon = 1e-9);
        assert_relative_eq!(positions.end_effector(), Point::new(51.3, 0.0, 4.3), epsilon = 1e-9);
    }

    #[test]
    fn test_base_rotation_keeps_vertical_arm_on_axis() {
        let angles = JointAngles::new([137.0, 0.0, 0.0, 0.0]);
        let positions = forward_kinematics(&angles, 4).unwrap();
        assert_relative_eq!(positions.end_effector(), Point::new(0.0, 0.0, 55.6), epsilon = 1e-9);
    }

    #[test]
    fn test_truncated_chain_repeats_last_frame() {
        let angles = JointAngles::new([10.0, 45.0, -30.0, 20.0]);
        let positions = forward_kinematics(&angles, 2).unwrap();
        // Two links: entries 1..=3 all sit at the end of link 2
        assert_eq!(positions.0[1], positions.0[2]);
        assert_eq!(positions.0[2], positions.0[3]);
    }

    #[test]
    fn test_positions_match_truncated_poses() {
        let model = KinematicsModel::default();
        let angles = JointAngles::new([-50.0, 50.0, 150.0, -60.0]);
        let positions = model.forward(&angles, ChainMode::FULL);

        for k in 2..=4u8 {
            let pose = model.pose(&angles, ChainMode::new(k).unwrap());
            let expected = Point::new(pose[(0, 3)], pose[(1, 3)], pose[(2, 3)]);
            assert_eq!(positions.0[(k - 1) as usize], expected);
        }
    }

    #[test]
    fn test_deterministic() {
        let angles = JointAngles::new([12.5, -33.0, 181.0, 354.9]);
        let a = forward_kinematics(&angles, 4).unwrap();
        let b = forward_kinematics(&angles, 4).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert_eq!(p.x.to_bits(), q.x.to_bits());
            assert_eq!(p.y.to_bits(), q.y.to_bits());
            assert_eq!(p.z.to_bits(), q.z.to_bits());
        }
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(matches!(
            forward_kinematics(&JointAngles::zeros(), 0),
            Err(ArmError::InvalidChainMode(0))
        ));
        assert!(matches!(
            forward_kinematics(&JointAngles::zeros(), 5),
            Err(ArmError::InvalidChainMode(5))
        ));
    }

    #[test]
    fn test_reach_never_exceeds_link_sum() {
        let model = KinematicsModel::default();
        for a in (-180..=180).step_by(45) {
            for b in (-180..=180).step_by(45) {
                let angles = JointAngles::new([a as f64, b as f64, (a + b) as f64, (a - b) as f64]);
                let ee = model.forward(&angles, ChainMode::FULL).end_effector();
                assert!(ee.coords.norm() <= 55.6 + 1e-9);
            }
        }
    }

    #[test]
    fn test_lerp_endpoints() {
        let from = JointAngles::zeros();
        let to = JointAngles::new([10.0, -20.0, 30.0, 355.0]);
        assert_eq!(from.lerp(&to, 0.0), from);
        assert_relative_eq!(from.lerp(&to, 0.5).0[3], 177.5);
    }
}
