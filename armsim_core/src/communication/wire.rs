//! Visualization wire format
//!
//! Every datagram is a JSON array of numbers whose length is a multiple of
//! three. Read as rows of three:
//!
//! - control: one row `[env_count, objective_count, code]`
//! - frame: header row `[env_index, objective_count, trajectory_reset]`, four
//!   joint rows, `objective_count` objective rows, then any number of new
//!   trajectory rows.

use crate::error::{ArmError, ArmResult};
use crate::kinematics::Point;
use crate::scheduling::SimSnapshot;

/// Rows before the objectives in a frame: header plus four joints
const FRAME_PREFIX_ROWS: usize = 5;

/// Largest count or index a datagram may carry. A 64 KiB datagram cannot
/// hold more rows than this.
pub const MAX_WIRE_COUNT: usize = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    Shutdown = 2,
    Init = 3,
}

impl ControlCode {
    fn from_value(value: f64) -> Option<Self> {
        if value == 2.0 {
            Some(ControlCode::Shutdown)
        } else if value == 3.0 {
            Some(ControlCode::Init)
        } else {
            None
        }
    }
}

/// One environment's state as sent to the visualizer
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub env_index: usize,
    /// Receiver must drop its trajectory before appending
    pub reset_trajectory: bool,
    pub joints: [Point; 4],
    pub objectives: Vec<Point>,
    /// Trajectory points appended since the previous frame
    pub trajectory: Vec<Point>,
}

impl Frame {
    /// Build a frame from `snapshot`.
    ///
    /// With `cursor` set, only trajectory points appended after it are
    /// included; otherwise the whole retained trajectory is sent and the
    /// reset flag is raised. At most `max_points` of the newest points are
    /// kept. Dropping older points also raises the reset flag so the
    /// receiver restarts from a contiguous tail instead of keeping a gap.
    pub fn from_snapshot(
        env_index: usize,
        snapshot: &SimSnapshot,
        cursor: Option<u64>,
        max_points: usize,
    ) -> Self {
        let mut trajectory = match cursor {
            Some(cursor) => snapshot.trajectory.since(cursor),
            None => snapshot.trajectory.to_vec(),
        };
        let truncated = trajectory.len() > max_points;
        if truncated {
            trajectory.drain(..trajectory.len() - max_points);
        }

        Self {
            env_index,
            reset_trajectory: cursor.is_none() || truncated,
            joints: snapshot.joint_positions.0,
            objectives: snapshot.objectives.positions(),
            trajectory,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Control {
        env_count: usize,
        objective_count: usize,
        code: ControlCode,
    },
    Frame(Frame),
}

impl WireMessage {
    pub fn init(env_count: usize, objective_count: usize) -> Self {
        WireMessage::Control {
            env_count,
            objective_count,
            code: ControlCode::Init,
        }
    }

    pub fn shutdown(env_count: usize) -> Self {
        WireMessage::Control {
            env_count,
            objective_count: 0,
            code: ControlCode::Shutdown,
        }
    }

    /// Flat numeric representation
    pub fn to_values(&self) -> Vec<f64> {
        match self {
            WireMessage::Control {
                env_count,
                objective_count,
                code,
            } => vec![*env_count as f64, *objective_count as f64, *code as u8 as f64],
            WireMessage::Frame(frame) => {
                let rows = FRAME_PREFIX_ROWS + frame.objectives.len() + frame.trajectory.len();
                let mut values = Vec::with_capacity(rows * 3);
                values.extend([
                    frame.env_index as f64,
                    frame.objectives.len() as f64,
                    if frame.reset_trajectory { 1.0 } else { 0.0 },
                ]);
                for p in frame
                    .joints
                    .iter()
                    .chain(&frame.objectives)
                    .chain(&frame.trajectory)
                {
                    values.extend([p.x, p.y, p.z]);
                }
                values
            }
        }
    }

    pub fn from_values(values: &[f64]) -> ArmResult<Self> {
        if values.is_empty() || values.len() % 3 != 0 {
            return Err(ArmError::Wire(format!(
                "expected a non-empty multiple of 3 values, got {}",
                values.len()
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
            return Err(ArmError::Wire(format!("non-finite value {}", bad)));
        }

        let rows: Vec<Point> = values
            .chunks_exact(3)
            .map(|c| Point::new(c[0], c[1], c[2]))
            .collect();
        let header = rows[0];

        if rows.len() == 1 {
            let code = ControlCode::from_value(header.z).ok_or_else(|| {
                ArmError::Wire(format!("unknown control code {}", header.z))
            })?;
            return Ok(WireMessage::Control {
                env_count: as_count(header.x, "env count")?,
                objective_count: as_count(header.y, "objective count")?,
                code,
            });
        }

        let objective_count = as_count(header.y, "objective count")?;
        let objectives_end = FRAME_PREFIX_ROWS + objective_count;
        if rows.len() < objectives_end {
            return Err(ArmError::Wire(format!(
                "frame has {} rows, header announces at least {}",
                rows.len(),
                objectives_end
            )));
        }

        Ok(WireMessage::Frame(Frame {
            env_index: as_count(header.x, "env index")?,
            reset_trajectory: header.z != 0.0,
            joints: [rows[1], rows[2], rows[3], rows[4]],
            objectives: rows[FRAME_PREFIX_ROWS..objectives_end].to_vec(),
            trajectory: rows[objectives_end..].to_vec(),
        }))
    }

    /// JSON datagram payload
    pub fn encode(&self) -> ArmResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_values())?)
    }

    pub fn decode(bytes: &[u8]) -> ArmResult<Self> {
        let values: Vec<f64> = serde_json::from_slice(bytes)?;
        Self::from_values(&values)
    }
}

fn as_count(value: f64, what: &str) -> ArmResult<usize> {
    if value < 0.0 || value.fract() != 0.0 {
        return Err(ArmError::Wire(format!(
            "{} must be a non-negative integer, got {}",
            what, value
        )));
    }
    if value > MAX_WIRE_COUNT as f64 {
        return Err(ArmError::Wire(format!(
            "{} {} exceeds {}",
            what, value, MAX_WIRE_COUNT
        )));
    }
    Ok(value as usize)
}
