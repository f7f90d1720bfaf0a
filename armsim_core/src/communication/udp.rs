//! UDP transport for the visualization channel
//!
//! The publisher is fire-and-forget: datagrams to a port nobody listens on
//! are simply lost. The receiver keeps per-environment buffers that mirror
//! what the publisher has sent so far.

use super::wire::{ControlCode, Frame, WireMessage};
use crate::config::VizConfig;
use crate::error::ArmResult;
use crate::kinematics::Point;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::{debug, warn};

const UDP_BUFFER_SIZE: usize = 65536; // 64KB (max UDP packet)

/// Sends wire messages to one visualizer
#[derive(Debug)]
pub struct VizPublisher {
    socket: UdpSocket,
    remote_addr: SocketAddr,
}

impl VizPublisher {
    pub fn new(remote: impl ToSocketAddrs) -> ArmResult<Self> {
        let remote_addr = remote.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "visualizer address did not resolve")
        })?;
        let bind_addr = if remote_addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;
        debug!(%remote_addr, "visualization publisher ready");
        Ok(Self {
            socket,
            remote_addr,
        })
    }

    pub fn from_config(config: &VizConfig) -> ArmResult<Self> {
        Self::new((config.host.as_str(), config.port))
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn send(&self, message: &WireMessage) -> ArmResult<()> {
        let bytes = message.encode()?;
        self.socket.send_to(&bytes, self.remote_addr)?;
        Ok(())
    }

    pub fn send_init(&self, env_count: usize, objective_count: usize) -> ArmResult<()> {
        self.send(&WireMessage::init(env_count, objective_count))
    }

    pub fn send_shutdown(&self, env_count: usize) -> ArmResult<()> {
        self.send(&WireMessage::shutdown(env_count))
    }

    pub fn publish_frame(&self, frame: Frame) -> ArmResult<()> {
        self.send(&WireMessage::Frame(frame))
    }
}

/// Receiving end of the visualization channel
#[derive(Debug)]
pub struct VizReceiver {
    socket: UdpSocket,
}

impl VizReceiver {
    pub fn bind(addr: impl ToSocketAddrs) -> ArmResult<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> ArmResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Next message, or `None` if nothing arrived within `timeout`.
    /// Malformed datagrams are returned as errors.
    pub fn recv_timeout(&self, timeout: Duration) -> ArmResult<Option<WireMessage>> {
        self.socket.set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;
        let mut buffer = vec![0u8; UDP_BUFFER_SIZE];
        match self.socket.recv_from(&mut buffer) {
            Ok((size, _src_addr)) => WireMessage::decode(&buffer[..size]).map(Some),
            Err(ref e)
                if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Everything the visualizer knows about one environment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvBuffer {
    pub joints: Vec<Point>,
    pub objectives: Vec<Point>,
    pub trajectory: Vec<Point>,
    pub frames: u64,
}

/// Highest environment count a scene will grow to for unannounced frames
pub const MAX_SCENE_ENVS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    Initialized { env_count: usize },
    Updated { env_index: usize },
    /// Frame ignored: index beyond [`MAX_SCENE_ENVS`] or the announced count
    Dropped { env_index: usize },
    Shutdown,
}

/// Per-environment buffers rebuilt from the message stream
#[derive(Debug, Clone, Default)]
pub struct VizScene {
    envs: Vec<EnvBuffer>,
    objective_capacity: usize,
}

impl VizScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envs(&self) -> &[EnvBuffer] {
        &self.envs
    }

    pub fn env(&self, index: usize) -> Option<&EnvBuffer> {
        self.envs.get(index)
    }

    /// Objective count announced by the last init message
    pub fn objective_capacity(&self) -> usize {
        self.objective_capacity
    }

    pub fn apply(&mut self, message: WireMessage) -> SceneEvent {
        match message {
            WireMessage::Control {
                env_count,
                objective_count,
                code: ControlCode::Init,
            } => {
                if env_count > MAX_SCENE_ENVS {
                    warn!(
                        env_count,
                        max = MAX_SCENE_ENVS,
                        "init announces too many environments, capping"
                    );
                }
                self.envs = vec![EnvBuffer::default(); env_count.min(MAX_SCENE_ENVS)];
                self.objective_capacity = objective_count;
                SceneEvent::Initialized { env_count }
            }
            WireMessage::Control {
                code: ControlCode::Shutdown,
                ..
            } => SceneEvent::Shutdown,
            WireMessage::Frame(frame) => {
                let index = frame.env_index;
                if index >= MAX_SCENE_ENVS {
                    warn!(
                        env_index = index,
                        max = MAX_SCENE_ENVS,
                        "dropping frame for out-of-range environment"
                    );
                    return SceneEvent::Dropped { env_index: index };
                }
                if index >= self.envs.len() {
                    warn!(
                        env_index = index,
                        envs = self.envs.len(),
                        "frame for unknown environment, growing buffers"
                    );
                    self.envs.resize(index + 1, EnvBuffer::default());
                }

                let env = &mut self.envs[index];
                env.joints = frame.joints.to_vec();
                env.objectives = frame.objectives;
                if frame.reset_trajectory {
                    env.trajectory.clear();
                }
                env.trajectory.extend(frame.trajectory);
                env.frames += 1;
                SceneEvent::Updated { env_index: index }
            }
        }
    }
}
