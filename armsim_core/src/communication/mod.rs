//! Visualization channel: wire codec and UDP transport

pub mod udp;
pub mod wire;

pub use udp::{EnvBuffer, SceneEvent, VizPublisher, VizReceiver, VizScene, MAX_SCENE_ENVS};
pub use wire::{ControlCode, Frame, WireMessage, MAX_WIRE_COUNT};
