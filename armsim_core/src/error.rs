//! Error types for the ARMSIM core

use thiserror::Error;

/// Errors produced by the simulation engine and its collaborators
#[derive(Debug, Error)]
pub enum ArmError {
    /// Joint-chain mode outside 1..=4
    #[error("invalid chain mode {0}: expected 1..=4")]
    InvalidChainMode(u8),

    /// A motion request that can never be executed (e.g. zero steps)
    #[error("invalid motion: {0}")]
    InvalidMotion(String),

    /// `move_to` was called while moving and the policy is `reject`
    #[error("motion already in progress ({remaining} steps remaining)")]
    MotionInProgress { remaining: usize },

    /// Rejection sampling could not find a reachable point within budget
    #[error("objective sampling exhausted after {attempts} attempts (radius {radius})")]
    SamplingExhausted { attempts: u64, radius: f64 },

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Action vector with the wrong number of components
    #[error("action has {got} components, expected {expected}")]
    ActionDimension { expected: usize, got: usize },

    /// Malformed visualization datagram
    #[error("wire protocol error: {0}")]
    Wire(String),

    /// Engine lifecycle misuse
    #[error("engine is already running")]
    AlreadyRunning,

    #[error("failed to spawn task '{name}': {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Result alias used across the crate
pub type ArmResult<T> = Result<T, ArmError>;
