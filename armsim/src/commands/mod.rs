pub mod listen;
pub mod rollout;
pub mod run;
