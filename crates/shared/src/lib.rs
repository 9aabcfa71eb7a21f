//! Types shared between the orchestrator core and the control-plane relay.

pub mod protocol;

pub use protocol::*;
