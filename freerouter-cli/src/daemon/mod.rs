//! Proxy supervision
//!
//! Handles the proxy lifecycle including:
//! - State file persistence
//! - Spawning and readiness detection
//! - Stopping and log following

mod process;
mod state;

pub use process::{
    LaunchSpec, LogCursor, READY_TIMEOUT, Readiness, STOP_TIMEOUT, StopOutcome, spawn,
    tail_lines, terminate, wait_for_ready,
};
pub use state::{Liveness, ProxyState, clear_state, is_process_alive, liveness, write_state};
