//! Route recording: the per-call recorder and its errors.

pub mod recorder;

use thiserror::Error;

pub use recorder::{RecorderState, RouteRecorder};

/// Errors raised by route recording.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// An operation was called in a state that does not accept it.
    #[error("route recorder cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: RecorderState,
    },
}
