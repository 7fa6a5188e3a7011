//! Detection Reset Coordination
//!
//! Runs the reset protocol for a detection session:
//! - Confirmation with the user
//! - Backend counter reset and local display clearing
//! - Stream and poll loop restart for camera sessions, gated on the
//!   backend's stop acknowledgement

pub mod collaborators;
pub mod context;
pub mod coordinator;
pub mod gate;

pub use collaborators::{AutoConfirm, Confirm, NoticeLevel, Notifier, TracingNotifier};
pub use context::{DetectionType, SessionContext, SharedContext, DEFAULT_USERNAME};
pub use coordinator::{ResetCoordinator, ResetOutcome, ResetState};
pub use gate::RestartGate;

use detector_client::BackendError;
use thiserror::Error;

/// Reset error types
#[derive(Error, Debug)]
pub enum ResetError {
    #[error("A reset is already in progress")]
    Busy,

    #[error("Reset request failed: {0}")]
    Transport(#[from] BackendError),

    /// Backend answered `success: false`; carries its message verbatim
    #[error("Reset rejected by backend: {0}")]
    Rejected(String),

    /// The restart task panicked; the stream may be left stopped
    #[error("Detection stream restart failed: {0}")]
    Restart(String),
}
