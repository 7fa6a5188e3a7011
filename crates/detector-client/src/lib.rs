//! Detector Backend Client
//!
//! Request/response primitives for the detector backend's HTTP surface:
//! the camera stream, counter polling, reset, and stop. `HttpBackend`
//! talks to a real server; `MockBackend` scripts replies and journals
//! every call for tests.

mod backend;
mod error;
mod http;
mod mock;
mod replies;

pub use backend::DetectorBackend;
pub use error::BackendError;
pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend, Scripted};
pub use replies::{CurrentModelReply, ModelInfo, ModelsReply, ResetReply, StopReply};

/// Backend endpoint paths
pub mod endpoints {
    pub const CAMERA_STREAM: &str = "api/stream/camera";
    pub const DETECTED_OBJECTS: &str = "api/get_detected_objects";
    pub const CAMERA_RESET: &str = "api/camera/reset";
    pub const CAMERA_STOP: &str = "api/detect/camera/stop";
    pub const MODELS: &str = "api/models";
    pub const CURRENT_MODEL: &str = "api/models/current";
}

/// Camera index requested from the backend
pub const CAMERA_INDEX: u32 = 0;
