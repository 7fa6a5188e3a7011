//! Detector backend abstraction

use crate::error::BackendError;
use crate::replies::{CurrentModelReply, ModelsReply, ResetReply, StopReply};
use detection_stats::StatsResponse;
use std::future::Future;

/// Request/response primitives the session controller needs from the
/// detector backend.
///
/// Implementations are shared between spawned tasks behind an `Arc`, so
/// every returned future must be `Send`.
pub trait DetectorBackend: Send + Sync + 'static {
    /// Build the camera stream URL for a model and user
    fn stream_url(&self, model: &str, username: &str) -> Result<String, BackendError>;

    /// Open the stream at `url` and consume it until the server closes it.
    ///
    /// Dropping the future closes the connection. Returns the number of
    /// bytes received.
    fn pull_stream(&self, url: &str) -> impl Future<Output = Result<u64, BackendError>> + Send;

    /// `GET /api/get_detected_objects`
    fn fetch_stats(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<StatsResponse, BackendError>> + Send;

    /// `POST /api/camera/reset`
    fn reset(&self, username: &str) -> impl Future<Output = Result<ResetReply, BackendError>> + Send;

    /// `POST /api/detect/camera/stop`
    fn stop_detection(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<StopReply, BackendError>> + Send;

    /// `GET /api/models/current`
    fn current_model(&self) -> impl Future<Output = Result<CurrentModelReply, BackendError>> + Send;

    /// `GET /api/models`
    fn list_models(&self) -> impl Future<Output = Result<ModelsReply, BackendError>> + Send;
}
