//! Stream controller implementation

use crate::STREAM_ELEMENT_ID;
use detector_client::DetectorBackend;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// An open camera stream. Dropping the handle closes the connection.
#[derive(Debug)]
pub struct StreamHandle {
    source_url: String,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn element_id(&self) -> &'static str {
        STREAM_ELEMENT_ID
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// False once the server has closed the stream or it failed
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Controller for the single camera stream slot
pub struct StreamController<B: DetectorBackend> {
    backend: Arc<B>,
    slot: Option<StreamHandle>,
}

impl<B: DetectorBackend> StreamController<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            slot: None,
        }
    }

    /// Open the camera stream for `model` and `username`.
    ///
    /// An empty model is logged and ignored. Otherwise any stream already
    /// open is closed first, even if the new URL then cannot be built.
    pub fn start_stream(&mut self, model: &str, username: &str) {
        if model.is_empty() {
            error!("No detection model selected, camera stream not started");
            return;
        }

        if let Some(previous) = self.slot.take() {
            debug!("Closing previous camera stream {}", previous.source_url);
            drop(previous);
        }

        let url = match self.backend.stream_url(model, username) {
            Ok(url) => url,
            Err(e) => {
                error!("Cannot build camera stream URL: {}", e);
                return;
            }
        };

        let backend = Arc::clone(&self.backend);
        let task_url = url.clone();
        let task = tokio::spawn(async move {
            match backend.pull_stream(&task_url).await {
                Ok(bytes) => info!("Camera stream ended by backend after {} bytes", bytes),
                Err(e) => warn!("Camera stream failed: {}", e),
            }
        });

        info!("Backend camera stream started: {}", url);
        self.slot = Some(StreamHandle {
            source_url: url,
            task,
        });
    }

    /// Close the camera stream if one is open. Safe to call repeatedly.
    pub fn stop_stream(&mut self) {
        match self.slot.take() {
            Some(handle) => {
                info!("Backend camera stream stopped: {}", handle.source_url);
                drop(handle);
            }
            None => debug!("No camera stream to stop"),
        }
    }

    /// Whether a stream handle exists and is still loading
    pub fn is_active(&self) -> bool {
        self.slot.as_ref().is_some_and(StreamHandle::is_active)
    }

    pub fn has_handle(&self) -> bool {
        self.slot.is_some()
    }

    pub fn source_url(&self) -> Option<&str> {
        self.slot.as_ref().map(StreamHandle::source_url)
    }
}

impl<B: DetectorBackend> Drop for StreamController<B> {
    fn drop(&mut self) {
        self.stop_stream();
    }
}
