//! Scripted in-memory backend for tests and offline runs

use crate::backend::DetectorBackend;
use crate::error::BackendError;
use crate::replies::{CurrentModelReply, ModelInfo, ModelsReply, ResetReply, StopReply};
use detection_stats::StatsResponse;
use std::future::pending;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// What a mocked endpoint answers with
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    Reply(T),
    /// Transport failure with this message
    Fail(String),
    /// Never answers
    Hang,
}

impl<T> Scripted<T> {
    async fn resolve(self) -> Result<T, BackendError> {
        match self {
            Scripted::Reply(reply) => Ok(reply),
            Scripted::Fail(message) => Err(BackendError::Http(message)),
            Scripted::Hang => {
                pending::<()>().await;
                Err(BackendError::Timeout(0))
            }
        }
    }
}

/// A call observed by the mock, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    StreamOpened(String),
    /// The stream future was dropped (connection closed by the client)
    StreamClosed(String),
    FetchStats(String),
    Reset(String),
    StopDetection(String),
    /// The stop request finished, after any scripted delay
    StopCompleted(String),
    CurrentModel,
    ListModels,
}

#[derive(Debug, Clone)]
struct Script {
    /// When set, `stream_url` fails with this message
    stream_url_error: Option<String>,
    stats: Scripted<StatsResponse>,
    reset: Scripted<ResetReply>,
    stop: Scripted<StopReply>,
    stop_delay: Duration,
    current_model: Scripted<CurrentModelReply>,
    models: Scripted<ModelsReply>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            stream_url_error: None,
            stats: Scripted::Reply(StatsResponse {
                success: true,
                fatigue_level: Some("none".to_string()),
                ..Default::default()
            }),
            reset: Scripted::Reply(ResetReply {
                success: true,
                message: Some("reset".to_string()),
                restart_detection: None,
            }),
            stop: Scripted::Reply(StopReply {
                success: true,
                message: None,
            }),
            stop_delay: Duration::ZERO,
            current_model: Scripted::Reply(CurrentModelReply {
                success: true,
                current_model: Some("best.pt".to_string()),
                message: None,
            }),
            models: Scripted::Reply(ModelsReply {
                success: true,
                models: vec![ModelInfo {
                    name: "best.pt".to_string(),
                    size_mb: Some(6.2),
                    upload_time: None,
                }],
                message: None,
            }),
        }
    }
}

type Journal = Arc<Mutex<Vec<BackendCall>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Records `StreamClosed` when the stream future is dropped
struct CloseGuard {
    journal: Journal,
    url: String,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        lock(&self.journal).push(BackendCall::StreamClosed(std::mem::take(&mut self.url)));
    }
}

/// In-memory detector backend
///
/// Streams stay open until dropped. Every other endpoint answers from a
/// script that tests can change between calls.
#[derive(Debug, Default)]
pub struct MockBackend {
    script: Mutex<Script>,
    journal: Journal,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_stream_url_error(&self, error: Option<String>) {
        lock(&self.script).stream_url_error = error;
    }

    pub fn set_stats(&self, stats: Scripted<StatsResponse>) {
        lock(&self.script).stats = stats;
    }

    pub fn set_reset(&self, reset: Scripted<ResetReply>) {
        lock(&self.script).reset = reset;
    }

    pub fn set_stop(&self, stop: Scripted<StopReply>) {
        lock(&self.script).stop = stop;
    }

    /// Delay before the stop request answers
    pub fn set_stop_delay(&self, delay: Duration) {
        lock(&self.script).stop_delay = delay;
    }

    pub fn set_current_model(&self, reply: Scripted<CurrentModelReply>) {
        lock(&self.script).current_model = reply;
    }

    /// Snapshot of every call so far
    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.journal).clone()
    }

    /// Number of recorded calls matching `predicate`
    pub fn count(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        lock(&self.journal).iter().filter(|call| predicate(call)).count()
    }

    pub fn clear_calls(&self) {
        lock(&self.journal).clear();
    }

    fn record(&self, call: BackendCall) {
        debug!("Mock backend call: {:?}", call);
        lock(&self.journal).push(call);
    }

    fn script(&self) -> Script {
        lock(&self.script).clone()
    }
}

impl DetectorBackend for MockBackend {
    fn stream_url(&self, model: &str, username: &str) -> Result<String, BackendError> {
        if let Some(message) = lock(&self.script).stream_url_error.clone() {
            return Err(BackendError::InvalidUrl(message));
        }
        Ok(format!(
            "mock://detector/api/stream/camera?index=0&model={}&username={}",
            model, username
        ))
    }

    async fn pull_stream(&self, url: &str) -> Result<u64, BackendError> {
        self.record(BackendCall::StreamOpened(url.to_string()));
        let _guard = CloseGuard {
            journal: Arc::clone(&self.journal),
            url: url.to_string(),
        };
        pending::<()>().await;
        Ok(0)
    }

    async fn fetch_stats(&self, username: &str) -> Result<StatsResponse, BackendError> {
        self.record(BackendCall::FetchStats(username.to_string()));
        self.script().stats.resolve().await
    }

    async fn reset(&self, username: &str) -> Result<ResetReply, BackendError> {
        self.record(BackendCall::Reset(username.to_string()));
        self.script().reset.resolve().await
    }

    async fn stop_detection(&self, username: &str) -> Result<StopReply, BackendError> {
        self.record(BackendCall::StopDetection(username.to_string()));
        let script = self.script();
        if !script.stop_delay.is_zero() {
            tokio::time::sleep(script.stop_delay).await;
        }
        let result = script.stop.resolve().await;
        self.record(BackendCall::StopCompleted(username.to_string()));
        result
    }

    async fn current_model(&self) -> Result<CurrentModelReply, BackendError> {
        self.record(BackendCall::CurrentModel);
        self.script().current_model.resolve().await
    }

    async fn list_models(&self) -> Result<ModelsReply, BackendError> {
        self.record(BackendCall::ListModels);
        self.script().models.resolve().await
    }
}
