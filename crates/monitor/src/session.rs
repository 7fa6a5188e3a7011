//! Monitor session: owns the context, display board, stream, poll loop
//! and reset coordinator for one user.

use crate::MonitorError;
use detection_stats::{DisplayBoard, SharedBoard};
use detector_client::{BackendError, DetectorBackend, ModelsReply};
use poll_scheduler::{PollSnapshot, PollingScheduler, SchedulerConfig};
use reset_coordinator::{
    Confirm, NoticeLevel, Notifier, ResetCoordinator, ResetError, ResetOutcome, ResetState,
    RestartGate, SessionContext, SharedContext,
};
use std::sync::Arc;
use stream_control::StreamController;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Point-in-time view of the session for the `status` command
#[derive(Debug, Clone)]
pub struct SessionStatus {
    pub context: SessionContext,
    pub board: DisplayBoard,
    pub stream_url: Option<String>,
    pub stream_active: bool,
    pub polling: bool,
    pub poll: PollSnapshot,
    pub reset_state: ResetState,
}

/// A live detection session
pub struct MonitorSession<B: DetectorBackend> {
    backend: Arc<B>,
    context: SharedContext,
    board: SharedBoard,
    stream: Arc<Mutex<StreamController<B>>>,
    polling: Arc<Mutex<PollingScheduler<B>>>,
    coordinator: ResetCoordinator<B>,
    notifier: Arc<dyn Notifier>,
}

impl<B: DetectorBackend> MonitorSession<B> {
    pub fn new(
        backend: Arc<B>,
        context: SessionContext,
        polling: SchedulerConfig,
        gate: RestartGate,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        info!(
            "Creating monitor session for {} ({:?})",
            context.username, context.detection_type
        );
        let context = context.shared();
        let board = DisplayBoard::shared();
        let stream = Arc::new(Mutex::new(StreamController::new(Arc::clone(&backend))));
        let polling = Arc::new(Mutex::new(PollingScheduler::new(
            Arc::clone(&backend),
            Arc::clone(&board),
            polling,
        )));
        let coordinator = ResetCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&context),
            Arc::clone(&stream),
            Arc::clone(&polling),
            Arc::clone(&board),
            Arc::clone(&notifier),
        )
        .with_gate(gate);

        Self {
            backend,
            context,
            board,
            stream,
            polling,
            coordinator,
            notifier,
        }
    }

    /// Fill in the model from the backend when none is configured
    pub async fn resolve_model(&self) -> Result<String, MonitorError> {
        let configured = self.context.read().await.model.clone();
        if !configured.is_empty() {
            return Ok(configured);
        }

        let reply = self.backend.current_model().await?;
        match reply.current_model.filter(|m| reply.success && !m.is_empty()) {
            Some(model) => {
                info!("Using backend's current model {}", model);
                self.context.write().await.model = model.clone();
                Ok(model)
            }
            None => Err(MonitorError::NoModel),
        }
    }

    /// Start the stream and poll loop for a camera session
    pub async fn start(&self) {
        let ctx = self.context.read().await.clone();
        if !ctx.is_camera() {
            warn!(
                "Live detection only runs for camera sessions (current: {:?})",
                ctx.detection_type
            );
            return;
        }

        self.stream.lock().await.start_stream(&ctx.model, &ctx.username);
        self.polling.lock().await.start_polling(&ctx.username);
        self.board
            .write()
            .await
            .set_status("camera detection", "detecting...", "-");
        self.notifier
            .activity(NoticeLevel::Success, "Backend detection stream started");
    }

    /// Stop the stream and poll loop, and ask the backend to stop detecting
    pub async fn stop(&self) {
        let username = self.context.read().await.username.clone();
        self.stream.lock().await.stop_stream();
        self.polling.lock().await.stop_polling();

        match self.backend.stop_detection(&username).await {
            Ok(reply) if reply.success => info!("Backend detection stopped for {}", username),
            Ok(reply) => warn!(
                "Backend stop reported failure: {}",
                reply.message.as_deref().unwrap_or("no message")
            ),
            Err(e) => warn!("Failed to stop backend detection: {}", e),
        }
        self.board
            .write()
            .await
            .set_status("camera detection", "stopped", "-");
        self.notifier.activity(NoticeLevel::Info, "Detection stopped");
    }

    pub async fn reset<C: Confirm>(&self, confirm: &C) -> Result<ResetOutcome, ResetError> {
        self.coordinator.reset_detection(confirm).await
    }

    pub async fn models(&self) -> Result<ModelsReply, BackendError> {
        self.backend.list_models().await
    }

    pub async fn status(&self) -> SessionStatus {
        let context = self.context.read().await.clone();
        let board = self.board.read().await.clone();
        let (stream_url, stream_active) = {
            let stream = self.stream.lock().await;
            (stream.source_url().map(str::to_string), stream.is_active())
        };
        let (polling, poll) = {
            let polling = self.polling.lock().await;
            (polling.is_polling(), polling.counters())
        };

        SessionStatus {
            context,
            board,
            stream_url,
            stream_active,
            polling,
            poll,
            reset_state: self.coordinator.state(),
        }
    }

    pub fn board(&self) -> SharedBoard {
        Arc::clone(&self.board)
    }

    pub fn context(&self) -> SharedContext {
        Arc::clone(&self.context)
    }
}
