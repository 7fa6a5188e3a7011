//! Reset Coordinator Implementation

use crate::collaborators::{Confirm, NoticeLevel, Notifier};
use crate::context::{DetectionType, SharedContext};
use crate::gate::RestartGate;
use crate::ResetError;
use detection_stats::SharedBoard;
use detector_client::DetectorBackend;
use poll_scheduler::PollingScheduler;
use std::sync::Arc;
use stream_control::StreamController;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

/// Prompt shown before anything is reset
pub const RESET_PROMPT: &str =
    "Reset the current detection data? All accumulated statistics will be cleared.";

/// Reset sequence state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Idle,
    Confirming,
    Resetting,
    Restarting,
    Done,
}

impl ResetState {
    /// Whether a sequence is currently running
    pub fn in_progress(&self) -> bool {
        matches!(
            self,
            ResetState::Confirming | ResetState::Resetting | ResetState::Restarting
        )
    }
}

/// How a reset sequence ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// User declined the confirmation
    Cancelled,
    /// Counters cleared, stream and polling untouched
    Reset,
    /// Counters cleared, stream and polling restarted
    Restarted,
}

/// Marks a reset sequence as running. Dropping it before the sequence
/// reached `Done` returns the state to `Idle`.
struct ResetRun {
    state: Arc<watch::Sender<ResetState>>,
}

impl ResetRun {
    fn set(&self, state: ResetState) {
        self.state.send_replace(state);
    }
}

impl Drop for ResetRun {
    fn drop(&mut self) {
        let abandoned = self.state.send_if_modified(|state| {
            if state.in_progress() {
                *state = ResetState::Idle;
                true
            } else {
                false
            }
        });
        if abandoned {
            warn!("Reset sequence abandoned before completion, state returned to Idle");
        }
    }
}

/// Everything the restart needs, detached from the coordinator so it can
/// run to completion on its own task
struct Restart<B: DetectorBackend> {
    backend: Arc<B>,
    context: SharedContext,
    stream: Arc<Mutex<StreamController<B>>>,
    polling: Arc<Mutex<PollingScheduler<B>>>,
    notifier: Arc<dyn Notifier>,
    gate: RestartGate,
}

impl<B: DetectorBackend> Restart<B> {
    /// Stop the backend detector, the local stream and the poll loop, then
    /// start the stream and poll loop again once the gate opens.
    async fn run(self, username: String) {
        info!("Restarting camera detection stream");
        self.notifier.activity(NoticeLevel::Info, "Restarting detection stream...");

        // Not awaited here; the gate decides whether to observe it
        let stop_request = {
            let backend = Arc::clone(&self.backend);
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                match backend.stop_detection(&username).await {
                    Ok(reply) if reply.success => info!("Backend detection stopped for {}", username),
                    Ok(reply) => warn!(
                        "Backend stop reported failure: {}",
                        reply.message.as_deref().unwrap_or("no message")
                    ),
                    Err(e) => {
                        error!("Failed to stop backend detection: {}", e);
                        notifier.activity(
                            NoticeLevel::Error,
                            &format!("Failed to stop backend detection: {}", e),
                        );
                    }
                }
            })
        };

        self.stream.lock().await.stop_stream();
        self.polling.lock().await.stop_polling();

        self.gate.wait(stop_request).await;

        // Session may have changed model or user while waiting
        let (username, model) = {
            let ctx = self.context.read().await;
            (ctx.username.clone(), ctx.model.clone())
        };
        info!("Starting detection stream again for {}", username);
        self.stream.lock().await.start_stream(&model, &username);
        self.polling.lock().await.start_polling(&username);

        self.notifier.activity(NoticeLevel::Success, "Detection stream restart complete");
    }
}

/// Coordinates reset and restart of a detection session
pub struct ResetCoordinator<B: DetectorBackend> {
    backend: Arc<B>,
    context: SharedContext,
    stream: Arc<Mutex<StreamController<B>>>,
    polling: Arc<Mutex<PollingScheduler<B>>>,
    board: SharedBoard,
    notifier: Arc<dyn Notifier>,
    gate: RestartGate,
    state: Arc<watch::Sender<ResetState>>,
}

impl<B: DetectorBackend> ResetCoordinator<B> {
    pub fn new(
        backend: Arc<B>,
        context: SharedContext,
        stream: Arc<Mutex<StreamController<B>>>,
        polling: Arc<Mutex<PollingScheduler<B>>>,
        board: SharedBoard,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(ResetState::Idle);
        Self {
            backend,
            context,
            stream,
            polling,
            board,
            notifier,
            gate: RestartGate::default(),
            state: Arc::new(state),
        }
    }

    pub fn with_gate(mut self, gate: RestartGate) -> Self {
        info!("Reset restart gate: {:?}", gate);
        self.gate = gate;
        self
    }

    pub fn state(&self) -> ResetState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<ResetState> {
        self.state.subscribe()
    }

    /// Run the full reset sequence.
    ///
    /// Every failure returns the state to `Idle` after telling the user.
    /// Nothing is retried. Dropping the future also returns the state to
    /// `Idle`; a restart that already began still runs to completion.
    pub async fn reset_detection<C: Confirm>(&self, confirm: &C) -> Result<ResetOutcome, ResetError> {
        let run = self.begin()?;

        let (username, detection_type) = {
            let ctx = self.context.read().await;
            (ctx.username.clone(), ctx.detection_type)
        };
        info!(
            "Reset requested (username={}, detection_type={:?})",
            username, detection_type
        );

        if !confirm.confirm(RESET_PROMPT).await {
            info!("Reset cancelled by user");
            run.set(ResetState::Idle);
            return Ok(ResetOutcome::Cancelled);
        }

        run.set(ResetState::Resetting);
        self.notifier.toast(NoticeLevel::Info, "Resetting detection data...");

        let reply = match self.backend.reset(&username).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Reset request failed: {}", e);
                let message = format!("Reset request failed: {}", e);
                self.notifier.toast(NoticeLevel::Error, &message);
                self.notifier.activity(NoticeLevel::Error, &message);
                run.set(ResetState::Idle);
                return Err(ResetError::Transport(e));
            }
        };

        if !reply.success {
            let backend_message = reply.message.unwrap_or_default();
            warn!("Backend rejected reset: {}", backend_message);
            let message = format!("Reset failed: {}", backend_message);
            self.notifier.toast(NoticeLevel::Error, &message);
            self.notifier.activity(NoticeLevel::Error, &message);
            run.set(ResetState::Idle);
            return Err(ResetError::Rejected(backend_message));
        }

        self.clear_display(detection_type).await;

        let restart = reply.restart_requested() && detection_type == Some(DetectionType::Camera);
        let (run, outcome) = if restart {
            run.set(ResetState::Restarting);
            (self.restart(username.clone(), run).await?, ResetOutcome::Restarted)
        } else {
            (run, ResetOutcome::Reset)
        };

        let message = match outcome {
            ResetOutcome::Restarted => "Detection data reset, detection stream restarted",
            _ => "Detection data reset",
        };
        self.notifier.toast(NoticeLevel::Success, message);
        self.notifier.activity(NoticeLevel::Success, message);
        info!(
            target: "audit",
            username = %username,
            restarted = restart,
            "detection data reset"
        );

        run.set(ResetState::Done);
        Ok(outcome)
    }

    /// Enter `Confirming` unless a sequence is already running
    fn begin(&self) -> Result<ResetRun, ResetError> {
        let mut busy = false;
        self.state.send_if_modified(|state| {
            if state.in_progress() {
                busy = true;
                false
            } else {
                *state = ResetState::Confirming;
                true
            }
        });

        if busy {
            warn!("Reset ignored, another reset is in progress");
            return Err(ResetError::Busy);
        }
        Ok(ResetRun {
            state: Arc::clone(&self.state),
        })
    }

    async fn clear_display(&self, detection_type: Option<DetectionType>) {
        let mut board = self.board.write().await;
        board.zero();
        if let Some(kind) = detection_type {
            board.set_status(&format!("{} detection", kind.label()), "detecting...", "not fatigued");
        }
    }

    /// Run the restart on its own task. The task owns `run`, so the state
    /// stays `Restarting` until the stream and poll loop are back even if
    /// the caller stops waiting.
    async fn restart(&self, username: String, run: ResetRun) -> Result<ResetRun, ResetError> {
        let restart = Restart {
            backend: Arc::clone(&self.backend),
            context: Arc::clone(&self.context),
            stream: Arc::clone(&self.stream),
            polling: Arc::clone(&self.polling),
            notifier: Arc::clone(&self.notifier),
            gate: self.gate,
        };
        let task = tokio::spawn(async move {
            restart.run(username).await;
            run
        });

        task.await.map_err(|e| {
            error!("Restart task failed: {}", e);
            self.notifier
                .activity(NoticeLevel::Error, &format!("Detection stream restart failed: {}", e));
            ResetError::Restart(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::AutoConfirm;
    use crate::context::SessionContext;
    use detection_stats::{colors, DisplayBoard, RenderedStats};
    use detector_client::{BackendCall, MockBackend, ResetReply, Scripted};
    use poll_scheduler::SchedulerConfig;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::time::sleep;

    #[derive(Default)]
    struct RecordingNotifier {
        toasts: StdMutex<Vec<(NoticeLevel, String)>>,
        activity: StdMutex<Vec<(NoticeLevel, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn toast(&self, level: NoticeLevel, message: &str) {
            self.toasts.lock().unwrap().push((level, message.to_string()));
        }

        fn activity(&self, level: NoticeLevel, message: &str) {
            self.activity.lock().unwrap().push((level, message.to_string()));
        }
    }

    impl RecordingNotifier {
        fn last_toast(&self) -> (NoticeLevel, String) {
            self.toasts.lock().unwrap().last().cloned().unwrap()
        }
    }

    struct SlowConfirm;

    impl Confirm for SlowConfirm {
        async fn confirm(&self, _prompt: &str) -> bool {
            sleep(Duration::from_secs(1)).await;
            true
        }
    }

    struct Harness {
        backend: Arc<MockBackend>,
        board: SharedBoard,
        stream: Arc<Mutex<StreamController<MockBackend>>>,
        polling: Arc<Mutex<PollingScheduler<MockBackend>>>,
        notifier: Arc<RecordingNotifier>,
        coordinator: Arc<ResetCoordinator<MockBackend>>,
    }

    async fn harness(detection_type: DetectionType, gate: RestartGate) -> Harness {
        let backend = Arc::new(MockBackend::new());
        let board = DisplayBoard::shared();
        let context = SessionContext::new("alice", "best.pt", Some(detection_type)).shared();
        let stream = Arc::new(Mutex::new(StreamController::new(Arc::clone(&backend))));
        let polling = Arc::new(Mutex::new(PollingScheduler::new(
            Arc::clone(&backend),
            Arc::clone(&board),
            SchedulerConfig::default(),
        )));
        let notifier = Arc::new(RecordingNotifier::default());

        stream.lock().await.start_stream("best.pt", "alice");
        polling.lock().await.start_polling("alice");

        let coordinator = ResetCoordinator::new(
            Arc::clone(&backend),
            context,
            Arc::clone(&stream),
            Arc::clone(&polling),
            Arc::clone(&board),
            notifier.clone(),
        )
        .with_gate(gate);

        Harness {
            backend,
            board,
            stream,
            polling,
            notifier,
            coordinator: Arc::new(coordinator),
        }
    }

    fn restart_reply() -> Scripted<ResetReply> {
        Scripted::Reply(ResetReply {
            success: true,
            message: Some("reset".to_string()),
            restart_detection: Some(true),
        })
    }

    fn position(calls: &[BackendCall], predicate: impl Fn(&BackendCall) -> bool) -> Vec<usize> {
        calls
            .iter()
            .enumerate()
            .filter(|(_, call)| predicate(call))
            .map(|(i, _)| i)
            .collect()
    }

    async fn seed_board(board: &SharedBoard) {
        board.write().await.apply(RenderedStats {
            closed_eyes: "14".to_string(),
            open_mouth: "3".to_string(),
            alert_color: colors::SEVERE,
            ..RenderedStats::zeroed()
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_confirmation_changes_nothing() {
        let h = harness(DetectionType::Camera, RestartGate::fixed_delay()).await;
        seed_board(&h.board).await;

        let outcome = h.coordinator.reset_detection(&AutoConfirm(false)).await.unwrap();

        assert_eq!(outcome, ResetOutcome::Cancelled);
        assert_eq!(h.coordinator.state(), ResetState::Idle);
        assert_eq!(h.board.read().await.stats().closed_eyes, "14");
        assert_eq!(h.backend.count(|c| matches!(c, BackendCall::Reset(_))), 0);
        assert!(h.notifier.toasts.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_without_restart_zeroes_display() {
        let h = harness(DetectionType::Camera, RestartGate::fixed_delay()).await;
        seed_board(&h.board).await;
        let url_before = h.stream.lock().await.source_url().map(str::to_string);

        let outcome = h.coordinator.reset_detection(&AutoConfirm(true)).await.unwrap();

        assert_eq!(outcome, ResetOutcome::Reset);
        assert_eq!(h.coordinator.state(), ResetState::Done);

        let board = h.board.read().await;
        let stats = board.stats();
        for value in [
            &stats.closed_eyes,
            &stats.open_mouth,
            &stats.open_eyes,
            &stats.closed_mouth,
            &stats.total_detections,
        ] {
            assert_eq!(value, "0");
        }
        assert_eq!(stats.detection_time, "0s");
        assert_eq!(stats.alert_color, "#00FF00");
        assert_eq!(board.status().unwrap().title, "camera detection");
        assert_eq!(board.status().unwrap().fatigue, "not fatigued");

        // Stream and polling were left alone
        assert_eq!(h.stream.lock().await.source_url().map(str::to_string), url_before);
        assert!(h.polling.lock().await.is_polling());
        assert_eq!(h.backend.count(|c| matches!(c, BackendCall::StreamClosed(_))), 0);
        assert_eq!(h.backend.count(|c| matches!(c, BackendCall::StopDetection(_))), 0);
        assert_eq!(h.notifier.last_toast().0, NoticeLevel::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_sequence_order() {
        let h = harness(DetectionType::Camera, RestartGate::fixed_delay()).await;
        h.backend.set_reset(restart_reply());

        let coordinator = Arc::clone(&h.coordinator);
        let run = tokio::spawn(async move { coordinator.reset_detection(&AutoConfirm(true)).await });

        sleep(Duration::from_millis(10)).await;
        assert_eq!(h.coordinator.state(), ResetState::Restarting);
        assert!(!h.stream.lock().await.has_handle());
        assert!(!h.polling.lock().await.is_polling());
        assert_eq!(h.backend.count(|c| matches!(c, BackendCall::StopDetection(_))), 1);

        sleep(Duration::from_millis(2100)).await;
        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, ResetOutcome::Restarted);
        assert!(h.stream.lock().await.is_active());
        assert!(h.polling.lock().await.is_polling());

        let calls = h.backend.calls();
        let opened = position(&calls, |c| matches!(c, BackendCall::StreamOpened(_)));
        let closed = position(&calls, |c| matches!(c, BackendCall::StreamClosed(_)));
        let reset = position(&calls, |c| matches!(c, BackendCall::Reset(_)));
        assert_eq!(opened.len(), 2);
        assert_eq!(closed.len(), 1);
        assert!(reset[0] < closed[0]);
        assert!(closed[0] < opened[1]);
        assert_eq!(
            h.notifier.last_toast().1,
            "Detection data reset, detection stream restarted"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_stop_acknowledgement() {
        let h = harness(DetectionType::Camera, RestartGate::default()).await;
        h.backend.set_reset(restart_reply());
        h.backend.set_stop_delay(Duration::from_millis(3000));

        let coordinator = Arc::clone(&h.coordinator);
        let run = tokio::spawn(async move { coordinator.reset_detection(&AutoConfirm(true)).await });

        // Settle delay is over but the backend has not acknowledged yet
        sleep(Duration::from_millis(2500)).await;
        assert!(!h.stream.lock().await.has_handle());
        assert!(!h.polling.lock().await.is_polling());

        sleep(Duration::from_millis(600)).await;
        assert_eq!(run.await.unwrap().unwrap(), ResetOutcome::Restarted);
        assert!(h.stream.lock().await.is_active());

        let calls = h.backend.calls();
        let completed = position(&calls, |c| matches!(c, BackendCall::StopCompleted(_)));
        let opened = position(&calls, |c| matches!(c, BackendCall::StreamOpened(_)));
        assert!(completed[0] < opened[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_still_restarts() {
        let h = harness(DetectionType::Camera, RestartGate::default()).await;
        h.backend.set_reset(restart_reply());
        h.backend.set_stop(Scripted::Fail("connection refused".to_string()));

        let outcome = h.coordinator.reset_detection(&AutoConfirm(true)).await.unwrap();

        assert_eq!(outcome, ResetOutcome::Restarted);
        assert!(h.stream.lock().await.has_handle());
        let activity = h.notifier.activity.lock().unwrap();
        assert!(activity
            .iter()
            .any(|(level, m)| *level == NoticeLevel::Error && m.contains("connection refused")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_restart_outside_camera_mode() {
        let h = harness(DetectionType::Video, RestartGate::fixed_delay()).await;
        h.backend.set_reset(restart_reply());

        let outcome = h.coordinator.reset_detection(&AutoConfirm(true)).await.unwrap();

        assert_eq!(outcome, ResetOutcome::Reset);
        assert_eq!(h.backend.count(|c| matches!(c, BackendCall::StopDetection(_))), 0);
        assert_eq!(h.board.read().await.status().unwrap().title, "video detection");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_reset_keeps_counters() {
        let h = harness(DetectionType::Camera, RestartGate::fixed_delay()).await;
        seed_board(&h.board).await;
        h.backend.set_reset(Scripted::Reply(ResetReply {
            success: false,
            message: Some("no active detection session".to_string()),
            restart_detection: None,
        }));

        let err = h.coordinator.reset_detection(&AutoConfirm(true)).await.unwrap_err();

        assert!(matches!(err, ResetError::Rejected(ref m) if m == "no active detection session"));
        assert_eq!(h.coordinator.state(), ResetState::Idle);
        assert_eq!(h.board.read().await.stats().closed_eyes, "14");
        assert_eq!(h.board.read().await.stats().alert_color, colors::SEVERE);

        let (level, message) = h.notifier.last_toast();
        assert_eq!(level, NoticeLevel::Error);
        assert!(message.contains("no active detection session"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_returns_to_idle() {
        let h = harness(DetectionType::Camera, RestartGate::fixed_delay()).await;
        h.backend.set_reset(Scripted::Fail("connection refused".to_string()));

        let err = h.coordinator.reset_detection(&AutoConfirm(true)).await.unwrap_err();

        assert!(matches!(err, ResetError::Transport(_)));
        assert_eq!(h.coordinator.state(), ResetState::Idle);
        assert_eq!(h.notifier.last_toast().0, NoticeLevel::Error);
        assert!(h.stream.lock().await.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_reset_is_rejected() {
        let h = harness(DetectionType::Camera, RestartGate::fixed_delay()).await;

        let coordinator = Arc::clone(&h.coordinator);
        let first = tokio::spawn(async move { coordinator.reset_detection(&SlowConfirm).await });
        sleep(Duration::from_millis(10)).await;

        let second = h.coordinator.reset_detection(&AutoConfirm(true)).await;
        assert!(matches!(second, Err(ResetError::Busy)));

        assert_eq!(first.await.unwrap().unwrap(), ResetOutcome::Reset);
        // A finished sequence can be started again
        assert!(h.coordinator.reset_detection(&AutoConfirm(false)).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_reset_returns_to_idle() {
        let h = harness(DetectionType::Camera, RestartGate::fixed_delay()).await;

        let abandoned = tokio::time::timeout(
            Duration::from_millis(500),
            h.coordinator.reset_detection(&SlowConfirm),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(h.coordinator.state(), ResetState::Idle);

        let outcome = h.coordinator.reset_detection(&AutoConfirm(true)).await.unwrap();
        assert_eq!(outcome, ResetOutcome::Reset);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_caller_does_not_strand_restart() {
        let h = harness(DetectionType::Camera, RestartGate::default()).await;
        h.backend.set_reset(restart_reply());
        h.backend.set_stop_delay(Duration::from_millis(3000));

        let coordinator = Arc::clone(&h.coordinator);
        let run = tokio::spawn(async move { coordinator.reset_detection(&AutoConfirm(true)).await });

        sleep(Duration::from_millis(100)).await;
        assert_eq!(h.coordinator.state(), ResetState::Restarting);
        assert!(!h.stream.lock().await.has_handle());
        run.abort();
        let _ = run.await;

        // Still restarting until the gate opens
        assert!(matches!(
            h.coordinator.reset_detection(&AutoConfirm(true)).await,
            Err(ResetError::Busy)
        ));

        sleep(Duration::from_millis(3100)).await;
        assert!(h.stream.lock().await.is_active());
        assert!(h.polling.lock().await.is_polling());
        assert_eq!(h.coordinator.state(), ResetState::Idle);

        h.backend.set_reset(Scripted::Reply(ResetReply {
            success: true,
            message: None,
            restart_detection: None,
        }));
        let outcome = h.coordinator.reset_detection(&AutoConfirm(true)).await.unwrap();
        assert_eq!(outcome, ResetOutcome::Reset);
    }
}
