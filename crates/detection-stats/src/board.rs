//! Display board holding the rendered detection values

use crate::render::RenderedStats;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Board shared between the poll loop, the reset sequence and the renderer
pub type SharedBoard = Arc<RwLock<DisplayBoard>>;

/// Status label pair shown next to the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusLabel {
    /// e.g. "camera detection"
    pub title: String,
    /// e.g. "detecting..."
    pub state: String,
    /// e.g. "not fatigued"
    pub fatigue: String,
}

/// Current contents of the rendered surface
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayBoard {
    stats: RenderedStats,
    status: Option<StatusLabel>,
    /// Bumped on every write, lets renderers skip unchanged frames
    revision: u64,
}

impl DisplayBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a board wrapped for sharing
    pub fn shared() -> SharedBoard {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Replace all displayed values with a fresh render
    pub fn apply(&mut self, stats: RenderedStats) {
        debug!(
            "Board update: closed_eyes={} open_mouth={} level={} time={}",
            stats.closed_eyes, stats.open_mouth, stats.fatigue_indicator, stats.detection_time
        );
        self.stats = stats;
        self.revision += 1;
    }

    /// Clear every counter and reset the alert colour to "no fatigue"
    pub fn zero(&mut self) {
        self.stats = RenderedStats::zeroed();
        self.revision += 1;
    }

    pub fn set_status(&mut self, title: &str, state: &str, fatigue: &str) {
        self.status = Some(StatusLabel {
            title: title.to_string(),
            state: state.to_string(),
            fatigue: fatigue.to_string(),
        });
        self.revision += 1;
    }

    pub fn stats(&self) -> &RenderedStats {
        &self.stats
    }

    pub fn status(&self) -> Option<&StatusLabel> {
        self.status.as_ref()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
