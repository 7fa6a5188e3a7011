//! Detection Statistics
//!
//! Typed counter payloads returned by the detector backend, the mapping
//! from those payloads to display values and colour codes, and the
//! display board the rendered values are written to.

pub mod board;
pub mod payload;
pub mod render;

pub use board::{DisplayBoard, SharedBoard, StatusLabel};
pub use payload::{DetectionInfo, DetectionStats, FatigueIndicator, FatigueLevel, StatsResponse};
pub use render::{fatigue_color, format_elapsed, render, RenderedStats};

/// Colour codes used on the display board
pub mod colors {
    /// No fatigue
    pub const NONE: &str = "#00FF00";
    /// Mild fatigue
    pub const MILD: &str = "#FFD700";
    /// Moderate fatigue
    pub const MODERATE: &str = "#FF8C00";
    /// Severe fatigue
    pub const SEVERE: &str = "#FF0000";
    /// Informational fields and unrecognised levels
    pub const NEUTRAL: &str = "#333";
}
