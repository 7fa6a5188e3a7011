//! Mapping from poll responses to display values

use crate::colors;
use crate::payload::{DetectionStats, FatigueLevel, StatsResponse};
use serde::Serialize;

/// Frame rate the backend detector samples at
pub const FRAMES_PER_SECOND: f64 = 25.0;

/// Suffix appended to the elapsed detection time
pub const TIME_UNIT: &str = "s";

/// Indicator text shown when the backend sends no level
pub const NO_LEVEL_TEXT: &str = "none";

/// Display values for one poll response
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedStats {
    // Alert group
    pub closed_eyes: String,
    pub open_mouth: String,
    pub fatigue_indicator: String,
    // Informational group
    pub open_eyes: String,
    pub closed_mouth: String,
    pub total_detections: String,

    pub detection_time: String,
    pub alert_color: &'static str,
    pub info_color: &'static str,
}

impl RenderedStats {
    /// All counters cleared, coloured as "not fatigued"
    pub fn zeroed() -> Self {
        Self {
            closed_eyes: "0".to_string(),
            open_mouth: "0".to_string(),
            fatigue_indicator: NO_LEVEL_TEXT.to_string(),
            open_eyes: "0".to_string(),
            closed_mouth: "0".to_string(),
            total_detections: "0".to_string(),
            detection_time: format_elapsed(0),
            alert_color: colors::NONE,
            info_color: colors::NEUTRAL,
        }
    }
}

impl Default for RenderedStats {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Colour for the alert group at a given fatigue level
pub fn fatigue_color(level: FatigueLevel) -> &'static str {
    match level {
        FatigueLevel::None => colors::NONE,
        FatigueLevel::Mild => colors::MILD,
        FatigueLevel::Moderate => colors::MODERATE,
        FatigueLevel::Severe => colors::SEVERE,
        FatigueLevel::Unknown => colors::NEUTRAL,
    }
}

/// Elapsed detection time derived from the frame count.
///
/// Zero frames yields the bare `"0"` rather than `"0.0"`.
pub fn format_elapsed(total_frames: u64) -> String {
    if total_frames == 0 {
        return format!("0{}", TIME_UNIT);
    }
    format!("{:.1}{}", total_frames as f64 / FRAMES_PER_SECOND, TIME_UNIT)
}

/// Render a poll response into display values
pub fn render(response: &StatsResponse) -> RenderedStats {
    let stats = DetectionStats::from_response(response);

    let fatigue_indicator = match response.fatigue_level.as_deref() {
        Some(level) if !level.is_empty() => level.to_string(),
        _ => NO_LEVEL_TEXT.to_string(),
    };

    RenderedStats {
        closed_eyes: stats.closed_eyes_count.to_string(),
        open_mouth: stats.open_mouth_count.to_string(),
        fatigue_indicator,
        open_eyes: stats.open_eyes_count.to_string(),
        closed_mouth: stats.closed_mouth_count.to_string(),
        total_detections: stats.total_detections.to_string(),
        detection_time: format_elapsed(stats.total_frames),
        alert_color: fatigue_color(stats.fatigue_level),
        info_color: colors::NEUTRAL,
    }
}
