//! Counter payloads returned by `GET /api/get_detected_objects`

use serde::{Deserialize, Serialize};

/// Backend-computed fatigue severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FatigueLevel {
    None,
    Mild,
    Moderate,
    Severe,
    /// Absent or not one of the four known levels
    #[default]
    Unknown,
}

impl FatigueLevel {
    /// Parse the backend's level string. Anything unrecognised is `Unknown`.
    pub fn parse(level: &str) -> Self {
        match level {
            "none" => FatigueLevel::None,
            "mild" => FatigueLevel::Mild,
            "moderate" => FatigueLevel::Moderate,
            "severe" => FatigueLevel::Severe,
            _ => FatigueLevel::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FatigueLevel::None => "none",
            FatigueLevel::Mild => "mild",
            FatigueLevel::Moderate => "moderate",
            FatigueLevel::Severe => "severe",
            FatigueLevel::Unknown => "unknown",
        }
    }
}

/// One entry of the backend's `fatigue_indicators` list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatigueIndicator {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub count: u64,
}

/// Raw `detection_info` object. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionInfo {
    pub closed_eyes_count: Option<u64>,
    pub open_mouth_count: Option<u64>,
    pub open_eyes_count: Option<u64>,
    pub closed_mouth_count: Option<u64>,
    pub total_detections: Option<u64>,
    pub total_frames: Option<u64>,
    /// Wall-clock seconds since the backend session started
    pub total_seconds: Option<f64>,
    pub detection_active: Option<bool>,
    #[serde(default)]
    pub fatigue_indicators: Vec<FatigueIndicator>,
}

/// Full poll response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(default)]
    pub success: bool,
    pub detection_info: Option<DetectionInfo>,
    pub fatigue_level: Option<String>,
    pub message: Option<String>,
}

/// Counters of one poll response with defaults applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionStats {
    pub closed_eyes_count: u64,
    pub open_mouth_count: u64,
    pub open_eyes_count: u64,
    pub closed_mouth_count: u64,
    pub total_detections: u64,
    pub total_frames: u64,
    pub fatigue_level: FatigueLevel,
}

impl DetectionStats {
    /// Apply defaulting: a missing `detection_info` or a missing (or null)
    /// counter is 0, a missing level is `Unknown`.
    pub fn from_response(response: &StatsResponse) -> Self {
        let info = response.detection_info.clone().unwrap_or_default();
        Self {
            closed_eyes_count: info.closed_eyes_count.unwrap_or(0),
            open_mouth_count: info.open_mouth_count.unwrap_or(0),
            open_eyes_count: info.open_eyes_count.unwrap_or(0),
            closed_mouth_count: info.closed_mouth_count.unwrap_or(0),
            total_detections: info.total_detections.unwrap_or(0),
            total_frames: info.total_frames.unwrap_or(0),
            fatigue_level: response
                .fatigue_level
                .as_deref()
                .map(FatigueLevel::parse)
                .unwrap_or_default(),
        }
    }
}
