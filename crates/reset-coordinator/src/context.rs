//! Session context

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Username used when none is configured
pub const DEFAULT_USERNAME: &str = "monitor_user";

/// Context shared by the session, the console and the reset sequence
pub type SharedContext = Arc<RwLock<SessionContext>>;

/// Kind of detection the session is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionType {
    /// Live camera stream; the only type that restarts after a reset
    Camera,
    Video,
    Image,
}

impl DetectionType {
    pub fn label(&self) -> &'static str {
        match self {
            DetectionType::Camera => "camera",
            DetectionType::Video => "video",
            DetectionType::Image => "image",
        }
    }
}

impl fmt::Display for DetectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DetectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "camera" => Ok(DetectionType::Camera),
            "video" => Ok(DetectionType::Video),
            "image" => Ok(DetectionType::Image),
            other => Err(format!("unknown detection type: {}", other)),
        }
    }
}

/// Who the session belongs to and what it is detecting with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub username: String,
    /// Detector model file name, e.g. "best.pt"
    pub model: String,
    pub detection_type: Option<DetectionType>,
}

impl SessionContext {
    pub fn new(username: &str, model: &str, detection_type: Option<DetectionType>) -> Self {
        let username = if username.is_empty() {
            DEFAULT_USERNAME
        } else {
            username
        };
        Self {
            username: username.to_string(),
            model: model.to_string(),
            detection_type,
        }
    }

    pub fn shared(self) -> SharedContext {
        Arc::new(RwLock::new(self))
    }

    pub fn is_camera(&self) -> bool {
        self.detection_type == Some(DetectionType::Camera)
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME, "", None)
    }
}
