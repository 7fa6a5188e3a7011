//! Reply envelopes for the backend's control endpoints

use serde::{Deserialize, Serialize};

/// Reply to `POST /api/camera/reset`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResetReply {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    /// Backend asks the client to restart the stream and poll loop
    pub restart_detection: Option<bool>,
}

impl ResetReply {
    pub fn restart_requested(&self) -> bool {
        self.restart_detection.unwrap_or(false)
    }
}

/// Reply to `POST /api/detect/camera/stop`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopReply {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

/// Reply to `GET /api/models/current`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentModelReply {
    #[serde(default)]
    pub success: bool,
    pub current_model: Option<String>,
    pub message: Option<String>,
}

/// One model file known to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size_mb: Option<f64>,
    pub upload_time: Option<String>,
}

/// Reply to `GET /api/models`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelsReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    pub message: Option<String>,
}
