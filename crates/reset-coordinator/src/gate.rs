//! Restart gating after the backend stop request

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Default stabilisation wait before restarting (ms)
pub const DEFAULT_SETTLE_MS: u64 = 2000;

/// Default bound on waiting for the stop acknowledgement (ms)
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 5000;

/// What the restart waits for once the stream and poll loop are stopped.
///
/// Deserializes from a table with an optional `mode`. Without one it is
/// `stop_acknowledged`, and missing durations take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case", from = "GateTable")]
pub enum RestartGate {
    /// Wait a fixed time; the stop request is not observed
    FixedDelay { delay_ms: u64 },
    /// Wait for the stop request to finish (bounded by `ack_timeout_ms`)
    /// and for `settle_ms`, whichever is later
    StopAcknowledged { settle_ms: u64, ack_timeout_ms: u64 },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum GateMode {
    FixedDelay,
    StopAcknowledged,
}

/// Config-file shape of [`RestartGate`]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GateTable {
    mode: Option<GateMode>,
    delay_ms: Option<u64>,
    settle_ms: Option<u64>,
    ack_timeout_ms: Option<u64>,
}

impl From<GateTable> for RestartGate {
    fn from(table: GateTable) -> Self {
        match table.mode.unwrap_or(GateMode::StopAcknowledged) {
            GateMode::FixedDelay => RestartGate::FixedDelay {
                delay_ms: table.delay_ms.unwrap_or(DEFAULT_SETTLE_MS),
            },
            GateMode::StopAcknowledged => RestartGate::StopAcknowledged {
                settle_ms: table.settle_ms.unwrap_or(DEFAULT_SETTLE_MS),
                ack_timeout_ms: table.ack_timeout_ms.unwrap_or(DEFAULT_ACK_TIMEOUT_MS),
            },
        }
    }
}

impl Default for RestartGate {
    fn default() -> Self {
        RestartGate::StopAcknowledged {
            settle_ms: DEFAULT_SETTLE_MS,
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT_MS,
        }
    }
}

impl RestartGate {
    pub fn fixed_delay() -> Self {
        RestartGate::FixedDelay {
            delay_ms: DEFAULT_SETTLE_MS,
        }
    }

    /// Block until the restart may proceed.
    ///
    /// `stop_request` is the task carrying the backend stop call. It is
    /// never cancelled here; when not awaited it runs to completion on its own.
    pub async fn wait(&self, stop_request: JoinHandle<()>) {
        match *self {
            RestartGate::FixedDelay { delay_ms } => {
                debug!("Waiting {}ms before restart", delay_ms);
                sleep(Duration::from_millis(delay_ms)).await;
            }
            RestartGate::StopAcknowledged {
                settle_ms,
                ack_timeout_ms,
            } => {
                debug!(
                    "Waiting for stop acknowledgement (timeout {}ms) and {}ms settle",
                    ack_timeout_ms, settle_ms
                );
                let acknowledged = async {
                    match timeout(Duration::from_millis(ack_timeout_ms), stop_request).await {
                        Ok(_) => debug!("Backend stop request finished"),
                        Err(_) => warn!(
                            "Backend stop not acknowledged within {}ms, restarting anyway",
                            ack_timeout_ms
                        ),
                    }
                };
                tokio::join!(sleep(Duration::from_millis(settle_ms)), acknowledged);
            }
        }
    }
}
