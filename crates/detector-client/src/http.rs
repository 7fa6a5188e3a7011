//! HTTP implementation of the detector backend

use crate::backend::DetectorBackend;
use crate::endpoints;
use crate::error::BackendError;
use crate::replies::{CurrentModelReply, ModelsReply, ResetReply, StopReply};
use crate::CAMERA_INDEX;
use detection_stats::StatsResponse;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for control requests
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Detector backend reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackend {
    /// Always ends with `/` so endpoint paths join below it
    base_url: Url,
    client: Client,
    /// Per-request timeout for everything except the stream
    timeout: Duration,
}

impl HttpBackend {
    /// Create a client for the backend at `base_url` (e.g. "http://127.0.0.1:5001")
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalized)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        // No client-wide timeout: the camera stream stays open indefinitely
        let client = Client::builder().build()?;

        info!("Creating detector backend client for {}", parsed);

        Ok(Self {
            base_url: parsed,
            client,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    /// Set the per-request timeout for control requests
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn classify(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout(self.timeout.as_millis() as u64)
        } else {
            err.into()
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()?;

        response.json::<T>().await.map_err(|e| self.classify(e))
    }

    async fn post_username<T: DeserializeOwned>(
        &self,
        url: Url,
        username: &str,
    ) -> Result<T, BackendError> {
        debug!("POST {} (username={})", url, username);
        let response = self
            .client
            .post(url)
            .json(&json!({ "username": username }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()?;

        response.json::<T>().await.map_err(|e| self.classify(e))
    }
}

impl DetectorBackend for HttpBackend {
    fn stream_url(&self, model: &str, username: &str) -> Result<String, BackendError> {
        let mut url = self.endpoint(endpoints::CAMERA_STREAM)?;
        url.query_pairs_mut()
            .append_pair("index", &CAMERA_INDEX.to_string())
            .append_pair("model", model)
            .append_pair("username", username);
        Ok(url.to_string())
    }

    async fn pull_stream(&self, url: &str) -> Result<u64, BackendError> {
        let url = Url::parse(url).map_err(|e| BackendError::InvalidUrl(format!("{}: {}", url, e)))?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?;

        let mut received: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            received += chunk.len() as u64;
        }

        debug!("Camera stream closed by server after {} bytes", received);
        Ok(received)
    }

    async fn fetch_stats(&self, username: &str) -> Result<StatsResponse, BackendError> {
        let url = self.endpoint(endpoints::DETECTED_OBJECTS)?;
        self.get_json(url, &[("username", username)]).await
    }

    async fn reset(&self, username: &str) -> Result<ResetReply, BackendError> {
        let url = self.endpoint(endpoints::CAMERA_RESET)?;
        self.post_username(url, username).await
    }

    async fn stop_detection(&self, username: &str) -> Result<StopReply, BackendError> {
        let url = self.endpoint(endpoints::CAMERA_STOP)?;
        self.post_username(url, username).await
    }

    async fn current_model(&self) -> Result<CurrentModelReply, BackendError> {
        let url = self.endpoint(endpoints::CURRENT_MODEL)?;
        self.get_json(url, &[]).await
    }

    async fn list_models(&self) -> Result<ModelsReply, BackendError> {
        let url = self.endpoint(endpoints::MODELS)?;
        self.get_json(url, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one request with a canned reply; the task yields the raw request
    async fn serve_once(status: &str, body: &str) -> (HttpBackend, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let reply = format!(
            "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                if let Some(head_end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..head_end]).to_lowercase();
                    let body_len = head
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .map(|value| value.trim().parse::<usize>().unwrap())
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + body_len {
                        break;
                    }
                }
            }
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8(request).unwrap()
        });

        let backend = HttpBackend::new(&format!("http://{}", addr))
            .unwrap()
            .with_timeout(Duration::from_secs(2));
        (backend, server)
    }

    fn body_of(request: &str) -> &str {
        request.split("\r\n\r\n").nth(1).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_reset_posts_username_and_decodes_rejection() {
        let (backend, server) = serve_once(
            "200 OK",
            r#"{"success": false, "message": "no active detection session"}"#,
        )
        .await;

        let reply = backend.reset("driver 7").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /api/camera/reset HTTP/1.1\r\n"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        let body: serde_json::Value = serde_json::from_str(body_of(&request)).unwrap();
        assert_eq!(body, json!({ "username": "driver 7" }));

        assert!(!reply.success);
        assert_eq!(reply.message.as_deref(), Some("no active detection session"));
        assert!(!reply.restart_requested());
    }

    #[tokio::test]
    async fn test_stop_posts_username() {
        let (backend, server) = serve_once("200 OK", r#"{"success": true}"#).await;

        let reply = backend.stop_detection("alice").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("POST /api/detect/camera/stop HTTP/1.1\r\n"));
        let body: serde_json::Value = serde_json::from_str(body_of(&request)).unwrap();
        assert_eq!(body, json!({ "username": "alice" }));
        assert!(reply.success);
    }

    #[tokio::test]
    async fn test_fetch_stats_sends_username_query() {
        let (backend, server) = serve_once(
            "200 OK",
            r#"{"success": true, "fatigue_level": "mild",
                "detection_info": {"closed_eyes_count": 4, "total_frames": 75}}"#,
        )
        .await;

        let response = backend.fetch_stats("driver 7").await.unwrap();
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /api/get_detected_objects?username=driver+7 HTTP/1.1\r\n"));
        assert!(response.success);
        assert_eq!(response.fatigue_level.as_deref(), Some("mild"));
        let info = response.detection_info.unwrap();
        assert_eq!(info.closed_eyes_count, Some(4));
        assert_eq!(info.total_frames, Some(75));
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let (backend, server) = serve_once("500 Internal Server Error", "{}").await;

        let result = backend.reset("alice").await;
        server.await.unwrap();

        assert!(matches!(result, Err(BackendError::Status(500))));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let (backend, server) = serve_once("200 OK", "not json").await;

        let result = backend.current_model().await;
        let request = server.await.unwrap();

        assert!(request.starts_with("GET /api/models/current HTTP/1.1\r\n"));
        assert!(matches!(result, Err(BackendError::Decode(_))));
    }

    #[test]
    fn test_stream_url_encodes_parameters() {
        let backend = HttpBackend::new("http://127.0.0.1:5001").unwrap();
        let url = backend.stream_url("best model.pt", "driver&1").unwrap();

        assert!(url.starts_with("http://127.0.0.1:5001/api/stream/camera?index=0&"));
        assert!(url.contains("model=best+model.pt"));
        assert!(url.contains("username=driver%261"));
    }

    #[test]
    fn test_base_url_with_prefix_and_trailing_slash() {
        let backend = HttpBackend::new("http://detector.local/fp/").unwrap();
        let url = backend.endpoint(endpoints::CAMERA_RESET).unwrap();
        assert_eq!(url.as_str(), "http://detector.local/fp/api/camera/reset");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpBackend::new("not a url"),
            Err(BackendError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Port 9 (discard) is closed on test hosts
        let backend = HttpBackend::new("http://127.0.0.1:9")
            .unwrap()
            .with_timeout(Duration::from_millis(500));
        let result = backend.fetch_stats("monitor_user").await;
        assert!(result.is_err());
    }
}
