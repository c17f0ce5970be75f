//! Analysis service HTTP client.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{AnalyzeRequest, AnalyzeResponse, HealthResponse};

/// Upper bound on configured retries.
pub const MAX_RETRIES: u32 = 10;

/// Longest single wait between retries.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Configuration for the analysis client.
#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    /// Base URL of the analysis service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// First retry delay; doubles on every attempt
    pub retry_delay: Duration,
}

impl Default for AnalysisClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(300), // 5 minutes for video analysis
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl AnalysisClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("ANALYSIS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("ANALYSIS_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            max_retries: std::env::var("ANALYSIS_SERVICE_RETRIES")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
                .map(|n| n.min(MAX_RETRIES))
                .unwrap_or(2),
            retry_delay: Duration::from_millis(500),
        }
    }

    /// Wait before retry number `attempt` (0-based), capped at one minute.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(MAX_RETRY_DELAY)
    }
}

/// Client for the analysis service.
pub struct AnalysisClient {
    http: Client,
    config: AnalysisClientConfig,
}

impl AnalysisClient {
    /// Create a new analysis client.
    pub fn new(config: AnalysisClientConfig) -> AnalysisResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AnalysisError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> AnalysisResult<Self> {
        Self::new(AnalysisClientConfig::from_env())
    }

    pub fn config(&self) -> &AnalysisClientConfig {
        &self.config
    }

    /// Check if the analysis service is healthy.
    pub async fn health_check(&self) -> AnalysisResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Analysis service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Analysis service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Analyze a video and return its segments.
    ///
    /// Segments that violate the time range invariants are dropped with a
    /// warning rather than failing the whole response.
    pub async fn analyze(&self, request: &AnalyzeRequest) -> AnalysisResult<AnalyzeResponse> {
        let url = format!("{}/analyze", self.config.base_url);

        debug!("Sending analysis request to {}", url);

        let mut response: AnalyzeResponse = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .json(request)
                    .send()
                    .await
                    .map_err(AnalysisError::Network)?;

                let status = response.status();
                if status.is_server_error() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AnalysisError::ServiceUnavailable(format!(
                        "analysis service returned {}: {}",
                        status, body
                    )));
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AnalysisError::RequestFailed(format!(
                        "analysis service returned {}: {}",
                        status, body
                    )));
                }

                let text = response.text().await.map_err(AnalysisError::Network)?;
                serde_json::from_str::<AnalyzeResponse>(&text)
                    .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))
            })
            .await?;

        let before = response.segments.len();
        response.segments.retain(|segment| match segment.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("Dropping invalid segment from analysis response: {}", e);
                false
            }
        });

        info!(
            video = %request.video_path,
            segments = response.segments.len(),
            dropped = before - response.segments.len(),
            "Analysis complete"
        );
        Ok(response)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> AnalysisResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = AnalysisResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.backoff(attempt);
                    warn!(
                        "Analysis request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, max_retries: u32) -> AnalysisClient {
        AnalysisClient::new(AnalysisClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries,
            retry_delay: Duration::from_millis(10),
        })
        .unwrap()
    }

    fn request() -> AnalyzeRequest {
        AnalyzeRequest {
            video_path: "talk.mp4".into(),
            context: String::new(),
            frame_count: 12,
        }
    }

    #[test]
    fn test_config_defaults() {
        let config = AnalysisClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_backoff_doubles_then_saturates() {
        let config = AnalysisClientConfig::default();
        assert_eq!(config.backoff(0), Duration::from_millis(500));
        assert_eq!(config.backoff(2), Duration::from_secs(2));
        assert_eq!(config.backoff(7), Duration::from_secs(60));
        assert_eq!(config.backoff(32), Duration::from_secs(60));
        assert_eq!(config.backoff(u32::MAX), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_analyze_drops_invalid_segments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "segments": [
                    {"start_time": 0.0, "end_time": 12.5, "description": "Opening demo"},
                    {"start_time": 30.0, "end_time": 20.0, "description": "reversed"},
                    {"start_time": 40.0, "end_time": 70.0, "description": "Key insight", "engagement_score": 0.8}
                ],
                "summary": "A product talk"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client_for(&server, 0).analyze(&request()).await.unwrap();
        assert_eq!(response.segments.len(), 2);
        assert_eq!(response.segments[1].engagement_score, 0.8);
        assert_eq!(response.summary.as_deref(), Some("A product talk"));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"segments": []})))
            .mount(&server)
            .await;

        let response = client_for(&server, 2).analyze(&request()).await.unwrap();
        assert!(response.segments.is_empty());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad video"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 3).analyze(&request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::RequestFailed(_)));
        assert!(err.to_string().contains("bad video"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_string("```json not really```"))
            .mount(&server)
            .await;

        let err = client_for(&server, 0).analyze(&request()).await.unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        assert!(client_for(&server, 0).health_check().await.unwrap());
    }
}
