//! Conversation history proxy.
//!
//! Forwards a read-only lookup to the ElevenLabs conversational-AI API. One
//! attempt per call, bounded by the configured timeout, no retries.

use reqwest::{StatusCode, Url};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::HistoryConfig;

/// Header the upstream API reads its credential from.
const API_KEY_HEADER: &str = "xi-api-key";

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("ELEVENLABS_API_KEY not configured")]
    MissingApiKey,
    #[error("Conversation not found")]
    NotFound { conversation_id: String },
    #[error("Authentication failed")]
    AuthenticationFailed { details: String },
    #[error("API request failed with status {status}")]
    Upstream { status: u16, details: String },
    #[error("Request timed out")]
    Timeout { conversation_id: String },
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Unexpected error: {0}")]
    InvalidResponse(String),
}

impl HistoryError {
    /// Structured error body returned to clients in place of upstream JSON.
    pub fn to_body(&self) -> Value {
        let error = self.to_string();
        match self {
            HistoryError::NotFound { conversation_id }
            | HistoryError::Timeout { conversation_id } => {
                json!({ "error": error, "conversation_id": conversation_id })
            }
            HistoryError::AuthenticationFailed { details } => {
                json!({ "error": error, "details": details })
            }
            HistoryError::Upstream { status, details } => {
                json!({ "error": error, "status_code": status, "details": details })
            }
            HistoryError::MissingApiKey
            | HistoryError::Request(_)
            | HistoryError::InvalidResponse(_) => json!({ "error": error }),
        }
    }
}

pub struct HistoryClient {
    http: reqwest::Client,
    config: HistoryConfig,
}

impl HistoryClient {
    pub fn new(config: HistoryConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn conversation_url(&self, conversation_id: &str) -> Result<Url, HistoryError> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| HistoryError::Request(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| HistoryError::Request("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(["v1", "convai", "conversations", conversation_id]);
        Ok(url)
    }

    /// Fetch one conversation's history. Upstream JSON is returned verbatim.
    pub async fn fetch_conversation(&self, conversation_id: &str) -> Result<Value, HistoryError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(HistoryError::MissingApiKey)?;
        let url = self.conversation_url(conversation_id)?;
        debug!(conversation = %conversation_id, "Fetching conversation history");

        let transport_error = |e: reqwest::Error| {
            if e.is_timeout() {
                HistoryError::Timeout {
                    conversation_id: conversation_id.to_string(),
                }
            } else {
                HistoryError::Request(e.to_string())
            }
        };

        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, api_key)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        match status {
            StatusCode::OK => serde_json::from_str(&body)
                .map_err(|e| HistoryError::InvalidResponse(e.to_string())),
            StatusCode::NOT_FOUND => Err(HistoryError::NotFound {
                conversation_id: conversation_id.to_string(),
            }),
            StatusCode::UNAUTHORIZED => {
                warn!("Conversation history upstream rejected the API key");
                Err(HistoryError::AuthenticationFailed { details: body })
            }
            other => Err(HistoryError::Upstream {
                status: other.as_u16(),
                details: body,
            }),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        response::{IntoResponse, Response},
        routing::get,
    };
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) const TEST_KEY: &str = "test-key";

    /// Stand-in for the upstream API. The conversation id picks the behavior.
    async fn fake_conversation(
        State(hits): State<Arc<AtomicUsize>>,
        Path(id): Path<String>,
        headers: HeaderMap,
    ) -> Response {
        hits.fetch_add(1, Ordering::SeqCst);
        if headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) != Some(TEST_KEY) {
            return (AxumStatus::UNAUTHORIZED, "invalid api key").into_response();
        }
        match id.as_str() {
            "missing" => (AxumStatus::NOT_FOUND, "no such conversation").into_response(),
            "boom" => (AxumStatus::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
            "garbage" => (AxumStatus::OK, "<html>not json</html>").into_response(),
            "slow" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "conversation_id": id })).into_response()
            }
            _ => Json(json!({
                "conversation_id": id,
                "status": "done",
                "transcript": [{ "role": "user", "message": "hello" }],
            }))
            .into_response(),
        }
    }

    /// Spawn the fake upstream on an ephemeral port. Returns its base URL and
    /// a counter of requests it has seen.
    pub(crate) async fn spawn_upstream() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/v1/convai/conversations/{id}", get(fake_conversation))
            .with_state(hits.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    pub(crate) fn client(
        base_url: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> HistoryClient {
        HistoryClient::new(HistoryConfig {
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
            timeout,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_success_passes_body_through() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, Some(TEST_KEY), Duration::from_secs(5));
        let body = c.fetch_conversation("conv_123").await.unwrap();
        assert_eq!(body["conversation_id"], "conv_123");
        assert_eq!(body["transcript"][0]["message"], "hello");
    }

    #[tokio::test]
    async fn test_not_found() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, Some(TEST_KEY), Duration::from_secs(5));
        let err = c.fetch_conversation("missing").await.unwrap_err();
        assert!(matches!(err, HistoryError::NotFound { .. }));
        assert_eq!(
            err.to_body(),
            json!({ "error": "Conversation not found", "conversation_id": "missing" })
        );
    }

    #[tokio::test]
    async fn test_bad_key_is_authentication_failure() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, Some("wrong"), Duration::from_secs(5));
        let err = c.fetch_conversation("conv_1").await.unwrap_err();
        let body = err.to_body();
        assert_eq!(body["error"], "Authentication failed");
        assert_eq!(body["details"], "invalid api key");
    }

    #[tokio::test]
    async fn test_other_status_is_generic_error() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, Some(TEST_KEY), Duration::from_secs(5));
        let body = c.fetch_conversation("boom").await.unwrap_err().to_body();
        assert_eq!(body["error"], "API request failed with status 500");
        assert_eq!(body["status_code"], 500);
        assert_eq!(body["details"], "upstream exploded");
    }

    #[tokio::test]
    async fn test_timeout() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, Some(TEST_KEY), Duration::from_millis(200));
        let err = c.fetch_conversation("slow").await.unwrap_err();
        assert!(matches!(err, HistoryError::Timeout { .. }), "got {:?}", err);
        assert_eq!(err.to_body()["error"], "Request timed out");
    }

    #[tokio::test]
    async fn test_missing_key_skips_upstream() {
        let (base, hits) = spawn_upstream().await;
        let c = client(&base, None, Duration::from_secs(5));
        assert!(!c.is_configured());
        let err = c.fetch_conversation("conv_1").await.unwrap_err();
        assert!(matches!(err, HistoryError::MissingApiKey));
        assert_eq!(
            err.to_body(),
            json!({ "error": "ELEVENLABS_API_KEY not configured" })
        );
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_refused_is_request_failure() {
        // Grab a free port, then close it so nothing is listening there.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let c = client(
            &format!("http://{}", addr),
            Some(TEST_KEY),
            Duration::from_secs(5),
        );
        let err = c.fetch_conversation("conv_1").await.unwrap_err();
        assert!(matches!(err, HistoryError::Request(_)), "got {:?}", err);
        assert!(err.to_body()["error"]
            .as_str()
            .unwrap()
            .starts_with("Request failed: "));
    }

    #[tokio::test]
    async fn test_non_json_success_is_unexpected() {
        let (base, _) = spawn_upstream().await;
        let c = client(&base, Some(TEST_KEY), Duration::from_secs(5));
        let err = c.fetch_conversation("garbage").await.unwrap_err();
        assert!(matches!(err, HistoryError::InvalidResponse(_)));
        assert!(err.to_body()["error"]
            .as_str()
            .unwrap()
            .starts_with("Unexpected error: "));
    }

    #[test]
    fn test_conversation_url_escapes_id() {
        let c = client("http://upstream.test", Some(TEST_KEY), Duration::from_secs(1));
        let url = c.conversation_url("a/b c").unwrap();
        assert_eq!(
            url.as_str(),
            "http://upstream.test/v1/convai/conversations/a%2Fb%20c"
        );
    }
}
