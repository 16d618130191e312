//! Testing harness for connector implementations.
//!
//! [`MockTransport`] replays scripted HTTP replies per URL and records every
//! request, so retry behaviour and provider URLs can be checked without a
//! network.

use crate::http::{HttpTransport, TransportResponse};
use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use async_trait::async_trait;
use reqwest::Url;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Creates a test connector config with sensible defaults.
pub fn test_connector_config(name: &str, base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        auth: AuthConfig::None,
        timeout_secs: 5,
        retries: 3,
        backoff_factor: 1.0,
        verify_tls: true,
        headers: HashMap::new(),
    }
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Response(TransportResponse),
    Error(ConnectorError),
}

impl MockReply {
    /// A reply with the given status and an empty JSON object body.
    pub fn status(status: u16) -> Self {
        Self::raw(status, b"{}".to_vec())
    }

    /// A reply with a JSON body.
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::raw(status, body.to_string().into_bytes())
    }

    /// A reply with an arbitrary body.
    pub fn raw(status: u16, body: Vec<u8>) -> Self {
        Self::Response(TransportResponse { status, body })
    }

    /// A transport-level failure.
    pub fn error(error: ConnectorError) -> Self {
        Self::Error(error)
    }
}

/// A request seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Scripted transport keyed by full URL.
///
/// Replies for a URL are consumed in order; the last one repeats once the
/// script runs out. Unscripted URLs answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the replies for one URL.
    pub async fn route(&self, url: &str, replies: Vec<MockReply>) {
        self.routes
            .lock()
            .await
            .insert(url.to_string(), replies.into_iter().collect());
    }

    /// All requests in arrival order.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// Number of requests made to one URL.
    pub async fn requests_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.url == url)
            .count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(
        &self,
        url: &Url,
        headers: &[(String, String)],
    ) -> ConnectorResult<TransportResponse> {
        self.requests.lock().await.push(RecordedRequest {
            url: url.to_string(),
            headers: headers.to_vec(),
        });

        let reply = {
            let mut routes = self.routes.lock().await;
            match routes.get_mut(url.as_str()) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply.unwrap_or_else(|| MockReply::status(404)) {
            MockReply::Response(response) => Ok(response),
            MockReply::Error(error) => Err(error),
        }
    }
}
