use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::MentoraConfig;
use crate::errors::{MentoraError, MentoraResult};

/// Status and parsed body of a backend response
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// JSON body, or `Value::Null` when the body was empty or not JSON
    pub body: Value,
}

impl TransportResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_created_or_ok(&self) -> bool {
        self.status == 200 || self.status == 201
    }
}

/// The seam between the dispatcher and the network.
/// A response with any status is `Ok`; `Err` means no response was received.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, path: &str, body: &Value) -> MentoraResult<TransportResponse>;

    async fn get(&self, path: &str, timeout: Duration) -> MentoraResult<TransportResponse>;
}

/// reqwest-backed transport against the configured base URL
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &MentoraConfig) -> MentoraResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                MentoraError::ConfigError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.api_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn read(response: reqwest::Response) -> MentoraResult<TransportResponse> {
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(transport_error)?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        debug!("Received status {} ({} bytes)", status, bytes.len());
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, path: &str, body: &Value) -> MentoraResult<TransportResponse> {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read(response).await
    }

    async fn get(&self, path: &str, timeout: Duration) -> MentoraResult<TransportResponse> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read(response).await
    }
}

/// Collapses a reqwest failure into a short, user-presentable reason
fn transport_error(e: reqwest::Error) -> MentoraError {
    warn!("Transport failure: {}", e);
    let reason = if e.is_timeout() {
        "tiempo de espera agotado"
    } else if e.is_connect() {
        "sin conexión con el servidor"
    } else if e.is_body() || e.is_decode() {
        "respuesta incompleta del servidor"
    } else {
        "error de red"
    };
    MentoraError::Transport(reason.to_string())
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub struct RecordedCall {
        pub method: &'static str,
        pub path: String,
        pub body: Value,
    }

    #[derive(Debug, Clone)]
    enum Scripted {
        Respond(TransportResponse),
        Fail(String),
    }

    /// Scripted transport that records every call it receives
    #[derive(Debug, Clone, Default)]
    pub struct FakeTransport {
        script: Arc<Mutex<VecDeque<Scripted>>>,
        calls: Arc<Mutex<Vec<RecordedCall>>>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, status: u16, body: Value) -> &Self {
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted::Respond(TransportResponse::new(status, body)));
            self
        }

        pub fn fail(&self, reason: &str) -> &Self {
            self.script
                .lock()
                .unwrap()
                .push_back(Scripted::Fail(reason.to_string()));
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn next(&self, method: &'static str, path: &str, body: Value) -> MentoraResult<TransportResponse> {
            self.calls.lock().unwrap().push(RecordedCall {
                method,
                path: path.to_string(),
                body,
            });
            match self.script.lock().unwrap().pop_front() {
                Some(Scripted::Respond(response)) => Ok(response),
                Some(Scripted::Fail(reason)) => Err(MentoraError::Transport(reason)),
                None => Err(MentoraError::Transport("no scripted response".to_string())),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post_json(&self, path: &str, body: &Value) -> MentoraResult<TransportResponse> {
            self.next("POST", path, body.clone())
        }

        async fn get(&self, path: &str, _timeout: Duration) -> MentoraResult<TransportResponse> {
            self.next("GET", path, Value::Null)
        }
    }
}
