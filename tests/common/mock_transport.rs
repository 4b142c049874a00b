use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use food_client::transport::{ApiResponse, Transport, TransportError};
use reqwest::StatusCode;
use tokio::sync::Notify;

use super::{Event, Events};

#[derive(Debug, Clone)]
pub struct PostedRequest {
    pub path: String,
    pub body: Bytes,
    pub idempotency_key: Option<String>,
}

#[derive(Clone)]
pub struct MockTransport {
    events: Events,
    posts: Arc<Mutex<Vec<PostedRequest>>>,
    failures_left: Arc<Mutex<u32>>,
    get_body: Arc<Mutex<Bytes>>,
    get_gate: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl MockTransport {
    pub fn new(events: Events) -> Self {
        Self {
            events,
            posts: Arc::new(Mutex::new(Vec::new())),
            failures_left: Arc::new(Mutex::new(0)),
            get_body: Arc::new(Mutex::new(Bytes::from_static(b"[]"))),
            get_gate: Arc::new(Mutex::new(None)),
        }
    }

    /// Fail the next `count` POSTs with a 503
    pub fn set_failures(&self, count: u32) {
        *self.failures_left.lock().unwrap() = count;
    }

    pub fn set_get_body(&self, body: &'static str) {
        *self.get_body.lock().unwrap() = Bytes::from_static(body.as_bytes());
    }

    /// Hold the next GET, after it has read its body, until the returned gate is notified
    pub fn gate_next_get(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.get_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn posts(&self) -> Vec<PostedRequest> {
        self.posts.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == Event::Get)
            .count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(
        &self,
        path: &str,
        body: Bytes,
        idempotency_key: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        tokio::task::yield_now().await;

        self.posts.lock().unwrap().push(PostedRequest {
            path: path.to_string(),
            body: body.clone(),
            idempotency_key: idempotency_key.map(str::to_string),
        });
        self.events.lock().unwrap().push(Event::Post);

        let mut failures_left = self.failures_left.lock().unwrap();
        if *failures_left > 0 {
            *failures_left -= 1;
            return Err(TransportError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: Bytes::from_static(b"unavailable"),
            });
        }

        Ok(ApiResponse::new(StatusCode::CREATED, body))
    }

    async fn get(&self, _path: &str) -> Result<ApiResponse, TransportError> {
        let body = self.get_body.lock().unwrap().clone();
        self.events.lock().unwrap().push(Event::Get);

        let gate = self.get_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        Ok(ApiResponse::new(StatusCode::OK, body))
    }
}
