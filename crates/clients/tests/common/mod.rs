//! Recording test doubles for the executor and encoder ports.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use protocol::{
    ConnectionContext, EncodeError, ExecutorResponse, HttpBody, HttpRequest, PayloadEncoder,
    RequestExecutor, Source,
};
use serde_json::Value;

/// Replays scripted responses in order and records every request it sees.
pub struct MockExecutor {
    responses: Mutex<VecDeque<ExecutorResponse>>,
    requests: Mutex<Vec<(HttpRequest, u32)>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a response.
    pub fn with_response(self, response: ExecutorResponse) -> Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn succeeding(body: Value) -> Self {
        Self::new().with_response(ExecutorResponse::Success { body })
    }

    pub fn failing(error_code: u16, error: Option<&str>) -> Self {
        Self::new().with_response(ExecutorResponse::Failure {
            error_code,
            error: error.map(str::to_string),
        })
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The single recorded request and its attempt budget.
    pub fn only_request(&self) -> (HttpRequest, u32) {
        let requests = self.requests.lock().unwrap();
        assert_eq!(requests.len(), 1, "expected exactly one request");
        requests[0].clone()
    }
}

#[async_trait]
impl RequestExecutor for MockExecutor {
    async fn execute(&self, request: HttpRequest, max_attempts: u32) -> ExecutorResponse {
        self.requests.lock().unwrap().push((request, max_attempts));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected request: no scripted response left")
    }
}

/// Encodes payloads as plain JSON bytes so tests can read them back.
pub struct JsonEncoder {
    fail: AtomicBool,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self {
            fail: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
        }
    }
}

impl PayloadEncoder for JsonEncoder {
    fn encode(&self, payload: &Value) -> Result<Vec<u8>, EncodeError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EncodeError::Compress(std::io::Error::other("disk full")));
        }
        Ok(serde_json::to_vec(payload)?)
    }
}

/// Decodes a body written by [`JsonEncoder`] or a JSON body.
pub fn body_json(request: &HttpRequest) -> Value {
    match request.body.as_ref().expect("request has no body") {
        HttpBody::Json(value) => value.clone(),
        HttpBody::Bytes(bytes) => serde_json::from_slice(bytes).unwrap(),
    }
}

pub fn context() -> ConnectionContext {
    ConnectionContext::new("https://deeproxy.test", "session-token", Source::new("test-source").unwrap())
}

/// A context whose base URL can never be turned into a request URL.
pub fn broken_context() -> ConnectionContext {
    ConnectionContext::new("not a url", "session-token", Source::new("test-source").unwrap())
}
