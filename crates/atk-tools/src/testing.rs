//! Recording transport doubles for adapter tests

use atk_core::{
    CommandOutput, CommandRunner, HttpRequest, HttpResponse, HttpTransport, TransportError,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays queued responses in order and records every request.
/// Once the queue is empty every request fails with a connect error.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Result<HttpResponse, TransportError>) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(Ok(HttpResponse::from_json(status, &body)))
    }

    pub fn push_raw(&self, status: u16, body: impl Into<bytes::Bytes>) -> &Self {
        self.push(Ok(HttpResponse::new(status, body)))
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        self.push(Err(error))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Connect("connection refused".to_string())))
    }
}

/// Replays queued process results and records every argument vector
#[derive(Default)]
pub struct MockRunner {
    outputs: Mutex<VecDeque<Result<CommandOutput, TransportError>>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl MockRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_output(&self, exit_code: i32, output: &str) -> &Self {
        self.outputs.lock().unwrap().push_back(Ok(CommandOutput {
            exit_code,
            output: output.to_string(),
        }));
        self
    }

    pub fn push_error(&self, error: TransportError) -> &Self {
        self.outputs.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_command_line(&self) -> String {
        let calls = self.calls.lock().unwrap();
        atk_core::command_line(calls.last().expect("no command was run"))
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, args: &[String]) -> Result<CommandOutput, TransportError> {
        self.calls.lock().unwrap().push(args.to_vec());
        self.outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Process("command not found".to_string())))
    }
}
