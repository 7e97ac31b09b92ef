//! In-crate fakes for the backend and the stream transport.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use parking_lot::Mutex;

use crate::backend::{ChatBackend, GenerateReplyRequest, ReplySuggestions};
use crate::error::{CoreError, Result, StreamError};
use crate::models::Expert;
use crate::streaming::{LineStream, StreamTransport};

struct BackendState {
    suggestions: ReplySuggestions,
    generate_error: Option<String>,
    generate_delay: Option<Duration>,
    send_error: Option<String>,
    delete_error: Option<String>,
    experts: Vec<Expert>,
    experts_error: Option<String>,

    generate_requests: Vec<GenerateReplyRequest>,
    sent: Vec<(String, String)>,
    deleted: Vec<String>,
    list_expert_calls: usize,
    in_flight: HashMap<String, usize>,
    max_in_flight: HashMap<String, usize>,
}

/// Scriptable `ChatBackend` that records every call.
pub struct FakeBackend {
    state: Mutex<BackendState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BackendState {
                suggestions: ReplySuggestions {
                    aggressive: Some("aggressive reply".into()),
                    conservative: Some("conservative reply".into()),
                    professional: Some("professional reply".into()),
                },
                generate_error: None,
                generate_delay: None,
                send_error: None,
                delete_error: None,
                experts: Vec::new(),
                experts_error: None,
                generate_requests: Vec::new(),
                sent: Vec::new(),
                deleted: Vec::new(),
                list_expert_calls: 0,
                in_flight: HashMap::new(),
                max_in_flight: HashMap::new(),
            }),
        }
    }

    pub fn set_suggestions(&self, suggestions: ReplySuggestions) {
        self.state.lock().suggestions = suggestions;
    }

    pub fn fail_generate(&self, message: &str) {
        self.state.lock().generate_error = Some(message.to_string());
    }

    pub fn set_generate_delay(&self, delay: Duration) {
        self.state.lock().generate_delay = Some(delay);
    }

    pub fn fail_send(&self, message: &str) {
        self.state.lock().send_error = Some(message.to_string());
    }

    pub fn fail_delete(&self, message: &str) {
        self.state.lock().delete_error = Some(message.to_string());
    }

    pub fn set_experts(&self, experts: Vec<Expert>) {
        let mut state = self.state.lock();
        state.experts = experts;
        state.experts_error = None;
    }

    pub fn fail_list_experts(&self, message: &str) {
        self.state.lock().experts_error = Some(message.to_string());
    }

    pub fn generate_requests(&self) -> Vec<GenerateReplyRequest> {
        self.state.lock().generate_requests.clone()
    }

    pub fn sent_messages(&self) -> Vec<(String, String)> {
        self.state.lock().sent.clone()
    }

    pub fn deleted_sessions(&self) -> Vec<String> {
        self.state.lock().deleted.clone()
    }

    pub fn list_expert_calls(&self) -> usize {
        self.state.lock().list_expert_calls
    }

    pub fn max_concurrent_generates_for(&self, session_id: &str) -> usize {
        self.state
            .lock()
            .max_in_flight
            .get(session_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn generate_reply(&self, request: &GenerateReplyRequest) -> Result<ReplySuggestions> {
        let delay = {
            let mut state = self.state.lock();
            state.generate_requests.push(request.clone());
            let in_flight = state.in_flight.entry(request.session_id.clone()).or_insert(0);
            *in_flight += 1;
            let current = *in_flight;
            let max = state.max_in_flight.entry(request.session_id.clone()).or_insert(0);
            *max = (*max).max(current);
            state.generate_delay
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(n) = state.in_flight.get_mut(&request.session_id) {
            *n -= 1;
        }
        match &state.generate_error {
            Some(e) => Err(CoreError::Generation(e.clone())),
            None => Ok(state.suggestions.clone()),
        }
    }

    async fn send_message(&self, recipient: &str, message: &str) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(e) = &state.send_error {
            return Err(CoreError::Send(e.clone()));
        }
        state.sent.push((recipient.to_string(), message.to_string()));
        Ok(())
    }

    async fn list_experts(&self) -> Result<Vec<Expert>> {
        let mut state = self.state.lock();
        state.list_expert_calls += 1;
        match &state.experts_error {
            Some(e) => Err(CoreError::Backend {
                endpoint: "list experts",
                message: e.clone(),
            }),
            None => Ok(state.experts.clone()),
        }
    }

    async fn delete_session(&self, conversation_id: &str) -> Result<u64> {
        let mut state = self.state.lock();
        if let Some(e) = &state.delete_error {
            return Err(CoreError::Backend {
                endpoint: "delete session",
                message: e.clone(),
            });
        }
        state.deleted.push(conversation_id.to_string());
        Ok(1)
    }
}

/// Test-side end of one fake stream connection.
pub struct FakeStream {
    tx: mpsc::UnboundedSender<std::result::Result<String, StreamError>>,
}

impl FakeStream {
    pub fn line(&self, line: &str) {
        let _ = self.tx.unbounded_send(Ok(line.to_string()));
    }

    /// One SSE event carrying `json`.
    pub fn event(&self, json: &str) {
        self.line(&format!("data: {json}"));
        self.line("");
    }

    pub fn fail(&self, error: StreamError) {
        let _ = self.tx.unbounded_send(Err(error));
    }

    /// End the stream cleanly (server closed it).
    pub fn close(self) {}

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

enum Scripted {
    Open,
    Refuse(String),
    /// `open` never resolves, like a server that accepts and then goes quiet
    Hang,
}

struct TransportState {
    script: VecDeque<Scripted>,
    opened: Vec<FakeStream>,
    attempts: Vec<tokio::time::Instant>,
}

/// Transport whose connections are driven from the test.
///
/// Each `open` consumes the next scripted outcome (default: succeed). A
/// successful open hands the test a `FakeStream` through `take_stream`.
pub struct FakeTransport {
    state: Mutex<TransportState>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TransportState {
                script: VecDeque::new(),
                opened: Vec::new(),
                attempts: Vec::new(),
            }),
        }
    }

    pub fn refuse_next(&self, reason: &str) {
        self.state
            .lock()
            .script
            .push_back(Scripted::Refuse(reason.to_string()));
    }

    pub fn refuse_next_n(&self, n: usize, reason: &str) {
        for _ in 0..n {
            self.refuse_next(reason);
        }
    }

    pub fn hang_next(&self) {
        self.state.lock().script.push_back(Scripted::Hang);
    }

    pub fn hang_next_n(&self, n: usize) {
        for _ in 0..n {
            self.hang_next();
        }
    }

    pub fn accept_next(&self) {
        self.state.lock().script.push_back(Scripted::Open);
    }

    /// Oldest connection not yet handed to the test.
    pub fn take_stream(&self) -> Option<FakeStream> {
        let mut state = self.state.lock();
        if state.opened.is_empty() {
            None
        } else {
            Some(state.opened.remove(0))
        }
    }

    pub fn attempts(&self) -> Vec<tokio::time::Instant> {
        self.state.lock().attempts.clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.state.lock().attempts.len()
    }
}

#[async_trait]
impl StreamTransport for FakeTransport {
    async fn open(&self, _url: &str) -> std::result::Result<LineStream, StreamError> {
        {
            let mut state = self.state.lock();
            state.attempts.push(tokio::time::Instant::now());
            match state.script.pop_front().unwrap_or(Scripted::Open) {
                Scripted::Refuse(reason) => return Err(StreamError::Other(reason)),
                Scripted::Open => {
                    let (tx, rx) = mpsc::unbounded();
                    state.opened.push(FakeStream { tx });
                    return Ok(Box::pin(rx));
                }
                Scripted::Hang => {}
            }
        }
        futures::future::pending().await
    }
}
