use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::backoff::ReconnectPolicy;
use super::sse::{LineStream, SseDecoder, StreamTransport};
use super::types::{decode_frame, StreamFrame};
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::models::Message;

/// Observable status of the event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub connected: bool,
    pub retrying: bool,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl ConnectionState {
    /// Status before the first attempt resolves.
    pub fn connecting() -> Self {
        Self {
            retrying: true,
            ..Self::default()
        }
    }

    /// Gave up retrying; only a manual reconnect leaves this state.
    pub fn is_terminal(&self) -> bool {
        !self.connected && !self.retrying && self.last_error.is_some()
    }
}

#[derive(Debug)]
enum Command {
    Reconnect,
    Close,
}

/// What ended one connection attempt.
enum Next {
    Retry(StreamError),
    ReconnectNow,
    Close,
}

/// Owns the one persistent connection to the backend event feed.
///
/// Decoded messages go to the consumer channel in arrival order. Dropping
/// the handle stops the worker.
pub struct StreamConnectionManager {
    state_rx: watch::Receiver<ConnectionState>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl StreamConnectionManager {
    /// Start connecting to `url` in the background. Must be called inside a tokio runtime.
    pub fn connect(
        url: impl Into<String>,
        transport: Arc<dyn StreamTransport>,
        config: &StreamConfig,
        sink: mpsc::Sender<Message>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::connecting());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            url: url.into(),
            transport,
            config: config.clone(),
            policy: ReconnectPolicy::from_config(config),
            sink,
            state_tx,
            commands: command_rx,
        };
        let task = tokio::spawn(worker.run());

        Self {
            state_rx,
            commands,
            task,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Reset the retry counter and connect now, superseding any pending retry
    /// or live connection.
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StreamConnectionManager {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for StreamConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamConnectionManager")
            .field("state", &*self.state_rx.borrow())
            .finish()
    }
}

struct Worker {
    url: String,
    transport: Arc<dyn StreamTransport>,
    config: StreamConfig,
    policy: ReconnectPolicy,
    sink: mpsc::Sender<Message>,
    state_tx: watch::Sender<ConnectionState>,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Worker {
    async fn run(mut self) {
        let mut retry_count: u32 = 0;

        loop {
            let error = match self.session(&mut retry_count).await {
                Next::Retry(error) => error,
                Next::ReconnectNow => {
                    tracing::info!(url = %self.url, "manual reconnect");
                    retry_count = 0;
                    continue;
                }
                Next::Close => break,
            };

            if self.policy.is_exhausted(retry_count) {
                tracing::warn!(retry_count, error = %error, "stream retries exhausted");
                self.publish(ConnectionState {
                    connected: false,
                    retrying: false,
                    retry_count,
                    last_error: Some(error.to_string()),
                });
                match self.commands.recv().await {
                    Some(Command::Reconnect) => {
                        retry_count = 0;
                        continue;
                    }
                    Some(Command::Close) | None => break,
                }
            }

            let delay = self.policy.delay(retry_count);
            tracing::info!(retry_count, ?delay, error = %error, "stream disconnected, scheduling reconnect");
            self.publish(ConnectionState {
                connected: false,
                retrying: true,
                retry_count,
                last_error: Some(error.to_string()),
            });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    retry_count += 1;
                }
                command = self.commands.recv() => match command {
                    Some(Command::Reconnect) => {
                        tracing::info!(url = %self.url, "manual reconnect");
                        retry_count = 0;
                    }
                    Some(Command::Close) | None => break,
                },
            }
        }

        self.state_tx.send_modify(|state| {
            state.connected = false;
            state.retrying = false;
        });
        tracing::info!(url = %self.url, "stream closed");
    }

    /// One connection attempt: open, then pump lines until something ends it.
    ///
    /// An open that stays silent past `heartbeat_timeout` counts as a dead
    /// connection, same as silence after it opened.
    async fn session(&mut self, retry_count: &mut u32) -> Next {
        tracing::debug!(url = %self.url, attempt = *retry_count + 1, "opening stream");
        let attempt = *retry_count;
        self.state_tx.send_modify(|state| {
            state.connected = false;
            state.retrying = true;
            state.retry_count = attempt;
        });

        let timeout = self.config.heartbeat_timeout;
        let opened = tokio::select! {
            result = tokio::time::timeout(timeout, self.transport.open(&self.url)) => result,
            command = self.commands.recv() => return on_command(command),
        };
        let lines = match opened {
            Ok(Ok(lines)) => lines,
            Ok(Err(e)) => return Next::Retry(e),
            Err(_) => {
                tracing::warn!(?timeout, "stream open timed out");
                return Next::Retry(StreamError::HeartbeatTimeout(timeout));
            }
        };

        *retry_count = 0;
        self.publish(ConnectionState {
            connected: true,
            retrying: false,
            retry_count: 0,
            last_error: None,
        });
        tracing::info!(url = %self.url, "stream connected");

        self.pump(lines).await
    }

    async fn pump(&mut self, mut lines: LineStream) -> Next {
        let mut decoder = SseDecoder::new();
        let mut last_activity = Instant::now();
        let mut watchdog = tokio::time::interval(self.config.watchdog_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                line = lines.next() => match line {
                    Some(Ok(line)) => {
                        last_activity = Instant::now();
                        if let Some(payload) = decoder.push_line(&line) {
                            if !self.dispatch(&payload).await {
                                return Next::Close;
                            }
                        }
                    }
                    Some(Err(e)) => return Next::Retry(e),
                    None => {
                        if let Some(payload) = decoder.finish() {
                            if !self.dispatch(&payload).await {
                                return Next::Close;
                            }
                        }
                        return Next::Retry(StreamError::Closed);
                    }
                },
                _ = watchdog.tick() => {
                    let silence = last_activity.elapsed();
                    if silence > self.config.heartbeat_timeout {
                        tracing::warn!(?silence, "no stream activity, dropping connection");
                        return Next::Retry(StreamError::HeartbeatTimeout(silence));
                    }
                }
                command = self.commands.recv() => return on_command(command),
            }
        }
    }

    /// Returns false once the consumer is gone.
    async fn dispatch(&self, payload: &str) -> bool {
        match decode_frame(payload) {
            Ok(StreamFrame::Heartbeat) => {
                tracing::trace!("heartbeat");
                true
            }
            Ok(StreamFrame::Message(message)) => {
                tracing::debug!(conversation = %message.conversation_id, is_self = message.is_self, "stream message");
                if self.sink.send(message).await.is_err() {
                    tracing::debug!("message consumer dropped");
                    return false;
                }
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed stream frame");
                true
            }
        }
    }

    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

fn on_command(command: Option<Command>) -> Next {
    match command {
        Some(Command::Reconnect) => Next::ReconnectNow,
        Some(Command::Close) | None => Next::Close,
    }
}
