use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ClientError;

use super::protocol::{Frame, Outbound};
use super::transport::{Connector, Transport, TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// What `emit` does with a frame while the session is not connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitPolicy {
    Drop,
    /// Keep up to `emit_buffer_limit` frames and flush them on the next connect.
    Buffer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    Sent,
    Queued,
    Dropped,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub server_url: String,
    pub transports: Vec<TransportKind>,
    pub connect_timeout: Duration,
    pub emit_policy: EmitPolicy,
    pub emit_buffer_limit: usize,
}

type EventHandler = Box<dyn FnMut(&Value) + Send>;
type ConnectHook = Box<dyn FnMut() + Send>;

/// Owns the single realtime connection to the chat server.
pub struct TransportSession {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    state: SessionState,
    link: Option<Box<dyn Transport>>,
    session_id: Option<Uuid>,
    handlers: HashMap<String, Vec<EventHandler>>,
    connect_hooks: Vec<ConnectHook>,
    outbox: VecDeque<Frame>,
}

impl TransportSession {
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            state: SessionState::Disconnected,
            link: None,
            session_id: None,
            handlers: HashMap::new(),
            connect_hooks: Vec::new(),
            outbox: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.link.as_ref().map(|link| link.kind())
    }

    pub fn buffered(&self) -> usize {
        self.outbox.len()
    }

    /// Registers a handler for an inbound event. Handlers for the same
    /// event run in registration order.
    pub fn on<F>(&mut self, event: &str, handler: F)
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Box::new(handler));
    }

    /// Registers a hook run once after every successful (re)connection.
    pub fn on_connect<F>(&mut self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.connect_hooks.push(Box::new(hook));
    }

    /// Tries each configured transport in order. Failures only show up as
    /// the returned `Disconnected` state and in the log.
    ///
    /// Buffered frames go out after the connect hooks.
    pub async fn connect(&mut self) -> SessionState {
        self.open().await;
        self.flush().await;
        self.state
    }

    /// Like [`connect`](Self::connect) but leaves the outbox untouched, so the
    /// caller can send its own frames first and then call [`flush`](Self::flush).
    pub async fn open(&mut self) -> SessionState {
        if self.state == SessionState::Connected {
            return self.state;
        }

        self.state = SessionState::Connecting;
        let transports = self.config.transports.clone();

        for kind in transports {
            let attempt = tokio::time::timeout(
                self.config.connect_timeout,
                self.connector.open(kind, &self.config.server_url),
            )
            .await;

            match attempt {
                Ok(Ok(link)) => {
                    let session_id = Uuid::new_v4();
                    log::info!(
                        "Connected to {} over {kind} (session {session_id})",
                        self.config.server_url
                    );
                    self.link = Some(link);
                    self.session_id = Some(session_id);
                    self.state = SessionState::Connected;

                    for hook in self.connect_hooks.iter_mut() {
                        hook();
                    }
                    return self.state;
                }
                Ok(Err(err)) => {
                    log::warn!("Transport {kind} failed: {err}");
                }
                Err(_) => {
                    log::warn!(
                        "Transport {kind} timed out after {:?}",
                        self.config.connect_timeout
                    );
                }
            }
        }

        log::error!(
            "Unable to connect to {}; session stays disconnected",
            self.config.server_url
        );
        self.state = SessionState::Disconnected;
        self.state
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.close().await;
            log::info!("Session {:?} closed", self.session_id);
        }
        self.session_id = None;
        self.state = SessionState::Disconnected;
    }

    /// Sends a frame iff the session is connected; otherwise the frame is
    /// dropped or buffered according to the emit policy.
    pub async fn emit(&mut self, event: &str, payload: Value) -> EmitOutcome {
        let frame = Frame::new(event, payload);

        if self.state != SessionState::Connected {
            return self.hold(frame);
        }
        let Some(link) = self.link.as_mut() else {
            return self.hold(frame);
        };

        let sent = link.send(&frame).await;
        match sent {
            Ok(()) => EmitOutcome::Sent,
            Err(err) => {
                log::error!("Failed to send `{}`: {err}", frame.event);
                self.lose_link();
                self.hold(frame)
            }
        }
    }

    pub async fn emit_outbound(&mut self, outbound: &Outbound) -> EmitOutcome {
        self.emit(outbound.event(), outbound.payload()).await
    }

    /// Waits for the next inbound frame and runs its handlers.
    ///
    /// Returns `None` when the link goes away. Never resolves while there is
    /// no link, so it can sit in a `select!` unconditionally.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        let Some(link) = self.link.as_mut() else {
            return futures::future::pending().await;
        };

        let received = link.recv().await;
        match received {
            Ok(Some(frame)) => {
                self.dispatch(&frame);
                Some(frame)
            }
            Ok(None) => {
                log::info!("Server closed session {:?}", self.session_id);
                self.lose_link();
                None
            }
            Err(err) => {
                log::error!("Session {:?} dropped: {err}", self.session_id);
                self.lose_link();
                None
            }
        }
    }

    fn dispatch(&mut self, frame: &Frame) {
        match self.handlers.get_mut(&frame.event) {
            Some(handlers) => {
                for handler in handlers.iter_mut() {
                    handler(&frame.data);
                }
            }
            None => log::debug!("No handler for `{}`", frame.event),
        }
    }

    fn lose_link(&mut self) {
        self.link = None;
        self.session_id = None;
        self.state = SessionState::Disconnected;
    }

    fn hold(&mut self, frame: Frame) -> EmitOutcome {
        match self.config.emit_policy {
            EmitPolicy::Drop => {
                let dropped = ClientError::SendDropped { event: frame.event };
                log::warn!("{dropped}");
                EmitOutcome::Dropped
            }
            EmitPolicy::Buffer => {
                if self.config.emit_buffer_limit == 0 {
                    log::warn!("Emit buffer disabled; dropping `{}`", frame.event);
                    return EmitOutcome::Dropped;
                }
                if self.outbox.len() >= self.config.emit_buffer_limit {
                    if let Some(evicted) = self.outbox.pop_front() {
                        log::warn!("Emit buffer full; evicting `{}`", evicted.event);
                    }
                }
                log::debug!("Buffering `{}` until reconnect", frame.event);
                self.outbox.push_back(frame);
                EmitOutcome::Queued
            }
        }
    }

    /// Sends buffered frames in order. No-op while disconnected.
    pub async fn flush(&mut self) {
        if self.state != SessionState::Connected {
            return;
        }
        while let Some(frame) = self.outbox.pop_front() {
            let Some(link) = self.link.as_mut() else {
                self.outbox.push_front(frame);
                return;
            };
            let sent = link.send(&frame).await;
            if let Err(err) = sent {
                log::error!("Failed to flush `{}`: {err}", frame.event);
                self.outbox.push_front(frame);
                self.lose_link();
                return;
            }
        }
    }
}
