//! Outbound Telnet connection owned by one relay session.
//!
//! Each `RemoteSession` runs a tokio task that owns the TCP socket. The task
//! connects with a deadline, filters every read through a
//! [`ProtocolFilter`], answers option requests, submits credentials when the
//! login prompts show up and acknowledges pager prompts. Everything it sees
//! is reported to the owner as [`RemoteEvent`]s over a bounded channel; while
//! that channel is full the task stops reading, so a slow client pushes
//! back on the remote host through TCP flow control.

use std::collections::HashSet;
use std::net::SocketAddrV4;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use termbridge_core::{Credentials, Error, PromptSettings, RemoteSettings, Result};
use termbridge_filter::{FilterOutput, Negotiation, PromptWatcher, ProtocolFilter};

/// What happened on the remote socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEventKind {
    /// Transport handshake completed
    Connected,
    /// Sanitized output arrived
    Data {
        /// Sanitized text, possibly empty
        text: String,
        /// A pager prompt was seen (and acknowledged)
        pager: bool,
    },
    /// Socket-level failure; terminal
    Error(String),
    /// Handshake did not complete in time; terminal
    TimedOut(String),
    /// Remote end closed the socket; terminal
    Closed,
}

impl RemoteEventKind {
    /// Whether no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RemoteEventKind::Error(_) | RemoteEventKind::TimedOut(_) | RemoteEventKind::Closed
        )
    }
}

/// An event tagged with the connection attempt that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEvent {
    /// Connection-attempt generation of the emitting session
    pub attempt: u64,
    /// Event payload
    pub kind: RemoteEventKind,
}

/// Handle to a running remote connection.
///
/// Dropping the handle closes the connection.
#[derive(Debug)]
pub struct RemoteSession {
    attempt: u64,
    addr: SocketAddrV4,
    writer: mpsc::UnboundedSender<Vec<u8>>,
    task: Option<JoinHandle<()>>,
}

impl RemoteSession {
    /// Start connecting to `addr`.
    ///
    /// Returns immediately; the outcome arrives on `events` as `Connected`,
    /// `Error` or `TimedOut`. Credentials live in the connection task and are
    /// dropped with it.
    pub fn open(
        attempt: u64,
        addr: SocketAddrV4,
        remote: &RemoteSettings,
        prompts: &PromptSettings,
        credentials: Credentials,
        events: mpsc::Sender<RemoteEvent>,
    ) -> Result<Self> {
        let watcher = PromptWatcher::new(prompts, credentials)?;
        let (writer, writes) = mpsc::unbounded_channel();

        let connection = Connection {
            attempt,
            addr,
            settings: remote.clone(),
            filter: ProtocolFilter::new(&prompts.pager),
            watcher,
            events: events.clone(),
            answered: HashSet::new(),
        };

        let task = tokio::spawn(async move {
            let kind = match AssertUnwindSafe(connection.run(writes)).catch_unwind().await {
                Ok(kind) => kind,
                Err(_) => {
                    error!("Remote session task for {} panicked", addr);
                    RemoteEventKind::Error(format!("Internal error in session with {addr}"))
                }
            };
            let _ = events.send(RemoteEvent { attempt, kind }).await;
        });

        debug!("Opened remote session attempt={} addr={}", attempt, addr);

        Ok(Self {
            attempt,
            addr,
            writer,
            task: Some(task),
        })
    }

    /// Connection-attempt generation.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Remote address.
    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    /// Queue bytes for the socket.
    ///
    /// Best effort: once the connection has ended the bytes are dropped and
    /// a warning is logged.
    pub fn write(&self, bytes: impl Into<Vec<u8>>) {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return;
        }
        if self.writer.send(bytes).is_err() {
            warn!("Dropped write to closed remote session {}", self.addr);
        }
    }

    /// Tear the connection down. No further events are emitted.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Closed remote session attempt={} addr={}", self.attempt, self.addr);
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.task.is_none()
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// State owned by the connection task.
struct Connection {
    attempt: u64,
    addr: SocketAddrV4,
    settings: RemoteSettings,
    filter: ProtocolFilter,
    watcher: PromptWatcher,
    events: mpsc::Sender<RemoteEvent>,
    /// Options already refused, so each is answered once
    answered: HashSet<Negotiation>,
}

impl Connection {
    /// Drive the socket until it ends; returns the terminal event.
    async fn run(mut self, mut writes: mpsc::UnboundedReceiver<Vec<u8>>) -> RemoteEventKind {
        let addr = self.addr.to_string();

        let connect = TcpStream::connect(self.addr);
        let stream = match tokio::time::timeout(self.settings.connect_timeout(), connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                info!("Connection to {} failed: {}", addr, e);
                let err = Error::ConnectionFailed {
                    addr,
                    reason: e.to_string(),
                };
                return RemoteEventKind::Error(err.to_string());
            }
            Err(_) => {
                info!("Connection to {} timed out", addr);
                let err = Error::ConnectTimeout {
                    addr,
                    timeout_ms: self.settings.connect_timeout_ms,
                };
                return RemoteEventKind::TimedOut(err.to_string());
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY on {}: {}", addr, e);
        }

        info!("Connected to {}", addr);
        self.emit(RemoteEventKind::Connected).await;

        let (mut reader, mut writer) = stream.into_split();
        let mut buf = vec![0u8; self.settings.read_buffer_size];

        loop {
            tokio::select! {
                result = reader.read(&mut buf) => {
                    match result {
                        Ok(0) => {
                            let rest = self.filter.feed_final(&[]);
                            if !rest.text.is_empty() {
                                self.emit(RemoteEventKind::Data { text: rest.text, pager: false }).await;
                            }
                            info!("Remote {} closed the connection", addr);
                            return RemoteEventKind::Closed;
                        }
                        Ok(n) => {
                            let out = self.filter.feed(&buf[..n]);
                            let reply = self.process(out).await;
                            if !reply.is_empty() {
                                if let Err(e) = writer.write_all(&reply).await {
                                    return self.failed(&addr, e);
                                }
                            }
                        }
                        Err(e) => return self.failed(&addr, e),
                    }
                }

                Some(bytes) = writes.recv() => {
                    if let Err(e) = writer.write_all(&bytes).await {
                        return self.failed(&addr, e);
                    }
                }
            }
        }
    }

    /// Forward filtered output and build the bytes to write back.
    ///
    /// Waits while the owner's event queue is full.
    async fn process(&mut self, out: FilterOutput) -> Vec<u8> {
        let mut reply = Vec::new();

        if self.settings.refuse_options {
            for negotiation in out.negotiations {
                if let Some(refusal) = negotiation.refusal() {
                    if self.answered.insert(negotiation) {
                        debug!("Refusing TELNET option {:?} {}", negotiation.verb, negotiation.option);
                        reply.extend_from_slice(&refusal);
                    }
                }
            }
        }

        if out.text.is_empty() && !out.pager {
            return reply;
        }

        let actions = self.watcher.observe(&out.text);
        self.emit(RemoteEventKind::Data {
            text: out.text,
            pager: out.pager,
        })
        .await;

        for action in actions {
            info!("Submitting {} to {}", action.label(), self.addr);
            reply.extend_from_slice(action.payload().as_bytes());
            reply.extend_from_slice(self.settings.line_terminator.as_bytes());
        }

        if out.pager {
            debug!("Acknowledging pager prompt from {}", self.addr);
            reply.push(b' ');
        }

        reply
    }

    fn failed(&self, addr: &str, e: std::io::Error) -> RemoteEventKind {
        warn!("Connection to {} lost: {}", addr, e);
        let err = Error::ConnectionFailed {
            addr: addr.to_string(),
            reason: e.to_string(),
        };
        RemoteEventKind::Error(err.to_string())
    }

    async fn emit(&self, kind: RemoteEventKind) {
        let event = RemoteEvent {
            attempt: self.attempt,
            kind,
        };
        if self.events.send(event).await.is_err() {
            debug!("Event receiver for {} is gone", self.addr);
        }
    }
}
