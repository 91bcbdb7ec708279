//! Per-client relay state machine.
//!
//! A `RelaySession` bridges one client message channel to at most one
//! [`RemoteSession`]. It runs as a single task: client frames and remote
//! events are handled one at a time, so the state needs no locking.
//!
//! Both the event queue and the client outbox are bounded. A reply waits for
//! room in the outbox, and while it waits no remote events are taken, so the
//! remote task stops reading its socket.
//!
//! ```text
//!   Idle ──connect──▶ Connecting ──Connected──▶ Connected
//!    ▲                    │                         │
//!    └── error / timeout / remote close / disconnect ┘
//! ```

use std::net::SocketAddrV4;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use termbridge_core::{
    validate_ipv4, ClientMessage, Credentials, Error, RelayState, ServerConfig, ServerMessage,
    SessionId,
};

use crate::remote::{RemoteEvent, RemoteEventKind, RemoteSession};

/// Status text sent when the remote host closes the socket.
pub const STATUS_REMOTE_CLOSED: &str = "Session ended by remote host";

/// Status text sent after a client `disconnect`.
pub const STATUS_DISCONNECTED: &str = "Session closed";

/// One client's relay session.
#[derive(Debug)]
pub struct RelaySession {
    id: SessionId,
    config: Arc<ServerConfig>,
    state: RelayState,
    remote: Option<RemoteSession>,
    /// Generation of the current connection attempt
    attempt: u64,
    outbox: mpsc::Sender<ServerMessage>,
    events: mpsc::Sender<RemoteEvent>,
}

impl RelaySession {
    /// Create an idle session that replies on `outbox`.
    ///
    /// The returned receiver carries remote events and must be passed to
    /// [`RelaySession::run`]. It holds `server.queue_depth` events.
    pub fn new(
        id: SessionId,
        config: Arc<ServerConfig>,
        outbox: mpsc::Sender<ServerMessage>,
    ) -> (Self, mpsc::Receiver<RemoteEvent>) {
        let (events, events_rx) = mpsc::channel(config.server.queue_depth);
        let session = Self {
            id,
            config,
            state: RelayState::Idle,
            remote: None,
            attempt: 0,
            outbox,
            events,
        };
        (session, events_rx)
    }

    /// Current state.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Serve the session until the client stream ends.
    ///
    /// When `inbound` ends the remote connection is closed and nothing more
    /// is sent to the client.
    pub async fn run<S>(mut self, mut inbound: S, mut events: mpsc::Receiver<RemoteEvent>)
    where
        S: Stream<Item = String> + Unpin,
    {
        info!("Relay session {} started", self.id);

        loop {
            tokio::select! {
                frame = inbound.next() => match frame {
                    Some(text) => self.handle_frame(&text).await,
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event).await,
            }
        }

        self.shutdown();
        info!("Relay session {} ended", self.id);
    }

    /// Handle one client text frame.
    pub async fn handle_frame(&mut self, text: &str) {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!("Session {} sent a malformed message: {}", self.id, e);
                self.send(ServerMessage::from(&e)).await;
            }
        }
    }

    /// Handle one decoded client message.
    pub async fn handle_message(&mut self, message: ClientMessage) {
        debug!(
            "Session {} received {} in state {:?}",
            self.id,
            message.kind(),
            self.state
        );

        match message {
            ClientMessage::Connect { ip, credentials } => self.connect(&ip, credentials).await,
            ClientMessage::Command { command } => self.command(&command).await,
            ClientMessage::Control { data } => self.control(&data).await,
            ClientMessage::Disconnect => self.disconnect().await,
        }
    }

    /// Handle one event from a remote connection.
    pub async fn handle_event(&mut self, event: RemoteEvent) {
        if event.attempt != self.attempt || self.remote.is_none() {
            debug!(
                "Session {} discarding event from superseded attempt {}",
                self.id, event.attempt
            );
            return;
        }

        match event.kind {
            RemoteEventKind::Connected => {
                if self.state != RelayState::Connecting {
                    return;
                }
                self.state = RelayState::Connected;
                if let Some(addr) = self.remote_addr() {
                    self.send(ServerMessage::status(format!("Connected to {addr}"))).await;
                }
                self.send(ServerMessage::Ready).await;
            }
            RemoteEventKind::Data { text, pager } => {
                if pager {
                    debug!("Session {} acknowledged a pager prompt", self.id);
                }
                if !text.is_empty() {
                    self.send(ServerMessage::output(text)).await;
                }
            }
            RemoteEventKind::Error(message) => {
                self.teardown();
                self.send(ServerMessage::error(message)).await;
                self.send(ServerMessage::Closed).await;
            }
            RemoteEventKind::TimedOut(message) => {
                self.teardown();
                self.send(ServerMessage::status(message)).await;
                self.send(ServerMessage::Closed).await;
            }
            RemoteEventKind::Closed => {
                self.teardown();
                self.send(ServerMessage::status(STATUS_REMOTE_CLOSED)).await;
                self.send(ServerMessage::Closed).await;
            }
        }
    }

    async fn connect(&mut self, ip: &str, credentials: Credentials) {
        let ip = match validate_ipv4(ip) {
            Ok(ip) => ip,
            Err(e) => {
                self.reject(&e).await;
                return;
            }
        };

        // Last connect wins: the superseded remote gets no `closed`
        if let Some(mut old) = self.remote.take() {
            info!(
                "Session {} replacing connection to {}",
                self.id,
                old.addr()
            );
            old.close();
        }
        self.state = RelayState::Idle;
        self.attempt += 1;

        let addr = SocketAddrV4::new(ip, self.config.remote.default_port);
        info!(
            "Session {} connecting to {} (username {})",
            self.id,
            addr,
            if credentials.username().is_some() { "present" } else { "absent" }
        );

        match RemoteSession::open(
            self.attempt,
            addr,
            &self.config.remote,
            &self.config.prompts,
            credentials,
            self.events.clone(),
        ) {
            Ok(remote) => {
                self.remote = Some(remote);
                self.state = RelayState::Connecting;
                self.send(ServerMessage::status(format!("Connecting to {addr}...")))
                    .await;
            }
            Err(e) => self.reject(&e).await,
        }
    }

    async fn command(&self, command: &str) {
        let Some(remote) = self.ready_remote().await else {
            return;
        };

        let trimmed = command.trim();
        let mut line = Vec::with_capacity(trimmed.len() + 2);
        line.extend_from_slice(trimmed.as_bytes());
        line.extend_from_slice(self.config.remote.line_terminator.as_bytes());

        debug!("Session {} command ({} bytes)", self.id, trimmed.len());
        remote.write(line);
    }

    async fn control(&self, data: &str) {
        let Some(remote) = self.ready_remote().await else {
            return;
        };
        debug!("Session {} control ({} bytes)", self.id, data.len());
        remote.write(data.as_bytes().to_vec());
    }

    async fn disconnect(&mut self) {
        if !self.state.has_remote() {
            self.reject(&Error::NoActiveSession).await;
            return;
        }

        info!("Session {} disconnecting", self.id);
        self.teardown();
        self.send(ServerMessage::status(STATUS_DISCONNECTED)).await;
        self.send(ServerMessage::Closed).await;
    }

    /// The remote, if commands are accepted; otherwise reply with an error.
    async fn ready_remote(&self) -> Option<&RemoteSession> {
        let err = match self.state {
            RelayState::Connected => return self.remote.as_ref(),
            RelayState::Connecting => Error::SessionNotReady,
            RelayState::Idle => Error::NoActiveSession,
        };
        self.reject(&err).await;
        None
    }

    fn remote_addr(&self) -> Option<SocketAddrV4> {
        self.remote.as_ref().map(RemoteSession::addr)
    }

    /// Close the remote connection and return to `Idle`.
    fn teardown(&mut self) {
        if let Some(mut remote) = self.remote.take() {
            remote.close();
        }
        self.state = RelayState::Idle;
    }

    /// Client channel is gone: close everything without replying.
    fn shutdown(&mut self) {
        if self.remote.is_some() {
            debug!("Session {} closing remote on client disconnect", self.id);
        }
        self.teardown();
    }

    async fn reject(&self, err: &Error) {
        debug!("Session {} rejected request: {}", self.id, err);
        self.send(ServerMessage::from(err)).await;
    }

    /// Queue a reply, waiting while the client is behind.
    async fn send(&self, message: ServerMessage) {
        if self.outbox.send(message).await.is_err() {
            debug!("Session {} client channel closed", self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (
        RelaySession,
        mpsc::Receiver<ServerMessage>,
        mpsc::Receiver<RemoteEvent>,
    ) {
        let (tx, rx) = mpsc::channel(16);
        let (session, events) = RelaySession::new(SessionId::new(), Arc::default(), tx);
        (session, rx, events)
    }

    fn event(attempt: u64, kind: RemoteEventKind) -> RemoteEvent {
        RemoteEvent { attempt, kind }
    }

    fn data(text: &str) -> RemoteEventKind {
        RemoteEventKind::Data {
            text: text.to_string(),
            pager: false,
        }
    }

    fn drain(rx: &mut mpsc::Receiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn test_new_session_is_idle() {
        let (session, _rx, _events) = session();
        assert_eq!(session.state(), RelayState::Idle);
        assert!(session.remote.is_none());
    }

    #[tokio::test]
    async fn test_invalid_ip_rejected_without_state_change() {
        let (mut session, mut rx, _events) = session();
        session.handle_frame(r#"{"type":"connect","ip":"999.1.1.1"}"#).await;

        assert_eq!(session.state(), RelayState::Idle);
        assert!(session.remote.is_none());
        assert_eq!(session.attempt, 0);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::error("Invalid IPv4 address: 999.1.1.1")]
        );
    }

    #[tokio::test]
    async fn test_command_and_control_when_idle() {
        let (mut session, mut rx, _events) = session();
        session.handle_frame(r#"{"type":"command","command":"show version"}"#).await;
        session.handle_frame(r#"{"type":"control","data":"\t"}"#).await;
        session.handle_frame(r#"{"type":"disconnect"}"#).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::error("No active session"),
                ServerMessage::error("No active session"),
                ServerMessage::error("No active session"),
            ]
        );
        assert_eq!(session.state(), RelayState::Idle);
    }

    #[tokio::test]
    async fn test_malformed_frames() {
        let (mut session, mut rx, _events) = session();
        session.handle_frame("not json").await;
        session.handle_frame(r#"{"type":"reboot"}"#).await;
        session.handle_frame(r#"{"type":"command"}"#).await;

        let replies = drain(&mut rx);
        assert_eq!(replies.len(), 3);
        for reply in replies {
            match reply {
                ServerMessage::Error { message } => {
                    assert!(message.starts_with("Malformed message"))
                }
                other => panic!("unexpected reply {other:?}"),
            }
        }
        assert_eq!(session.state(), RelayState::Idle);
    }

    #[tokio::test]
    async fn test_stray_event_ignored_when_idle() {
        let (mut session, mut rx, _events) = session();
        session.handle_event(event(0, RemoteEventKind::Closed)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.state(), RelayState::Idle);
    }

    #[tokio::test]
    async fn test_connect_enters_connecting() {
        let (mut session, mut rx, _events) = session();
        session.handle_frame(r#"{"type":"connect","ip":"127.0.0.1"}"#).await;

        assert_eq!(session.state(), RelayState::Connecting);
        assert_eq!(session.attempt, 1);
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::status("Connecting to 127.0.0.1:23...")]
        );

        session.handle_frame(r#"{"type":"command","command":"show version"}"#).await;
        assert_eq!(
            drain(&mut rx),
            vec![ServerMessage::error("Session is not ready yet")]
        );
    }

    #[tokio::test]
    async fn test_superseded_events_discarded() {
        let (mut session, mut rx, _events) = session();
        session.handle_frame(r#"{"type":"connect","ip":"127.0.0.1"}"#).await;
        session.handle_frame(r#"{"type":"connect","ip":"127.0.0.2"}"#).await;
        drain(&mut rx);

        session.handle_event(event(1, data("stale"))).await;
        session.handle_event(event(1, RemoteEventKind::Closed)).await;
        assert!(drain(&mut rx).is_empty());
        assert_eq!(session.state(), RelayState::Connecting);
    }

    #[tokio::test]
    async fn test_event_sequence_for_current_attempt() {
        let (mut session, mut rx, _events) = session();
        session.handle_frame(r#"{"type":"connect","ip":"127.0.0.1"}"#).await;
        drain(&mut rx);

        session.handle_event(event(1, RemoteEventKind::Connected)).await;
        session.handle_event(event(1, data(""))).await;
        session.handle_event(event(1, data("router> "))).await;
        session.handle_event(event(1, RemoteEventKind::TimedOut("Timed out".into()))).await;

        assert_eq!(
            drain(&mut rx),
            vec![
                ServerMessage::status("Connected to 127.0.0.1:23"),
                ServerMessage::Ready,
                ServerMessage::output("router> "),
                ServerMessage::status("Timed out"),
                ServerMessage::Closed,
            ]
        );
        assert_eq!(session.state(), RelayState::Idle);
        assert!(session.remote.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_from_connecting() {
        let (mut session, mut rx, _events) = session();
        session.handle_frame(r#"{"type":"connect","ip":"127.0.0.1"}"#).await;
        session.handle_frame(r#"{"type":"disconnect"}"#).await;

        let replies = drain(&mut rx);
        assert_eq!(
            &replies[1..],
            &[ServerMessage::status(STATUS_DISCONNECTED), ServerMessage::Closed]
        );
        assert_eq!(session.state(), RelayState::Idle);
    }
}
