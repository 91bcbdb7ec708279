//! Wire messages exchanged with browser clients.
//!
//! Every WebSocket text frame carries exactly one JSON object tagged by
//! `type`. Anything that does not match a known tag and shape is rejected
//! as malformed.

use serde::{Deserialize, Serialize};

use crate::{Credentials, Error, Result};

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Open a Telnet session to `ip` on the configured remote port
    Connect {
        /// Dotted-quad IPv4 address of the remote host
        ip: String,
        /// Optional login material
        #[serde(flatten)]
        credentials: Credentials,
    },
    /// Send a line of text followed by the line terminator
    Command {
        /// Free text, trimmed before use
        command: String,
    },
    /// Send raw keystroke bytes verbatim
    Control {
        /// Single character or short escape sequence
        data: String,
    },
    /// Close the remote session
    Disconnect,
}

impl ClientMessage {
    /// Decode one client frame.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::MalformedMessage(e.to_string()))
    }

    /// Short name of the message kind, safe to log.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Connect { .. } => "connect",
            ClientMessage::Command { .. } => "command",
            ClientMessage::Control { .. } => "control",
            ClientMessage::Disconnect => "disconnect",
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Informational, non-terminal
    Status {
        /// Human-readable text
        message: String,
    },
    /// Sanitized text to append to the terminal view
    Output {
        /// Sanitized text chunk
        data: String,
    },
    /// A failure
    Error {
        /// Human-readable text
        message: String,
    },
    /// Transport handshake complete; commands are accepted
    Ready,
    /// Terminal for the current connection attempt
    Closed,
}

impl ServerMessage {
    /// Build a `status` message.
    pub fn status(message: impl Into<String>) -> Self {
        ServerMessage::Status {
            message: message.into(),
        }
    }

    /// Build an `output` message.
    pub fn output(data: impl Into<String>) -> Self {
        ServerMessage::Output { data: data.into() }
    }

    /// Build an `error` message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<&Error> for ServerMessage {
    fn from(err: &Error) -> Self {
        ServerMessage::error(err.to_string())
    }
}

/// One-shot probe request (`POST /api/probe`).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRequest {
    /// Dotted-quad IPv4 address of the remote host
    pub ip: String,
    /// Remote port; the configured default when absent
    #[serde(default)]
    pub port: Option<i64>,
    /// Username for the login prompt
    #[serde(default)]
    pub username: Option<String>,
    /// Password for the password prompt
    #[serde(default)]
    pub password: Option<String>,
    /// Command to run once logged in
    #[serde(default)]
    pub probe_command: Option<String>,
}

impl ProbeRequest {
    /// Login material carried by the request.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

impl std::fmt::Debug for ProbeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeRequest")
            .field("ip", &self.ip)
            .field("port", &self.port)
            .field("credentials", &self.credentials())
            .field("probe_command", &self.probe_command)
            .finish()
    }
}

/// One-shot probe outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Whether the host accepted the connection and produced output
    pub ok: bool,
    /// Explanation of the outcome
    pub message: String,
    /// Tail of the sanitized text observed
    pub output: String,
}

impl ProbeResponse {
    /// A failed probe with no output.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            output: String::new(),
        }
    }
}
