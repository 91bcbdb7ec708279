//! Session types for relay session management.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one client duplex connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State of a relay session.
///
/// A relay owns a remote session if and only if it is `Connecting` or
/// `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayState {
    /// No remote session
    Idle,
    /// Remote socket opened, transport handshake pending
    Connecting,
    /// Transport handshake complete
    Connected,
}

impl RelayState {
    /// Whether a remote session exists in this state.
    pub fn has_remote(&self) -> bool {
        !matches!(self, RelayState::Idle)
    }
}

/// Login material supplied with a `connect` request.
///
/// `Debug` never prints the password.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Username for the login prompt
    #[serde(default)]
    pub username: Option<String>,
    /// Password for the password prompt
    #[serde(default)]
    pub password: Option<String>,
}

impl Credentials {
    /// Create credentials from optional parts.
    pub fn new(username: Option<String>, password: Option<String>) -> Self {
        Self { username, password }
    }

    /// Username, if one was supplied and is not empty.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref().filter(|u| !u.is_empty())
    }

    /// Password, if one was supplied and is not empty.
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// True when neither credential is usable.
    pub fn is_empty(&self) -> bool {
        self.username().is_none() && self.password().is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username().map(|_| "<set>"))
            .field("password", &self.password().map(|_| "<redacted>"))
            .finish()
    }
}

/// Liveness record kept by the session registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier
    pub id: SessionId,
    /// Peer address of the client connection, if known
    pub peer: Option<String>,
    /// When the client connected
    pub opened_at: DateTime<Utc>,
}

impl SessionInfo {
    /// Create a liveness record stamped with the current time.
    pub fn new(id: SessionId, peer: Option<String>) -> Self {
        Self {
            id,
            peer,
            opened_at: Utc::now(),
        }
    }
}
