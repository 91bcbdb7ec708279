//! Configuration types for the termbridge server.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{Error, Result};

/// Server configuration loaded from YAML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP/WebSocket listener settings
    pub server: ServerSettings,
    /// Outbound Telnet settings
    pub remote: RemoteSettings,
    /// Prompt markers
    pub prompts: PromptSettings,
    /// One-shot probe settings
    pub probe: ProbeSettings,
}

impl ServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ServerConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the `PORT` environment override, if present.
    pub fn apply_env_port(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(raw) = value {
            self.server.port = raw
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("PORT must be a port number, got '{raw}'")))?;
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_sessions == 0 {
            return Err(Error::Config("server.max_sessions must be > 0".into()));
        }
        if self.server.queue_depth == 0 {
            return Err(Error::Config("server.queue_depth must be > 0".into()));
        }

        if self.remote.default_port == 0 {
            return Err(Error::Config("remote.default_port must be > 0".into()));
        }
        if self.remote.connect_timeout_ms == 0 {
            return Err(Error::Config("remote.connect_timeout_ms must be > 0".into()));
        }
        if self.remote.read_buffer_size == 0 {
            return Err(Error::Config("remote.read_buffer_size must be > 0".into()));
        }
        if self.remote.line_terminator.is_empty() {
            return Err(Error::Config("remote.line_terminator cannot be empty".into()));
        }

        self.prompts.validate()?;

        if self.probe.window_ms == 0 || self.probe.idle_ms == 0 {
            return Err(Error::Config("probe windows must be > 0".into()));
        }
        if self.probe.max_output_chars == 0 {
            return Err(Error::Config("probe.max_output_chars must be > 0".into()));
        }

        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind
    pub bind_address: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum number of concurrent client connections
    pub max_sessions: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Directory of static files for the browser terminal
    pub static_dir: Option<String>,
    /// Messages buffered per client; a full queue pauses reads from the remote host
    pub queue_depth: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            max_sessions: 100,
            log_level: "info".to_string(),
            static_dir: None,
            queue_depth: 64,
        }
    }
}

/// Outbound Telnet settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Port used for interactive sessions
    pub default_port: u16,
    /// Transport handshake deadline in milliseconds
    pub connect_timeout_ms: u64,
    /// Size of each socket read
    pub read_buffer_size: usize,
    /// Appended to commands and auto-submitted credentials
    pub line_terminator: String,
    /// Answer WILL/DO requests with DONT/WONT
    pub refuse_options: bool,
}

impl RemoteSettings {
    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            default_port: 23,
            connect_timeout_ms: 10_000,
            read_buffer_size: 4096,
            line_terminator: "\r\n".to_string(),
            refuse_options: true,
        }
    }
}

/// Prompt markers, matched case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Login prompt markers
    pub username: Vec<String>,
    /// Password prompt markers
    pub password: Vec<String>,
    /// Pager continuation markers (matched literally)
    pub pager: Vec<String>,
    /// Size of the cumulative text window used for prompt detection
    pub window_chars: usize,
}

impl PromptSettings {
    /// Validate marker lists.
    pub fn validate(&self) -> Result<()> {
        for (name, markers) in [
            ("username", &self.username),
            ("password", &self.password),
            ("pager", &self.pager),
        ] {
            if markers.is_empty() {
                return Err(Error::Config(format!("prompts.{name} cannot be empty")));
            }
            if markers.iter().any(|m| m.trim().is_empty()) {
                return Err(Error::Config(format!(
                    "prompts.{name} contains a blank marker"
                )));
            }
        }

        let longest = self
            .username
            .iter()
            .chain(&self.password)
            .map(|m| m.chars().count())
            .max()
            .unwrap_or(0);
        if self.window_chars < longest {
            return Err(Error::Config(format!(
                "prompts.window_chars must be at least {longest}"
            )));
        }

        Ok(())
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            username: vec!["username:".to_string(), "login:".to_string()],
            password: vec!["password:".to_string()],
            pager: vec!["--More--".to_string()],
            window_chars: 512,
        }
    }
}

/// One-shot probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Upper bound on the whole probe
    pub window_ms: u64,
    /// Quiet period after output that ends the probe early
    pub idle_ms: u64,
    /// Characters of output returned
    pub max_output_chars: usize,
}

impl ProbeSettings {
    /// Probe window as a duration.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Idle threshold as a duration.
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            window_ms: 8000,
            idle_ms: 1500,
            max_output_chars: 4000,
        }
    }
}
