//! Credential prompt detection and auto-submission policy.

use regex::{Regex, RegexBuilder};
use std::fmt;

use termbridge_core::{Credentials, Error, PromptSettings, Result};

use crate::pager::last_chars;

/// Case-insensitive matcher for a set of literal prompt markers.
#[derive(Debug, Clone)]
pub struct PromptMatcher {
    regex: Regex,
}

impl PromptMatcher {
    /// Compile a matcher for any of `markers`.
    pub fn new<S: AsRef<str>>(markers: &[S]) -> Result<Self> {
        let alternation = markers
            .iter()
            .map(|m| m.as_ref())
            .filter(|m| !m.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");
        if alternation.is_empty() {
            return Err(Error::Config("prompt marker list is empty".into()));
        }

        let regex = RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("Invalid prompt markers: {e}")))?;

        Ok(Self { regex })
    }

    /// Whether any marker occurs in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Byte offset just past the first marker in `text`.
    pub fn find_end(&self, text: &str) -> Option<usize> {
        self.regex.find(text).map(|m| m.end())
    }
}

/// A credential line the remote session should write.
#[derive(Clone, PartialEq, Eq)]
pub enum PromptAction {
    /// Username prompt seen; send the username
    SendUsername(String),
    /// Password prompt seen; send the password
    SendPassword(String),
}

impl PromptAction {
    /// Text to write, without the line terminator.
    pub fn payload(&self) -> &str {
        match self {
            PromptAction::SendUsername(s) | PromptAction::SendPassword(s) => s,
        }
    }

    /// Which prompt triggered the action.
    pub fn label(&self) -> &'static str {
        match self {
            PromptAction::SendUsername(_) => "username",
            PromptAction::SendPassword(_) => "password",
        }
    }
}

impl fmt::Debug for PromptAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PromptAction({}, <redacted>)", self.label())
    }
}

/// Watches sanitized output for login prompts.
///
/// Text is accumulated in a bounded window so a prompt split across reads
/// is still recognised. Each credential is submitted at most once, and only
/// if it was supplied. After a submission the window is drained up to the
/// end of the matched prompt, so the same prompt text cannot trigger the
/// next step.
pub struct PromptWatcher {
    username: PromptMatcher,
    password: PromptMatcher,
    credentials: Credentials,
    username_sent: bool,
    password_sent: bool,
    window: String,
    window_chars: usize,
}

impl PromptWatcher {
    /// Create a watcher for one connection attempt.
    pub fn new(settings: &PromptSettings, credentials: Credentials) -> Result<Self> {
        Ok(Self {
            username: PromptMatcher::new(&settings.username)?,
            password: PromptMatcher::new(&settings.password)?,
            credentials,
            username_sent: false,
            password_sent: false,
            window: String::new(),
            window_chars: settings.window_chars,
        })
    }

    /// Feed newly received sanitized text.
    pub fn observe(&mut self, text: &str) -> Vec<PromptAction> {
        let mut actions = Vec::new();
        if self.is_done() || text.is_empty() {
            return actions;
        }

        self.window.push_str(text);
        let excess = self.window.len() - last_chars(&self.window, self.window_chars).len();
        self.window.drain(..excess);

        if !self.username_sent {
            if let Some(username) = self.credentials.username() {
                if let Some(end) = self.username.find_end(&self.window) {
                    actions.push(PromptAction::SendUsername(username.to_string()));
                    self.username_sent = true;
                    self.window.drain(..end);
                }
            }
        }

        if !self.password_sent {
            if let Some(password) = self.credentials.password() {
                if let Some(end) = self.password.find_end(&self.window) {
                    actions.push(PromptAction::SendPassword(password.to_string()));
                    self.password_sent = true;
                    self.window.drain(..end);
                }
            }
        }

        if self.is_done() {
            self.window.clear();
        }

        actions
    }

    /// Whether the username has been submitted.
    pub fn username_sent(&self) -> bool {
        self.username_sent
    }

    /// Whether the password has been submitted.
    pub fn password_sent(&self) -> bool {
        self.password_sent
    }

    /// True once nothing is left to submit.
    pub fn is_done(&self) -> bool {
        (self.username_sent || self.credentials.username().is_none())
            && (self.password_sent || self.credentials.password().is_none())
    }
}

impl fmt::Debug for PromptWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromptWatcher")
            .field("credentials", &self.credentials)
            .field("username_sent", &self.username_sent)
            .field("password_sent", &self.password_sent)
            .field("window_len", &self.window.len())
            .finish()
    }
}
