//! One-shot probe of a Telnet host.
//!
//! Opens a socket, logs in if credentials are given, optionally runs one
//! command and returns the tail of what the host printed. The socket never
//! outlives the call.

use std::collections::HashSet;
use std::net::SocketAddrV4;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info};

use termbridge_core::{
    validate_ipv4, validate_port, Error, ProbeRequest, ProbeResponse, Result, ServerConfig,
};
use termbridge_filter::{PromptWatcher, ProtocolFilter};

/// Why the read loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Finish {
    Closed,
    Idle,
    Window,
    Failed(String),
}

/// Probe a host.
///
/// Invalid addresses and ports are returned as `Err`; every network
/// outcome, including failure to connect, is an `Ok` response.
pub async fn probe(request: &ProbeRequest, config: &ServerConfig) -> Result<ProbeResponse> {
    let ip = validate_ipv4(&request.ip)?;
    let port = match request.port {
        Some(port) => validate_port(port)?,
        None => config.remote.default_port,
    };
    let addr = SocketAddrV4::new(ip, port);

    let mut watcher = PromptWatcher::new(&config.prompts, request.credentials())?;
    let mut filter = ProtocolFilter::new(&config.prompts.pager);
    let mut command = request
        .probe_command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from);

    info!("Probing {}", addr);

    let stream = match timeout(config.remote.connect_timeout(), TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let err = Error::ConnectionFailed {
                addr: addr.to_string(),
                reason: e.to_string(),
            };
            info!("Probe of {} failed: {}", addr, err);
            return Ok(ProbeResponse::failed(err.to_string()));
        }
        Err(_) => {
            let err = Error::ConnectTimeout {
                addr: addr.to_string(),
                timeout_ms: config.remote.connect_timeout_ms,
            };
            info!("Probe of {} failed: {}", addr, err);
            return Ok(ProbeResponse::failed(err.to_string()));
        }
    };

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; config.remote.read_buffer_size];
    let deadline = Instant::now() + config.probe.window();
    let keep = config.probe.max_output_chars;

    let mut transcript = String::new();
    let mut received = false;
    let mut answered = HashSet::new();

    let finish = loop {
        let wait = if received {
            deadline.min(Instant::now() + config.probe.idle())
        } else {
            deadline
        };

        let n = match timeout_at(wait, reader.read(&mut buf)).await {
            Err(_) if Instant::now() >= deadline => break Finish::Window,
            Err(_) => break Finish::Idle,
            Ok(Ok(0)) => break Finish::Closed,
            Ok(Ok(n)) => n,
            Ok(Err(e)) => break Finish::Failed(e.to_string()),
        };
        received = true;

        let out = filter.feed(&buf[..n]);
        let mut reply = Vec::new();

        if config.remote.refuse_options {
            for negotiation in out.negotiations {
                if let Some(refusal) = negotiation.refusal() {
                    if answered.insert(negotiation) {
                        reply.extend_from_slice(&refusal);
                    }
                }
            }
        }

        let actions = watcher.observe(&out.text);
        let submitted = !actions.is_empty();
        for action in actions {
            debug!("Probe submitting {} to {}", action.label(), addr);
            reply.extend_from_slice(action.payload().as_bytes());
            reply.extend_from_slice(config.remote.line_terminator.as_bytes());
        }

        // The command waits for output that follows the last submission
        let logged_in = watcher.password_sent() || watcher.is_done();
        if logged_in && !submitted && !out.text.is_empty() {
            if let Some(command) = command.take() {
                debug!("Probe sending command ({} bytes) to {}", command.len(), addr);
                reply.extend_from_slice(command.as_bytes());
                reply.extend_from_slice(config.remote.line_terminator.as_bytes());
            }
        }

        if out.pager {
            reply.push(b' ');
        }

        transcript.push_str(&out.text);
        truncate_front(&mut transcript, keep);

        if !reply.is_empty() {
            if let Err(e) = writer.write_all(&reply).await {
                break Finish::Failed(e.to_string());
            }
        }
    };

    transcript.push_str(&filter.feed_final(&[]).text);
    truncate_front(&mut transcript, keep);

    let reason = match &finish {
        Finish::Closed => "remote host closed the connection".to_string(),
        Finish::Idle => "output settled".to_string(),
        Finish::Window => "probe window elapsed".to_string(),
        Finish::Failed(e) => format!("connection lost: {e}"),
    };
    info!("Probe of {} finished: {}", addr, reason);

    let response = if received {
        ProbeResponse {
            ok: true,
            message: format!("Connected to {addr}, {reason}"),
            output: transcript,
        }
    } else {
        ProbeResponse {
            ok: false,
            message: format!("Connected to {addr} but no output received, {reason}"),
            output: transcript,
        }
    };

    Ok(response)
}

/// Keep only the last `max` characters of `s`.
fn truncate_front(s: &mut String, max: usize) {
    let len = s.chars().count();
    if len > max {
        let cut = s
            .char_indices()
            .nth(len - max)
            .map(|(idx, _)| idx)
            .unwrap_or(s.len());
        s.drain(..cut);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_front() {
        let mut s = "abcdef".to_string();
        truncate_front(&mut s, 3);
        assert_eq!(s, "def");

        let mut s = "é✓x".to_string();
        truncate_front(&mut s, 2);
        assert_eq!(s, "✓x");

        let mut s = "ab".to_string();
        truncate_front(&mut s, 5);
        assert_eq!(s, "ab");
    }

    #[tokio::test]
    async fn test_invalid_address_is_error() {
        let request = ProbeRequest {
            ip: "999.1.1.1".into(),
            ..Default::default()
        };
        let result = probe(&request, &ServerConfig::default()).await;
        assert!(matches!(result, Err(Error::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn test_invalid_port_is_error() {
        let request = ProbeRequest {
            ip: "127.0.0.1".into(),
            port: Some(70000),
            ..Default::default()
        };
        let result = probe(&request, &ServerConfig::default()).await;
        assert!(matches!(result, Err(Error::InvalidPort(70000))));
    }
}
