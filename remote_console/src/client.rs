use std::io::Write;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::chat::split_message;
use crate::framing::{decode_response, encode_request, read_frame, response_code};
use crate::{ChatRoom, ConsoleCommand, ConsoleError, ResponseCode};

/// Connection and pacing settings for the remote console.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    pub host: String,
    pub port: u16,
    pub login: String,
    pub password: String,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub send_delay_ms: u64,
    pub max_message_len: usize,
    /// Prepended to every broadcast chunk.
    pub chat_prefix: String,
    pub io_timeout_ms: u64,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8991,
            login: String::new(),
            password: String::new(),
            max_attempts: 8,
            initial_backoff_ms: 250,
            max_backoff_ms: 4_000,
            send_delay_ms: 200,
            max_message_len: 750,
            chat_prefix: String::new(),
            io_timeout_ms: 5_000,
        }
    }
}

impl ConsoleSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Bounded attempts with doubling backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        let delay = self.initial_backoff.saturating_mul(1u32 << shift);
        delay.min(self.max_backoff)
    }
}

/// Blocking client holding at most one authenticated connection.
pub struct RemoteConsole {
    settings: ConsoleSettings,
    policy: RetryPolicy,
    stream: Option<TcpStream>,
    last_response: Option<String>,
}

impl RemoteConsole {
    pub fn new(settings: ConsoleSettings) -> Self {
        let policy = settings.retry_policy();
        Self {
            settings,
            policy,
            stream: None,
            last_response: None,
        }
    }

    pub fn settings(&self) -> &ConsoleSettings {
        &self.settings
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Decoded text of the last successful response.
    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Opens the socket and authenticates once.
    pub fn connect(&mut self) -> Result<(), ConsoleError> {
        let addr = self.settings.address();
        let stream = TcpStream::connect(&addr).map_err(|source| ConsoleError::Connect {
            addr: addr.clone(),
            source,
        })?;
        if self.settings.io_timeout_ms > 0 {
            let timeout = Some(Duration::from_millis(self.settings.io_timeout_ms));
            stream.set_read_timeout(timeout)?;
            stream.set_write_timeout(timeout)?;
        }
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(target: "remote_console", error = %err, "console.nodelay_failed");
        }
        self.stream = Some(stream);

        let auth = ConsoleCommand::Auth {
            login: self.settings.login.clone(),
            password: self.settings.password.clone(),
        };
        let (code, _) = match self.exchange(&auth) {
            Ok(result) => result,
            Err(err) => {
                self.stream = None;
                return Err(err);
            }
        };
        if !code.is_ok() {
            self.stream = None;
            return Err(ConsoleError::Rejected {
                command: auth.to_string(),
                code,
            });
        }
        tracing::info!(target: "remote_console", addr = %addr, "console.connected");
        Ok(())
    }

    /// Drops the connection; the next send reconnects.
    pub fn reset(&mut self) {
        if self.stream.take().is_some() {
            tracing::info!(target: "remote_console", "console.reset");
        }
    }

    /// Sends a command until the console answers OK or the attempt budget runs out.
    pub fn send(&mut self, command: &ConsoleCommand) -> Result<String, ConsoleError> {
        for attempt in 1..=self.policy.max_attempts {
            if self.stream.is_none() {
                if let Err(err) = self.connect() {
                    tracing::warn!(
                        target: "remote_console",
                        attempt,
                        error = %err,
                        "console.connect_failed"
                    );
                    self.pause(attempt);
                    continue;
                }
            }

            match self.exchange(command) {
                Ok((code, text)) if code.is_ok() && response_complete(command, &text) => {
                    tracing::debug!(
                        target: "remote_console",
                        command = %command,
                        "console.command_ok"
                    );
                    self.last_response = Some(text.clone());
                    return Ok(text);
                }
                Ok((code, text)) => {
                    tracing::warn!(
                        target: "remote_console",
                        command = %command,
                        attempt,
                        code = ?code,
                        reason = code.description(),
                        response = %text,
                        "console.command_rejected"
                    );
                }
                Err(err) => {
                    tracing::warn!(
                        target: "remote_console",
                        command = %command,
                        attempt,
                        error = %err,
                        "console.exchange_failed"
                    );
                    self.stream = None;
                }
            }
            self.pause(attempt);
        }

        tracing::error!(
            target: "remote_console",
            command = %command,
            attempts = self.policy.max_attempts,
            "console.exhausted"
        );
        Err(ConsoleError::Exhausted {
            command: command.to_string(),
            attempts: self.policy.max_attempts,
        })
    }

    /// Broadcasts to every player, split into console-sized chunks.
    pub fn broadcast(&mut self, message: &str) -> Result<(), ConsoleError> {
        self.broadcast_with(ChatRoom::All, 0, message)
    }

    pub fn broadcast_with(
        &mut self,
        room: ChatRoom,
        recipient: i64,
        message: &str,
    ) -> Result<(), ConsoleError> {
        let prefix = self.settings.chat_prefix.clone();
        let budget = self
            .settings
            .max_message_len
            .saturating_sub(prefix.chars().count())
            .max(1);
        let chunks = split_message(message, budget);
        let delay = Duration::from_millis(self.settings.send_delay_ms);
        for (idx, chunk) in chunks.iter().enumerate() {
            if idx > 0 && !delay.is_zero() {
                thread::sleep(delay);
            }
            let command = ConsoleCommand::ChatMsg {
                room,
                recipient,
                text: format!("{prefix}{chunk}"),
            };
            self.send(&command)?;
        }
        Ok(())
    }

    fn exchange(&mut self, command: &ConsoleCommand) -> Result<(ResponseCode, String), ConsoleError> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            ConsoleError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "remote console not connected",
            ))
        })?;
        let frame = encode_request(&command.to_wire())?;
        stream.write_all(&frame)?;
        stream.flush()?;
        let body = read_frame(stream)?;
        let text = decode_response(&body)?;
        let code = ResponseCode::from_code(response_code(&text)?);
        Ok((code, text))
    }

    fn pause(&self, attempt: u32) {
        if attempt < self.policy.max_attempts {
            thread::sleep(self.policy.delay_for(attempt));
        }
    }
}

// The player list occasionally comes back with only a status field.
fn response_complete(command: &ConsoleCommand, text: &str) -> bool {
    match command {
        ConsoleCommand::GetPlayerList => text.contains("playerList"),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_command_line;
    use std::io::Read;
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn reply(stream: &mut TcpStream, text: &str) {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        let mut wire = (payload.len() as u16).to_le_bytes().to_vec();
        wire.extend_from_slice(&payload);
        stream.write_all(&wire).unwrap();
    }

    fn read_request(stream: &mut TcpStream) -> Option<String> {
        let mut len = [0u8; 2];
        stream.read_exact(&mut len).ok()?;
        let mut body = vec![0u8; u16::from_le_bytes(len) as usize];
        stream.read_exact(&mut body).ok()?;
        body.pop();
        String::from_utf8(body).ok()
    }

    /// Serves one connection, answering each request with the next scripted status.
    fn fake_console(statuses: Vec<&'static str>) -> (u16, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            for status in statuses {
                let Some(request) = read_request(&mut stream) else {
                    return;
                };
                tx.send(request).unwrap();
                reply(&mut stream, status);
            }
        });
        (port, rx)
    }

    fn settings(port: u16) -> ConsoleSettings {
        ConsoleSettings {
            port,
            login: "arcade".into(),
            password: "pw".into(),
            max_attempts: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            send_delay_ms: 0,
            ..ConsoleSettings::default()
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ConsoleSettings::default().retry_policy();
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for(4), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(9), Duration::from_millis(4_000));
    }

    #[test]
    fn authenticates_then_sends() {
        let (port, requests) = fake_console(vec!["STATUS=1", "STATUS=1"]);
        let mut console = RemoteConsole::new(settings(port));
        console
            .send(&ConsoleCommand::server_input("spawn2"))
            .unwrap();
        assert_eq!(requests.recv().unwrap(), "auth arcade pw");
        assert_eq!(requests.recv().unwrap(), "serverinput spawn2");
        assert_eq!(console.last_response(), Some("STATUS=1"));
    }

    #[test]
    fn retries_until_ok() {
        let (port, requests) = fake_console(vec!["STATUS=1", "STATUS=7", "STATUS=1"]);
        let mut console = RemoteConsole::new(settings(port));
        console.send(&ConsoleCommand::CutChatLog).unwrap();
        let seen: Vec<String> = requests.try_iter().collect();
        assert_eq!(seen, vec!["auth arcade pw", "cutchatlog", "cutchatlog"]);
    }

    #[test]
    fn gives_up_after_budget() {
        let (port, _requests) =
            fake_console(vec!["STATUS=1", "STATUS=3", "STATUS=3", "STATUS=3"]);
        let mut console = RemoteConsole::new(settings(port));
        let err = console.send(&ConsoleCommand::CutChatLog).unwrap_err();
        assert!(err.is_exhausted());
    }

    #[test]
    fn unreachable_console_is_exhausted() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let mut console = RemoteConsole::new(settings(port));
        let err = console.send(&ConsoleCommand::CutChatLog).unwrap_err();
        assert!(matches!(err, ConsoleError::Exhausted { attempts: 3, .. }));
        assert!(!console.is_connected());
    }

    #[test]
    fn broadcast_prefixes_each_chunk() {
        let (port, requests) = fake_console(vec!["STATUS=1", "STATUS=1", "STATUS=1"]);
        let mut console = RemoteConsole::new(ConsoleSettings {
            chat_prefix: "> ".into(),
            max_message_len: 8,
            ..settings(port)
        });
        console.broadcast("line1\nline2").unwrap();
        let _auth = requests.recv().unwrap();
        let first = parse_command_line(&requests.recv().unwrap()).unwrap();
        let second = parse_command_line(&requests.recv().unwrap()).unwrap();
        assert_eq!(first, ConsoleCommand::chat_to_all("> line1"));
        assert_eq!(second, ConsoleCommand::chat_to_all("> line2"));
    }
}
