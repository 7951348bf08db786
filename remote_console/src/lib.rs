//! Client for the flight simulator server's remote console.
//!
//! The console speaks a small length-prefixed text protocol. This crate knows
//! the command vocabulary, the wire framing, the numeric result codes and the
//! retry/reconnect discipline the server needs, without depending on the
//! arcade runtime in `arcade_core`.

mod chat;
mod client;
mod command_text;
mod framing;

use std::fmt;
use std::io;

use thiserror::Error;

pub use chat::split_message;
pub use client::{ConsoleSettings, RemoteConsole, RetryPolicy};
pub use command_text::{parse_command_line, CommandParseError};
pub use framing::{
    decode_response, encode_request, percent_decode, read_frame, response_code, FrameError,
    MAX_PAYLOAD_LEN,
};

/// Chat audience selector used by `chatmsg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRoom {
    All,
    Coalition,
    Country,
    Player,
}

impl ChatRoom {
    pub const fn code(self) -> u8 {
        match self {
            ChatRoom::All => 0,
            ChatRoom::Coalition => 1,
            ChatRoom::Country => 2,
            ChatRoom::Player => 3,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ChatRoom::All),
            1 => Some(ChatRoom::Coalition),
            2 => Some(ChatRoom::Country),
            3 => Some(ChatRoom::Player),
            _ => None,
        }
    }
}

/// Commands understood by the remote console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Auth {
        login: String,
        password: String,
    },
    ChatMsg {
        room: ChatRoom,
        recipient: i64,
        text: String,
    },
    /// Fires a named trigger inside the running scenario.
    ServerInput {
        trigger: String,
    },
    CutChatLog,
    GetPlayerList,
}

impl ConsoleCommand {
    pub fn chat_to_all(text: impl Into<String>) -> Self {
        ConsoleCommand::ChatMsg {
            room: ChatRoom::All,
            recipient: 0,
            text: text.into(),
        }
    }

    pub fn server_input(trigger: impl Into<String>) -> Self {
        ConsoleCommand::ServerInput {
            trigger: trigger.into(),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            ConsoleCommand::Auth { .. } => "auth",
            ConsoleCommand::ChatMsg { .. } => "chatmsg",
            ConsoleCommand::ServerInput { .. } => "serverinput",
            ConsoleCommand::CutChatLog => "cutchatlog",
            ConsoleCommand::GetPlayerList => "getplayerlist",
        }
    }

    /// Text sent over the wire.
    pub fn to_wire(&self) -> String {
        match self {
            ConsoleCommand::Auth { login, password } => format!("auth {login} {password}"),
            ConsoleCommand::ChatMsg {
                room,
                recipient,
                text,
            } => format!("chatmsg {} {recipient} {text}", room.code()),
            ConsoleCommand::ServerInput { trigger } => format!("serverinput {trigger}"),
            ConsoleCommand::CutChatLog | ConsoleCommand::GetPlayerList => self.verb().to_string(),
        }
    }
}

/// Log-safe rendering; credentials never reach the logs.
impl fmt::Display for ConsoleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleCommand::Auth { login, .. } => write!(f, "auth {login} ****"),
            other => f.write_str(&other.to_wire()),
        }
    }
}

/// Result codes returned by the console for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    SocketError,
    Ok,
    UnknownError,
    UnknownCommand,
    ParameterCount,
    ReceiveBuffer,
    AuthorizationIncorrect,
    ServerNotRunning,
    UserError,
    UnknownUserError,
    Other(u32),
}

impl ResponseCode {
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => ResponseCode::SocketError,
            1 => ResponseCode::Ok,
            2 => ResponseCode::UnknownError,
            3 => ResponseCode::UnknownCommand,
            4 => ResponseCode::ParameterCount,
            5 => ResponseCode::ReceiveBuffer,
            6 => ResponseCode::AuthorizationIncorrect,
            7 => ResponseCode::ServerNotRunning,
            8 => ResponseCode::UserError,
            9 => ResponseCode::UnknownUserError,
            other => ResponseCode::Other(other),
        }
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, ResponseCode::Ok)
    }

    pub fn description(self) -> &'static str {
        match self {
            ResponseCode::SocketError => "socket error",
            ResponseCode::Ok => "OK",
            ResponseCode::UnknownError => "unknown error",
            ResponseCode::UnknownCommand => "unknown command",
            ResponseCode::ParameterCount => "parameter count error",
            ResponseCode::ReceiveBuffer => "receive buffer error",
            ResponseCode::AuthorizationIncorrect => "authorization incorrect",
            ResponseCode::ServerNotRunning => "server not running",
            ResponseCode::UserError => "server user error",
            ResponseCode::UnknownUserError => "unknown user error",
            ResponseCode::Other(_) => "unrecognized result code",
        }
    }
}

/// Failure talking to the remote console.
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("failed to connect to remote console at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("socket error talking to remote console: {0}")]
    Io(#[from] io::Error),
    #[error("malformed console frame: {0}")]
    Frame(#[from] FrameError),
    #[error("console answered '{command}' with {} ({code:?})", code.description())]
    Rejected { command: String, code: ResponseCode },
    #[error("gave up sending '{command}' after {attempts} attempts")]
    Exhausted { command: String, attempts: u32 },
}

impl ConsoleError {
    /// True when the retry budget ran out and the channel should be treated as down.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, ConsoleError::Exhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_text_matches_console_grammar() {
        assert_eq!(
            ConsoleCommand::chat_to_all("hello pilots").to_wire(),
            "chatmsg 0 0 hello pilots"
        );
        assert_eq!(
            ConsoleCommand::server_input("spawn2").to_wire(),
            "serverinput spawn2"
        );
        assert_eq!(ConsoleCommand::CutChatLog.to_wire(), "cutchatlog");
    }

    #[test]
    fn display_hides_password() {
        let auth = ConsoleCommand::Auth {
            login: "arcade".to_string(),
            password: "hunter2".to_string(),
        };
        assert_eq!(auth.to_wire(), "auth arcade hunter2");
        assert_eq!(auth.to_string(), "auth arcade ****");
    }

    #[test]
    fn response_codes_map_to_descriptions() {
        assert!(ResponseCode::from_code(1).is_ok());
        assert_eq!(ResponseCode::from_code(3), ResponseCode::UnknownCommand);
        assert_eq!(ResponseCode::from_code(42), ResponseCode::Other(42));
        assert_eq!(
            ResponseCode::AuthorizationIncorrect.description(),
            "authorization incorrect"
        );
    }
}
