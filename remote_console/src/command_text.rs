use std::num::ParseIntError;

use thiserror::Error;

use crate::{ChatRoom, ConsoleCommand};

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
    #[error("invalid chat room '{0}'")]
    InvalidRoom(u8),
}

/// Parses console wire text (`chatmsg 0 0 hello`) back into a command.
pub fn parse_command_line(input: &str) -> Result<ConsoleCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;
    let rest = parts.next().unwrap_or("").trim_start();

    match verb.as_str() {
        "auth" => {
            let mut args = rest.split_whitespace();
            let login = args
                .next()
                .ok_or(CommandParseError::MissingArgument("login"))?;
            let password = args
                .next()
                .ok_or(CommandParseError::MissingArgument("password"))?;
            Ok(ConsoleCommand::Auth {
                login: login.to_string(),
                password: password.to_string(),
            })
        }
        "chatmsg" => {
            // Chat text keeps its inner spacing, so only the two numeric fields are split off.
            let mut args = rest.splitn(3, ' ');
            let room_str = args
                .next()
                .filter(|s| !s.is_empty())
                .ok_or(CommandParseError::MissingArgument("room"))?;
            let recipient_str = args
                .next()
                .ok_or(CommandParseError::MissingArgument("recipient"))?;
            let text = args.next().unwrap_or("");
            let room_code = parse_u8(room_str, "chat room")?;
            let room =
                ChatRoom::from_code(room_code).ok_or(CommandParseError::InvalidRoom(room_code))?;
            let recipient = parse_i64(recipient_str, "chat recipient")?;
            Ok(ConsoleCommand::ChatMsg {
                room,
                recipient,
                text: text.to_string(),
            })
        }
        "serverinput" => {
            let trigger = rest
                .split_whitespace()
                .next()
                .ok_or(CommandParseError::MissingArgument("trigger"))?;
            Ok(ConsoleCommand::ServerInput {
                trigger: trigger.to_string(),
            })
        }
        "cutchatlog" => Ok(ConsoleCommand::CutChatLog),
        "getplayerlist" => Ok(ConsoleCommand::GetPlayerList),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_u8(value: &str, context: &'static str) -> Result<u8, CommandParseError> {
    value
        .parse::<u8>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

fn parse_i64(value: &str, context: &'static str) -> Result<i64, CommandParseError> {
    value
        .parse::<i64>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_preserving_spacing() {
        let parsed = parse_command_line("chatmsg 0 0 score:  600 points").unwrap();
        assert_eq!(
            parsed,
            ConsoleCommand::ChatMsg {
                room: ChatRoom::All,
                recipient: 0,
                text: "score:  600 points".to_string(),
            }
        );
    }

    #[test]
    fn wire_text_parses_back() {
        let commands = [
            ConsoleCommand::server_input("spawn3"),
            ConsoleCommand::chat_to_all("hello"),
            ConsoleCommand::CutChatLog,
            ConsoleCommand::GetPlayerList,
            ConsoleCommand::Auth {
                login: "arcade".into(),
                password: "secret".into(),
            },
        ];
        for command in commands {
            assert_eq!(parse_command_line(&command.to_wire()).unwrap(), command);
        }
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            parse_command_line("   "),
            Err(CommandParseError::Empty)
        ));
        assert!(matches!(
            parse_command_line("kick 12"),
            Err(CommandParseError::UnknownCommand(verb)) if verb == "kick"
        ));
        assert!(matches!(
            parse_command_line("chatmsg 7 0 hi"),
            Err(CommandParseError::InvalidRoom(7))
        ));
        assert!(matches!(
            parse_command_line("chatmsg x 0 hi"),
            Err(CommandParseError::InvalidInteger { context: "chat room", .. })
        ));
        assert!(matches!(
            parse_command_line("serverinput"),
            Err(CommandParseError::MissingArgument("trigger"))
        ));
    }
}
