use std::io::{self, Read};

use thiserror::Error;

/// Largest payload the u16 length prefix can carry (the prefix counts the trailing NUL).
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - 1;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("command of {len} bytes exceeds the {MAX_PAYLOAD_LEN} byte frame limit")]
    TooLong { len: usize },
    #[error("frame declared zero length")]
    EmptyFrame,
    #[error("console response is not valid UTF-8")]
    InvalidUtf8,
    #[error("console response carries no result code: '{0}'")]
    MissingCode(String),
    #[error("failed reading frame: {0}")]
    Io(#[from] io::Error),
}

/// Encodes a request as `u16 LE length ‖ UTF-8 payload ‖ NUL`.
pub fn encode_request(command: &str) -> Result<Vec<u8>, FrameError> {
    let payload = command.as_bytes();
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::TooLong { len: payload.len() });
    }
    let len = (payload.len() + 1) as u16;
    let mut buffer = Vec::with_capacity(2 + payload.len() + 1);
    buffer.extend_from_slice(&len.to_le_bytes());
    buffer.extend_from_slice(payload);
    buffer.push(0);
    Ok(buffer)
}

/// Reads one length-prefixed frame and returns its body (terminator included).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes)?;
    let len = u16::from_le_bytes(len_bytes) as usize;
    if len == 0 {
        return Err(FrameError::EmptyFrame);
    }
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Turns a frame body into text: strips trailing NULs and percent-decodes twice.
pub fn decode_response(body: &[u8]) -> Result<String, FrameError> {
    let end = body
        .iter()
        .rposition(|byte| *byte != 0)
        .map(|idx| idx + 1)
        .unwrap_or(0);
    let raw = std::str::from_utf8(&body[..end]).map_err(|_| FrameError::InvalidUtf8)?;
    let once = percent_decode(raw)?;
    percent_decode(&once)
}

/// Decodes `%XX` escapes. `+` is left alone; malformed escapes pass through verbatim.
pub fn percent_decode(input: &str) -> Result<String, FrameError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == b'%' && idx + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[idx + 1]), hex_value(bytes[idx + 2])) {
                out.push(hi << 4 | lo);
                idx += 3;
                continue;
            }
        }
        out.push(bytes[idx]);
        idx += 1;
    }
    String::from_utf8(out).map_err(|_| FrameError::InvalidUtf8)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Extracts the first integer in a decoded response (`STATUS=1&...` → 1).
pub fn response_code(text: &str) -> Result<u32, FrameError> {
    let start = text
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| FrameError::MissingCode(text.to_string()))?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<u32>()
        .map_err(|_| FrameError::MissingCode(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn request_frame_counts_terminator() {
        let frame = encode_request("cutchatlog").unwrap();
        assert_eq!(&frame[..2], &11u16.to_le_bytes());
        assert_eq!(&frame[2..12], b"cutchatlog");
        assert_eq!(frame[12], 0);
        assert_eq!(frame.len(), 13);
    }

    #[test]
    fn oversized_request_is_rejected() {
        let long = "x".repeat(MAX_PAYLOAD_LEN + 1);
        assert!(matches!(
            encode_request(&long),
            Err(FrameError::TooLong { .. })
        ));
    }

    #[test]
    fn reads_and_decodes_double_escaped_response() {
        // "%253D" decodes to "%3D" and then to "=".
        let payload = b"STATUS=1&playerList=a%253Db\0";
        let mut wire = Vec::new();
        wire.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        wire.extend_from_slice(payload);
        let body = read_frame(&mut Cursor::new(wire)).unwrap();
        let text = decode_response(&body).unwrap();
        assert_eq!(text, "STATUS=1&playerList=a=b");
        assert_eq!(response_code(&text).unwrap(), 1);
    }

    #[test]
    fn truncated_frame_is_an_io_error() {
        let wire = vec![5u8, 0, b'S', b'T'];
        assert!(matches!(
            read_frame(&mut Cursor::new(wire)),
            Err(FrameError::Io(_))
        ));
    }

    #[test]
    fn percent_decode_leaves_malformed_escapes() {
        assert_eq!(percent_decode("100%").unwrap(), "100%");
        assert_eq!(percent_decode("%zz%41").unwrap(), "%zzA");
        assert_eq!(percent_decode("a%20b").unwrap(), "a b");
    }

    #[test]
    fn missing_code_is_reported() {
        assert!(matches!(
            response_code("STATUS=&"),
            Err(FrameError::MissingCode(_))
        ));
        assert_eq!(response_code("STATUS=3").unwrap(), 3);
    }
}
