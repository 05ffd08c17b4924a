//! `application/x-www-form-urlencoded` codec for the submission form.
//!
//! ```text
//! username=<enc>&message=<enc>
//! ```
//!
//! Values are percent-encoded with `+` standing for a space. A `%` not
//! followed by two hex digits is kept as-is.

use crate::error::FormError;
use crate::models::{ANONYMOUS_USERNAME, Message};

const FIELD_USERNAME: &str = "username";
const FIELD_MESSAGE: &str = "message";

/// Decode a submitted form body into a [`Message`].
///
/// Missing `username` becomes `"anonymous"`, missing `message` becomes `""`.
/// A repeated known field is an error rather than last-one-wins.
pub fn decode_form(body: &[u8]) -> Result<Message, FormError> {
    let body = std::str::from_utf8(body).map_err(|_| FormError::InvalidUtf8)?;

    let mut username: Option<String> = None;
    let mut message: Option<String> = None;

    for pair in body.split('&') {
        if pair.is_empty() {
            continue;
        }

        let (raw_key, raw_value) = pair
            .split_once('=')
            .ok_or_else(|| FormError::MissingSeparator(pair.to_string()))?;

        let key = percent_decode(raw_key)?;
        let slot = match key.as_str() {
            FIELD_USERNAME => (&mut username, FIELD_USERNAME),
            FIELD_MESSAGE => (&mut message, FIELD_MESSAGE),
            _ => continue,
        };

        if slot.0.is_some() {
            return Err(FormError::DuplicateField(slot.1));
        }
        *slot.0 = Some(percent_decode(raw_value)?);
    }

    Ok(Message {
        username: username.unwrap_or_else(|| ANONYMOUS_USERNAME.to_string()),
        message: message.unwrap_or_default(),
    })
}

/// Encode a [`Message`] the way a browser submits the form.
pub fn encode_form(msg: &Message) -> String {
    format!(
        "{}={}&{}={}",
        FIELD_USERNAME,
        percent_encode(&msg.username),
        FIELD_MESSAGE,
        percent_encode(&msg.message),
    )
}

fn percent_decode(input: &str) -> Result<String, FormError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => match (bytes.get(i + 1).and_then(hex_val), bytes.get(i + 2).and_then(hex_val)) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| FormError::InvalidUtf8)
}

fn percent_encode(input: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            b' ' => out.push('+'),
            _ => {
                out.push('%');
                out.push(HEX[(b >> 4) as usize] as char);
                out.push(HEX[(b & 0x0f) as usize] as char);
            }
        }
    }
    out
}

fn hex_val(b: &u8) -> Option<u8> {
    match *b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
