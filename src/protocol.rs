use std::borrow::Cow;

use crate::error::ChatError;
use crate::message::ServerEvent;

/// Line protocol spoken over the TCP transport.
///
/// Inbound, one frame per line:
///
///   JOIN:username:room
///   MSG:text
///   LOC:latitude,longitude
///   QUIT:
///
/// Outbound, one JSON-encoded `ServerEvent` per line.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<'a> {
    Join {
        username: Cow<'a, str>,
        room: Cow<'a, str>,
    },
    Msg {
        text: Cow<'a, str>,
    },
    Loc {
        latitude: f64,
        longitude: f64,
    },
    Quit,
}

/// Parse a single line. Borrows from `line`; nothing is allocated for
/// well-formed input.
///
/// Join fields are passed through untrimmed so the registry owns the
/// validation rules.
pub fn parse_frame(line: &str) -> Result<Frame<'_>, ChatError> {
    let line = line.trim();

    let (cmd, payload) = line
        .split_once(':')
        .ok_or_else(|| ChatError::Parse("missing ':' delimiter".into()))?;

    match cmd {
        "JOIN" => {
            let (username, room) = payload
                .split_once(':')
                .ok_or_else(|| ChatError::Parse("JOIN requires username:room".into()))?;
            Ok(Frame::Join {
                username: Cow::Borrowed(username),
                room: Cow::Borrowed(room),
            })
        }
        "MSG" => Ok(Frame::Msg {
            text: Cow::Borrowed(payload),
        }),
        "LOC" => {
            let (lat, lon) = payload
                .split_once(',')
                .ok_or_else(|| ChatError::Parse("LOC requires latitude,longitude".into()))?;
            Ok(Frame::Loc {
                latitude: parse_coordinate(lat)?,
                longitude: parse_coordinate(lon)?,
            })
        }
        "QUIT" => Ok(Frame::Quit),
        _ => Err(ChatError::Parse(format!("unknown command: {cmd}"))),
    }
}

fn parse_coordinate(raw: &str) -> Result<f64, ChatError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ChatError::Parse(format!("invalid coordinate: {raw:?}")))?;
    if !value.is_finite() {
        return Err(ChatError::Parse(format!("invalid coordinate: {raw:?}")));
    }
    Ok(value)
}

/// Encode an event as a newline-terminated JSON line.
pub fn encode_event(event: &ServerEvent) -> Result<String, ChatError> {
    let mut line = serde_json::to_string(event)?;
    line.push('\n');
    Ok(line)
}
