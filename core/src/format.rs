//! Wire encodings of an [`Operation`].
//!
//! Two formats are supported:
//!
//! - `go-json`: one JSON object per message,
//!   `{"path", "type": "file", "dir", "filename", "operation"}`.
//! - `gem-listen`: the frame understood by the Ruby `listen` gem TCP
//!   broadcaster, a big-endian `u32` length followed by the JSON array
//!   `["file", <added|removed|modified>, <dir>, <filename>, {}]`.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Result, WatchError};
use crate::operation::Operation;

pub const GO_JSON: &str = "go-json";
pub const GEM_LISTEN: &str = "gem-listen";

/// Known wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerFormat {
    GoJson,
    GemListen,
}

impl ServerFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoJson => GO_JSON,
            Self::GemListen => GEM_LISTEN,
        }
    }

    /// Encode an operation.
    pub fn encode(self, op: &Operation) -> Result<Vec<u8>> {
        match self {
            Self::GoJson => encode_go_json(op),
            Self::GemListen => encode_gem_listen(op),
        }
    }
}

impl FromStr for ServerFormat {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            GO_JSON => Ok(Self::GoJson),
            GEM_LISTEN => Ok(Self::GemListen),
            other => Err(WatchError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ServerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encode `op` with the format named by `selector`.
pub fn format_message(op: &Operation, selector: &str) -> Result<Vec<u8>> {
    selector.parse::<ServerFormat>()?.encode(op)
}

#[derive(Serialize)]
struct GoJsonMessage<'a> {
    path: &'a str,
    #[serde(rename = "type")]
    entry_type: &'static str,
    dir: &'a str,
    filename: &'a str,
    operation: &'static str,
}

fn encode_go_json(op: &Operation) -> Result<Vec<u8>> {
    let path = op.path.to_string_lossy();
    let dir = op.directory();
    let dir = dir.to_string_lossy();
    let filename = op.filename();

    Ok(serde_json::to_vec(&GoJsonMessage {
        path: &path,
        entry_type: "file",
        dir: &dir,
        filename: &filename,
        operation: op.kind().as_str(),
    })?)
}

fn encode_gem_listen(op: &Operation) -> Result<Vec<u8>> {
    let dir = op.directory();
    let payload = serde_json::to_vec(&(
        "file",
        op.broadcast_kind().as_str(),
        dir.to_string_lossy(),
        op.filename(),
        serde_json::Map::new(),
    ))?;

    let len = u32::try_from(payload.len()).map_err(|_| {
        WatchError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "gem-listen payload exceeds u32 length prefix",
        ))
    })?;

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}
