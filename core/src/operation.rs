//! Normalized filesystem change records.

use std::fmt;
use std::ops::BitOr;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use notify::event::{EventKind, ModifyKind};
use serde::{Deserialize, Serialize};

/// Underlying change signal, possibly several conditions at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RawKind(u8);

impl RawKind {
    pub const NONE: Self = Self(0);
    pub const CREATE: Self = Self(1);
    pub const WRITE: Self = Self(1 << 1);
    pub const REMOVE: Self = Self(1 << 2);
    pub const RENAME: Self = Self(1 << 3);
    pub const CHMOD: Self = Self(1 << 4);

    /// Whether every condition in `other` is present.
    pub fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Map a notify event kind onto the change conditions it signals.
    ///
    /// Access events carry no change and map to [`RawKind::NONE`].
    pub fn from_event_kind(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => Self::CREATE,
            EventKind::Remove(_) => Self::REMOVE,
            EventKind::Modify(ModifyKind::Name(_)) => Self::RENAME,
            EventKind::Modify(ModifyKind::Metadata(_)) => Self::CHMOD,
            EventKind::Modify(_) => Self::WRITE,
            EventKind::Access(_) => Self::NONE,
            EventKind::Any | EventKind::Other => Self::WRITE,
        }
    }
}

impl BitOr for RawKind {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Resolved semantic label of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Create,
    Write,
    Remove,
    Rename,
    Chmod,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Write => "WRITE",
            Self::Remove => "REMOVE",
            Self::Rename => "RENAME",
            Self::Chmod => "CHMOD",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse label used by the `gem-listen` wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastKind {
    Added,
    Removed,
    Modified,
}

impl BroadcastKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        }
    }
}

impl fmt::Display for BroadcastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification table, highest priority first.
const PRIORITY: [(RawKind, OperationKind, BroadcastKind); 5] = [
    (RawKind::CREATE, OperationKind::Create, BroadcastKind::Added),
    (RawKind::REMOVE, OperationKind::Remove, BroadcastKind::Removed),
    (RawKind::WRITE, OperationKind::Write, BroadcastKind::Modified),
    (RawKind::RENAME, OperationKind::Rename, BroadcastKind::Removed),
    (RawKind::CHMOD, OperationKind::Chmod, BroadcastKind::Modified),
];

/// Resolve a raw kind into both labels. Falls back to `WRITE`/`modified`.
pub fn classify(raw: RawKind) -> (OperationKind, BroadcastKind) {
    PRIORITY
        .iter()
        .find(|(flag, _, _)| raw.contains(*flag))
        .map_or((OperationKind::Write, BroadcastKind::Modified), |&(_, kind, broadcast)| {
            (kind, broadcast)
        })
}

/// One filesystem change event.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// Absolute path of the changed entry.
    pub path: PathBuf,

    /// Change signal as delivered by the watch subsystem.
    pub raw_kind: RawKind,

    /// When the event was observed.
    pub timestamp: DateTime<Utc>,
}

impl Operation {
    /// Create a new operation.
    pub fn new(path: impl Into<PathBuf>, raw_kind: RawKind) -> Self {
        Self {
            path: path.into(),
            raw_kind,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        classify(self.raw_kind).0
    }

    pub fn broadcast_kind(&self) -> BroadcastKind {
        classify(self.raw_kind).1
    }

    /// Parent directory of the path; `.` for a bare name.
    pub fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
            Some(parent) => parent.to_path_buf(),
            None => self.path.clone(),
        }
    }

    /// Last component of the path; the path itself when there is none.
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map_or_else(
                || self.path.to_string_lossy().into_owned(),
                |name| name.to_string_lossy().into_owned(),
            )
    }
}
