use std::fmt;
use std::str::FromStr;

/// Lifecycle event a blame column is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlameEvent {
    Created,
    Updated,
    Deleted,
}

impl BlameEvent {
    /// Resolution order used when normalizing declarations.
    pub const ALL: [BlameEvent; 3] = [
        BlameEvent::Created,
        BlameEvent::Updated,
        BlameEvent::Deleted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlameEvent::Created => "created",
            BlameEvent::Updated => "updated",
            BlameEvent::Deleted => "deleted",
        }
    }

    /// `<event>_by`, used when no default column is configured.
    pub fn fallback_column(self) -> String {
        format!("{}_by", self.as_str())
    }

    pub(crate) fn index(self) -> usize {
        match self {
            BlameEvent::Created => 0,
            BlameEvent::Updated => 1,
            BlameEvent::Deleted => 2,
        }
    }
}

impl fmt::Display for BlameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent(pub String);

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown blame event `{}`", self.0)
    }
}

impl std::error::Error for UnknownEvent {}

impl FromStr for BlameEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(BlameEvent::Created),
            "updated" => Ok(BlameEvent::Updated),
            "deleted" => Ok(BlameEvent::Deleted),
            other => Err(UnknownEvent(other.to_string())),
        }
    }
}
