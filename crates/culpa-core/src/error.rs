use thiserror::Error;

use crate::event::BlameEvent;

pub type BlameResult<T> = Result<T, BlameError>;

#[derive(Debug, Error)]
pub enum BlameError {
    #[error("users.active_user names `{0}`, which is not a registered active user provider")]
    ActiveUserNotInvocable(String),
    #[error("no column for the {0} field is configured, set default_fields.{0}")]
    MissingDefaultColumn(BlameEvent),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("entity has no column named `{0}`")]
    UnknownColumn(String),
    #[error("column `{column}` cannot hold a user id: {reason}")]
    IncompatibleColumn { column: String, reason: String },
    #[error("active user provider failed: {0}")]
    Provider(String),
}

impl BlameError {
    /// Programmer errors in wiring or configuration, as opposed to failures
    /// while writing a particular entity.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BlameError::ActiveUserNotInvocable(_)
                | BlameError::MissingDefaultColumn(_)
                | BlameError::InvalidConfig(_)
                | BlameError::Io(_)
        )
    }
}

impl From<toml::de::Error> for BlameError {
    fn from(err: toml::de::Error) -> Self {
        BlameError::InvalidConfig(err.to_string())
    }
}
