use serde::{Deserialize, Serialize};

use crate::error::BlameResult;

/// The identity held responsible for the current operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ActiveUser {
    pub fn new(id: i64) -> Self {
        Self { id, name: None }
    }

    pub fn named(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}

/// `Ok(None)` means nobody is acting. `Err` aborts the operation.
pub trait ActiveUserProvider: Send + Sync {
    fn current(&self) -> BlameResult<Option<ActiveUser>>;
}

impl<F> ActiveUserProvider for F
where
    F: Fn() -> Option<ActiveUser> + Send + Sync,
{
    fn current(&self) -> BlameResult<Option<ActiveUser>> {
        Ok(self())
    }
}
