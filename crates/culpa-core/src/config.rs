use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BlameError, BlameResult};
use crate::event::BlameEvent;

/// Settings consumed by the interceptor and the schema helper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlameConfig {
    pub default_fields: DefaultFields,
    pub users: UsersConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultFields {
    pub created: Option<String>,
    pub updated: Option<String>,
    pub deleted: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsersConfig {
    /// Foreign key target for blame columns. No constraint is added when unset.
    pub table: Option<String>,
    pub classname: Option<String>,
    /// Name of a registered provider that replaces the authenticated-session lookup.
    pub active_user: Option<String>,
}

impl DefaultFields {
    pub fn column(&self, event: BlameEvent) -> Option<&str> {
        let column = match event {
            BlameEvent::Created => &self.created,
            BlameEvent::Updated => &self.updated,
            BlameEvent::Deleted => &self.deleted,
        };
        column.as_deref().filter(|c| !c.is_empty())
    }

    /// Configured column, or a configuration error naming the missing key.
    pub fn require(&self, event: BlameEvent) -> BlameResult<&str> {
        self.column(event).ok_or(BlameError::MissingDefaultColumn(event))
    }
}

impl BlameConfig {
    /// The values the package config is published with.
    pub fn standard() -> Self {
        Self {
            default_fields: DefaultFields {
                created: Some("created_by".to_string()),
                updated: Some("updated_by".to_string()),
                deleted: Some("deleted_by".to_string()),
            },
            users: UsersConfig {
                table: Some("users".to_string()),
                classname: Some("users".to_string()),
                active_user: None,
            },
        }
    }

    pub fn from_toml_str(raw: &str) -> BlameResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> BlameResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(v) = lookup(key) {
                let v = v.trim().to_string();
                *slot = if v.is_empty() { None } else { Some(v) };
            }
        };

        set(&mut self.default_fields.created, "CULPA_DEFAULT_CREATED");
        set(&mut self.default_fields.updated, "CULPA_DEFAULT_UPDATED");
        set(&mut self.default_fields.deleted, "CULPA_DEFAULT_DELETED");
        set(&mut self.users.table, "CULPA_USERS_TABLE");
        set(&mut self.users.classname, "CULPA_USERS_CLASSNAME");
        set(&mut self.users.active_user, "CULPA_ACTIVE_USER");
        self
    }
}
