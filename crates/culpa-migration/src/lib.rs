use culpa_core::BlameConfig;
use sea_orm_migration::prelude::*;

pub mod blueprint;
mod m0001_create_users;
mod m0002_create_posts;
mod m0003_create_comments;

pub use blueprint::BlameableTableExt;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m0001_create_users::Migration),
            Box::new(m0002_create_posts::Migration),
            Box::new(m0003_create_comments::Migration),
        ]
    }
}

/// Published defaults, overridable through `CULPA_*` variables.
pub fn config() -> BlameConfig {
    BlameConfig::standard().with_env_overrides()
}

pub(crate) fn config_err(err: culpa_core::BlameError) -> DbErr {
    DbErr::Migration(err.to_string())
}
