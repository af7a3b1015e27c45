pub use culpa_core;
pub use sea_orm;

use sea_orm::{Database, DatabaseConnection};

pub mod entities;
pub mod hooks;

pub use hooks::{BlameableModel, before_delete, before_save, observe};

pub async fn connect(database_url: &str) -> Result<DatabaseConnection, sea_orm::DbErr> {
    Database::connect(database_url).await
}
