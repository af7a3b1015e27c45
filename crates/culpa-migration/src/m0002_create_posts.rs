use culpa_core::{BlameConfig, BlameEvent, BlameResult};
use sea_orm_migration::prelude::*;

use crate::blueprint::BlameableTableExt;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = table(&crate::config()).map_err(crate::config_err)?;
        manager.create_table(table).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Posts::Table).to_owned())
            .await
    }
}

fn table(config: &BlameConfig) -> BlameResult<TableCreateStatement> {
    Ok(Table::create()
        .table(Posts::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Posts::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Posts::Title).string().not_null())
        .blameable(config, &BlameEvent::ALL, true)?
        .to_owned())
}

#[derive(DeriveIden)]
pub(crate) enum Posts {
    Table,
    Id,
    Title,
}
