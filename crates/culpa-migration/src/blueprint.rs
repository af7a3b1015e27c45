use culpa_core::{BlameConfig, BlameEvent, BlameResult};
use sea_orm_migration::prelude::*;

pub trait BlameableTableExt {
    fn blame_column(
        &mut self,
        config: &BlameConfig,
        event: BlameEvent,
        nullable: bool,
    ) -> BlameResult<&mut Self>;

    fn created_by(&mut self, config: &BlameConfig, nullable: bool) -> BlameResult<&mut Self> {
        self.blame_column(config, BlameEvent::Created, nullable)
    }

    fn updated_by(&mut self, config: &BlameConfig, nullable: bool) -> BlameResult<&mut Self> {
        self.blame_column(config, BlameEvent::Updated, nullable)
    }

    fn deleted_by(&mut self, config: &BlameConfig, nullable: bool) -> BlameResult<&mut Self> {
        self.blame_column(config, BlameEvent::Deleted, nullable)
    }

    /// Adds the columns for `events`, in created/updated/deleted order.
    fn blameable(
        &mut self,
        config: &BlameConfig,
        events: &[BlameEvent],
        nullable: bool,
    ) -> BlameResult<&mut Self> {
        for event in BlameEvent::ALL {
            if events.contains(&event) {
                self.blame_column(config, event, nullable)?;
            }
        }
        Ok(self)
    }
}

impl BlameableTableExt for TableCreateStatement {
    fn blame_column(
        &mut self,
        config: &BlameConfig,
        event: BlameEvent,
        nullable: bool,
    ) -> BlameResult<&mut Self> {
        let column = config.default_fields.require(event)?;
        self.col(&mut column_def(column, nullable));

        if let Some(users) = users_table(config) {
            self.foreign_key(&mut users_foreign_key(column, users));
        }

        Ok(self)
    }
}

impl BlameableTableExt for TableAlterStatement {
    fn blame_column(
        &mut self,
        config: &BlameConfig,
        event: BlameEvent,
        nullable: bool,
    ) -> BlameResult<&mut Self> {
        let column = config.default_fields.require(event)?;
        self.add_column(&mut column_def(column, nullable));

        if let Some(users) = users_table(config) {
            self.add_foreign_key(users_foreign_key(column, users).get_foreign_key());
        }

        Ok(self)
    }
}

fn column_def(column: &str, nullable: bool) -> ColumnDef {
    let mut def = ColumnDef::new(Alias::new(column));
    def.unsigned();
    if nullable {
        def.null();
    } else {
        def.not_null();
    }
    def
}

fn users_table(config: &BlameConfig) -> Option<&str> {
    config.users.table.as_deref().filter(|t| !t.is_empty())
}

fn users_foreign_key(column: &str, users: &str) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .from_col(Alias::new(column))
        .to(Alias::new(users), Alias::new("id"))
        .to_owned()
}
