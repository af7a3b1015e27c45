use culpa_core::{BlameableFields, blameable};
use sea_orm::entity::prelude::*;

use crate::hooks::{self, BlameableModel};

/// Comments name their creator column explicitly and have no deleted-by column.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub post_id: i32,
    pub body: String,
    pub author_id: i64,
    pub updated_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::posts::Entity",
        from = "Column::PostId",
        to = "super::posts::Column::Id"
    )]
    Posts,
}

impl Related<super::posts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Posts.def()
    }
}

impl BlameableModel for ActiveModel {
    fn blameable_fields() -> BlameableFields {
        blameable!["created" => "author_id", "updated"]
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        hooks::before_save(self, insert)
    }
}
