use culpa_core::{BlameableFields, blameable};
use sea_orm::Linked;
use sea_orm::entity::prelude::*;

use crate::hooks::{self, BlameableModel};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub created_by: Option<i32>,
    pub updated_by: Option<i32>,
    pub deleted_by: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::CreatedBy",
        to = "super::users::Column::Id"
    )]
    Creator,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UpdatedBy",
        to = "super::users::Column::Id"
    )]
    Updater,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::DeletedBy",
        to = "super::users::Column::Id"
    )]
    Eraser,
}

/// `post.find_linked(CreatorLink)`
pub struct CreatorLink;

impl Linked for CreatorLink {
    type FromEntity = Entity;
    type ToEntity = super::users::Entity;

    fn link(&self) -> Vec<RelationDef> {
        vec![Relation::Creator.def()]
    }
}

pub struct UpdaterLink;

impl Linked for UpdaterLink {
    type FromEntity = Entity;
    type ToEntity = super::users::Entity;

    fn link(&self) -> Vec<RelationDef> {
        vec![Relation::Updater.def()]
    }
}

pub struct EraserLink;

impl Linked for EraserLink {
    type FromEntity = Entity;
    type ToEntity = super::users::Entity;

    fn link(&self) -> Vec<RelationDef> {
        vec![Relation::Eraser.def()]
    }
}

impl BlameableModel for ActiveModel {
    fn blameable_fields() -> BlameableFields {
        blameable!["created", "updated", "deleted"]
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

    async fn before_delete<C>(self, db: &C) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        hooks::before_delete(self, db).await
    }
}
