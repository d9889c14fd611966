//! Image entity (gallery image, linked to posts through `post_image`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Storage key under the media root
    pub key: String,

    /// MIME type of the detected format
    pub content_type: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post_image::Entity")]
    PostImages,
}

impl Related<super::post_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PostImages.def()
    }
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        super::post_image::Relation::Post.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::post_image::Relation::Image.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
