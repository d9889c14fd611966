//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, image, post, post_image};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, TransactionTrait,
};
use traveltube_common::{AppError, AppResult};

/// Which posts a query covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostFilter {
    /// Every post.
    All,
    /// Posts filed under a group.
    Group(String),
    /// Posts written by one user.
    Author(String),
    /// Posts written by any of the given users.
    Authors(Vec<String>),
}

impl PostFilter {
    fn apply(&self, query: Select<Post>) -> Select<Post> {
        match self {
            Self::All => query,
            Self::Group(group_id) => query.filter(post::Column::GroupId.eq(group_id.as_str())),
            Self::Author(user_id) => query.filter(post::Column::UserId.eq(user_id.as_str())),
            Self::Authors(user_ids) => query.filter(post::Column::UserId.is_in(user_ids.clone())),
        }
    }
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Count posts matching a filter.
    pub async fn count(&self, filter: &PostFilter) -> AppResult<u64> {
        filter
            .apply(Post::find())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get one window of posts matching a filter, newest first.
    ///
    /// Posts sharing a timestamp are ordered by ID, newest insertion first.
    pub async fn find_window(
        &self,
        filter: &PostFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        filter
            .apply(Post::find())
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count posts written by a user.
    pub async fn count_by_user(&self, user_id: &str) -> AppResult<u64> {
        self.count(&PostFilter::Author(user_id.to_string())).await
    }

    /// Create a post together with its gallery images in one transaction.
    ///
    /// Either every row is written or none is.
    pub async fn create_with_images(
        &self,
        model: post::ActiveModel,
        images: Vec<image::ActiveModel>,
        links: Vec<post_image::ActiveModel>,
    ) -> AppResult<post::Model> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let created = model
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for image in images {
            image
                .insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        for link in links {
            link.insert(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(created)
    }

    /// Update a post.
    pub async fn update(&self, model: post::ActiveModel) -> AppResult<post::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a post. Comments and image links go with it.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Post::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get the gallery images attached to a post.
    pub async fn find_images(&self, post: &post::Model) -> AppResult<Vec<image::Model>> {
        post.find_related(image::Entity)
            .order_by_asc(image::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
