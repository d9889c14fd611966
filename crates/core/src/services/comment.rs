//! Comment service.

use chrono::Utc;
use sea_orm::Set;
use traveltube_common::{AppResult, IdGenerator};
use traveltube_db::{
    entities::{comment, user},
    repositories::{CommentRepository, PostRepository},
};
use validator::Validate;

use crate::services::post::validate_not_blank;

/// Input for a new comment.
#[derive(Debug, Validate)]
pub struct AddCommentInput {
    #[validate(custom(function = "validate_not_blank"))]
    pub text: String,
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub const fn new(comment_repo: CommentRepository, post_repo: PostRepository) -> Self {
        Self {
            comment_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Add a comment to a post.
    pub async fn add_comment(
        &self,
        author: &user::Model,
        post_id: &str,
        input: AddCommentInput,
    ) -> AppResult<comment::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;
        input.validate()?;

        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            post_id: Set(post.id.clone()),
            user_id: Set(author.id.clone()),
            text: Set(input.text),
            created_at: Set(Utc::now().into()),
        };

        let created = self.comment_repo.create(model).await?;
        tracing::info!(comment_id = %created.id, post_id = %post.id, "Added comment");
        Ok(created)
    }
}
