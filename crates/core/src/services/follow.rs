//! Follow graph: who receives whose posts.

use chrono::Utc;
use sea_orm::Set;
use serde::Serialize;
use traveltube_common::{AppResult, IdGenerator};
use traveltube_db::{
    entities::follow,
    repositories::{FollowRepository, UserRepository},
};

/// Result of a follow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOutcome {
    /// A new edge was created.
    Followed,
    /// The edge already existed; nothing changed.
    AlreadyFollowing,
    /// Follower and target are the same user; nothing changed.
    SelfFollow,
}

/// Result of an unfollow request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfollowOutcome {
    /// The edge was removed.
    Removed,
    /// There was no edge; nothing changed.
    NotFollowing,
}

/// Follow relationships between users.
#[derive(Clone)]
pub struct FollowGraph {
    follow_repo: FollowRepository,
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl FollowGraph {
    /// Create a new follow graph.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository, user_repo: UserRepository) -> Self {
        Self {
            follow_repo,
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Make `follower_id` follow `target_id`.
    ///
    /// Self-follows and repeated follows are no-ops. The target must exist.
    pub async fn follow(&self, follower_id: &str, target_id: &str) -> AppResult<FollowOutcome> {
        if follower_id == target_id {
            return Ok(FollowOutcome::SelfFollow);
        }

        let target = self.user_repo.get_by_id(target_id).await?;

        if self.follow_repo.is_following(follower_id, &target.id).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(follower_id.to_string()),
            author_id: Set(target.id.clone()),
            created_at: Set(Utc::now().into()),
        };

        // A concurrent identical follow loses on the unique index.
        match self.follow_repo.create(model).await? {
            Some(_) => {
                tracing::info!(user_id = %follower_id, author_id = %target.id, "Followed author");
                Ok(FollowOutcome::Followed)
            }
            None => Ok(FollowOutcome::AlreadyFollowing),
        }
    }

    /// Remove the edge from `follower_id` to `target_id` if present.
    pub async fn unfollow(
        &self,
        follower_id: &str,
        target_id: &str,
    ) -> AppResult<UnfollowOutcome> {
        let removed = self.follow_repo.delete_by_pair(follower_id, target_id).await?;
        if removed == 0 {
            return Ok(UnfollowOutcome::NotFollowing);
        }

        tracing::info!(user_id = %follower_id, author_id = %target_id, "Unfollowed author");
        Ok(UnfollowOutcome::Removed)
    }

    /// IDs of every author `viewer_id` follows.
    pub async fn feed_authors(&self, viewer_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .follow_repo
            .find_following(viewer_id)
            .await?
            .into_iter()
            .map(|edge| edge.author_id)
            .collect())
    }

    /// Whether `viewer_id` follows `target_id`.
    pub async fn is_following(&self, viewer_id: &str, target_id: &str) -> AppResult<bool> {
        self.follow_repo.is_following(viewer_id, target_id).await
    }

    /// Number of users following `user_id`.
    pub async fn follower_count(&self, user_id: &str) -> AppResult<u64> {
        self.follow_repo.count_followers(user_id).await
    }

    /// Number of authors `user_id` follows.
    pub async fn following_count(&self, user_id: &str) -> AppResult<u64> {
        self.follow_repo.count_following(user_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_fixtures::{create_test_follow, create_test_user};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;
    use traveltube_common::AppError;

    fn graph(follow_db: MockDatabase, user_db: MockDatabase) -> FollowGraph {
        FollowGraph::new(
            FollowRepository::new(Arc::new(follow_db.into_connection())),
            UserRepository::new(Arc::new(user_db.into_connection())),
        )
    }

    #[tokio::test]
    async fn test_follow_self_is_noop() {
        // No query results queued: any database access would fail.
        let graph = graph(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let outcome = graph.follow("user1", "user1").await.unwrap();
        assert_eq!(outcome, FollowOutcome::SelfFollow);
    }

    #[tokio::test]
    async fn test_follow_unknown_target() {
        let graph = graph(
            MockDatabase::new(DatabaseBackend::Postgres),
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<traveltube_db::entities::user::Model>::new()]),
        );

        let result = graph.follow("user1", "ghost").await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_follow_twice_is_noop() {
        let graph = graph(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_follow("f1", "user1", "user2")]]),
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("user2", "mia")]]),
        );

        let outcome = graph.follow("user1", "user2").await.unwrap();
        assert_eq!(outcome, FollowOutcome::AlreadyFollowing);
    }

    #[tokio::test]
    async fn test_follow_creates_edge() {
        let graph = graph(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<follow::Model>::new()])
                .append_query_results([[create_test_follow("f1", "user1", "user2")]]),
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_user("user2", "mia")]]),
        );

        let outcome = graph.follow("user1", "user2").await.unwrap();
        assert_eq!(outcome, FollowOutcome::Followed);
    }

    #[tokio::test]
    async fn test_unfollow_missing_edge() {
        let graph = graph(
            MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }]),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let outcome = graph.unfollow("user1", "user2").await.unwrap();
        assert_eq!(outcome, UnfollowOutcome::NotFollowing);
    }

    #[tokio::test]
    async fn test_unfollow_removes_edge() {
        let graph = graph(
            MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let outcome = graph.unfollow("user1", "user2").await.unwrap();
        assert_eq!(outcome, UnfollowOutcome::Removed);
    }

    #[tokio::test]
    async fn test_feed_authors() {
        let graph = graph(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[
                create_test_follow("f1", "user1", "user2"),
                create_test_follow("f2", "user1", "user3"),
            ]]),
            MockDatabase::new(DatabaseBackend::Postgres),
        );

        let authors = graph.feed_authors("user1").await.unwrap();
        assert_eq!(authors, vec!["user2".to_string(), "user3".to_string()]);
    }
}
