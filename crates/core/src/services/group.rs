//! Group service.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use sea_orm::Set;
use serde::Deserialize;
use traveltube_common::{AppError, AppResult, IdGenerator};
use traveltube_db::{entities::group, repositories::GroupRepository};
use validator::{Validate, ValidationError};

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap()
});

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    if SLUG_RE.is_match(slug) {
        Ok(())
    } else {
        Err(ValidationError::new("slug").with_message(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.".into(),
        ))
    }
}

/// Input for creating a group.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// URL-safe identifier, fixed once created.
    #[validate(length(min = 1, max = 50), custom(function = "validate_slug"))]
    pub slug: String,

    #[serde(default)]
    pub description: String,
}

/// Input for updating a group. The slug cannot change.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGroupInput {
    /// New title, if changing.
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    /// New description, if changing.
    pub description: Option<String>,
}

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    id_gen: IdGenerator,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub const fn new(group_repo: GroupRepository) -> Self {
        Self {
            group_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a group.
    pub async fn create_group(&self, input: CreateGroupInput) -> AppResult<group::Model> {
        input.validate()?;

        if self.group_repo.find_by_slug(&input.slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "Group with slug '{}' already exists",
                input.slug
            )));
        }

        let model = group::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title),
            slug: Set(input.slug),
            description: Set(input.description),
            created_at: Set(Utc::now().into()),
        };

        let created = self.group_repo.create(model).await?;
        tracing::info!(group_id = %created.id, slug = %created.slug, "Created group");
        Ok(created)
    }

    /// Get a group by slug.
    pub async fn get_by_slug(&self, slug: &str) -> AppResult<group::Model> {
        self.group_repo.get_by_slug(slug).await
    }

    /// All groups, alphabetically.
    pub async fn list_groups(&self) -> AppResult<Vec<group::Model>> {
        self.group_repo.list().await
    }

    /// Update a group's title or description.
    pub async fn update_group(
        &self,
        slug: &str,
        input: UpdateGroupInput,
    ) -> AppResult<group::Model> {
        input.validate()?;
        let group = self.group_repo.get_by_slug(slug).await?;

        let mut active: group::ActiveModel = group.into();
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }

        let updated = self.group_repo.update(active).await?;
        tracing::info!(slug = %updated.slug, "Updated group");
        Ok(updated)
    }

    /// Delete a group. Its posts stay, without a group.
    pub async fn delete_group(&self, slug: &str) -> AppResult<()> {
        let group = self.group_repo.get_by_slug(slug).await?;
        self.group_repo.delete(&group.id).await?;
        tracing::info!(slug = %slug, "Deleted group");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_fixtures::create_test_group;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: MockDatabase) -> GroupService {
        GroupService::new(GroupRepository::new(Arc::new(db.into_connection())))
    }

    fn create_input(slug: &str) -> CreateGroupInput {
        CreateGroupInput {
            title: "The Alps".to_string(),
            slug: slug.to_string(),
            description: "Mountains".to_string(),
        }
    }

    #[test]
    fn test_slug_validation() {
        assert!(create_input("alps_2024-summer").validate().is_ok());
        assert!(create_input("alps trip").validate().is_err());
        assert!(create_input("").validate().is_err());
        assert!(create_input(&"a".repeat(51)).validate().is_err());
    }

    #[tokio::test]
    async fn test_create_group() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group::Model>::new()])
                .append_query_results([[create_test_group("g1", "alps")]]),
        );

        let group = service.create_group(create_input("alps")).await.unwrap();
        assert_eq!(group.slug, "alps");
    }

    #[tokio::test]
    async fn test_create_group_duplicate_slug() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_group("g1", "alps")]]),
        );

        let result = service.create_group(create_input("alps")).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_get_unknown_slug() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group::Model>::new()]),
        );

        let result = service.get_by_slug("nowhere").await;
        assert!(matches!(result, Err(AppError::GroupNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_group_keeps_slug() {
        let mut updated = create_test_group("g1", "alps");
        updated.title = "Alpine".to_string();
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_group("g1", "alps")]])
                .append_query_results([[updated]]),
        );

        let group = service
            .update_group(
                "alps",
                UpdateGroupInput {
                    title: Some("Alpine".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(group.title, "Alpine");
        assert_eq!(group.slug, "alps");
    }

    #[tokio::test]
    async fn test_delete_group() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_group("g1", "alps")]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
        );

        service.delete_group("alps").await.unwrap();
    }
}
