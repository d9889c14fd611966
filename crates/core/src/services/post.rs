//! Post service.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::Set;
use serde::Serialize;
use traveltube_common::{
    AppError, AppResult, FieldErrors, IdGenerator, MediaKind, StorageBackend, StoredFile,
};
use traveltube_db::{
    entities::{comment, group, image, post, post_image, user},
    repositories::{CommentRepository, GroupRepository, PostRepository, UserRepository},
};
use validator::Validate;

use crate::services::feed::Page;
use crate::services::media::{
    UploadedImage, ValidatedImage, discard_files, store_images, validate_upload,
};

const INVALID_GROUP: &str =
    "Select a valid choice. That choice is not one of the available choices.";

/// Reject empty and whitespace-only text.
pub fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("required")
            .with_message("This field is required.".into()));
    }
    Ok(())
}

/// Input for creating a new post.
#[derive(Debug, Default, Validate)]
pub struct CreatePostInput {
    /// Post body. Must not be blank.
    #[validate(custom(function = "validate_not_blank"))]
    pub text: String,

    /// Group ID, empty or `None` for no group.
    pub group_id: Option<String>,

    /// Inline image.
    pub image: Option<UploadedImage>,

    /// Gallery images.
    pub images: Vec<UploadedImage>,
}

/// Input for editing a post. Text and group are overwritten; the inline
/// image only when a new one is supplied.
#[derive(Debug, Default, Validate)]
pub struct EditPostInput {
    /// New post body. Must not be blank.
    #[validate(custom(function = "validate_not_blank"))]
    pub text: String,

    /// New group ID, empty or `None` to unfile the post.
    pub group_id: Option<String>,

    /// Replacement inline image.
    pub image: Option<UploadedImage>,
}

/// Result of an edit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The editor does not own the post; nothing changed.
    NotAuthor,
    /// The post was updated.
    Updated(post::Model),
}

/// A post as shown in feeds.
#[derive(Debug, Clone, Serialize)]
pub struct PostSummary {
    /// The post row.
    #[serde(flatten)]
    pub post: post::Model,
    /// Who wrote it.
    pub author: user::Model,
    /// Group the post is filed under, if any.
    pub group: Option<group::Model>,
    /// Public URL of the inline image.
    pub image_url: Option<String>,
}

/// A gallery image with its public URL.
#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    /// The image row.
    #[serde(flatten)]
    pub image: image::Model,
    /// Public URL of the stored file.
    pub url: String,
}

/// A comment with its author.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    /// The comment row.
    #[serde(flatten)]
    pub comment: comment::Model,
    /// Comment author; `None` if the account is gone.
    pub author: Option<user::Model>,
}

/// Everything the post detail view shows.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    /// Post with author, group and inline image.
    #[serde(flatten)]
    pub summary: PostSummary,
    /// Gallery images.
    pub images: Vec<ImageView>,
    /// Comments, newest first.
    pub comments: Vec<CommentView>,
    /// Total number of posts by the author.
    pub author_post_count: u64,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    group_repo: GroupRepository,
    user_repo: UserRepository,
    comment_repo: CommentRepository,
    storage: Arc<dyn StorageBackend>,
    id_gen: IdGenerator,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub fn new(
        post_repo: PostRepository,
        group_repo: GroupRepository,
        user_repo: UserRepository,
        comment_repo: CommentRepository,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        Self {
            post_repo,
            group_repo,
            user_repo,
            comment_repo,
            storage,
            id_gen: IdGenerator::new(),
        }
    }

    /// Resolve the chosen group, recording an error for unknown IDs.
    async fn resolve_group(
        &self,
        group_id: Option<&str>,
        errors: &mut FieldErrors,
    ) -> AppResult<Option<group::Model>> {
        let Some(group_id) = group_id.filter(|id| !id.is_empty()) else {
            return Ok(None);
        };

        let group = self.group_repo.find_by_id(group_id).await?;
        if group.is_none() {
            errors.add("group", INVALID_GROUP);
        }
        Ok(group)
    }

    /// Create a new post.
    ///
    /// Every upload is validated before anything is stored. The post and
    /// all gallery rows are written in one transaction; stored files are
    /// removed again if that fails.
    pub async fn create_post(
        &self,
        author: &user::Model,
        input: CreatePostInput,
    ) -> AppResult<post::Model> {
        let mut errors = input
            .validate()
            .err()
            .map(FieldErrors::from)
            .unwrap_or_default();

        let group = self
            .resolve_group(input.group_id.as_deref(), &mut errors)
            .await?;

        let inline = input
            .image
            .and_then(|upload| validate_upload("image", upload, &mut errors));
        let gallery: Vec<ValidatedImage> = input
            .images
            .into_iter()
            .filter_map(|upload| validate_upload("images", upload, &mut errors))
            .collect();

        errors.into_result()?;

        let inline_files = store_images(
            self.storage.as_ref(),
            MediaKind::PostImage,
            inline.as_slice(),
        )
        .await?;
        let gallery_files =
            match store_images(self.storage.as_ref(), MediaKind::GalleryImage, &gallery).await {
                Ok(files) => files,
                Err(e) => {
                    discard_files(self.storage.as_ref(), &inline_files).await;
                    return Err(e);
                }
            };

        let post_id = self.id_gen.generate();
        let now = Utc::now();
        let model = post::ActiveModel {
            id: Set(post_id.clone()),
            user_id: Set(author.id.clone()),
            group_id: Set(group.map(|g| g.id)),
            text: Set(input.text),
            image: Set(inline_files.first().map(|f| f.key.clone())),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let mut images = Vec::with_capacity(gallery_files.len());
        let mut links = Vec::with_capacity(gallery_files.len());
        for file in &gallery_files {
            let image_id = self.id_gen.generate();
            images.push(image::ActiveModel {
                id: Set(image_id.clone()),
                key: Set(file.key.clone()),
                content_type: Set(file.content_type.clone()),
                created_at: Set(now.into()),
            });
            links.push(post_image::ActiveModel {
                id: Set(self.id_gen.generate()),
                post_id: Set(post_id.clone()),
                image_id: Set(image_id),
            });
        }

        match self.post_repo.create_with_images(model, images, links).await {
            Ok(created) => {
                tracing::info!(
                    post_id = %created.id,
                    user_id = %author.id,
                    images = gallery_files.len(),
                    "Created post"
                );
                Ok(created)
            }
            Err(e) => {
                let stored: Vec<StoredFile> =
                    inline_files.into_iter().chain(gallery_files).collect();
                discard_files(self.storage.as_ref(), &stored).await;
                Err(e)
            }
        }
    }

    /// Get a post for editing, or `None` if `editor` is not its author.
    pub async fn editable(
        &self,
        editor: &user::Model,
        post_id: &str,
    ) -> AppResult<Option<post::Model>> {
        let post = self.post_repo.get_by_id(post_id).await?;
        Ok((post.user_id == editor.id).then_some(post))
    }

    /// Edit a post in place. Only the author may edit.
    pub async fn edit_post(
        &self,
        editor: &user::Model,
        post_id: &str,
        input: EditPostInput,
    ) -> AppResult<EditOutcome> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.user_id != editor.id {
            tracing::debug!(post_id = %post.id, user_id = %editor.id, "Edit refused for non-author");
            return Ok(EditOutcome::NotAuthor);
        }

        let mut errors = input
            .validate()
            .err()
            .map(FieldErrors::from)
            .unwrap_or_default();
        let group = self
            .resolve_group(input.group_id.as_deref(), &mut errors)
            .await?;
        let inline = input
            .image
            .and_then(|upload| validate_upload("image", upload, &mut errors));
        errors.into_result()?;

        let new_files = store_images(
            self.storage.as_ref(),
            MediaKind::PostImage,
            inline.as_slice(),
        )
        .await?;

        let old_image = post.image.clone();
        let mut active: post::ActiveModel = post.into();
        active.text = Set(input.text);
        active.group_id = Set(group.map(|g| g.id));
        if let Some(file) = new_files.first() {
            active.image = Set(Some(file.key.clone()));
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = match self.post_repo.update(active).await {
            Ok(updated) => updated,
            Err(e) => {
                discard_files(self.storage.as_ref(), &new_files).await;
                return Err(e);
            }
        };

        if !new_files.is_empty()
            && let Some(old_key) = old_image
            && let Err(e) = self.storage.delete(&old_key).await
        {
            tracing::warn!(key = %old_key, error = %e, "Failed to remove replaced image");
        }

        tracing::info!(post_id = %updated.id, "Updated post");
        Ok(EditOutcome::Updated(updated))
    }

    /// Delete a post. Allowed for its author and administrators.
    ///
    /// Returns the post's author.
    pub async fn delete_post(&self, actor: &user::Model, post_id: &str) -> AppResult<user::Model> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.user_id != actor.id && !actor.is_admin {
            return Err(AppError::Forbidden(
                "Only the author can delete this post".to_string(),
            ));
        }

        self.post_repo.delete(&post.id).await?;

        if let Some(key) = &post.image
            && let Err(e) = self.storage.delete(key).await
        {
            tracing::warn!(key = %key, error = %e, "Failed to remove post image");
        }

        tracing::info!(post_id = %post.id, user_id = %actor.id, "Deleted post");
        self.user_repo.get_by_id(&post.user_id).await
    }

    /// Attach author, group and image URL to every post of a page.
    pub async fn summarize(&self, page: Page<post::Model>) -> AppResult<Page<PostSummary>> {
        let mut user_ids: Vec<String> = page.items.iter().map(|p| p.user_id.clone()).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let mut group_ids: Vec<String> = page
            .items
            .iter()
            .filter_map(|p| p.group_id.clone())
            .collect();
        group_ids.sort_unstable();
        group_ids.dedup();

        let authors: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let groups: HashMap<String, group::Model> = self
            .group_repo
            .find_by_ids(&group_ids)
            .await?
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();

        if let Some(post) = page.items.iter().find(|p| !authors.contains_key(&p.user_id)) {
            return Err(AppError::UserNotFound(post.user_id.clone()));
        }

        Ok(page.map(|post| PostSummary {
            author: authors[&post.user_id].clone(),
            group: post.group_id.as_ref().and_then(|id| groups.get(id).cloned()),
            image_url: post.image.as_deref().map(|k| self.storage.public_url(k)),
            post,
        }))
    }

    /// Load a post with everything its detail view shows.
    pub async fn post_detail(&self, post_id: &str) -> AppResult<PostDetail> {
        let post = self.post_repo.get_by_id(post_id).await?;
        let author = self.user_repo.get_by_id(&post.user_id).await?;
        let group = match &post.group_id {
            Some(group_id) => self.group_repo.find_by_id(group_id).await?,
            None => None,
        };

        let images = self
            .post_repo
            .find_images(&post)
            .await?
            .into_iter()
            .map(|image| ImageView {
                url: self.storage.public_url(&image.key),
                image,
            })
            .collect();

        let comments = self.comment_repo.find_by_post(&post.id).await?;
        let mut commenter_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        commenter_ids.sort_unstable();
        commenter_ids.dedup();
        let commenters: HashMap<String, user::Model> = self
            .user_repo
            .find_by_ids(&commenter_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();
        let comments = comments
            .into_iter()
            .map(|comment| CommentView {
                author: commenters.get(&comment.user_id).cloned(),
                comment,
            })
            .collect();

        let author_post_count = self.post_repo.count_by_user(&author.id).await?;

        Ok(PostDetail {
            summary: PostSummary {
                image_url: post.image.as_deref().map(|k| self.storage.public_url(k)),
                post,
                author,
                group,
            },
            images,
            comments,
            author_post_count,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::feed::PageWindow;
    use crate::services::media::tests::{SMALL_GIF, png_bytes};
    use crate::services::test_fixtures::{
        MemoryStorage, count_row, create_test_comment, create_test_group, create_test_image,
        create_test_post, create_test_user,
    };
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    struct Dbs {
        post: MockDatabase,
        group: MockDatabase,
        user: MockDatabase,
        comment: MockDatabase,
    }

    impl Dbs {
        fn new() -> Self {
            Self {
                post: MockDatabase::new(DatabaseBackend::Postgres),
                group: MockDatabase::new(DatabaseBackend::Postgres),
                user: MockDatabase::new(DatabaseBackend::Postgres),
                comment: MockDatabase::new(DatabaseBackend::Postgres),
            }
        }

        fn service(self, storage: Arc<MemoryStorage>) -> PostService {
            PostService::new(
                PostRepository::new(Arc::new(self.post.into_connection())),
                GroupRepository::new(Arc::new(self.group.into_connection())),
                UserRepository::new(Arc::new(self.user.into_connection())),
                CommentRepository::new(Arc::new(self.comment.into_connection())),
                storage,
            )
        }
    }

    fn input(text: &str) -> CreatePostInput {
        CreatePostInput {
            text: text.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_post_blank_text() {
        let service = Dbs::new().service(Arc::new(MemoryStorage::default()));
        let author = create_test_user("user1", "leo");

        let result = service.create_post(&author, input("   ")).await;

        match result {
            Err(AppError::Validation(fields)) => assert!(fields.get("text").is_some()),
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_post_unknown_group() {
        let mut dbs = Dbs::new();
        dbs.group = dbs
            .group
            .append_query_results([Vec::<group::Model>::new()]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));
        let author = create_test_user("user1", "leo");

        let mut create = input("Lisbon at dawn");
        create.group_id = Some("nope".to_string());
        let result = service.create_post(&author, create).await;

        match result {
            Err(AppError::Validation(fields)) => {
                assert_eq!(fields.get("group").unwrap()[0], INVALID_GROUP);
            }
            other => panic!("Expected Validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_post_rejects_gif_before_storing() {
        let storage = Arc::new(MemoryStorage::default());
        let service = Dbs::new().service(storage.clone());
        let author = create_test_user("user1", "leo");

        let mut create = input("Lisbon at dawn");
        create.images = vec![
            UploadedImage::new(Some("ok.png".to_string()), png_bytes()),
            UploadedImage::new(Some("small.gif".to_string()), SMALL_GIF.to_vec()),
        ];
        let result = service.create_post(&author, create).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(storage.stored_keys().is_empty());
    }

    #[tokio::test]
    async fn test_create_post_with_group_and_images() {
        let mut dbs = Dbs::new();
        dbs.group = dbs
            .group
            .append_query_results([[create_test_group("g1", "alps")]]);
        let mut created = create_test_post("p1", "user1", Some("g1"));
        created.text = "Lisbon at dawn".to_string();
        dbs.post = dbs
            .post
            .append_query_results([[created]])
            .append_query_results([[create_test_image("i1")]])
            .append_query_results([[post_image::Model {
                id: "l1".to_string(),
                post_id: "p1".to_string(),
                image_id: "i1".to_string(),
            }]]);
        let storage = Arc::new(MemoryStorage::default());
        let service = dbs.service(storage.clone());
        let author = create_test_user("user1", "leo");

        let mut create = input("Lisbon at dawn");
        create.group_id = Some("g1".to_string());
        create.image = Some(UploadedImage::new(None, png_bytes()));
        create.images = vec![UploadedImage::new(None, png_bytes())];
        let post = service.create_post(&author, create).await.unwrap();

        assert_eq!(post.group_id.as_deref(), Some("g1"));
        let keys = storage.stored_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys[0].starts_with("posts/"));
        assert!(keys[1].starts_with("images/"));
    }

    #[tokio::test]
    async fn test_create_post_failed_transaction_removes_files() {
        let mut dbs = Dbs::new();
        dbs.post = dbs
            .post
            .append_query_errors([DbErr::Custom("connection reset".to_string())]);
        let storage = Arc::new(MemoryStorage::default());
        let service = dbs.service(storage.clone());
        let author = create_test_user("user1", "leo");

        let mut create = input("Lisbon at dawn");
        create.images = vec![UploadedImage::new(None, png_bytes())];
        let result = service.create_post(&author, create).await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert!(storage.stored_keys().is_empty());
    }

    #[tokio::test]
    async fn test_edit_post_by_non_author_changes_nothing() {
        let mut dbs = Dbs::new();
        dbs.post = dbs
            .post
            .append_query_results([[create_test_post("p1", "user1", None)]]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));
        let intruder = create_test_user("user2", "mia");

        let outcome = service
            .edit_post(
                &intruder,
                "p1",
                EditPostInput {
                    text: "hijacked".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // Only the lookup ran; no update was queued or needed.
        assert_eq!(outcome, EditOutcome::NotAuthor);
    }

    #[tokio::test]
    async fn test_edit_post_by_author() {
        let original = create_test_post("p1", "user1", None);
        let mut updated = original.clone();
        updated.text = "Edited".to_string();

        let mut dbs = Dbs::new();
        dbs.post = dbs
            .post
            .append_query_results([[original]])
            .append_query_results([[updated]]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));
        let author = create_test_user("user1", "leo");

        let outcome = service
            .edit_post(
                &author,
                "p1",
                EditPostInput {
                    text: "Edited".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        match outcome {
            EditOutcome::Updated(post) => assert_eq!(post.text, "Edited"),
            EditOutcome::NotAuthor => panic!("author should be able to edit"),
        }
    }

    #[tokio::test]
    async fn test_edit_missing_post() {
        let mut dbs = Dbs::new();
        dbs.post = dbs.post.append_query_results([Vec::<post::Model>::new()]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));
        let author = create_test_user("user1", "leo");

        let result = service
            .edit_post(&author, "missing", EditPostInput::default())
            .await;

        assert!(matches!(result, Err(AppError::PostNotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_post_by_stranger_forbidden() {
        let mut dbs = Dbs::new();
        dbs.post = dbs
            .post
            .append_query_results([[create_test_post("p1", "user1", None)]]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));
        let stranger = create_test_user("user2", "mia");

        let result = service.delete_post(&stranger, "p1").await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_post_by_admin() {
        let mut dbs = Dbs::new();
        dbs.post = dbs
            .post
            .append_query_results([[create_test_post("p1", "user1", None)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        dbs.user = dbs
            .user
            .append_query_results([[create_test_user("user1", "leo")]]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));
        let mut admin = create_test_user("admin", "root");
        admin.is_admin = true;

        let author = service.delete_post(&admin, "p1").await.unwrap();
        assert_eq!(author.username, "leo");
    }

    #[tokio::test]
    async fn test_summarize_attaches_authors_and_groups() {
        let mut dbs = Dbs::new();
        dbs.user = dbs
            .user
            .append_query_results([[create_test_user("user1", "leo")]]);
        dbs.group = dbs
            .group
            .append_query_results([[create_test_group("g1", "alps")]]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));

        let mut with_image = create_test_post("p2", "user1", Some("g1"));
        with_image.image = Some("posts/x.png".to_string());
        let page = Page::new(
            vec![with_image, create_test_post("p1", "user1", None)],
            PageWindow::resolve(2, 10, None),
            2,
        );

        let page = service.summarize(page).await.unwrap();
        assert_eq!(page.items[0].author.username, "leo");
        assert_eq!(page.items[0].group.as_ref().unwrap().slug, "alps");
        assert_eq!(page.items[0].image_url.as_deref(), Some("/media/posts/x.png"));
        assert!(page.items[1].group.is_none());
    }

    #[tokio::test]
    async fn test_post_detail() {
        let mut dbs = Dbs::new();
        dbs.post = dbs
            .post
            .append_query_results([[create_test_post("p1", "user1", None)]])
            .append_query_results([[create_test_image("i1")]])
            .append_query_results([[count_row(4)]]);
        dbs.user = dbs
            .user
            .append_query_results([[create_test_user("user1", "leo")]])
            .append_query_results([[create_test_user("user2", "mia")]]);
        dbs.comment = dbs.comment.append_query_results([[
            create_test_comment("c2", "p1", "user2"),
            create_test_comment("c1", "p1", "user2"),
        ]]);
        let service = dbs.service(Arc::new(MemoryStorage::default()));

        let detail = service.post_detail("p1").await.unwrap();

        assert_eq!(detail.summary.author.username, "leo");
        assert_eq!(detail.images.len(), 1);
        assert_eq!(detail.comments.len(), 2);
        assert_eq!(detail.comments[0].comment.id, "c2");
        assert_eq!(
            detail.comments[0].author.as_ref().unwrap().username,
            "mia"
        );
        assert_eq!(detail.author_post_count, 4);
    }
}
