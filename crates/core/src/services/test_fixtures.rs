//! Model builders and fakes shared by service tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::Utc;
use traveltube_common::{AppError, AppResult, StorageBackend, StoredFile};
use traveltube_db::entities::{comment, follow, group, image, post, user};

pub fn create_test_user(id: &str, username: &str) -> user::Model {
    user::Model {
        id: id.to_string(),
        username: username.to_string(),
        username_lower: username.to_lowercase(),
        password_hash: "!".to_string(),
        token: Some(format!("token-{id}")),
        is_admin: false,
        created_at: Utc::now().into(),
    }
}

pub fn create_test_group(id: &str, slug: &str) -> group::Model {
    group::Model {
        id: id.to_string(),
        title: format!("Group {slug}"),
        slug: slug.to_string(),
        description: String::new(),
        created_at: Utc::now().into(),
    }
}

pub fn create_test_post(id: &str, user_id: &str, group_id: Option<&str>) -> post::Model {
    post::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        group_id: group_id.map(ToString::to_string),
        text: format!("post {id}"),
        image: None,
        created_at: Utc::now().into(),
        updated_at: None,
    }
}

pub fn create_test_image(id: &str) -> image::Model {
    image::Model {
        id: id.to_string(),
        key: format!("images/2024/01/01/{id}.png"),
        content_type: "image/png".to_string(),
        created_at: Utc::now().into(),
    }
}

pub fn create_test_comment(id: &str, post_id: &str, user_id: &str) -> comment::Model {
    comment::Model {
        id: id.to_string(),
        post_id: post_id.to_string(),
        user_id: user_id.to_string(),
        text: format!("comment {id}"),
        created_at: Utc::now().into(),
    }
}

pub fn create_test_follow(id: &str, user_id: &str, author_id: &str) -> follow::Model {
    follow::Model {
        id: id.to_string(),
        user_id: user_id.to_string(),
        author_id: author_id.to_string(),
        created_at: Utc::now().into(),
    }
}

/// Mock row answering a `COUNT(*)` query.
pub fn count_row(n: i64) -> BTreeMap<&'static str, sea_orm::Value> {
    maplit::btreemap! {
        "num_items" => sea_orm::Value::BigInt(Some(n))
    }
}

/// Storage that keeps keys in memory and can be told to fail.
#[derive(Default)]
pub struct MemoryStorage {
    pub keys: Mutex<Vec<String>>,
    pub fail_uploads: bool,
}

impl MemoryStorage {
    pub fn stored_keys(&self) -> Vec<String> {
        self.keys.lock().map(|k| k.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStorage {
    async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> AppResult<StoredFile> {
        if self.fail_uploads {
            return Err(AppError::Storage("disk full".to_string()));
        }
        if let Ok(mut keys) = self.keys.lock() {
            keys.push(key.to_string());
        }
        Ok(StoredFile {
            key: key.to_string(),
            url: format!("/media/{key}"),
            size: data.len() as u64,
            content_type: content_type.to_string(),
            md5: String::new(),
        })
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        if let Ok(mut keys) = self.keys.lock() {
            keys.retain(|k| k != key);
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("/media/{key}")
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.stored_keys().iter().any(|k| k == key))
    }
}
