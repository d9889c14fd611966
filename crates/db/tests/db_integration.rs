//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `traveltube_test`)
//!   `TEST_DB_PASSWORD` (default: `traveltube_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{EntityTrait, Set};
use traveltube_db::entities::{Comment, Post, comment, follow, image, post, post_image};
use traveltube_db::repositories::{
    CommentRepository, FollowRepository, GroupRepository, PostFilter, PostRepository,
};
use traveltube_db::test_utils::TestDatabase;

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_post_cascades_comments() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.seed_user("u1", "leo").await.unwrap();
    db.seed_post("p1", "u1", None).await.unwrap();

    let comments = CommentRepository::new(Arc::new(db.conn.clone()));
    comments
        .create(comment::ActiveModel {
            id: Set("c1".to_string()),
            post_id: Set("p1".to_string()),
            user_id: Set("u1".to_string()),
            text: Set("first".to_string()),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap();

    let posts = PostRepository::new(Arc::new(db.conn.clone()));
    posts.delete("p1").await.unwrap();

    assert!(Comment::find_by_id("c1").one(&db.conn).await.unwrap().is_none());
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_group_keeps_posts() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.seed_user("u1", "leo").await.unwrap();
    db.seed_group("g1", "alps").await.unwrap();
    db.seed_post("p1", "u1", Some("g1")).await.unwrap();

    let groups = GroupRepository::new(Arc::new(db.conn.clone()));
    groups.delete("g1").await.unwrap();

    let post = Post::find_by_id("p1").one(&db.conn).await.unwrap().unwrap();
    assert!(post.group_id.is_none());
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_follow_is_absorbed() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.seed_user("u1", "leo").await.unwrap();
    db.seed_user("u2", "mia").await.unwrap();

    let follows = FollowRepository::new(Arc::new(db.conn.clone()));
    let edge = |id: &str| follow::ActiveModel {
        id: Set(id.to_string()),
        user_id: Set("u1".to_string()),
        author_id: Set("u2".to_string()),
        created_at: Set(Utc::now().into()),
    };

    assert!(follows.create(edge("f1")).await.unwrap().is_some());
    assert!(follows.create(edge("f2")).await.unwrap().is_none());
    assert_eq!(follows.count_following("u1").await.unwrap(), 1);
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_create_with_images_rolls_back() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.seed_user("u1", "leo").await.unwrap();

    let posts = PostRepository::new(Arc::new(db.conn.clone()));
    let new_post = post::ActiveModel {
        id: Set("p1".to_string()),
        user_id: Set("u1".to_string()),
        group_id: Set(None),
        text: Set("trip".to_string()),
        image: Set(None),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    };
    let new_image = image::ActiveModel {
        id: Set("i1".to_string()),
        key: Set("images/i1.png".to_string()),
        content_type: Set("image/png".to_string()),
        created_at: Set(Utc::now().into()),
    };
    // Link points at an image that is never written.
    let broken_link = post_image::ActiveModel {
        id: Set("l1".to_string()),
        post_id: Set("p1".to_string()),
        image_id: Set("missing".to_string()),
    };

    let result = posts
        .create_with_images(new_post, vec![new_image], vec![broken_link])
        .await;

    assert!(result.is_err());
    assert!(Post::find_by_id("p1").one(&db.conn).await.unwrap().is_none());
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_feed_window_newest_first() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.seed_user("u1", "leo").await.unwrap();
    for i in 0..13 {
        db.seed_post(&format!("p{i:02}"), "u1", None).await.unwrap();
    }

    let posts = PostRepository::new(Arc::new(db.conn.clone()));
    assert_eq!(posts.count(&PostFilter::All).await.unwrap(), 13);

    let first = posts.find_window(&PostFilter::All, 10, 0).await.unwrap();
    let second = posts.find_window(&PostFilter::All, 10, 10).await.unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(second.len(), 3);
    assert_eq!(first[0].id, "p12");
    assert_eq!(second[2].id, "p00");
    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_following_feed_only_shows_followed_authors() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.seed_user("viewer", "leo").await.unwrap();
    db.seed_user("followed", "mia").await.unwrap();
    db.seed_user("stranger", "noa").await.unwrap();

    db.seed_post("pa0", "followed", None).await.unwrap();
    db.seed_post("pb0", "stranger", None).await.unwrap();
    db.seed_post("pa1", "followed", None).await.unwrap();
    db.seed_post("pv0", "viewer", None).await.unwrap();

    let follows = FollowRepository::new(Arc::new(db.conn.clone()));
    follows
        .create(follow::ActiveModel {
            id: Set("f1".to_string()),
            user_id: Set("viewer".to_string()),
            author_id: Set("followed".to_string()),
            created_at: Set(Utc::now().into()),
        })
        .await
        .unwrap();

    let authors: Vec<String> = follows
        .find_following("viewer")
        .await
        .unwrap()
        .into_iter()
        .map(|edge| edge.author_id)
        .collect();
    assert_eq!(authors, vec!["followed".to_string()]);

    let posts = PostRepository::new(Arc::new(db.conn.clone()));
    let filter = PostFilter::Authors(authors);
    assert_eq!(posts.count(&filter).await.unwrap(), 2);

    let window = posts.find_window(&filter, 10, 0).await.unwrap();
    let ids: Vec<&str> = window.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["pa1", "pa0"]);
    db.drop_database().await.unwrap();
}
