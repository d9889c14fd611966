//! Database entities.

#![allow(missing_docs)]

pub mod comment;
pub mod follow;
pub mod group;
pub mod image;
pub mod post;
pub mod post_image;
pub mod user;

pub use comment::Entity as Comment;
pub use follow::Entity as Follow;
pub use group::Entity as Group;
pub use image::Entity as Image;
pub use post::Entity as Post;
pub use post_image::Entity as PostImage;
pub use user::Entity as User;
