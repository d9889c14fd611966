//! Database repositories.

pub mod comment;
pub mod follow;
pub mod group;
pub mod image;
pub mod post;
pub mod user;

pub use comment::CommentRepository;
pub use follow::FollowRepository;
pub use group::GroupRepository;
pub use image::ImageRepository;
pub use post::{PostFilter, PostRepository};
pub use user::UserRepository;
