//! Business logic services.

#![allow(missing_docs)]

pub mod comment;
pub mod feed;
pub mod follow;
pub mod group;
pub mod media;
pub mod post;
pub mod user;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use comment::{AddCommentInput, CommentService};
pub use feed::{FeedComposer, FeedSource, Page, PageWindow};
pub use follow::{FollowGraph, FollowOutcome, UnfollowOutcome};
pub use group::{CreateGroupInput, GroupService, UpdateGroupInput};
pub use media::{
    ImageKind, ImageService, InvalidImageFormat, UploadedImage, ValidatedImage,
    validate_image_format,
};
pub use post::{
    CommentView, CreatePostInput, EditOutcome, EditPostInput, ImageView, PostDetail, PostService,
    PostSummary,
};
pub use user::{CreateUserInput, UserService};
