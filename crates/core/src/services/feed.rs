//! Feed composition: ordered, paginated views over posts.

use serde::Serialize;
use traveltube_common::AppResult;
use traveltube_db::{
    entities::post,
    repositories::{PostFilter, PostRepository},
};

use crate::services::follow::FollowGraph;

/// The collection a feed is drawn from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    /// Every post.
    All,
    /// Posts filed under a group (by group ID).
    Group(String),
    /// Posts written by one user (by user ID).
    Author(String),
    /// Posts written by anyone the viewer follows (by viewer ID).
    Following(String),
}

/// Position of one page inside a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number, always within `1..=num_pages`.
    pub number: u64,
    /// Total number of pages, at least 1.
    pub num_pages: u64,
    /// Rows to skip.
    pub offset: u64,
    /// Rows to take.
    pub limit: u64,
}

impl PageWindow {
    /// Resolve a raw page cursor against a collection of `total` items.
    ///
    /// A missing or unparsable cursor is page 1. Cursors below 1 clamp to 1
    /// and cursors past the end clamp to the last page. An empty collection
    /// still has one (empty) page.
    #[must_use]
    pub fn resolve(total: u64, page_size: u64, cursor: Option<&str>) -> Self {
        let page_size = page_size.max(1);
        let num_pages = total.div_ceil(page_size).max(1);

        let requested = cursor
            .and_then(|c| c.trim().parse::<i64>().ok())
            .unwrap_or(1);
        let number = if requested < 1 {
            1
        } else {
            (requested as u64).min(num_pages)
        };

        Self {
            number,
            num_pages,
            offset: (number - 1) * page_size,
            limit: page_size,
        }
    }
}

/// One page of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Items on this page, at most the page size.
    pub items: Vec<T>,
    /// 1-based page number.
    pub number: u64,
    /// Total number of pages.
    pub num_pages: u64,
    /// Total number of items across all pages.
    pub total_items: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Build a page from its window and items.
    #[must_use]
    pub const fn new(items: Vec<T>, window: PageWindow, total_items: u64) -> Self {
        Self {
            items,
            number: window.number,
            num_pages: window.num_pages,
            total_items,
            has_next: window.number < window.num_pages,
            has_previous: window.number > 1,
        }
    }

    /// Number of the next page, if any.
    #[must_use]
    pub const fn next_page_number(&self) -> Option<u64> {
        if self.has_next {
            Some(self.number + 1)
        } else {
            None
        }
    }

    /// Number of the previous page, if any.
    #[must_use]
    pub const fn previous_page_number(&self) -> Option<u64> {
        if self.has_previous {
            Some(self.number - 1)
        } else {
            None
        }
    }

    /// Convert every item, keeping the page position.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total_items: self.total_items,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Composes feed pages from posts.
#[derive(Clone)]
pub struct FeedComposer {
    post_repo: PostRepository,
    follow_graph: FollowGraph,
    page_size: u64,
}

impl FeedComposer {
    /// Create a new feed composer.
    #[must_use]
    pub const fn new(post_repo: PostRepository, follow_graph: FollowGraph, page_size: u64) -> Self {
        Self {
            post_repo,
            follow_graph,
            page_size,
        }
    }

    /// Compose one page of `source`, newest post first.
    pub async fn compose_page(
        &self,
        source: &FeedSource,
        cursor: Option<&str>,
    ) -> AppResult<Page<post::Model>> {
        let filter = match source {
            FeedSource::All => PostFilter::All,
            FeedSource::Group(group_id) => PostFilter::Group(group_id.clone()),
            FeedSource::Author(user_id) => PostFilter::Author(user_id.clone()),
            FeedSource::Following(viewer_id) => {
                let authors = self.follow_graph.feed_authors(viewer_id).await?;
                if authors.is_empty() {
                    let window = PageWindow::resolve(0, self.page_size, cursor);
                    return Ok(Page::new(vec![], window, 0));
                }
                PostFilter::Authors(authors)
            }
        };

        let total = self.post_repo.count(&filter).await?;
        let window = PageWindow::resolve(total, self.page_size, cursor);
        let items = if total == 0 {
            vec![]
        } else {
            self.post_repo
                .find_window(&filter, window.limit, window.offset)
                .await?
        };

        tracing::debug!(
            source = ?source,
            page = window.number,
            num_pages = window.num_pages,
            total,
            "Composed feed page"
        );

        Ok(Page::new(items, window, total))
    }
}
