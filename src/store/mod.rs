// src/store/mod.rs

//! Storage contract for comments.
//!
//! Every list query is scoped, ordered and filtered to live rows unless the caller
//! explicitly asks for [`Visibility::All`]. Counter changes go through
//! [`CommentStore::atomic_increment`], which must apply the delta in a single
//! atomic step on the backend. Writes that move a parent's `reply_count` go
//! through [`CommentStore::insert_reply`] and [`CommentStore::soft_delete`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentId},
        page::{SortDir, SortKey},
    },
    threads::counters,
};

pub use memory::MemoryCommentStore;
pub use postgres::PgCommentStore;

/// Which comments a listing or count covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every comment on a post.
    Post(String),
    /// Comments on a post without a parent.
    RootsOf(String),
    /// Direct children of a comment.
    RepliesTo(CommentId),
    Author(String),
    /// Case-insensitive literal substring match on content.
    ContentMatch(String),
    /// A comment and its descendants, selected by materialized path prefix.
    Subtree { id: CommentId, prefix: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Live,
    /// Includes soft-deleted rows; only tree reconstruction needs these.
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub key: SortKey,
    pub dir: SortDir,
}

impl OrderBy {
    pub const fn asc(key: SortKey) -> Self {
        Self {
            key,
            dir: SortDir::Asc,
        }
    }

    pub const fn desc(key: SortKey) -> Self {
        Self {
            key,
            dir: SortDir::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: i64,
    pub limit: i64,
}

/// A list query. Results are ordered by `order`, then by `id` for stability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub scope: Scope,
    pub visibility: Visibility,
    pub order: Vec<OrderBy>,
    pub window: Option<Window>,
}

impl Listing {
    pub fn new(scope: Scope, order: Vec<OrderBy>) -> Self {
        Self {
            scope,
            visibility: Visibility::Live,
            order,
            window: None,
        }
    }

    pub fn including_deleted(mut self) -> Self {
        self.visibility = Visibility::All;
        self
    }

    pub fn window(mut self, offset: i64, limit: i64) -> Self {
        self.window = Some(Window { offset, limit });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterField {
    ReplyCount,
    LikeCount,
}

impl CounterField {
    pub fn column(self) -> &'static str {
        match self {
            CounterField::ReplyCount => "reply_count",
            CounterField::LikeCount => "like_count",
        }
    }
}

/// A counter adjustment that could not be applied after the write it belongs to
/// was committed. Returned to the caller so it can be reconciled out of band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterDrift {
    pub comment_id: CommentId,
    pub field: &'static str,
    pub delta: i32,
    pub reason: String,
}

/// Result of a write that also adjusts a parent's counter.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub comment: Comment,
    /// Set when the counter step failed after the main write was committed.
    pub counter_drift: Option<CounterDrift>,
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persists a fully formed new comment in one write.
    async fn insert(&self, comment: &Comment) -> Result<(), AppError>;

    /// Looks a comment up regardless of its deletion state.
    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, AppError>;

    async fn find(&self, listing: &Listing) -> Result<Vec<Comment>, AppError>;

    /// Number of live comments in `scope`.
    async fn count(&self, scope: &Scope) -> Result<i64, AppError>;

    /// Replaces the content of a live comment. `None` if it is missing or deleted.
    async fn update_content(
        &self,
        id: CommentId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, AppError>;

    /// Flags a live comment as deleted. `None` if it is missing or already deleted,
    /// so only one of several concurrent deletes wins.
    async fn mark_deleted(
        &self,
        id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, AppError>;

    /// Adds `delta` to a counter in one atomic step, clamped to `0..=i32::MAX`.
    /// `None` if the comment does not exist.
    async fn atomic_increment(
        &self,
        id: CommentId,
        field: CounterField,
        delta: i32,
    ) -> Result<Option<Comment>, AppError>;

    /// Writes a new comment and bumps its parent's `reply_count`.
    ///
    /// Backends with transactions override this so both land or neither does, and a
    /// missing or deleted parent fails with `NotFound` before anything is written.
    /// The default runs the two steps in sequence and reports a failed second step
    /// as drift.
    async fn insert_reply(&self, comment: &Comment) -> Result<Option<CounterDrift>, AppError> {
        self.insert(comment).await?;
        Ok(counters::on_child_created(self, comment.parent_id).await)
    }

    /// Flags a live comment as deleted and drops its parent's `reply_count`.
    /// `None` if it is missing or already deleted. Same atomicity contract as
    /// [`CommentStore::insert_reply`].
    async fn soft_delete(
        &self,
        id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Mutation>, AppError> {
        let Some(comment) = self.mark_deleted(id, at).await? else {
            return Ok(None);
        };
        let counter_drift = counters::on_child_soft_deleted(self, comment.parent_id).await;
        Ok(Some(Mutation {
            comment,
            counter_drift,
        }))
    }
}
