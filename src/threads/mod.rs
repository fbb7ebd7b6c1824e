// src/threads/mod.rs

//! The comment threading engine.
//!
//! * `path` places a new comment (level and materialized path) before it is written.
//! * `counters` keeps `reply_count` and `like_count` consistent with atomic updates
//!   and retries writes that hit a storage conflict.
//! * `queries` holds the flat, ordered read primitives.
//! * `tree` rebuilds nested reply trees from one flat fetch.
//! * `moderation` enforces authorship for edits and soft deletes.

pub mod counters;
pub mod moderation;
pub mod path;
pub mod queries;
pub mod tree;

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::{Author, Comment, CreateCommentRequest},
    store::CommentStore,
};

pub use crate::store::{CounterDrift, Mutation};

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn CommentStore>,
}

impl CommentService {
    pub fn new(store: Arc<dyn CommentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn CommentStore {
        self.store.as_ref()
    }

    /// Creates a root comment or a reply.
    ///
    /// The id is generated up front so the record is written once with its final path,
    /// together with the parent's `reply_count`.
    pub async fn create(
        &self,
        request: CreateCommentRequest,
        author: &Author,
    ) -> Result<Mutation, AppError> {
        request.validate()?;

        let id = Uuid::new_v4();
        let placement = path::assign(self.store(), id, &request.post_id, request.parent_id).await?;
        let now = Utc::now();

        let comment = Comment {
            id,
            post_id: request.post_id,
            author_id: author.id.clone(),
            author_name: author.name.clone(),
            content: request.content,
            parent_id: request.parent_id,
            level: placement.level,
            path: placement.path,
            is_deleted: false,
            like_count: 0,
            reply_count: 0,
            created_at: now,
            updated_at: now,
        };
        let counter_drift =
            counters::retry_on_conflict("Comment insert", || self.store.insert_reply(&comment))
                .await?;

        tracing::info!(
            "Comment {} created on post {} at level {}",
            comment.id,
            comment.post_id,
            comment.level
        );
        Ok(Mutation {
            comment,
            counter_drift,
        })
    }
}
