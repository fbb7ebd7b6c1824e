//! Author-only edits, soft deletes and likes.

use chrono::Utc;
use validator::Validate;

use super::{CommentService, Mutation, counters};
use crate::{
    error::AppError,
    models::comment::{Comment, CommentId, UpdateCommentRequest},
};

fn ensure_author(comment: &Comment, author_id: &str, action: &str) -> Result<(), AppError> {
    if comment.author_id != author_id {
        return Err(AppError::Unauthorized(format!(
            "You are not authorized to {} this comment",
            action
        )));
    }
    Ok(())
}

impl CommentService {
    /// Replaces the content of the caller's own comment.
    pub async fn update(
        &self,
        id: CommentId,
        author_id: &str,
        request: UpdateCommentRequest,
    ) -> Result<Comment, AppError> {
        let comment = self.get(id).await?;
        ensure_author(&comment, author_id, "update")?;
        request.validate()?;

        let updated = self
            .store
            .update_content(id, &request.content, Utc::now())
            .await?
            .ok_or_else(|| AppError::comment_not_found(id))?;

        tracing::info!("Comment {} edited by {}", id, author_id);
        Ok(updated)
    }

    /// Soft-deletes the caller's own comment. Replies are left in place.
    pub async fn delete(&self, id: CommentId, author_id: &str) -> Result<Mutation, AppError> {
        let comment = self.get(id).await?;
        ensure_author(&comment, author_id, "delete")?;

        // Conditional flip: a concurrent delete that got there first leaves us with None.
        let at = Utc::now();
        let deleted =
            counters::retry_on_conflict("Comment delete", || self.store.soft_delete(id, at))
                .await?
                .ok_or_else(|| AppError::comment_not_found(id))?;

        tracing::info!("Comment {} soft-deleted by {}", id, author_id);
        Ok(deleted)
    }

    pub async fn like(&self, id: CommentId) -> Result<Comment, AppError> {
        self.get(id).await?;
        counters::adjust_likes(self.store(), id, 1).await
    }

    pub async fn unlike(&self, id: CommentId) -> Result<Comment, AppError> {
        self.get(id).await?;
        counters::adjust_likes(self.store(), id, -1).await
    }

    pub async fn is_owner(&self, id: CommentId, author_id: &str) -> Result<bool, AppError> {
        Ok(self.get(id).await?.author_id == author_id)
    }
}
