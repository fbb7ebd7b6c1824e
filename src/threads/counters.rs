//! Reply and like counters.
//!
//! All changes go through the store's atomic increment. Only the direct parent's
//! `reply_count` moves when a child is created or soft-deleted. Stores that can
//! pair that move with the row write do so themselves; the helpers here are the
//! two-step path for stores that cannot.

use std::time::Duration;

use crate::{
    error::AppError,
    models::comment::{Comment, CommentId},
    store::{CommentStore, CounterDrift, CounterField},
};

pub const MAX_COUNTER_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Runs `op` until it succeeds, fails with something other than a storage
/// conflict, or has been tried [`MAX_COUNTER_ATTEMPTS`] times.
pub async fn retry_on_conflict<T, F, Fut>(what: &str, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(AppError::StorageConflict(msg)) if attempt < MAX_COUNTER_ATTEMPTS => {
                tracing::warn!("{} conflicted (attempt {}): {}", what, attempt, msg);
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Applies `delta` atomically, retrying a bounded number of times when the store
/// reports a conflicting concurrent update.
pub async fn increment_with_retry<S: CommentStore + ?Sized>(
    store: &S,
    id: CommentId,
    field: CounterField,
    delta: i32,
) -> Result<Option<Comment>, AppError> {
    let what = format!("Counter {} on {}", field.column(), id);
    retry_on_conflict(&what, || store.atomic_increment(id, field, delta)).await
}

async fn adjust_reply_count<S: CommentStore + ?Sized>(
    store: &S,
    parent_id: Option<CommentId>,
    delta: i32,
) -> Option<CounterDrift> {
    let parent_id = parent_id?;
    let field = CounterField::ReplyCount;

    let reason = match increment_with_retry(store, parent_id, field, delta).await {
        Ok(Some(_)) => return None,
        Ok(None) => "parent comment no longer exists".to_string(),
        Err(e) => e.to_string(),
    };

    tracing::error!(
        "Reply counter of {} left inconsistent (delta {}): {}",
        parent_id,
        delta,
        reason
    );
    Some(CounterDrift {
        comment_id: parent_id,
        field: field.column(),
        delta,
        reason,
    })
}

/// Bumps the parent's reply counter after a reply was written. No-op for roots.
pub async fn on_child_created<S: CommentStore + ?Sized>(
    store: &S,
    parent_id: Option<CommentId>,
) -> Option<CounterDrift> {
    adjust_reply_count(store, parent_id, 1).await
}

/// Drops the parent's reply counter after a reply was soft-deleted, floored at zero.
pub async fn on_child_soft_deleted<S: CommentStore + ?Sized>(
    store: &S,
    parent_id: Option<CommentId>,
) -> Option<CounterDrift> {
    adjust_reply_count(store, parent_id, -1).await
}

/// Moves `like_count` by `delta`, floored at zero.
pub async fn adjust_likes<S: CommentStore + ?Sized>(
    store: &S,
    id: CommentId,
    delta: i32,
) -> Result<Comment, AppError> {
    increment_with_retry(store, id, CounterField::LikeCount, delta)
        .await?
        .ok_or_else(|| AppError::comment_not_found(id))
}
