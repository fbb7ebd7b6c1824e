use std::{cmp::Ordering, collections::HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    CommentStore, CounterDrift, CounterField, Listing, Mutation, OrderBy, Scope, Visibility,
};
use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentId},
        page::{SortDir, SortKey},
    },
};

/// Process-local store used when no database is configured, and by the tests.
///
/// Every mutation happens under the write lock, so counter updates are atomic
/// with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    comments: RwLock<HashMap<CommentId, Comment>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_scope(comment: &Comment, scope: &Scope) -> bool {
    match scope {
        Scope::Post(post_id) => &comment.post_id == post_id,
        Scope::RootsOf(post_id) => &comment.post_id == post_id && comment.parent_id.is_none(),
        Scope::RepliesTo(parent) => comment.parent_id == Some(*parent),
        Scope::Author(author_id) => &comment.author_id == author_id,
        Scope::ContentMatch(keyword) => comment
            .content
            .to_lowercase()
            .contains(&keyword.to_lowercase()),
        Scope::Subtree { id, prefix } => comment.id == *id || comment.path.starts_with(prefix),
    }
}

/// Counter arithmetic shared by every path: saturates at `i32::MAX`, floors at zero.
fn bump(count: i32, delta: i32) -> i32 {
    count.saturating_add(delta).max(0)
}

fn visible(comment: &Comment, visibility: Visibility) -> bool {
    visibility == Visibility::All || !comment.is_deleted
}

fn compare_by(a: &Comment, b: &Comment, order: &OrderBy) -> Ordering {
    let ord = match order.key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::LikeCount => a.like_count.cmp(&b.like_count),
        SortKey::ReplyCount => a.reply_count.cmp(&b.reply_count),
        SortKey::Level => a.level.cmp(&b.level),
        SortKey::Path => a.path.cmp(&b.path),
    };
    match order.dir {
        SortDir::Asc => ord,
        SortDir::Desc => ord.reverse(),
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn insert(&self, comment: &Comment) -> Result<(), AppError> {
        let mut comments = self.comments.write().await;
        if comments.contains_key(&comment.id) {
            return Err(AppError::StorageConflict(format!(
                "Comment {} already exists",
                comment.id
            )));
        }
        comments.insert(comment.id, comment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, AppError> {
        Ok(self.comments.read().await.get(&id).cloned())
    }

    async fn find(&self, listing: &Listing) -> Result<Vec<Comment>, AppError> {
        let comments = self.comments.read().await;
        let mut matched: Vec<Comment> = comments
            .values()
            .filter(|c| visible(c, listing.visibility) && in_scope(c, &listing.scope))
            .cloned()
            .collect();
        drop(comments);

        matched.sort_by(|a, b| {
            listing
                .order
                .iter()
                .map(|order| compare_by(a, b, order))
                .find(|ord| ord.is_ne())
                .unwrap_or_else(|| a.id.cmp(&b.id))
        });

        if let Some(window) = listing.window {
            let offset = usize::try_from(window.offset).unwrap_or(0);
            let limit = usize::try_from(window.limit).unwrap_or(0);
            matched = matched.into_iter().skip(offset).take(limit).collect();
        }

        Ok(matched)
    }

    async fn count(&self, scope: &Scope) -> Result<i64, AppError> {
        let comments = self.comments.read().await;
        let n = comments
            .values()
            .filter(|c| !c.is_deleted && in_scope(c, scope))
            .count();
        Ok(n as i64)
    }

    async fn update_content(
        &self,
        id: CommentId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, AppError> {
        let mut comments = self.comments.write().await;
        Ok(comments.get_mut(&id).filter(|c| !c.is_deleted).map(|c| {
            c.content = content.to_string();
            c.updated_at = at;
            c.clone()
        }))
    }

    async fn mark_deleted(
        &self,
        id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, AppError> {
        let mut comments = self.comments.write().await;
        Ok(comments.get_mut(&id).filter(|c| !c.is_deleted).map(|c| {
            c.is_deleted = true;
            c.updated_at = at;
            c.clone()
        }))
    }

    async fn atomic_increment(
        &self,
        id: CommentId,
        field: CounterField,
        delta: i32,
    ) -> Result<Option<Comment>, AppError> {
        let mut comments = self.comments.write().await;
        Ok(comments.get_mut(&id).map(|c| {
            let counter = match field {
                CounterField::ReplyCount => &mut c.reply_count,
                CounterField::LikeCount => &mut c.like_count,
            };
            *counter = bump(*counter, delta);
            c.clone()
        }))
    }

    async fn insert_reply(&self, comment: &Comment) -> Result<Option<CounterDrift>, AppError> {
        let mut comments = self.comments.write().await;
        if comments.contains_key(&comment.id) {
            return Err(AppError::StorageConflict(format!(
                "Comment {} already exists",
                comment.id
            )));
        }
        if let Some(parent_id) = comment.parent_id {
            let parent = comments
                .get_mut(&parent_id)
                .filter(|p| !p.is_deleted)
                .ok_or_else(|| AppError::comment_not_found(parent_id))?;
            parent.reply_count = bump(parent.reply_count, 1);
        }
        comments.insert(comment.id, comment.clone());
        Ok(None)
    }

    async fn soft_delete(
        &self,
        id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Mutation>, AppError> {
        let mut comments = self.comments.write().await;
        let Some(deleted) = comments.get_mut(&id).filter(|c| !c.is_deleted).map(|c| {
            c.is_deleted = true;
            c.updated_at = at;
            c.clone()
        }) else {
            return Ok(None);
        };

        if let Some(parent) = deleted.parent_id.and_then(|p| comments.get_mut(&p)) {
            parent.reply_count = bump(parent.reply_count, -1);
        }
        Ok(Some(Mutation {
            comment: deleted,
            counter_drift: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn comment(post: &str, content: &str, minutes: i64) -> Comment {
        let id = Uuid::new_v4();
        let at = Utc::now() + Duration::minutes(minutes);
        Comment {
            id,
            post_id: post.to_string(),
            author_id: "u1".to_string(),
            author_name: "Ann".to_string(),
            content: content.to_string(),
            parent_id: None,
            level: 0,
            path: id.to_string(),
            is_deleted: false,
            like_count: 0,
            reply_count: 0,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn decrement_floors_at_zero() {
        let store = MemoryCommentStore::new();
        let c = comment("p1", "hi", 0);
        store.insert(&c).await.unwrap();

        let after = store
            .atomic_increment(c.id, CounterField::LikeCount, -3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.like_count, 0);
    }

    #[tokio::test]
    async fn increment_saturates_at_integer_max() {
        let store = MemoryCommentStore::new();
        let mut c = comment("p1", "hi", 0);
        c.like_count = i32::MAX;
        store.insert(&c).await.unwrap();

        let after = store
            .atomic_increment(c.id, CounterField::LikeCount, 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.like_count, i32::MAX);
    }

    #[tokio::test]
    async fn reply_and_parent_counter_land_together() {
        let store = MemoryCommentStore::new();
        let parent = comment("p1", "parent", 0);
        store.insert(&parent).await.unwrap();
        let mut reply = comment("p1", "reply", 1);
        reply.parent_id = Some(parent.id);
        reply.level = 1;
        reply.path = format!("{}/{}", parent.path, reply.id);

        assert_eq!(store.insert_reply(&reply).await.unwrap(), None);
        let parent_now = store.find_by_id(parent.id).await.unwrap().unwrap();
        assert_eq!(parent_now.reply_count, 1);

        let deleted = store.soft_delete(reply.id, Utc::now()).await.unwrap().unwrap();
        assert!(deleted.comment.is_deleted);
        assert!(deleted.counter_drift.is_none());
        let parent_now = store.find_by_id(parent.id).await.unwrap().unwrap();
        assert_eq!(parent_now.reply_count, 0);
        assert!(store.soft_delete(reply.id, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reply_to_deleted_parent_writes_nothing() {
        let store = MemoryCommentStore::new();
        let parent = comment("p1", "parent", 0);
        store.insert(&parent).await.unwrap();
        store.mark_deleted(parent.id, Utc::now()).await.unwrap();
        let mut reply = comment("p1", "reply", 1);
        reply.parent_id = Some(parent.id);

        assert!(matches!(
            store.insert_reply(&reply).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.find_by_id(reply.id).await.unwrap().is_none());
        let parent_now = store.find_by_id(parent.id).await.unwrap().unwrap();
        assert_eq!(parent_now.reply_count, 0);
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let store = MemoryCommentStore::new();
        let c = comment("p1", "hi", 0);
        store.insert(&c).await.unwrap();
        assert!(matches!(
            store.insert(&c).await,
            Err(AppError::StorageConflict(_))
        ));
    }

    #[tokio::test]
    async fn windows_apply_after_ordering() {
        let store = MemoryCommentStore::new();
        let first = comment("p1", "a", 0);
        let second = comment("p1", "b", 1);
        let third = comment("p1", "c", 2);
        for c in [&second, &third, &first] {
            store.insert(c).await.unwrap();
        }

        let listing = Listing::new(
            Scope::Post("p1".to_string()),
            vec![OrderBy::desc(SortKey::CreatedAt)],
        )
        .window(1, 1);
        let page = store.find(&listing).await.unwrap();
        assert_eq!(page, vec![second]);
    }

    #[tokio::test]
    async fn deleted_rows_are_hidden_unless_requested() {
        let store = MemoryCommentStore::new();
        let c = comment("p1", "hi", 0);
        store.insert(&c).await.unwrap();
        store.mark_deleted(c.id, Utc::now()).await.unwrap();

        let listing = Listing::new(Scope::Post("p1".to_string()), Vec::new());
        assert!(store.find(&listing).await.unwrap().is_empty());
        assert_eq!(store.find(&listing.including_deleted()).await.unwrap().len(), 1);
        assert_eq!(store.count(&Scope::Post("p1".to_string())).await.unwrap(), 0);
        assert!(store.mark_deleted(c.id, Utc::now()).await.unwrap().is_none());
    }
}
