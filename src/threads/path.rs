//! Depth and materialized path assignment for new comments.

use crate::{
    error::AppError,
    models::comment::{Comment, CommentId, PATH_SEPARATOR},
    store::CommentStore,
};

/// Where a new comment sits in its post's reply forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub level: i32,
    pub path: String,
}

impl Placement {
    pub fn root(id: CommentId) -> Self {
        Self {
            level: 0,
            path: id.to_string(),
        }
    }

    pub fn child_of(parent: &Comment, id: CommentId) -> Self {
        Self {
            level: parent.level + 1,
            path: format!("{}{}{}", parent.path, PATH_SEPARATOR, id),
        }
    }
}

/// Computes `(level, path)` for a comment whose id is already known.
///
/// The parent must exist, be live, and belong to the same post.
pub async fn assign(
    store: &dyn CommentStore,
    new_id: CommentId,
    post_id: &str,
    parent_id: Option<CommentId>,
) -> Result<Placement, AppError> {
    let Some(parent_id) = parent_id else {
        return Ok(Placement::root(new_id));
    };

    let parent = store
        .find_by_id(parent_id)
        .await?
        .filter(|p| !p.is_deleted)
        .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

    if parent.post_id != post_id {
        return Err(AppError::Validation(format!(
            "Parent comment {} belongs to a different post",
            parent_id
        )));
    }

    Ok(Placement::child_of(&parent, new_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCommentStore;
    use chrono::Utc;
    use uuid::Uuid;

    fn stored(parent: Option<&Comment>, post: &str) -> Comment {
        let id = Uuid::new_v4();
        let placement = match parent {
            Some(p) => Placement::child_of(p, id),
            None => Placement::root(id),
        };
        let now = Utc::now();
        Comment {
            id,
            post_id: post.to_string(),
            author_id: "u1".to_string(),
            author_name: "Ann".to_string(),
            content: "text".to_string(),
            parent_id: parent.map(|p| p.id),
            level: placement.level,
            path: placement.path,
            is_deleted: false,
            like_count: 0,
            reply_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn root_path_is_own_id() {
        let store = MemoryCommentStore::new();
        let id = Uuid::new_v4();
        let placement = assign(&store, id, "p1", None).await.unwrap();
        assert_eq!(placement.level, 0);
        assert_eq!(placement.path, id.to_string());
    }

    #[tokio::test]
    async fn child_extends_parent_path() {
        let store = MemoryCommentStore::new();
        let root = stored(None, "p1");
        let child = stored(Some(&root), "p1");
        store.insert(&root).await.unwrap();
        store.insert(&child).await.unwrap();

        let id = Uuid::new_v4();
        let placement = assign(&store, id, "p1", Some(child.id)).await.unwrap();
        assert_eq!(placement.level, 2);
        assert_eq!(placement.path, format!("{}/{}/{}", root.id, child.id, id));
    }

    #[tokio::test]
    async fn missing_or_deleted_parent_is_not_found() {
        let store = MemoryCommentStore::new();
        let missing = assign(&store, Uuid::new_v4(), "p1", Some(Uuid::new_v4())).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let root = stored(None, "p1");
        store.insert(&root).await.unwrap();
        store.mark_deleted(root.id, Utc::now()).await.unwrap();
        let deleted = assign(&store, Uuid::new_v4(), "p1", Some(root.id)).await;
        assert!(matches!(deleted, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn parent_on_another_post_is_rejected() {
        let store = MemoryCommentStore::new();
        let root = stored(None, "p1");
        store.insert(&root).await.unwrap();

        let result = assign(&store, Uuid::new_v4(), "p2", Some(root.id)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
