use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub type CommentId = Uuid;

/// Separator between ancestor ids in a materialized path.
pub const PATH_SEPARATOR: char = '/';

/// Represents the 'comments' table in the database.
/// This is also the flat view returned to clients.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub parent_id: Option<CommentId>,
    pub level: i32,
    /// Slash-joined ancestor ids, ending with this comment's own id.
    pub path: String,
    pub is_deleted: bool,
    pub like_count: i32,
    pub reply_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    /// Path prefix shared by every descendant of this comment.
    pub fn descendant_prefix(&self) -> String {
        format!("{}{}", self.path, PATH_SEPARATOR)
    }
}

/// Nested display node: the flat view minus `path`, plus ordered replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentTree {
    pub id: CommentId,
    pub post_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub parent_id: Option<CommentId>,
    pub level: i32,
    pub is_deleted: bool,
    pub like_count: i32,
    pub reply_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub replies: Vec<CommentTree>,
}

impl CommentTree {
    pub fn from_comment(comment: Comment, replies: Vec<CommentTree>) -> Self {
        // Deleted nodes only survive as placeholders for their visible replies.
        let content = if comment.is_deleted {
            String::new()
        } else {
            comment.content
        };

        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_name: comment.author_name,
            content,
            parent_id: comment.parent_id,
            level: comment.level,
            is_deleted: comment.is_deleted,
            like_count: comment.like_count,
            reply_count: comment.reply_count,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            replies,
        }
    }
}

/// Verified identity of the caller, taken from the bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub name: String,
}

/// DTO for creating a new comment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(custom(function = not_blank, message = "Post ID is required"))]
    pub post_id: String,

    #[validate(
        custom(function = not_blank, message = "Content is required"),
        length(
            min = 1,
            max = 2000,
            message = "Content must be between 1 and 2000 characters"
        )
    )]
    pub content: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<CommentId>,
}

/// DTO for editing a comment's content.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(
        custom(function = not_blank, message = "Content is required"),
        length(
            min = 1,
            max = 2000,
            message = "Content must be between 1 and 2000 characters"
        )
    )]
    pub content: String,
}

/// Rejects empty and whitespace-only strings.
fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(post_id: &str, content: &str) -> CreateCommentRequest {
        CreateCommentRequest {
            post_id: post_id.to_string(),
            content: content.to_string(),
            parent_id: None,
        }
    }

    #[test]
    fn content_length_is_counted_in_characters() {
        assert!(create("p1", &"é".repeat(2000)).validate().is_ok());
        assert!(create("p1", &"a".repeat(2001)).validate().is_err());
    }

    #[test]
    fn blank_content_and_post_id_are_rejected() {
        assert!(create("p1", "   ").validate().is_err());
        assert!(create("", "hello").validate().is_err());
        assert!(
            UpdateCommentRequest {
                content: "\n\t".to_string()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn deleted_placeholder_hides_content() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let comment = Comment {
            id,
            post_id: "p1".into(),
            author_id: "u1".into(),
            author_name: "Ann".into(),
            content: "secret".into(),
            parent_id: None,
            level: 0,
            path: id.to_string(),
            is_deleted: true,
            like_count: 0,
            reply_count: 1,
            created_at: now,
            updated_at: now,
        };
        let node = CommentTree::from_comment(comment, Vec::new());
        assert!(node.content.is_empty());
        assert!(node.is_deleted);
    }
}
