//! Reply tree reconstruction.
//!
//! A tree is built from one flat fetch: a single pass indexes children by parent,
//! then each root is assembled by walking that index. Every comment is visited
//! once, so the cost is linear in the size of the fetched set.

use std::collections::{HashMap, HashSet};

use super::CommentService;
use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentId, CommentTree},
        page::SortKey,
    },
    store::{Listing, OrderBy, Scope},
};

/// Nesting deeper than this is cut off rather than followed.
pub const MAX_TREE_DEPTH: usize = 512;

type ChildIndex = HashMap<CommentId, Vec<Comment>>;

/// Assembles a flat comment set into an ordered forest.
///
/// Roots and every reply list are ordered oldest first. A comment whose parent is
/// not in the set is promoted to a root. Soft-deleted comments stay only as
/// placeholders for visible replies; deleted leaves are dropped.
pub fn assemble(comments: Vec<Comment>) -> Vec<CommentTree> {
    let present: HashSet<CommentId> = comments.iter().map(|c| c.id).collect();

    let mut roots = Vec::new();
    let mut children = ChildIndex::new();
    for comment in comments {
        match comment.parent_id.filter(|p| present.contains(p)) {
            Some(parent_id) => children.entry(parent_id).or_default().push(comment),
            None => roots.push(comment),
        }
    }

    roots.sort_by_key(|c| c.created_at);
    for bucket in children.values_mut() {
        bucket.sort_by_key(|c| c.created_at);
    }

    let forest: Vec<CommentTree> = roots
        .into_iter()
        .filter_map(|root| attach(root, &mut children, 0))
        .collect();

    // Whatever is left was never reachable from a root: a cycle or a corrupt parent link.
    if !children.is_empty() {
        let stranded: usize = children.values().map(Vec::len).sum();
        tracing::warn!(
            "Dropped {} comments unreachable from any root while building reply tree",
            stranded
        );
    }

    forest
}

fn attach(comment: Comment, children: &mut ChildIndex, depth: usize) -> Option<CommentTree> {
    // Taking the bucket out of the index means no node is expanded twice.
    let bucket = children.remove(&comment.id).unwrap_or_default();

    let replies: Vec<CommentTree> = if depth >= MAX_TREE_DEPTH {
        if !bucket.is_empty() {
            tracing::warn!(
                "Reply tree under {} exceeds depth {}, truncating {} replies",
                comment.id,
                MAX_TREE_DEPTH,
                bucket.len()
            );
        }
        Vec::new()
    } else {
        bucket
            .into_iter()
            .filter_map(|child| attach(child, children, depth + 1))
            .collect()
    };

    if comment.is_deleted && replies.is_empty() {
        return None;
    }
    Some(CommentTree::from_comment(comment, replies))
}

impl CommentService {
    /// Nested reply forest of a post.
    pub async fn build_tree(&self, post_id: &str) -> Result<Vec<CommentTree>, AppError> {
        let listing = Listing::new(
            Scope::Post(post_id.to_string()),
            vec![OrderBy::asc(SortKey::Path), OrderBy::asc(SortKey::CreatedAt)],
        )
        .including_deleted();
        let flat = self.store.find(&listing).await?;
        tracing::debug!("Building reply tree for post {} from {} rows", post_id, flat.len());

        Ok(assemble(flat))
    }

    /// Nested thread rooted at one live comment, fetched by path prefix.
    pub async fn build_thread(&self, id: CommentId) -> Result<CommentTree, AppError> {
        let root = self.get(id).await?;
        let listing = Listing::new(
            Scope::Subtree {
                id,
                prefix: root.descendant_prefix(),
            },
            vec![OrderBy::asc(SortKey::Path), OrderBy::asc(SortKey::CreatedAt)],
        )
        .including_deleted();
        let flat = self.store.find(&listing).await?;

        assemble(flat)
            .into_iter()
            .find(|node| node.id == id)
            .ok_or_else(|| AppError::comment_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    struct Forest {
        comments: Vec<Comment>,
        minute: i64,
    }

    impl Forest {
        fn new() -> Self {
            Self {
                comments: Vec::new(),
                minute: 0,
            }
        }

        fn add(&mut self, parent: Option<CommentId>) -> CommentId {
            let id = Uuid::new_v4();
            let (level, path) = match parent.and_then(|p| self.comments.iter().find(|c| c.id == p)) {
                Some(p) => (p.level + 1, format!("{}/{}", p.path, id)),
                None => (0, id.to_string()),
            };
            self.minute += 1;
            let at = Utc::now() + Duration::minutes(self.minute);
            self.comments.push(Comment {
                id,
                post_id: "p1".to_string(),
                author_id: "u1".to_string(),
                author_name: "Ann".to_string(),
                content: format!("comment {}", self.minute),
                parent_id: parent,
                level,
                path,
                is_deleted: false,
                like_count: 0,
                reply_count: 0,
                created_at: at,
                updated_at: at,
            });
            id
        }

        fn delete(&mut self, id: CommentId) {
            if let Some(c) = self.comments.iter_mut().find(|c| c.id == id) {
                c.is_deleted = true;
            }
        }
    }

    fn shape(nodes: &[CommentTree]) -> Vec<(CommentId, usize)> {
        nodes.iter().map(|n| (n.id, n.replies.len())).collect()
    }

    #[test]
    fn chain_nests_three_levels() {
        let mut f = Forest::new();
        let a = f.add(None);
        let b = f.add(Some(a));
        let c = f.add(Some(b));

        let tree = assemble(f.comments);
        assert_eq!(shape(&tree), vec![(a, 1)]);
        assert_eq!(shape(&tree[0].replies), vec![(b, 1)]);
        assert_eq!(shape(&tree[0].replies[0].replies), vec![(c, 0)]);
        assert!(tree[0].replies[0].replies[0].replies.is_empty());
    }

    #[test]
    fn siblings_keep_creation_order_regardless_of_input_order() {
        let mut f = Forest::new();
        let root = f.add(None);
        let first = f.add(Some(root));
        let second = f.add(Some(root));
        let third = f.add(Some(root));
        f.comments.reverse();

        let tree = assemble(f.comments);
        let ids: Vec<_> = tree[0].replies.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn deleted_parent_stays_as_placeholder() {
        let mut f = Forest::new();
        let a = f.add(None);
        let b = f.add(Some(a));
        let c = f.add(Some(b));
        let lonely = f.add(Some(a));
        f.delete(b);
        f.delete(lonely);

        let tree = assemble(f.comments);
        let placeholder = &tree[0].replies[0];
        assert_eq!(tree[0].replies.len(), 1);
        assert_eq!(placeholder.id, b);
        assert!(placeholder.is_deleted);
        assert!(placeholder.content.is_empty());
        assert_eq!(shape(&placeholder.replies), vec![(c, 0)]);
    }

    #[test]
    fn orphan_is_promoted_to_root() {
        let mut f = Forest::new();
        let a = f.add(None);
        let b = f.add(Some(a));
        f.comments.retain(|c| c.id != a);

        let tree = assemble(f.comments);
        assert_eq!(shape(&tree), vec![(b, 0)]);
    }

    #[test]
    fn cycles_are_dropped_instead_of_looping() {
        let mut f = Forest::new();
        let root = f.add(None);
        let x = f.add(None);
        let y = f.add(Some(x));
        // Corrupt x so that x and y point at each other.
        if let Some(c) = f.comments.iter_mut().find(|c| c.id == x) {
            c.parent_id = Some(y);
        }

        let tree = assemble(f.comments);
        assert_eq!(shape(&tree), vec![(root, 0)]);
    }

    #[test]
    fn depth_guard_truncates_runaway_chains() {
        let mut f = Forest::new();
        let mut parent = f.add(None);
        for _ in 0..MAX_TREE_DEPTH + 5 {
            parent = f.add(Some(parent));
        }

        let tree = assemble(f.comments);
        let mut node = &tree[0];
        let mut depth = 0;
        while let Some(next) = node.replies.first() {
            node = next;
            depth += 1;
        }
        assert_eq!(depth, MAX_TREE_DEPTH);
    }
}
