//! Flat read primitives. Each one fixes its ordering and hides soft-deleted rows.

use super::CommentService;
use crate::{
    error::AppError,
    models::{
        comment::{Comment, CommentId},
        page::{Page, PageRequest, SortKey},
    },
    store::{Listing, OrderBy, Scope},
};

impl CommentService {
    /// A single live comment.
    pub async fn get(&self, id: CommentId) -> Result<Comment, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| AppError::comment_not_found(id))
    }

    /// All live comments of a post, subtrees grouped by path.
    pub async fn by_post(&self, post_id: &str) -> Result<Vec<Comment>, AppError> {
        let listing = Listing::new(
            Scope::Post(post_id.to_string()),
            vec![OrderBy::asc(SortKey::Path), OrderBy::asc(SortKey::CreatedAt)],
        );
        self.store.find(&listing).await
    }

    pub async fn roots_by_post(&self, post_id: &str) -> Result<Vec<Comment>, AppError> {
        let listing = Listing::new(
            Scope::RootsOf(post_id.to_string()),
            vec![OrderBy::asc(SortKey::CreatedAt)],
        );
        self.store.find(&listing).await
    }

    /// Direct live children, oldest first.
    pub async fn replies_of(&self, parent_id: CommentId) -> Result<Vec<Comment>, AppError> {
        let listing = Listing::new(
            Scope::RepliesTo(parent_id),
            vec![OrderBy::asc(SortKey::CreatedAt)],
        );
        self.store.find(&listing).await
    }

    pub async fn by_author(&self, author_id: &str) -> Result<Vec<Comment>, AppError> {
        let listing = Listing::new(
            Scope::Author(author_id.to_string()),
            vec![OrderBy::desc(SortKey::CreatedAt)],
        );
        self.store.find(&listing).await
    }

    /// Case-insensitive literal substring search over content, newest first.
    pub async fn search(&self, keyword: &str) -> Result<Vec<Comment>, AppError> {
        if keyword.trim().is_empty() {
            return Err(AppError::Validation("Keyword must not be blank".to_string()));
        }
        let listing = Listing::new(
            Scope::ContentMatch(keyword.to_string()),
            vec![OrderBy::desc(SortKey::CreatedAt)],
        );
        self.store.find(&listing).await
    }

    pub async fn count_by_post(&self, post_id: &str) -> Result<i64, AppError> {
        self.store.count(&Scope::Post(post_id.to_string())).await
    }

    pub async fn count_replies(&self, parent_id: CommentId) -> Result<i64, AppError> {
        self.store.count(&Scope::RepliesTo(parent_id)).await
    }

    pub async fn by_post_page(
        &self,
        post_id: &str,
        request: &PageRequest,
    ) -> Result<Page<Comment>, AppError> {
        self.page(Scope::Post(post_id.to_string()), request).await
    }

    pub async fn roots_by_post_page(
        &self,
        post_id: &str,
        request: &PageRequest,
    ) -> Result<Page<Comment>, AppError> {
        self.page(Scope::RootsOf(post_id.to_string()), request).await
    }

    async fn page(&self, scope: Scope, request: &PageRequest) -> Result<Page<Comment>, AppError> {
        let total = self.store.count(&scope).await?;
        let listing = Listing::new(
            scope,
            vec![OrderBy {
                key: request.sort_by,
                dir: request.sort_dir,
            }],
        )
        .window(request.offset(), request.size);
        let content = self.store.find(&listing).await?;

        Ok(Page::new(content, request, total))
    }
}
