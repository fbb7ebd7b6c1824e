use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder, postgres::PgArguments, query::Query};

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

const COLUMNS: &str = "id, post_id, author_id, author_name, content, parent_id, level, path, \
                       is_deleted, like_count, reply_count, created_at, updated_at";

const INSERT_SQL: &str = r#"
    INSERT INTO comments
        (id, post_id, author_id, author_name, content, parent_id, level, path,
         is_deleted, like_count, reply_count, created_at, updated_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
"#;

/// Postgres-backed comment store.
#[derive(Debug, Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escapes `%`, `_` and `\` so user input matches literally inside LIKE patterns.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// `column + $2` computed in BIGINT, then clamped back into `0..=i32::MAX`.
fn counter_sum(column: &str) -> String {
    format!("LEAST(GREATEST({column}::BIGINT + $2, 0), 2147483647)::INTEGER")
}

fn mark_deleted_sql() -> String {
    format!(
        "UPDATE comments SET is_deleted = TRUE, updated_at = $2 \
         WHERE id = $1 AND is_deleted = FALSE RETURNING {}",
        COLUMNS
    )
}

fn insert_query(comment: &Comment) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(INSERT_SQL)
        .bind(comment.id)
        .bind(&comment.post_id)
        .bind(&comment.author_id)
        .bind(&comment.author_name)
        .bind(&comment.content)
        .bind(comment.parent_id)
        .bind(comment.level)
        .bind(&comment.path)
        .bind(comment.is_deleted)
        .bind(comment.like_count)
        .bind(comment.reply_count)
        .bind(comment.created_at)
        .bind(comment.updated_at)
}

fn insert_error(id: CommentId, e: sqlx::Error) -> AppError {
    if e
        .as_database_error()
        .is_some_and(|db| db.is_unique_violation())
    {
        return AppError::StorageConflict(format!("Comment {} already exists", id));
    }
    tracing::error!("Failed to insert comment {}: {:?}", id, e);
    AppError::from(e)
}

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::CreatedAt => "created_at",
        SortKey::UpdatedAt => "updated_at",
        SortKey::LikeCount => "like_count",
        SortKey::ReplyCount => "reply_count",
        SortKey::Level => "level",
        // Bytewise collation keeps each subtree contiguous after its root.
        SortKey::Path => "path COLLATE \"C\"",
    }
}

fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: &Scope) {
    match scope {
        Scope::Post(post_id) => {
            builder.push("post_id = ").push_bind(post_id.clone());
        }
        Scope::RootsOf(post_id) => {
            builder
                .push("post_id = ")
                .push_bind(post_id.clone())
                .push(" AND parent_id IS NULL");
        }
        Scope::RepliesTo(parent_id) => {
            builder.push("parent_id = ").push_bind(*parent_id);
        }
        Scope::Author(author_id) => {
            builder.push("author_id = ").push_bind(author_id.clone());
        }
        Scope::ContentMatch(keyword) => {
            builder
                .push("content ILIKE ")
                .push_bind(format!("%{}%", escape_like(keyword)));
        }
        Scope::Subtree { id, prefix } => {
            builder
                .push("(id = ")
                .push_bind(*id)
                .push(" OR path LIKE ")
                .push_bind(format!("{}%", escape_like(prefix)))
                .push(")");
        }
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, order: &[OrderBy]) {
    builder.push(" ORDER BY ");
    for o in order {
        let dir = match o.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };
        builder.push(sort_column(o.key)).push(" ").push(dir).push(", ");
    }
    builder.push("id ASC");
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn insert(&self, comment: &Comment) -> Result<(), AppError> {
        insert_query(comment)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(comment.id, e))?;

        Ok(())
    }

    async fn find_by_id(&self, id: CommentId) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "SELECT {} FROM comments WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn find(&self, listing: &Listing) -> Result<Vec<Comment>, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM comments WHERE ", COLUMNS));
        push_scope(&mut builder, &listing.scope);
        if listing.visibility == Visibility::Live {
            builder.push(" AND is_deleted = FALSE");
        }
        push_order(&mut builder, &listing.order);
        if let Some(window) = listing.window {
            builder
                .push(" LIMIT ")
                .push_bind(window.limit)
                .push(" OFFSET ")
                .push_bind(window.offset);
        }

        let comments = builder
            .build_query_as::<Comment>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list comments for {:?}: {:?}", listing.scope, e);
                AppError::from(e)
            })?;

        Ok(comments)
    }

    async fn count(&self, scope: &Scope) -> Result<i64, AppError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM comments WHERE ");
        push_scope(&mut builder, scope);
        builder.push(" AND is_deleted = FALSE");

        let (count,) = builder.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn update_content(
        &self,
        id: CommentId,
        content: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET content = $2, updated_at = $3 \
             WHERE id = $1 AND is_deleted = FALSE RETURNING {}",
            COLUMNS
        ))
        .bind(id)
        .bind(content)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn mark_deleted(
        &self,
        id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Comment>, AppError> {
        let comment = sqlx::query_as::<_, Comment>(&mark_deleted_sql())
            .bind(id)
            .bind(at)
            .fetch_optional(&self.pool)
            .await?;

        Ok(comment)
    }

    async fn atomic_increment(
        &self,
        id: CommentId,
        field: CounterField,
        delta: i32,
    ) -> Result<Option<Comment>, AppError> {
        let column = field.column();
        let comment = sqlx::query_as::<_, Comment>(&format!(
            "UPDATE comments SET {} = {} WHERE id = $1 RETURNING {}",
            column,
            counter_sum(column),
            COLUMNS
        ))
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        Ok(comment)
    }

    async fn insert_reply(&self, comment: &Comment) -> Result<Option<CounterDrift>, AppError> {
        let mut tx = self.pool.begin().await?;

        if let Some(parent_id) = comment.parent_id {
            // Holds the parent's row lock until commit, so it cannot be deleted under the reply.
            let bumped = sqlx::query(&format!(
                "UPDATE comments SET reply_count = {} WHERE id = $1 AND is_deleted = FALSE",
                counter_sum("reply_count")
            ))
            .bind(parent_id)
            .bind(1_i32)
            .execute(&mut *tx)
            .await?;

            if bumped.rows_affected() == 0 {
                return Err(AppError::comment_not_found(parent_id));
            }
        }

        insert_query(comment)
            .execute(&mut *tx)
            .await
            .map_err(|e| insert_error(comment.id, e))?;

        tx.commit().await?;
        Ok(None)
    }

    async fn soft_delete(
        &self,
        id: CommentId,
        at: DateTime<Utc>,
    ) -> Result<Option<Mutation>, AppError> {
        let mut tx = self.pool.begin().await?;

        let Some(deleted) = sqlx::query_as::<_, Comment>(&mark_deleted_sql())
            .bind(id)
            .bind(at)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        if let Some(parent_id) = deleted.parent_id {
            sqlx::query(&format!(
                "UPDATE comments SET reply_count = {} WHERE id = $1",
                counter_sum("reply_count")
            ))
            .bind(parent_id)
            .bind(-1_i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(Some(Mutation {
            comment: deleted,
            counter_drift: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_match_literally() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("hello"), "hello");
    }

    #[test]
    fn counters_are_clamped_in_sql() {
        assert_eq!(
            counter_sum("like_count"),
            "LEAST(GREATEST(like_count::BIGINT + $2, 0), 2147483647)::INTEGER"
        );
    }

    #[test]
    fn ordering_always_ends_with_id() {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT 1");
        push_order(
            &mut builder,
            &[OrderBy::asc(SortKey::Path), OrderBy::desc(SortKey::CreatedAt)],
        );
        assert_eq!(
            builder.sql(),
            "SELECT 1 ORDER BY path COLLATE \"C\" ASC, created_at DESC, id ASC"
        );
    }
}
