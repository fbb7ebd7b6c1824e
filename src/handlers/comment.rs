use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        comment::{CommentTree, CreateCommentRequest, UpdateCommentRequest},
        page::{PageParams, PageRequest},
    },
    threads::CommentService,
    utils::jwt::Claims,
};

/// Create a new comment or reply as the authenticated author.
pub async fn create_comment(
    State(comments): State<CommentService>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let created = comments.create(payload, &claims.author()).await?;

    if let Some(drift) = &created.counter_drift {
        tracing::warn!("Comment {} created with counter drift: {:?}", created.comment.id, drift);
    }

    Ok((StatusCode::CREATED, Json(created.comment)))
}

/// Get a single comment by ID.
pub async fn get_comment(
    State(comments): State<CommentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.get(id).await?))
}

/// Edit a comment. Author only.
pub async fn update_comment(
    State(comments): State<CommentService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.update(id, &claims.sub, payload).await?))
}

/// Soft-delete a comment. Author only.
/// Answers 204, or 200 with a warning when the parent's reply counter could not be adjusted.
pub async fn delete_comment(
    State(comments): State<CommentService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let deleted = comments.delete(id, &claims.sub).await?;

    match deleted.counter_drift {
        Some(drift) => Ok((StatusCode::OK, Json(json!({ "warning": drift }))).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Nested reply tree of a post.
pub async fn get_post_tree(
    State(comments): State<CommentService>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.build_tree(&post_id).await?))
}

/// Root comments of a post, without their replies.
pub async fn list_post_roots(
    State(comments): State<CommentService>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let roots: Vec<CommentTree> = comments
        .roots_by_post(&post_id)
        .await?
        .into_iter()
        .map(|c| CommentTree::from_comment(c, Vec::new()))
        .collect();

    Ok(Json(roots))
}

pub async fn count_post_comments(
    State(comments): State<CommentService>,
    Path(post_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.count_by_post(&post_id).await?))
}

/// Paginated flat listing of a post's comments.
pub async fn list_post_page(
    State(comments): State<CommentService>,
    Path(post_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = PageRequest::try_from(params)?;
    Ok(Json(comments.by_post_page(&post_id, &request).await?))
}

/// Paginated listing of a post's root comments.
pub async fn list_post_roots_page(
    State(comments): State<CommentService>,
    Path(post_id): Path<String>,
    Query(params): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let request = PageRequest::try_from(params)?;
    Ok(Json(comments.roots_by_post_page(&post_id, &request).await?))
}

/// Direct replies of a comment.
pub async fn list_replies(
    State(comments): State<CommentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.replies_of(id).await?))
}

pub async fn count_replies(
    State(comments): State<CommentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.count_replies(id).await?))
}

/// The thread rooted at a comment.
pub async fn get_thread(
    State(comments): State<CommentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.build_thread(id).await?))
}

/// Whether the authenticated author wrote this comment.
pub async fn check_owner(
    State(comments): State<CommentService>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let owner = comments.is_owner(id, &claims.sub).await?;
    Ok(Json(json!({ "owner": owner })))
}

pub async fn like_comment(
    State(comments): State<CommentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let comment = comments.like(id).await?;
    Ok(Json(json!({ "like_count": comment.like_count })))
}

pub async fn unlike_comment(
    State(comments): State<CommentService>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let comment = comments.unlike(id).await?;
    Ok(Json(json!({ "like_count": comment.like_count })))
}

/// Comments written by an author, newest first.
pub async fn list_by_author(
    State(comments): State<CommentService>,
    Path(author_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.by_author(&author_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub keyword: String,
}

/// Content search, newest first.
pub async fn search_comments(
    State(comments): State<CommentService>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(comments.search(&params.keyword).await?))
}
