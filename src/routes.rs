// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{handlers::comment, state::AppState, utils::jwt::auth_middleware};

/// Assembles the main application router.
///
/// * Public read routes and like counters.
/// * Author routes behind the bearer-token middleware.
/// * Global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/search", get(comment::search_comments))
        .route("/author/{author_id}", get(comment::list_by_author))
        .route("/post/{post_id}", get(comment::get_post_tree))
        .route("/post/{post_id}/root", get(comment::list_post_roots))
        .route("/post/{post_id}/count", get(comment::count_post_comments))
        .route("/post/{post_id}/paginated", get(comment::list_post_page))
        .route(
            "/post/{post_id}/root/paginated",
            get(comment::list_post_roots_page),
        )
        .route("/{id}", get(comment::get_comment))
        .route("/{id}/replies", get(comment::list_replies))
        .route("/{id}/reply-count", get(comment::count_replies))
        .route("/{id}/thread", get(comment::get_thread))
        .route("/{id}/like", post(comment::like_comment))
        .route("/{id}/unlike", post(comment::unlike_comment));

    // Author identity only ever comes from the verified token.
    let author_routes = Router::new()
        .route("/", post(comment::create_comment))
        .route(
            "/{id}",
            put(comment::update_comment).delete(comment::delete_comment),
        )
        .route("/{id}/owner", get(comment::check_owner))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/comments", public_routes.merge(author_routes))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
