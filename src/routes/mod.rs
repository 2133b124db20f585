pub mod assets;
pub mod auth;
pub mod comments;
pub mod home;
pub mod posts;
pub mod search;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::flash;
use crate::state::AppState;
use crate::uploads::MAX_UPLOAD_BYTES;

/// The whole site.
pub fn app(state: AppState) -> Router {
    let media = ServeDir::new(state.config.uploads_path());

    Router::new()
        .route("/", get(home::index))
        .route("/about/", get(home::about))
        .route("/search/", get(search::user_search))
        .route("/blog/search/", get(search::blog_search))
        .merge(posts::router())
        .merge(comments::router())
        .merge(auth::router())
        .route("/assets/{*path}", get(assets::serve))
        .nest_service("/media", media)
        .layer(middleware::from_fn(flash::clear_after_render))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Numeric id from a path segment; anything else is a missing page.
pub(crate) fn parse_id(raw: &str) -> AppResult<i64> {
    raw.parse().map_err(|_| AppError::NotFound)
}
