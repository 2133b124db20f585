use askama::Template;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::db::models::{Post, UserSummary};
use crate::db::{posts, users};
use crate::error::AppResult;
use crate::extractors::Layout;
use crate::routes::home::Html;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BlogSearchQuery {
    pub q: Option<String>,
    pub blog_search_submit: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/user_search.html")]
pub struct UserSearchTemplate {
    pub layout: Layout,
    pub query: String,
    pub searched: bool,
    pub users: Vec<UserSummary>,
}

#[derive(Template)]
#[template(path = "pages/blog_search.html")]
pub struct BlogSearchTemplate {
    pub layout: Layout,
    pub query: String,
    pub submitted: Option<String>,
    pub posts: Vec<Post>,
}

/// GET /search/?q=: users by username
pub async fn user_search(
    State(state): State<AppState>,
    layout: Layout,
    Query(query): Query<UserSearchQuery>,
) -> AppResult<Response> {
    let (searched, found) = match query.q.as_deref() {
        Some(q) => (true, users::search_users(&state.db, q)?),
        None => (false, Vec::new()),
    };

    Ok(Html(UserSearchTemplate {
        layout,
        query: query.q.unwrap_or_default(),
        searched,
        users: found,
    })
    .into_response())
}

/// GET /blog/search/?q=: posts by title or content
pub async fn blog_search(
    State(state): State<AppState>,
    layout: Layout,
    Query(query): Query<BlogSearchQuery>,
) -> AppResult<Response> {
    let found = posts::search_posts(&state.db, query.q.as_deref())?;
    tracing::debug!(q = ?query.q, results = found.len(), "Blog search");

    Ok(Html(BlogSearchTemplate {
        layout,
        query: query.q.unwrap_or_default(),
        submitted: query.blog_search_submit,
        posts: found,
    })
    .into_response())
}
