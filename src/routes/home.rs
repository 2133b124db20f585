use askama::Template;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::db::categories;
use crate::db::models::{CategoryCount, Post};
use crate::db::posts;
use crate::error::AppResult;
use crate::extractors::Layout;
use crate::pagination::{PageInfo, POSTS_PER_PAGE};
use crate::state::AppState;

/// Number of posts in the sidebar's "most recent" box.
const SIDEBAR_RECENT: i64 = 3;

/// Right-hand column shared by the listing and detail pages.
pub struct Sidebar {
    pub most_recent: Vec<Post>,
    pub category_count: Vec<CategoryCount>,
}

impl Sidebar {
    pub fn load(state: &AppState) -> AppResult<Self> {
        Ok(Self {
            most_recent: posts::most_recent(&state.db, SIDEBAR_RECENT)?,
            category_count: categories::category_count(&state.db)?,
        })
    }
}

#[derive(Template)]
#[template(path = "pages/home.html")]
pub struct HomeTemplate {
    pub layout: Layout,
    pub posts: Vec<Post>,
    pub page: PageInfo,
    pub sidebar: Sidebar,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub layout: Layout,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// GET /: newest posts, four per page
pub async fn index(
    State(state): State<AppState>,
    layout: Layout,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let total = posts::count_posts(&state.db)?;
    let page = PageInfo::resolve(query.page.as_deref(), total, POSTS_PER_PAGE)?;
    let posts = posts::list_posts(&state.db, page.per_page, page.offset())?;

    Ok(Html(HomeTemplate {
        layout,
        posts,
        page,
        sidebar: Sidebar::load(&state)?,
    })
    .into_response())
}

/// GET /about/
pub async fn about(layout: Layout) -> Response {
    Html(AboutTemplate { layout }).into_response()
}
