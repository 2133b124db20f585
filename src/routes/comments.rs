use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::post;
use axum::Router;

use crate::db::comments;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::parse_id;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comment/{id}/like/", post(like))
        .route("/comment/{id}/dislike/", post(dislike))
}

#[derive(Debug, Clone, Copy)]
enum Reaction {
    Like,
    Dislike,
}

fn react(
    state: &AppState,
    user: &CurrentUser,
    raw_id: &str,
    reaction: Reaction,
) -> AppResult<Response> {
    let comment_id = parse_id(raw_id)?;
    let post_id = comments::comment_post_id(&state.db, comment_id)?.ok_or(AppError::NotFound)?;

    let recorded = match reaction {
        Reaction::Like => comments::like_comment(&state.db, user.id, comment_id)?,
        Reaction::Dislike => comments::dislike_comment(&state.db, user.id, comment_id)?,
    };
    tracing::debug!(
        user = user.id,
        comment = comment_id,
        ?reaction,
        recorded,
        "Comment reaction"
    );

    Ok(Redirect::to(&format!("/post/{post_id}/")).into_response())
}

/// POST /comment/{id}/like/
pub async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    react(&state, &user, &id, Reaction::Like)
}

/// POST /comment/{id}/dislike/
pub async fn dislike(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    react(&state, &user, &id, Reaction::Dislike)
}
