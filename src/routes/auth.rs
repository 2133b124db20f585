use axum::routing::{get, post};
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register/", get(handlers::register_page).post(handlers::register))
        .route("/login/", get(handlers::login_page).post(handlers::login))
        .route(
            "/login/{post_id}/",
            get(handlers::login_for_post_page).post(handlers::login_for_post),
        )
        .route("/logout/", post(handlers::logout))
        .route("/profile/", get(handlers::profile_page).post(handlers::update_profile))
        .route("/user/{username}/", get(handlers::user_page))
        .route("/activate/{uidb64}/{token}/", get(handlers::activate))
}
