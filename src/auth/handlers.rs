use askama::Template;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;

use crate::auth::password;
use crate::auth::session;
use crate::auth::tokens::{decode_uid, encode_uid, ActivationTokens};
use crate::db::models::{Post, User};
use crate::db::{bookmarks, posts, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie_value, referer, Layout};
use crate::flash;
use crate::forms::{FormErrors, LoginForm, ProfileForm, RegisterForm};
use crate::mail::Email;
use crate::routes::home::Html;
use crate::routes::parse_id;
use crate::state::AppState;
use crate::uploads::{self, FormData, PROFILE_IMAGE_DIR};

const REGISTERED: &str = "Please confirm your email address to complete the registration";
const ACTIVATED: &str = "Thank you for your email confirmation. Now you can login your account.";
const PROFILE_UPDATED: &str = "Your account has been updated!";
const BAD_LOGIN: &str = "Please enter a correct username and password.";
const BAD_ACTIVATION: &str = "Activation link is invalid!";
const USERNAME_TAKEN: &str = "A user with that username already exists.";

// -- Templates --

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub form: RegisterForm,
    pub errors: FormErrors,
}

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub action: String,
    pub username: String,
    pub error: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub layout: Layout,
    pub form: ProfileForm,
    pub errors: FormErrors,
    pub image: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/user_page.html")]
pub struct UserPageTemplate {
    pub layout: Layout,
    pub page_user: User,
    pub image: Option<String>,
    pub posts: Vec<Post>,
    pub interests: Vec<Post>,
    pub is_itself: bool,
}

#[derive(Template)]
#[template(path = "emails/activation.txt")]
pub struct ActivationEmail<'a> {
    pub username: &'a str,
    pub link: &'a str,
}

/// Origin used in links sent by email.
fn site_origin(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = state.config.server.base_url.as_deref() {
        return base.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("localhost:{}", state.config.server.port));
    format!("http://{host}")
}

fn activation_tokens(state: &AppState) -> ActivationTokens<'_> {
    ActivationTokens::new(state.config.secret_key(), state.config.auth.activation_hours)
}

// -- Registration --

/// GET /register/
pub async fn register_page(layout: Layout) -> Response {
    Html(RegisterTemplate {
        layout,
        form: RegisterForm::default(),
        errors: FormErrors::new(),
    })
    .into_response()
}

/// Re-renders the registration form with its errors. Passwords are never echoed back.
fn register_form_page(layout: Layout, mut form: RegisterForm, errors: FormErrors) -> Response {
    form.password1.clear();
    form.password2.clear();
    Html(RegisterTemplate {
        layout,
        form,
        errors,
    })
    .into_response()
}

/// POST /register/: create an inactive account and mail the activation link
pub async fn register(
    State(state): State<AppState>,
    layout: Layout,
    headers: HeaderMap,
    Form(mut form): Form<RegisterForm>,
) -> AppResult<Response> {
    form.username = form.username.trim().to_string();
    form.email = form.email.trim().to_string();

    let mut errors = FormErrors::check(&form);
    form.check_passwords(&mut errors);
    if !errors.has("username") && users::username_taken(&state.db, &form.username, None)? {
        errors.add("username", USERNAME_TAKEN);
    }
    if !errors.is_empty() {
        return Ok(register_form_page(layout, form, errors));
    }

    let hash = password::hash(&form.password1, state.config.auth.bcrypt_cost).await?;
    let user_id = match users::create_user(&state.db, &form.username, &form.email, &hash) {
        Ok(id) => id,
        Err(AppError::UsernameTaken) => {
            errors.add("username", USERNAME_TAKEN);
            return Ok(register_form_page(layout, form, errors));
        }
        Err(e) => return Err(e),
    };
    let user = users::get_user(&state.db, user_id)?
        .ok_or_else(|| AppError::Internal("user vanished after insert".into()))?;

    let token = activation_tokens(&state).make_token(&user)?;
    let link = format!(
        "{}/activate/{}/{}/",
        site_origin(&state, &headers),
        encode_uid(user.id),
        token
    );
    let body = ActivationEmail {
        username: &user.username,
        link: &link,
    }
    .render()?;

    state
        .mailer
        .send(Email {
            to: user.email.clone(),
            subject: "Activate your blog account.".into(),
            body,
        })
        .await?;
    tracing::info!(user = user.id, username = %user.username, "Registered new account");

    let back = referer(&headers).unwrap_or_else(|| "/register/".into());
    Ok(flash::redirect(&back, REGISTERED))
}

/// GET /activate/{uidb64}/{token}/: single-use account activation
pub async fn activate(
    State(state): State<AppState>,
    Path((uidb64, token)): Path<(String, String)>,
) -> AppResult<Response> {
    let user = match decode_uid(&uidb64) {
        Some(id) => users::get_user(&state.db, id)?,
        None => None,
    };
    let Some(user) = user.filter(|u| activation_tokens(&state).check_token(u, &token)) else {
        tracing::warn!(uidb64 = %uidb64, "Rejected activation link");
        return Ok((StatusCode::OK, BAD_ACTIVATION).into_response());
    };

    users::activate(&state.db, user.id)?;
    let session_token =
        session::create_session(&state.db, user.id, state.config.auth.session_hours)?;
    tracing::info!(user = user.id, "Activated account");

    Ok((
        AppendHeaders([
            (
                header::SET_COOKIE,
                session::session_cookie(
                    &state.config.auth.cookie_name,
                    &session_token,
                    state.config.auth.session_hours,
                ),
            ),
            (header::SET_COOKIE, flash::set_cookie(ACTIVATED)),
        ]),
        Redirect::to("/login/"),
    )
        .into_response())
}

// -- Login / logout --

fn login_action(post_id: Option<i64>) -> String {
    match post_id {
        Some(id) => format!("/login/{id}/"),
        None => "/login/".into(),
    }
}

fn login_form(
    layout: Layout,
    post_id: Option<i64>,
    username: String,
    error: Option<&'static str>,
) -> Response {
    Html(LoginTemplate {
        layout,
        action: login_action(post_id),
        username,
        error,
    })
    .into_response()
}

async fn attempt_login(
    state: &AppState,
    layout: Layout,
    post_id: Option<i64>,
    form: LoginForm,
) -> AppResult<Response> {
    // Inactive accounts fail exactly like a wrong password
    let candidate = users::find_by_username(&state.db, form.username.trim())?
        .filter(|user| user.is_active);
    let verified = match &candidate {
        Some(user) => password::verify(&form.password, &user.password_hash).await?,
        None => false,
    };
    let Some(user) = candidate.filter(|_| verified) else {
        tracing::debug!(username = %form.username, "Failed login");
        return Ok(login_form(layout, post_id, form.username, Some(BAD_LOGIN)));
    };

    let token = session::create_session(&state.db, user.id, state.config.auth.session_hours)?;
    let cookie = session::session_cookie(
        &state.config.auth.cookie_name,
        &token,
        state.config.auth.session_hours,
    );
    let next = match post_id {
        Some(id) => format!("/post/{id}/"),
        None => "/".into(),
    };
    tracing::info!(user = user.id, "Logged in");

    Ok(([(header::SET_COOKIE, cookie)], Redirect::to(&next)).into_response())
}

/// GET /login/
pub async fn login_page(layout: Layout) -> Response {
    login_form(layout, None, String::new(), None)
}

/// POST /login/
pub async fn login(
    State(state): State<AppState>,
    layout: Layout,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    attempt_login(&state, layout, None, form).await
}

/// GET /login/{post_id}/: log in, then return to a post
pub async fn login_for_post_page(
    layout: Layout,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let post_id = parse_id(&post_id)?;
    Ok(login_form(layout, Some(post_id), String::new(), None))
}

/// POST /login/{post_id}/
pub async fn login_for_post(
    State(state): State<AppState>,
    layout: Layout,
    Path(post_id): Path<String>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let post_id = parse_id(&post_id)?;
    attempt_login(&state, layout, Some(post_id), form).await
}

/// POST /logout/: delete session and redirect
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let cookie_name = &state.config.auth.cookie_name;
    if let Some(token) = cookie_value(&headers, cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        [(header::SET_COOKIE, session::clear_session_cookie(cookie_name))],
        Redirect::to("/"),
    )
        .into_response())
}

// -- Profile --

/// GET /profile/
pub async fn profile_page(State(state): State<AppState>, layout: Layout) -> AppResult<Response> {
    let user = layout.require_user()?;
    let form = ProfileForm {
        username: user.username.clone(),
        email: user.email.clone(),
    };
    let image = users::get_profile(&state.db, user.id)?.image;

    Ok(Html(ProfileTemplate {
        layout,
        form,
        errors: FormErrors::new(),
        image,
    })
    .into_response())
}

fn profile_form_page(
    state: &AppState,
    layout: Layout,
    form: ProfileForm,
    errors: FormErrors,
) -> AppResult<Response> {
    let user_id = layout.require_user()?.id;
    let image = users::get_profile(&state.db, user_id)?.image;
    Ok(Html(ProfileTemplate {
        layout,
        form,
        errors,
        image,
    })
    .into_response())
}

/// POST /profile/: username, email and picture
pub async fn update_profile(
    State(state): State<AppState>,
    layout: Layout,
    multipart: Multipart,
) -> AppResult<Response> {
    let user_id = layout.require_user()?.id;
    let mut data = FormData::read(multipart).await?;
    let form = ProfileForm {
        username: data.text("username").trim().to_string(),
        email: data.text("email").trim().to_string(),
    };
    let image = data.take_file("image");

    let mut errors = FormErrors::check(&form);
    if !errors.has("username")
        && users::username_taken(&state.db, &form.username, Some(user_id))?
    {
        errors.add("username", USERNAME_TAKEN);
    }
    if let Some(upload) = &image {
        if uploads::image_extension(&upload.bytes).is_none() {
            errors.add("image", uploads::INVALID_IMAGE);
        }
    }
    if !errors.is_empty() {
        return profile_form_page(&state, layout, form, errors);
    }

    match users::update_account(&state.db, user_id, &form.username, &form.email) {
        Ok(()) => {}
        Err(AppError::UsernameTaken) => {
            errors.add("username", USERNAME_TAKEN);
            return profile_form_page(&state, layout, form, errors);
        }
        Err(e) => return Err(e),
    }
    if let Some(upload) = image {
        if let Some(stored) =
            uploads::save_image(state.config.uploads_path(), PROFILE_IMAGE_DIR, &upload).await?
        {
            users::set_profile_image(&state.db, user_id, &stored)?;
        }
    }
    tracing::info!(user = user_id, "Updated profile");

    Ok(flash::redirect("/profile/", PROFILE_UPDATED))
}

/// GET /user/{username}/: a member's posts and saved posts
pub async fn user_page(
    State(state): State<AppState>,
    layout: Layout,
    Path(username): Path<String>,
) -> AppResult<Response> {
    let page_user = users::find_by_username(&state.db, &username)?.ok_or(AppError::NotFound)?;
    let is_itself = layout.user_id() == Some(page_user.id);

    Ok(Html(UserPageTemplate {
        image: users::get_profile(&state.db, page_user.id)?.image,
        posts: posts::posts_by_author(&state.db, page_user.id)?,
        interests: bookmarks::saved_posts(&state.db, page_user.id)?,
        layout,
        page_user,
        is_itself,
    })
    .into_response())
}
