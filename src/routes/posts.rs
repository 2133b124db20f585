use askama::Template;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};

use crate::db::models::{Category, Comment, Post};
use crate::db::posts::{NewPost, PostChanges};
use crate::db::{bookmarks, categories, comments, posts};
use crate::error::{AppError, AppResult};
use crate::extractors::{referer, CurrentUser, Layout};
use crate::forms::{CommentForm, FormErrors, PostForm};
use crate::routes::home::{Html, Sidebar};
use crate::routes::parse_id;
use crate::state::AppState;
use crate::uploads::{self, FormData, Upload, INVALID_IMAGE, POST_IMAGE_DIR};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/{id}/", get(detail).post(comment))
        .route("/new_post/", get(create_page).post(create))
        .route("/post/{id}/update/", get(update_page).post(update))
        .route("/post/{id}/delete/", get(delete_page).post(delete))
        .route("/post/{id}/save_post/", post(save))
        .route("/post/{id}/un_save_post/", get(unsave))
}

// -- Templates --

#[derive(Template)]
#[template(path = "pages/post_detail.html")]
pub struct PostDetailTemplate {
    pub layout: Layout,
    pub post: Post,
    pub categories: Vec<Category>,
    pub comments: Vec<Comment>,
    pub is_saved: bool,
    pub is_author: bool,
    pub form: CommentForm,
    pub errors: FormErrors,
    pub sidebar: Sidebar,
}

#[derive(Template)]
#[template(path = "pages/post_form.html")]
pub struct PostFormTemplate {
    pub layout: Layout,
    pub heading: &'static str,
    pub action: String,
    pub form: PostForm,
    pub errors: FormErrors,
    pub categories: Vec<Category>,
    pub current_image: Option<String>,
}

#[derive(Template)]
#[template(path = "pages/post_confirm_delete.html")]
pub struct ConfirmDeleteTemplate {
    pub layout: Layout,
    pub post: Post,
}

// -- Detail and comments --

fn render_detail(
    state: &AppState,
    layout: Layout,
    post: Post,
    form: CommentForm,
    errors: FormErrors,
) -> AppResult<Response> {
    let is_saved = match layout.user_id() {
        Some(user_id) => bookmarks::is_saved(&state.db, user_id, post.id)?,
        None => false,
    };
    let is_author = layout.user_id() == Some(post.author_id);

    Ok(Html(PostDetailTemplate {
        categories: categories::categories_for_post(&state.db, post.id)?,
        comments: comments::comments_for_post(&state.db, post.id)?,
        sidebar: Sidebar::load(state)?,
        layout,
        post,
        is_saved,
        is_author,
        form,
        errors,
    })
    .into_response())
}

fn find_post(state: &AppState, raw_id: &str) -> AppResult<Post> {
    posts::get_post(&state.db, parse_id(raw_id)?)?.ok_or(AppError::NotFound)
}

/// GET /post/{id}/: records a view for signed-in readers
pub async fn detail(
    State(state): State<AppState>,
    layout: Layout,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let mut post = find_post(&state, &id)?;
    if let Some(user_id) = layout.user_id() {
        if posts::record_view(&state.db, user_id, post.id)? {
            post.view_count += 1;
        }
    }

    render_detail(&state, layout, post, CommentForm::default(), FormErrors::new())
}

/// POST /post/{id}/: add a comment
pub async fn comment(
    State(state): State<AppState>,
    layout: Layout,
    Path(id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let user_id = layout.require_user()?.id;
    let post = find_post(&state, &id)?;

    let errors = FormErrors::check(&form);
    if !errors.is_empty() {
        return render_detail(&state, layout, post, form, errors);
    }

    comments::add_comment(&state.db, user_id, post.id, form.content.trim())?;
    Ok(Redirect::to(&post.url()).into_response())
}

// -- Bookmarks --

/// POST /post/{id}/save_post/
pub async fn save(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let post = find_post(&state, &id)?;
    if bookmarks::save_post(&state.db, user.id, post.id)? {
        tracing::debug!(user = user.id, post = post.id, "Saved post");
    }
    let back = referer(&headers).unwrap_or_else(|| post.url());
    Ok(Redirect::to(&back).into_response())
}

/// GET /post/{id}/un_save_post/
pub async fn unsave(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = find_post(&state, &id)?;
    bookmarks::unsave_post(&state.db, user.id, post.id)?;
    Ok(Redirect::to(&post.url()).into_response())
}

// -- Authoring --

/// Loads a post the current user may change.
fn authored_post(state: &AppState, user: &CurrentUser, raw_id: &str) -> AppResult<Post> {
    let post = find_post(state, raw_id)?;
    if post.author_id != user.id {
        tracing::warn!(user = user.id, post = post.id, "Rejected edit by non-author");
        return Err(AppError::Forbidden);
    }
    Ok(post)
}

fn read_post_form(data: &FormData) -> PostForm {
    PostForm {
        title: data.text("title").trim().to_string(),
        content: data.text("content"),
        category_ids: data.ids("categories"),
    }
}

/// Validates the text fields and the image part. `image_required` is false
/// on update, where a missing file keeps the current image.
fn validate_post(form: &PostForm, image: Option<&Upload>, image_required: bool) -> FormErrors {
    let mut errors = FormErrors::check(form);
    match image {
        Some(upload) if uploads::image_extension(&upload.bytes).is_none() => {
            errors.add("image", INVALID_IMAGE);
        }
        None if image_required => errors.add("image", "This field is required."),
        _ => {}
    }
    errors
}

async fn store_image(state: &AppState, upload: &Upload) -> AppResult<String> {
    uploads::save_image(state.config.uploads_path(), POST_IMAGE_DIR, upload)
        .await?
        .ok_or_else(|| AppError::BadRequest(INVALID_IMAGE.into()))
}

fn form_page(
    state: &AppState,
    layout: Layout,
    heading: &'static str,
    action: String,
    form: PostForm,
    errors: FormErrors,
    current_image: Option<String>,
) -> AppResult<Response> {
    Ok(Html(PostFormTemplate {
        layout,
        heading,
        action,
        form,
        errors,
        categories: categories::list_categories(&state.db)?,
        current_image,
    })
    .into_response())
}

/// GET /new_post/
pub async fn create_page(State(state): State<AppState>, layout: Layout) -> AppResult<Response> {
    layout.require_user()?;
    form_page(
        &state,
        layout,
        "New Post",
        "/new_post/".into(),
        PostForm::default(),
        FormErrors::new(),
        None,
    )
}

/// POST /new_post/
pub async fn create(
    State(state): State<AppState>,
    layout: Layout,
    multipart: Multipart,
) -> AppResult<Response> {
    let author_id = layout.require_user()?.id;
    let mut data = FormData::read(multipart).await?;
    let form = read_post_form(&data);
    let image = data.take_file("image");

    let errors = validate_post(&form, image.as_ref(), true);
    let Some(image) = image.filter(|_| errors.is_empty()) else {
        return form_page(
            &state,
            layout,
            "New Post",
            "/new_post/".into(),
            form,
            errors,
            None,
        );
    };

    let stored = store_image(&state, &image).await?;
    let created = posts::create_post(
        &state.db,
        &NewPost {
            author_id,
            title: form.title,
            content: form.content,
            image: stored.clone(),
            category_ids: form.category_ids,
        },
    );
    let id = match created {
        Ok(id) => id,
        Err(e) => {
            uploads::remove_image(state.config.uploads_path(), &stored).await;
            return Err(e);
        }
    };

    Ok(Redirect::to(&format!("/post/{id}/")).into_response())
}

/// GET /post/{id}/update/
pub async fn update_page(
    State(state): State<AppState>,
    layout: Layout,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = authored_post(&state, layout.require_user()?, &id)?;
    let category_ids = categories::categories_for_post(&state.db, post.id)?
        .into_iter()
        .map(|c| c.id)
        .collect();

    form_page(
        &state,
        layout,
        "Update Post",
        format!("/post/{}/update/", post.id),
        PostForm {
            title: post.title,
            content: post.content,
            category_ids,
        },
        FormErrors::new(),
        Some(post.image),
    )
}

/// POST /post/{id}/update/
pub async fn update(
    State(state): State<AppState>,
    layout: Layout,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Response> {
    let post = authored_post(&state, layout.require_user()?, &id)?;
    let mut data = FormData::read(multipart).await?;
    let form = read_post_form(&data);
    let image = data.take_file("image");

    let errors = validate_post(&form, image.as_ref(), false);
    if !errors.is_empty() {
        return form_page(
            &state,
            layout,
            "Update Post",
            format!("/post/{}/update/", post.id),
            form,
            errors,
            Some(post.image),
        );
    }

    let image = match image {
        Some(upload) => Some(store_image(&state, &upload).await?),
        None => None,
    };
    let updated = posts::update_post(
        &state.db,
        post.id,
        &PostChanges {
            title: form.title,
            content: form.content,
            image: image.clone(),
            category_ids: form.category_ids,
        },
    );
    if let Err(e) = updated {
        if let Some(stored) = image {
            uploads::remove_image(state.config.uploads_path(), &stored).await;
        }
        return Err(e);
    }

    Ok(Redirect::to(&post.url()).into_response())
}

/// GET /post/{id}/delete/: confirmation page
pub async fn delete_page(
    State(state): State<AppState>,
    layout: Layout,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = authored_post(&state, layout.require_user()?, &id)?;
    Ok(Html(ConfirmDeleteTemplate { layout, post }).into_response())
}

/// POST /post/{id}/delete/
pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let post = authored_post(&state, &user, &id)?;
    posts::delete_post(&state.db, post.id)?;
    tracing::info!(user = user.id, post = post.id, "Deleted post");
    Ok(Redirect::to("/").into_response())
}
