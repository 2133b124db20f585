//! One-shot messages carried across a redirect in a cookie.
//!
//! A handler sets the message on its redirect; the next page reads it through
//! [`Layout`](crate::extractors::Layout) and [`clear_after_render`] drops the
//! cookie once that page has rendered successfully.

use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};

use crate::extractors::cookie_value;

pub const COOKIE_NAME: &str = "parse_flash";

pub fn set_cookie(message: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=300",
        COOKIE_NAME,
        urlencoding::encode(message)
    )
}

pub fn clear_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", COOKIE_NAME)
}

/// Pending message, if any.
pub fn read(headers: &HeaderMap) -> Option<String> {
    let raw = cookie_value(headers, COOKIE_NAME)?;
    let message = urlencoding::decode(raw).ok()?.into_owned();
    (!message.is_empty()).then_some(message)
}

/// 303 to `to` carrying `message` for the next page.
pub fn redirect(to: &str, message: &str) -> Response {
    (
        [(header::SET_COOKIE, set_cookie(message))],
        Redirect::to(to),
    )
        .into_response()
}

/// Clears a flash cookie once a page has been shown with it.
pub async fn clear_after_render(request: Request, next: Next) -> Response {
    let had_flash = read(request.headers()).is_some();
    let mut response = next.run(request).await;

    if had_flash && response.status().is_success() && !sets_flash(&response) {
        if let Ok(value) = HeaderValue::from_str(&clear_cookie()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn sets_flash(response: &Response) -> bool {
    let prefix = format!("{COOKIE_NAME}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&prefix))
}
