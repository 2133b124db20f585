use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};

use crate::auth::session;
use crate::db::users;
use crate::error::AppError;
use crate::flash;
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub email: String,
}

/// Extractor that requires authentication.
/// Anonymous requests are rejected with a redirect to the login page.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie_value(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let user_id = session::session_user(&state.db, token)?.ok_or(AppError::Unauthorized)?;
        let user = users::get_user(&state.db, user_id)?
            .filter(|u| u.is_active)
            .ok_or(AppError::Unauthorized)?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
            email: user.email,
        })
    }
}

/// Optional user extractor: returns None instead of redirecting when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// What every page needs for its header: who is signed in and the pending flash message.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub user: Option<CurrentUser>,
    pub flash: Option<String>,
}

impl Layout {
    pub fn require_user(&self) -> Result<&CurrentUser, AppError> {
        self.user.as_ref().ok_or(AppError::Unauthorized)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for Layout {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let MaybeUser(user) = MaybeUser::from_request_parts(parts, state).await?;
        Ok(Layout {
            user,
            flash: flash::read(&parts.headers),
        })
    }
}

/// Value of a named cookie from the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

/// Same-site page the browser came from, used to send the user back after an action.
pub fn referer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::REFERER)?.to_str().ok()?;
    if value.is_empty() {
        return None;
    }
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    if value.starts_with('/') {
        return local_path(value).map(str::to_string);
    }
    // Absolute URLs are only followed back to this host
    let rest = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"))?;
    let (authority, path) = match rest.find('/') {
        Some(i) => (&rest[..i], &rest[i..]),
        None => (rest, "/"),
    };
    if Some(authority) != host {
        return None;
    }
    local_path(path).map(str::to_string)
}

/// Browsers treat `//host` and `/\host` as a different origin.
fn local_path(path: &str) -> Option<&str> {
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some('/'), Some('/' | '\\')) => None,
        (Some('/'), _) => Some(path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn cookie_value_finds_named_cookie() {
        let map = headers(&[(header::COOKIE, "a=1; parse_session=tok; b=2")]);
        assert_eq!(cookie_value(&map, "parse_session"), Some("tok"));
        assert_eq!(cookie_value(&map, "b"), Some("2"));
        assert_eq!(cookie_value(&map, "missing"), None);
    }

    #[test]
    fn cookie_value_reads_every_cookie_header() {
        let map = headers(&[(header::COOKIE, "a=1"), (header::COOKIE, "parse_flash=hi")]);
        assert_eq!(cookie_value(&map, "parse_flash"), Some("hi"));
    }

    #[test]
    fn referer_keeps_same_host_paths() {
        let map = headers(&[
            (header::HOST, "blog.test"),
            (header::REFERER, "http://blog.test/post/3/?page=2"),
        ]);
        assert_eq!(referer(&map).as_deref(), Some("/post/3/?page=2"));

        let map = headers(&[(header::HOST, "blog.test"), (header::REFERER, "/register/")]);
        assert_eq!(referer(&map).as_deref(), Some("/register/"));
    }

    #[test]
    fn referer_ignores_other_hosts() {
        let map = headers(&[
            (header::HOST, "blog.test"),
            (header::REFERER, "https://evil.test/phish"),
        ]);
        assert_eq!(referer(&map), None);

        let map = headers(&[(header::HOST, "blog.test"), (header::REFERER, "//evil.test/")]);
        assert_eq!(referer(&map), None);
        assert_eq!(referer(&HeaderMap::new()), None);
    }

    #[test]
    fn referer_rejects_backslash_authority() {
        let map = headers(&[
            (header::HOST, "blog.test"),
            (header::REFERER, "http://blog.test/\\evil.example/"),
        ]);
        assert_eq!(referer(&map), None);

        let map = headers(&[(header::HOST, "blog.test"), (header::REFERER, "/\\evil.example/")]);
        assert_eq!(referer(&map), None);

        let map = headers(&[(header::HOST, "blog.test"), (header::REFERER, "http://blog.test//x")]);
        assert_eq!(referer(&map), None);
    }
}
