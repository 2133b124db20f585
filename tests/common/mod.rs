#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tempfile::TempDir;
use tower::ServiceExt;

use parse_blog::auth::session;
use parse_blog::config::Config;
use parse_blog::db::posts::{self, NewPost};
use parse_blog::db::{self, users};
use parse_blog::mail::MemoryMailer;
use parse_blog::routes;
use parse_blog::state::{AppState, DbPool};

pub const PASSWORD: &str = "s3cret-pass";

/// Smallest PNG header that content sniffing recognises.
pub const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00,
];

/// A full application over a throwaway data directory.
pub struct TestApp {
    pub dir: TempDir,
    pub db: DbPool,
    pub config: Config,
    pub mailer: Arc<MemoryMailer>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.database.path = Some(dir.path().join("test.db"));
        config.storage.path = Some(dir.path().join("media"));
        config.server.base_url = Some("http://testserver".into());
        config.auth.secret_key = Some("test-secret".into());
        config.auth.bcrypt_cost = 4;

        let db = db::create_pool(config.db_path()).expect("Failed to create test database");
        db::run_migrations(&db).expect("Failed to run migrations");

        let mailer = Arc::new(MemoryMailer::new());
        let router = routes::app(AppState {
            db: db.clone(),
            config: config.clone(),
            mailer: mailer.clone(),
        });

        Self {
            dir,
            db,
            config,
            mailer,
            router,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::get(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        form: &Multipart,
        cookie: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::post(uri).header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", Multipart::BOUNDARY),
        );
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(form.body())).unwrap())
            .await
    }

    /// Active account with [`PASSWORD`].
    pub fn user(&self, username: &str) -> i64 {
        let hash = bcrypt::hash(PASSWORD, 4).unwrap();
        let id = users::create_user(&self.db, username, &format!("{username}@example.com"), &hash)
            .unwrap();
        users::activate(&self.db, id).unwrap();
        id
    }

    /// Session cookie header value for a user.
    pub fn login(&self, user_id: i64) -> String {
        let token = session::create_session(&self.db, user_id, 1).unwrap();
        format!("{}={}", self.config.auth.cookie_name, token)
    }

    pub fn post(&self, author_id: i64, title: &str, content: &str) -> i64 {
        posts::create_post(
            &self.db,
            &NewPost {
                author_id,
                title: title.into(),
                content: content.into(),
                image: "post_image/seed.png".into(),
                category_ids: vec![],
            },
        )
        .unwrap()
    }

    pub fn count(&self, sql: &str) -> i64 {
        let conn = self.db.get().unwrap();
        conn.query_row(sql, [], |row| row.get(0)).unwrap()
    }
}

/// Hand-built multipart body.
#[derive(Default)]
pub struct Multipart {
    parts: Vec<u8>,
}

impl Multipart {
    pub const BOUNDARY: &'static str = "parseblogtestboundary";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                Self::BOUNDARY,
                name,
                value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, bytes: &[u8]) -> Self {
        self.parts.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                Self::BOUNDARY,
                name,
                file_name
            )
            .as_bytes(),
        );
        self.parts.extend_from_slice(bytes);
        self.parts.extend_from_slice(b"\r\n");
        self
    }

    pub fn body(&self) -> Vec<u8> {
        let mut body = self.parts.clone();
        body.extend_from_slice(format!("--{}--\r\n", Self::BOUNDARY).as_bytes());
        body
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

/// `name=value` of the first Set-Cookie for `name`.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&prefix))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

pub fn assert_redirect(response: &Response<Body>, to: &str) {
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(response), to);
}
