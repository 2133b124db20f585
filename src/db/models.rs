use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub user_id: i64,
    pub image: Option<String>,
}

/// A user as shown in search results.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryCount {
    pub title: String,
    pub count: i64,
}

/// A post joined with its author's name and engagement counts.
#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author: String,
    pub title: String,
    pub image: String,
    pub content: String,
    pub date_posted: String,
    pub updated: String,
    pub comment_count: i64,
    pub view_count: i64,
}

impl Post {
    pub fn url(&self) -> String {
        format!("/post/{}/", self.id)
    }

    /// First 200 characters of the content, for list pages.
    pub fn excerpt(&self) -> String {
        let mut chars = self.content.chars();
        let head: String = chars.by_ref().take(200).collect();
        if chars.next().is_some() {
            format!("{head}…")
        } else {
            head
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub timestamp: String,
    pub like_count: i64,
    pub dislike_count: i64,
}
