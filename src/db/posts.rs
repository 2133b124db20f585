use rusqlite::{params, OptionalExtension, Row, Transaction};

use crate::db::like_pattern;
use crate::db::models::Post;
use crate::error::AppResult;
use crate::state::DbPool;

/// Shared projection: post columns, author name, and engagement counts.
pub(crate) const POST_SELECT: &str = "SELECT p.id, p.author_id, u.username, p.title, p.image, p.content,
        p.date_posted, p.updated,
        (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id),
        (SELECT COUNT(*) FROM post_views v WHERE v.post_id = p.id)
    FROM posts p
    JOIN users u ON u.id = p.author_id";

/// Newest first; ids break ties between posts created in the same second.
const NEWEST_FIRST: &str = "ORDER BY p.date_posted DESC, p.id DESC";

pub(crate) fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        author: row.get(2)?,
        title: row.get(3)?,
        image: row.get(4)?,
        content: row.get(5)?,
        date_posted: row.get(6)?,
        updated: row.get(7)?,
        comment_count: row.get(8)?,
        view_count: row.get(9)?,
    })
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub image: String,
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct PostChanges {
    pub title: String,
    pub content: String,
    /// `None` keeps the current image.
    pub image: Option<String>,
    pub category_ids: Vec<i64>,
}

fn link_categories(tx: &Transaction<'_>, post_id: i64, category_ids: &[i64]) -> AppResult<()> {
    tx.execute(
        "DELETE FROM post_categories WHERE post_id = ?1",
        params![post_id],
    )?;
    let mut stmt = tx.prepare(
        "INSERT OR IGNORE INTO post_categories (post_id, category_id)
         SELECT ?1, id FROM categories WHERE id = ?2",
    )?;
    for category_id in category_ids {
        stmt.execute(params![post_id, category_id])?;
    }
    Ok(())
}

pub fn create_post(pool: &DbPool, post: &NewPost) -> AppResult<i64> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO posts (author_id, title, image, content) VALUES (?1, ?2, ?3, ?4)",
        params![post.author_id, post.title, post.image, post.content],
    )?;
    let id = tx.last_insert_rowid();
    link_categories(&tx, id, &post.category_ids)?;
    tx.commit()?;

    tracing::info!(post_id = id, author_id = post.author_id, "Created post");
    Ok(id)
}

pub fn update_post(pool: &DbPool, id: i64, changes: &PostChanges) -> AppResult<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE posts SET title = ?1, content = ?2, image = COALESCE(?3, image),
                updated = datetime('now')
         WHERE id = ?4",
        params![changes.title, changes.content, changes.image, id],
    )?;
    link_categories(&tx, id, &changes.category_ids)?;
    tx.commit()?;
    Ok(())
}

/// Returns whether a row was removed. Comments, views, bookmarks and
/// category links go with it through `ON DELETE CASCADE`.
pub fn delete_post(pool: &DbPool, id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM posts WHERE id = ?1", params![id])?;
    Ok(rows > 0)
}

pub fn get_post(pool: &DbPool, id: i64) -> AppResult<Option<Post>> {
    let conn = pool.get()?;
    let post = conn
        .query_row(
            &format!("{POST_SELECT} WHERE p.id = ?1"),
            params![id],
            post_from_row,
        )
        .optional()?;
    Ok(post)
}

pub fn count_posts(pool: &DbPool) -> AppResult<i64> {
    let conn = pool.get()?;
    let count = conn.query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
    Ok(count)
}

pub fn list_posts(pool: &DbPool, limit: i64, offset: i64) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("{POST_SELECT} {NEWEST_FIRST} LIMIT ?1 OFFSET ?2"))?;
    let posts = stmt
        .query_map(params![limit, offset], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn most_recent(pool: &DbPool, n: i64) -> AppResult<Vec<Post>> {
    list_posts(pool, n, 0)
}

/// Posts whose title or content contains `query`, case-insensitively.
/// A blank query returns every post.
pub fn search_posts(pool: &DbPool, query: Option<&str>) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let posts = match query.filter(|q| !q.is_empty()) {
        Some(q) => {
            let mut stmt = conn.prepare(&format!(
                "{POST_SELECT}
                 WHERE casefold(p.title) LIKE casefold(?1) ESCAPE '\\'
                    OR casefold(p.content) LIKE casefold(?1) ESCAPE '\\'
                 {NEWEST_FIRST}"
            ))?;
            let rows = stmt.query_map(params![like_pattern(q)], post_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!("{POST_SELECT} {NEWEST_FIRST}"))?;
            let rows = stmt.query_map([], post_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(posts)
}

pub fn posts_by_author(pool: &DbPool, author_id: i64) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!("{POST_SELECT} WHERE p.author_id = ?1 {NEWEST_FIRST}"))?;
    let posts = stmt
        .query_map(params![author_id], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Record that `user_id` viewed the post, once per user. Returns true for a first view.
pub fn record_view(pool: &DbPool, user_id: i64, post_id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "INSERT INTO post_views (user_id, post_id)
         SELECT ?1, ?2
         WHERE NOT EXISTS (SELECT 1 FROM post_views WHERE user_id = ?1 AND post_id = ?2)",
        params![user_id, post_id],
    )?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::categories::{categories_for_post, create_category};
    use crate::db::comments::add_comment;
    use crate::db::testing::{active_user, migrated_pool};

    fn new_post(author: i64, title: &str, content: &str) -> NewPost {
        NewPost {
            author_id: author,
            title: title.into(),
            content: content.into(),
            image: "post_image/x.png".into(),
            category_ids: vec![],
        }
    }

    fn titles(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn create_and_fetch_post() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        let id = create_post(&pool, &new_post(alice, "Hello World", "first post")).unwrap();

        let post = get_post(&pool, id).unwrap().unwrap();
        assert_eq!(post.title, "Hello World");
        assert_eq!(post.author, "alice");
        assert_eq!(post.comment_count, 0);
        assert_eq!(post.view_count, 0);
        assert!(get_post(&pool, id + 1).unwrap().is_none());
    }

    #[test]
    fn listing_is_newest_first_and_paged() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        for i in 1..=5 {
            create_post(&pool, &new_post(alice, &format!("post {i}"), "c")).unwrap();
        }

        assert_eq!(count_posts(&pool).unwrap(), 5);
        let first = list_posts(&pool, 4, 0).unwrap();
        assert_eq!(titles(&first), vec!["post 5", "post 4", "post 3", "post 2"]);
        let second = list_posts(&pool, 4, 4).unwrap();
        assert_eq!(titles(&second), vec!["post 1"]);
        assert_eq!(titles(&most_recent(&pool, 3).unwrap()), vec!["post 5", "post 4", "post 3"]);
    }

    #[test]
    fn search_matches_title_or_content() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        create_post(&pool, &new_post(alice, "Hello World", "first post")).unwrap();
        create_post(&pool, &new_post(alice, "Cooking", "say HELLO to pasta")).unwrap();
        create_post(&pool, &new_post(alice, "Other", "nothing here")).unwrap();

        let hits = search_posts(&pool, Some("hello")).unwrap();
        assert_eq!(titles(&hits), vec!["Cooking", "Hello World"]);
        assert!(search_posts(&pool, Some("zzz")).unwrap().is_empty());
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        create_post(&pool, &new_post(alice, "Über Rust", "c")).unwrap();
        create_post(&pool, &new_post(alice, "Notes", "ÉCOLE et café")).unwrap();

        assert_eq!(titles(&search_posts(&pool, Some("über")).unwrap()), vec!["Über Rust"]);
        assert_eq!(titles(&search_posts(&pool, Some("école")).unwrap()), vec!["Notes"]);
        assert_eq!(titles(&search_posts(&pool, Some("CAFÉ")).unwrap()), vec!["Notes"]);
    }

    #[test]
    fn blank_search_returns_everything_in_order() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        create_post(&pool, &new_post(alice, "a", "c")).unwrap();
        create_post(&pool, &new_post(alice, "b", "c")).unwrap();

        assert_eq!(titles(&search_posts(&pool, None).unwrap()), vec!["b", "a"]);
        assert_eq!(titles(&search_posts(&pool, Some("")).unwrap()), vec!["b", "a"]);
    }

    #[test]
    fn search_treats_wildcards_literally() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        create_post(&pool, &new_post(alice, "50% off", "sale")).unwrap();
        create_post(&pool, &new_post(alice, "500 off", "sale")).unwrap();

        assert_eq!(titles(&search_posts(&pool, Some("0%")).unwrap()), vec!["50% off"]);
        assert_eq!(titles(&search_posts(&pool, Some("5_0")).unwrap()).len(), 0);
    }

    #[test]
    fn update_keeps_image_unless_replaced() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        let rust = create_category(&pool, "Rust").unwrap();
        let id = create_post(&pool, &new_post(alice, "old", "old")).unwrap();

        update_post(
            &pool,
            id,
            &PostChanges {
                title: "new".into(),
                content: "body".into(),
                image: None,
                category_ids: vec![rust],
            },
        )
        .unwrap();
        let post = get_post(&pool, id).unwrap().unwrap();
        assert_eq!(post.title, "new");
        assert_eq!(post.image, "post_image/x.png");
        assert_eq!(categories_for_post(&pool, id).unwrap().len(), 1);

        update_post(
            &pool,
            id,
            &PostChanges {
                title: "new".into(),
                content: "body".into(),
                image: Some("post_image/y.png".into()),
                category_ids: vec![],
            },
        )
        .unwrap();
        let post = get_post(&pool, id).unwrap().unwrap();
        assert_eq!(post.image, "post_image/y.png");
        assert!(categories_for_post(&pool, id).unwrap().is_empty());
    }

    #[test]
    fn unknown_categories_are_skipped() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        let mut post = new_post(alice, "t", "c");
        post.category_ids = vec![999];
        let id = create_post(&pool, &post).unwrap();
        assert!(categories_for_post(&pool, id).unwrap().is_empty());
    }

    #[test]
    fn views_are_recorded_once_per_user() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        let bob = active_user(&pool, "bob");
        let id = create_post(&pool, &new_post(alice, "t", "c")).unwrap();

        assert!(record_view(&pool, bob, id).unwrap());
        assert!(!record_view(&pool, bob, id).unwrap());
        assert!(record_view(&pool, alice, id).unwrap());
        assert_eq!(get_post(&pool, id).unwrap().unwrap().view_count, 2);
    }

    #[test]
    fn delete_cascades() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        let id = create_post(&pool, &new_post(alice, "t", "c")).unwrap();
        add_comment(&pool, alice, id, "hi").unwrap();

        assert!(delete_post(&pool, id).unwrap());
        assert!(!delete_post(&pool, id).unwrap());

        let conn = pool.get().unwrap();
        let comments: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(comments, 0);
    }

    #[test]
    fn posts_by_author_filters() {
        let pool = migrated_pool();
        let alice = active_user(&pool, "alice");
        let bob = active_user(&pool, "bob");
        create_post(&pool, &new_post(alice, "mine", "c")).unwrap();
        create_post(&pool, &new_post(bob, "theirs", "c")).unwrap();

        assert_eq!(titles(&posts_by_author(&pool, alice).unwrap()), vec!["mine"]);
    }
}
