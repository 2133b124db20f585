//! Saved posts. The `(user_id, post_id)` unique index makes saving
//! idempotent even when two requests race.

use rusqlite::params;

use crate::db::models::Post;
use crate::db::posts::{post_from_row, POST_SELECT};
use crate::error::AppResult;
use crate::state::DbPool;

/// Returns true when a new bookmark was written.
pub fn save_post(pool: &DbPool, user_id: i64, post_id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "INSERT OR IGNORE INTO saved_posts (user_id, post_id) VALUES (?1, ?2)",
        params![user_id, post_id],
    )?;
    Ok(rows > 0)
}

/// Returns true when a bookmark existed and was removed.
pub fn unsave_post(pool: &DbPool, user_id: i64, post_id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "DELETE FROM saved_posts WHERE user_id = ?1 AND post_id = ?2",
        params![user_id, post_id],
    )?;
    Ok(rows > 0)
}

pub fn is_saved(pool: &DbPool, user_id: i64, post_id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let saved = conn.query_row(
        "SELECT COUNT(*) > 0 FROM saved_posts WHERE user_id = ?1 AND post_id = ?2",
        params![user_id, post_id],
        |row| row.get(0),
    )?;
    Ok(saved)
}

/// Posts the user bookmarked, most recently saved first.
pub fn saved_posts(pool: &DbPool, user_id: i64) -> AppResult<Vec<Post>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&format!(
        "{POST_SELECT}
         JOIN saved_posts s ON s.post_id = p.id
         WHERE s.user_id = ?1
         ORDER BY s.id DESC"
    ))?;
    let posts = stmt
        .query_map(params![user_id], post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}
