use rusqlite::{params, OptionalExtension};

use crate::db::models::Comment;
use crate::error::AppResult;
use crate::state::DbPool;

pub fn add_comment(pool: &DbPool, user_id: i64, post_id: i64, content: &str) -> AppResult<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO comments (user_id, post_id, content) VALUES (?1, ?2, ?3)",
        params![user_id, post_id, content],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Comments on a post, newest first, with their like and dislike counts.
pub fn comments_for_post(pool: &DbPool, post_id: i64) -> AppResult<Vec<Comment>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.user_id, u.username, c.content, c.timestamp,
                (SELECT COUNT(*) FROM like_comments l WHERE l.comment_id = c.id),
                (SELECT COUNT(*) FROM dislike_comments d WHERE d.comment_id = c.id)
         FROM comments c
         JOIN users u ON u.id = c.user_id
         WHERE c.post_id = ?1
         ORDER BY c.timestamp DESC, c.id DESC",
    )?;
    let comments = stmt
        .query_map(params![post_id], |row| {
            Ok(Comment {
                id: row.get(0)?,
                post_id: row.get(1)?,
                user_id: row.get(2)?,
                username: row.get(3)?,
                content: row.get(4)?,
                timestamp: row.get(5)?,
                like_count: row.get(6)?,
                dislike_count: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// The post a comment belongs to.
pub fn comment_post_id(pool: &DbPool, comment_id: i64) -> AppResult<Option<i64>> {
    let conn = pool.get()?;
    let post_id = conn
        .query_row(
            "SELECT post_id FROM comments WHERE id = ?1",
            params![comment_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(post_id)
}

/// Returns false when the user already liked the comment.
pub fn like_comment(pool: &DbPool, user_id: i64, comment_id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "INSERT OR IGNORE INTO like_comments (user_id, comment_id) VALUES (?1, ?2)",
        params![user_id, comment_id],
    )?;
    Ok(rows > 0)
}

/// Returns false when the user already disliked the comment.
pub fn dislike_comment(pool: &DbPool, user_id: i64, comment_id: i64) -> AppResult<bool> {
    let conn = pool.get()?;
    let rows = conn.execute(
        "INSERT OR IGNORE INTO dislike_comments (user_id, comment_id) VALUES (?1, ?2)",
        params![user_id, comment_id],
    )?;
    Ok(rows > 0)
}
