use rusqlite::{params, OptionalExtension, Row};

use crate::db::like_pattern;
use crate::db::models::{Profile, User, UserSummary};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, date_joined";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        date_joined: row.get(5)?,
    })
}

/// Insert an inactive user together with an empty profile.
/// Maps the UNIQUE violation on `users.username` to `AppError::UsernameTaken`.
fn username_conflict(e: rusqlite::Error) -> AppError {
    let duplicate = matches!(
        &e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("users.username")
    );
    if duplicate {
        AppError::UsernameTaken
    } else {
        AppError::Database(e)
    }
}

pub fn create_user(
    pool: &DbPool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> AppResult<i64> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO users (username, email, password_hash, is_active) VALUES (?1, ?2, ?3, 0)",
        params![username, email, password_hash],
    )
    .map_err(username_conflict)?;
    let id = tx.last_insert_rowid();
    tx.execute("INSERT INTO profiles (user_id) VALUES (?1)", params![id])?;
    tx.commit()?;
    Ok(id)
}

pub fn get_user(pool: &DbPool, id: i64) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn find_by_username(pool: &DbPool, username: &str) -> AppResult<Option<User>> {
    let conn = pool.get()?;
    let user = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Whether `username` belongs to anyone other than `except`.
pub fn username_taken(pool: &DbPool, username: &str, except: Option<i64>) -> AppResult<bool> {
    let conn = pool.get()?;
    let taken = conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 AND id != ?2",
        params![username, except.unwrap_or(-1)],
        |row| row.get(0),
    )?;
    Ok(taken)
}

pub fn activate(pool: &DbPool, id: i64) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("UPDATE users SET is_active = 1 WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn update_account(pool: &DbPool, id: i64, username: &str, email: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE users SET username = ?1, email = ?2 WHERE id = ?3",
        params![username, email, id],
    )
    .map_err(username_conflict)?;
    Ok(())
}

pub fn get_profile(pool: &DbPool, user_id: i64) -> AppResult<Profile> {
    let conn = pool.get()?;
    let image = conn
        .query_row(
            "SELECT image FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()?
        .flatten();
    Ok(Profile { user_id, image })
}

/// Upsert so users created before profiles existed still get one.
pub fn set_profile_image(pool: &DbPool, user_id: i64, image: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO profiles (user_id, image) VALUES (?1, ?2)
         ON CONFLICT(user_id) DO UPDATE SET image = excluded.image",
        params![user_id, image],
    )?;
    Ok(())
}

/// Users whose username contains `query`, case-insensitively.
pub fn search_users(pool: &DbPool, query: &str) -> AppResult<Vec<UserSummary>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT DISTINCT u.id, u.username, p.image FROM users u
         LEFT JOIN profiles p ON p.user_id = u.id
         WHERE casefold(u.username) LIKE casefold(?1) ESCAPE '\\'
         ORDER BY u.username",
    )?;
    let users = stmt
        .query_map(params![like_pattern(query)], |row| {
            Ok(UserSummary {
                id: row.get(0)?,
                username: row.get(1)?,
                image: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}
