use rusqlite::params;

use crate::db::models::{Category, CategoryCount};
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

pub const MAX_TITLE_CHARS: usize = 20;

pub fn create_category(pool: &DbPool, title: &str) -> AppResult<i64> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::BadRequest(format!(
            "Category title must be 1-{MAX_TITLE_CHARS} characters"
        )));
    }

    let conn = pool.get()?;
    conn.execute("INSERT INTO categories (title) VALUES (?1)", params![title])?;
    Ok(conn.last_insert_rowid())
}

pub fn list_categories(pool: &DbPool) -> AppResult<Vec<Category>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT id, title FROM categories ORDER BY title, id")?;
    let categories = stmt
        .query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

pub fn categories_for_post(pool: &DbPool, post_id: i64) -> AppResult<Vec<Category>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT c.id, c.title FROM categories c
         JOIN post_categories pc ON pc.category_id = c.id
         WHERE pc.post_id = ?1
         ORDER BY c.title, c.id",
    )?;
    let categories = stmt
        .query_map(params![post_id], |row| {
            Ok(Category {
                id: row.get(0)?,
                title: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Number of posts per category title, busiest first. Categories with no
/// posts are left out; categories sharing a title are counted together.
pub fn category_count(pool: &DbPool) -> AppResult<Vec<CategoryCount>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT c.title, COUNT(pc.post_id) AS n FROM categories c
         JOIN post_categories pc ON pc.category_id = c.id
         GROUP BY c.title
         ORDER BY n DESC, c.title ASC",
    )?;
    let counts = stmt
        .query_map([], |row| {
            Ok(CategoryCount {
                title: row.get(0)?,
                count: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts)
}
