use crate::error::{AppError, AppResult};

/// bcrypt runs on the blocking pool so a login does not stall the runtime.
pub async fn hash(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("password hashing task: {e}")))?
        .map_err(AppError::from)
}

pub async fn verify(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("password check task: {e}")))?
        .map_err(AppError::from)
}
