use crate::error::{AppError, NOT_FOUND_MESSAGE};

/// Answer every route that matched nothing.
pub async fn not_found() -> AppError {
    AppError::NotFound(NOT_FOUND_MESSAGE.to_string())
}
