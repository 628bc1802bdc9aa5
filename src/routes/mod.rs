pub mod films;
pub mod images;
pub mod reviews;
pub mod users;

use crate::error::{ApiError, ApiResult};

pub(crate) fn require_non_empty(field: &'static str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> ApiResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    };
    if !valid {
        return Err(ApiError::validation("email must be a valid address"));
    }
    Ok(())
}

pub(crate) fn validate_password(password: &str) -> ApiResult<()> {
    if password.len() < 6 {
        return Err(ApiError::validation("password must be at least 6 characters"));
    }
    Ok(())
}

pub(crate) fn validate_age_rating(rating: &str) -> ApiResult<()> {
    if !crate::models::AGE_RATINGS.contains(&rating) {
        return Err(ApiError::validation(format!("invalid age rating {rating:?}")));
    }
    Ok(())
}

pub(crate) fn validate_runtime(runtime: i32) -> ApiResult<()> {
    if runtime <= 0 {
        return Err(ApiError::validation("runtime must be positive"));
    }
    Ok(())
}
