use anyhow::Context;
use axum::http::HeaderMap;
use rand::{Rng, distributions::Alphanumeric};

use crate::error::ApiResult;

/// Header carrying the opaque session token.
pub const AUTH_HEADER: &str = "x-authorization";

const TOKEN_LEN: usize = 32;

pub fn hash_password(password: &str) -> ApiResult<String> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST).context("hashing password")?)
}

pub fn verify_password(password: &str, hashed: &str) -> bool {
    bcrypt::verify(password, hashed).unwrap_or(false)
}

pub fn generate_token() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(TOKEN_LEN).map(char::from).collect()
}

pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTH_HEADER).and_then(|v| v.to_str().ok())
}
