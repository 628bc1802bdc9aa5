use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::{Value, json};

use crate::{
    AppState, auth,
    error::{ApiError, ApiResult},
    models::{LoginBody, RegisterBody, UpdateUserBody, UserView},
    policy,
    store::UserPatch,
};

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    super::validate_email(&body.email)?;
    super::require_non_empty("firstName", &body.first_name)?;
    super::require_non_empty("lastName", &body.last_name)?;
    super::validate_password(&body.password)?;

    let hash = auth::hash_password(&body.password)?;
    let user_id = state
        .store
        .insert_user(&body.email, &body.first_name, &body.last_name, &hash)
        .await
        .map_err(|err| match err {
            ApiError::Conflict(_) => ApiError::Conflict("email already in use"),
            err => err,
        })?;

    tracing::info!(user_id, "registered user");
    Ok((StatusCode::CREATED, Json(json!({ "userId": user_id }))))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<Value>> {
    super::validate_email(&body.email)?;

    let user = state
        .store
        .user_by_email(&body.email)
        .await?
        .ok_or(ApiError::Unauthenticated)?;
    if !auth::verify_password(&body.password, &user.password) {
        return Err(ApiError::Unauthenticated);
    }

    let token = auth::generate_token();
    state.store.set_auth_token(user.id, &token).await?;
    Ok(Json(json!({ "userId": user.id, "token": token })))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let token = auth::token_from_headers(&headers).ok_or(ApiError::Unauthenticated)?;
    if !state.store.clear_auth_token(token).await? {
        return Err(ApiError::Unauthenticated);
    }
    Ok(StatusCode::OK)
}

pub async fn view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> ApiResult<Json<UserView>> {
    let user = state
        .store
        .user_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("no user with id"))?;
    Ok(Json(policy::profile_view(&user, auth::token_from_headers(&headers))))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(body): Json<UpdateUserBody>,
) -> ApiResult<StatusCode> {
    if let Some(email) = &body.email {
        super::validate_email(email)?;
    }
    if let Some(first_name) = &body.first_name {
        super::require_non_empty("firstName", first_name)?;
    }
    if let Some(last_name) = &body.last_name {
        super::require_non_empty("lastName", last_name)?;
    }
    if let Some(password) = &body.password {
        super::validate_password(password)?;
    }

    let subject = state.store.user_by_id(id).await?;
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    policy::edit_profile(subject.as_ref(), actor.as_ref())?;
    let subject = subject.ok_or(ApiError::NotFound("no user with id"))?;

    let password_hash = match &body.password {
        Some(new_password) => {
            policy::change_password(
                body.current_password.as_deref(),
                new_password,
                &subject.password,
            )?;
            Some(auth::hash_password(new_password)?)
        },
        None => None,
    };

    state
        .store
        .update_user(id, UserPatch {
            email: body.email,
            first_name: body.first_name,
            last_name: body.last_name,
            password: password_hash,
        })
        .await
        .map_err(|err| match err {
            ApiError::Conflict(_) => ApiError::Conflict("email already in use"),
            err => err,
        })?;

    Ok(StatusCode::OK)
}
