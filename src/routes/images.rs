use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    AppState, auth,
    error::{ApiError, ApiResult},
    images::ImageType,
    policy,
};

fn image_type_from_headers(headers: &HeaderMap) -> Option<ImageType> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(ImageType::from_content_type)
}

fn image_response(filename: &str, bytes: Vec<u8>) -> Response {
    let content_type = ImageType::from_filename(filename)
        .map(ImageType::content_type)
        .unwrap_or("application/octet-stream");
    ([(header::CONTENT_TYPE, content_type)], bytes).into_response()
}

async fn serve_image(state: &AppState, filename: Option<&str>) -> ApiResult<Response> {
    let filename = filename.ok_or(ApiError::NotFound("no image"))?;
    let bytes = state
        .images
        .read(filename)
        .await?
        .ok_or(ApiError::NotFound("no image"))?;
    Ok(image_response(filename, bytes))
}

/// Best-effort removal of a blob that is no longer referenced; the record is
/// already consistent, so a failure only gets logged.
async fn discard_blob(state: &AppState, filename: &str) {
    if let Err(err) = state.images.delete(filename).await {
        tracing::warn!(filename = %filename, error = %err, "failed to delete replaced image");
    }
}

pub async fn get_user_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Response> {
    let user = state
        .store
        .user_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("no user with id"))?;
    serve_image(&state, user.image_filename.as_deref()).await
}

pub async fn set_user_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    let subject = state.store.user_by_id(id).await?;
    policy::modify_profile_image(actor.as_ref(), subject.as_ref())?;
    let subject = subject.ok_or(ApiError::NotFound("no user with id"))?;

    let image_type = image_type_from_headers(&headers)
        .ok_or_else(|| ApiError::validation("image must be png, jpeg or gif"))?;

    let filename = state.images.write(image_type, &body).await?;
    state.store.set_user_image(id, Some(&filename)).await?;

    match subject.image_filename.as_deref() {
        Some(old) => {
            discard_blob(&state, old).await;
            Ok(StatusCode::OK)
        },
        None => Ok(StatusCode::CREATED),
    }
}

pub async fn delete_user_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    let subject = state.store.user_by_id(id).await?;
    policy::modify_profile_image(actor.as_ref(), subject.as_ref())?;
    let subject = subject.ok_or(ApiError::NotFound("no user with id"))?;

    let filename = subject.image_filename.ok_or(ApiError::NotFound("user has no image"))?;
    state.store.set_user_image(id, None).await?;
    discard_blob(&state, &filename).await;
    Ok(StatusCode::OK)
}

pub async fn get_film_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Response> {
    let film = state
        .store
        .film_by_id(id)
        .await?
        .ok_or(ApiError::NotFound("no film with id"))?;
    serve_image(&state, film.image_filename.as_deref()).await
}

pub async fn set_film_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    let film = state.store.film_by_id(id).await?;
    let has_reviews = state.store.film_has_reviews(id).await?;
    let image_type = policy::set_film_image(
        actor.as_ref(),
        film.as_ref(),
        has_reviews,
        image_type_from_headers(&headers),
    )?;
    let film = film.ok_or(ApiError::NotFound("no film with id"))?;

    let filename = state.images.write(image_type, &body).await?;
    state.store.set_film_image(id, Some(&filename)).await?;

    match film.image_filename.as_deref() {
        Some(old) => {
            discard_blob(&state, old).await;
            Ok(StatusCode::OK)
        },
        None => Ok(StatusCode::CREATED),
    }
}
