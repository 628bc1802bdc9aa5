use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};

use crate::{
    AppState, auth,
    error::{ApiError, ApiResult},
    models::{PostReviewBody, ReviewDto, now_sec},
    policy,
};

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<Vec<ReviewDto>>> {
    if state.store.film_by_id(id).await?.is_none() {
        return Err(ApiError::NotFound("no film with id"));
    }
    Ok(Json(state.store.reviews_for_film(id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(body): Json<PostReviewBody>,
) -> ApiResult<StatusCode> {
    if !(1..=10).contains(&body.rating) {
        return Err(ApiError::validation("rating must be an integer from 1 to 10"));
    }

    let now = now_sec();
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    let film = state.store.film_by_id(id).await?;
    policy::post_review(actor.as_ref(), film.as_ref(), now)?;
    let actor = actor.ok_or(ApiError::Unauthenticated)?;

    state
        .store
        .insert_review(id, actor.id, body.rating, body.review, now)
        .await
        .map_err(|err| match err {
            ApiError::Conflict(_) => {
                ApiError::Conflict("cannot post more than one review on a film")
            },
            err => err,
        })?;

    Ok(StatusCode::CREATED)
}
