use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::Query;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, auth,
    error::{ApiError, ApiResult},
    models::{
        CreateFilmBody, DEFAULT_AGE_RATING, FilmDetail, FilmPage, GenreDto, UpdateFilmBody,
        now_sec, parse_datetime,
    },
    policy,
    query::{FilmQuery, FilmSearch, Page, paginate},
    store::{FilmPatch, NewFilm},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmSearchParams {
    start: Option<String>,
    count: Option<String>,
    q: Option<String>,
    #[serde(default)]
    genre_ids: Vec<i32>,
    #[serde(default)]
    age_ratings: Vec<String>,
    director_id: Option<i32>,
    reviewer_id: Option<i32>,
    sort_by: Option<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilmSearchParams>,
) -> ApiResult<Json<FilmPage>> {
    let known_genres = state.store.genre_ids().await?;
    let query = FilmQuery::build(
        FilmSearch {
            q: params.q,
            genre_ids: params.genre_ids,
            age_ratings: params.age_ratings,
            director_id: params.director_id,
            reviewer_id: params.reviewer_id,
            sort_by: params.sort_by,
        },
        &known_genres,
    )?;

    let films = state.store.search_films(&query).await?;
    let page = Page::from_raw(params.start.as_deref(), params.count.as_deref());
    let (films, count) = paginate(films, page);
    Ok(Json(FilmPage { films, count }))
}

pub async fn detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> ApiResult<Json<FilmDetail>> {
    let film = state
        .store
        .film_detail(id)
        .await?
        .ok_or(ApiError::NotFound("no film with id"))?;
    Ok(Json(film))
}

pub async fn genres(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<GenreDto>>> {
    Ok(Json(state.store.genres().await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateFilmBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    super::require_non_empty("title", &body.title)?;
    super::require_non_empty("description", &body.description)?;
    if let Some(runtime) = body.runtime {
        super::validate_runtime(runtime)?;
    }
    let age_rating = body.age_rating.unwrap_or_else(|| DEFAULT_AGE_RATING.to_string());
    super::validate_age_rating(&age_rating)?;

    let now = now_sec();
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    policy::create_film(actor.as_ref())?;
    let actor = actor.ok_or(ApiError::Unauthenticated)?;

    if !state.store.genre_exists(body.genre_id).await? {
        return Err(ApiError::validation(format!("no genre with id {}", body.genre_id)));
    }
    if state.store.title_in_use(&body.title, None).await? {
        return Err(ApiError::Forbidden("film title is not unique"));
    }
    let release_date = policy::resolve_release_date(body.release_date.as_deref(), now)?;

    let film_id = state
        .store
        .insert_film(NewFilm {
            title: body.title,
            description: body.description,
            release_date,
            genre_id: body.genre_id,
            runtime: body.runtime,
            age_rating,
            director_id: actor.id,
        })
        .await
        .map_err(|err| match err {
            ApiError::Conflict(_) => ApiError::Conflict("film title is not unique"),
            err => err,
        })?;

    tracing::info!(film_id, director_id = actor.id, "created film");
    Ok((StatusCode::CREATED, Json(json!({ "filmId": film_id }))))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
    Json(body): Json<UpdateFilmBody>,
) -> ApiResult<StatusCode> {
    if let Some(title) = &body.title {
        super::require_non_empty("title", title)?;
    }
    if let Some(description) = &body.description {
        super::require_non_empty("description", description)?;
    }
    if let Some(runtime) = body.runtime {
        super::validate_runtime(runtime)?;
    }
    if let Some(age_rating) = &body.age_rating {
        super::validate_age_rating(age_rating)?;
    }

    let now = now_sec();
    let film = state.store.film_by_id(id).await?;
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    let has_reviews = state.store.film_has_reviews(id).await?;
    policy::edit_film(film.as_ref(), actor.as_ref(), has_reviews)?;
    let film = film.ok_or(ApiError::NotFound("no film with id"))?;

    if let Some(genre_id) = body.genre_id {
        if !state.store.genre_exists(genre_id).await? {
            return Err(ApiError::Forbidden("genre does not exist"));
        }
    }
    if let Some(title) = &body.title {
        if state.store.title_in_use(title, Some(id)).await? {
            return Err(ApiError::Forbidden("film title is not unique"));
        }
    }
    let release_date = match body.release_date.as_deref() {
        Some(raw) => {
            let new_date = parse_datetime(raw)
                .map_err(|_| ApiError::validation(format!("invalid datetime {raw:?}")))?;
            policy::check_release_date_change(new_date, film.release_date, now)?;
            Some(new_date)
        },
        None => None,
    };

    state
        .store
        .update_film(id, FilmPatch {
            title: body.title,
            description: body.description,
            release_date,
            genre_id: body.genre_id,
            runtime: body.runtime,
            age_rating: body.age_rating,
        })
        .await
        .map_err(|err| match err {
            ApiError::Conflict(_) => ApiError::Conflict("film title is not unique"),
            err => err,
        })?;

    Ok(StatusCode::OK)
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let film = state.store.film_by_id(id).await?;
    let actor = state.store.actor_from_token(auth::token_from_headers(&headers)).await?;
    policy::delete_film(film.as_ref(), actor.as_ref())?;
    let film = film.ok_or(ApiError::NotFound("no film with id"))?;

    state.store.delete_film(id).await?;

    // Blob cleanup happens only once the record is gone; a failure here is
    // reported in the logs without masking the successful deletion.
    if let Some(filename) = &film.image_filename {
        if let Err(err) = state.images.delete(filename).await {
            tracing::warn!(film_id = id, filename = %filename, error = %err, "failed to delete hero image");
        }
    }

    Ok(StatusCode::OK)
}
