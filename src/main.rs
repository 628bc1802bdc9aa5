mod auth;
mod config;
mod db;
mod entities;
mod error;
mod images;
mod models;
mod policy;
mod query;
mod routes;
mod store;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, images::ImageStore, store::Store};

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub images: ImageStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,reelview=debug,sqlx=warn".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let db = db::connect_and_migrate(&config.database_url).await?;
    let store = Store::new(db);

    let images = ImageStore::new(&config.image_dir);
    images.ensure_root().await?;

    let state = Arc::new(AppState { store, images });

    let app = Router::new()
        .route("/api/v1/users/register", post(routes::users::register))
        .route("/api/v1/users/login", post(routes::users::login))
        .route("/api/v1/users/logout", post(routes::users::logout))
        .route("/api/v1/users/{id}", get(routes::users::view).patch(routes::users::update))
        .route(
            "/api/v1/users/{id}/image",
            get(routes::images::get_user_image)
                .put(routes::images::set_user_image)
                .delete(routes::images::delete_user_image),
        )
        .route("/api/v1/films", get(routes::films::search).post(routes::films::create))
        .route("/api/v1/films/genres", get(routes::films::genres))
        .route(
            "/api/v1/films/{id}",
            get(routes::films::detail)
                .patch(routes::films::update)
                .delete(routes::films::remove),
        )
        .route(
            "/api/v1/films/{id}/image",
            get(routes::images::get_film_image).put(routes::images::set_film_image),
        )
        .route(
            "/api/v1/films/{id}/reviews",
            get(routes::reviews::list).post(routes::reviews::create),
        )
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
