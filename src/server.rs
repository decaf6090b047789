#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper::server::conn::AddrStream;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Server};

#[macro_use]
mod utils;
#[macro_use]
mod error;
mod chats;
mod context;
mod cors;
mod database;
mod date_format;
mod events;
mod geocoding;
mod interface;
mod logger;
mod media;
mod pool;
mod storage;
mod users;
mod validators;

use crate::database::DbPool;
use crate::error::AppError;
use crate::geocoding::Geocoder;
use crate::interface::Response;
use crate::media::ObjectResolver;

/// Everything a handler needs, built once from the configuration.
pub struct AppState {
    pub pool: DbPool,
    pub geocoder: Arc<dyn Geocoder>,
    pub resolver: ObjectResolver,
}

async fn router(req: Request<Body>, state: &AppState) -> Result<Response, AppError> {
    let path = req.uri().path().to_string();

    if let Some(rest) = path.strip_prefix("/api/users") {
        return users::router(req, rest, state).await;
    }
    if let Some(rest) = path.strip_prefix("/api/events") {
        return events::router(req, rest, state).await;
    }
    if let Some(rest) = path.strip_prefix("/api/chats") {
        return chats::router(req, rest, state).await;
    }
    if let Some(rest) = path.strip_prefix("/api/media") {
        return media::router(req, rest, state).await;
    }
    Err(AppError::NotFound("API"))
}

fn log_error(e: &AppError) {
    match e {
        AppError::Database(e) => log::error!("Database error: {}", e),
        AppError::Storage(e) => log::warn!("Object storage error: {}", e),
        AppError::Geocode(e) => log::warn!("Geocoding error: {}", e),
        e => log::debug!("{}", e),
    }
}

async fn handler(req: Request<Body>, state: Arc<AppState>) -> Result<Response, hyper::Error> {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    if context::debug() && method == Method::OPTIONS {
        return Ok(cors::preflight_requests(&req));
    }
    let mut response = router(req, &state).await.unwrap_or_else(|e| {
        log_error(&e);
        interface::error_response(&e)
    });
    if context::debug() {
        response = cors::allow_origin(response);
    }
    log::info!(
        "{} {} {} {}ms",
        method,
        uri,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    Ok(response)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for the shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    let config = context::Config::from_env()?;
    logger::setup_logger(context::debug(), config.log_file.as_deref())?;

    let pool = database::pool(&config.database).await?;
    pool.get().await?.init_schema().await?;

    let http = reqwest::Client::builder().timeout(config.geocoder.timeout).build()?;
    let store = storage::S3::new(&config.storage, http)?;
    let geocoder = geocoding::Nominatim::new(&config.geocoder)?;
    let state = Arc::new(AppState {
        pool,
        geocoder: Arc::new(geocoder),
        resolver: ObjectResolver::new(Arc::new(store), config.storage.presign_ttl),
    });

    let addr = SocketAddr::from((config.host, config.port));
    let make_svc = make_service_fn(move |_: &AddrStream| {
        let state = state.clone();
        async move { Ok::<_, hyper::Error>(service_fn(move |req| handler(req, state.clone()))) }
    });

    log::info!("Listening on http://{}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
