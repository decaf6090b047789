use hyper::{Body, Method, Request};

use super::api::{EventsQuery, NewEvent};
use super::models::Event;
use super::service;
use crate::error::AppError;
use crate::interface::{created_response, missing, ok_response, parse_body, parse_query, IdQuery, Response};
use crate::AppState;

async fn create(req: Request<Body>, state: &AppState) -> Result<Event, AppError> {
    let form: NewEvent = parse_body(req).await?;
    let (draft, at) = service::prepare_event(&*state.geocoder, form).await?;

    let mut conn = state.pool.get().await?;
    let mut trans = conn.transaction().await?;
    let event = Event::create(&mut trans, &draft, at).await?;
    trans.commit().await?;
    log::info!("The event {} ({}) was created.", event.event_id, event.name);
    Ok(event)
}

async fn list(req: Request<Body>, state: &AppState) -> Result<Vec<Event>, AppError> {
    let query: EventsQuery = parse_query(req.uri())?;
    let bounds = query.bounding_box()?;
    let mut conn = state.pool.get().await?;
    service::list_events(&mut *conn, &state.resolver, bounds).await
}

async fn query_event(req: Request<Body>, state: &AppState) -> Result<Event, AppError> {
    let IdQuery { id } = parse_query(req.uri())?;
    let mut conn = state.pool.get().await?;
    service::get_event(&mut *conn, &state.resolver, id).await
}

pub async fn router(req: Request<Body>, path: &str, state: &AppState) -> Result<Response, AppError> {
    match (path, req.method().clone()) {
        ("" | "/", Method::POST) => create(req, state).await.and_then(created_response),
        ("" | "/", Method::GET) => list(req, state).await.and_then(ok_response),
        ("/query", Method::GET) => query_event(req, state).await.and_then(ok_response),
        (path, method) => missing(&method, ["", "/", "/query"].contains(&path)),
    }
}
