use hyper::{Body, Method, Request};

use super::api::PostMessage;
use super::models::ChatMessage;
use crate::error::{AppError, ValidationFailed};
use crate::interface::{created_response, missing, ok_response, parse_body, Response};
use crate::AppState;

async fn post(req: Request<Body>, event_id: i32, state: &AppState) -> Result<ChatMessage, AppError> {
    let PostMessage { user_id, message } = parse_body(req).await?;
    let user_id = user_id.ok_or(ValidationFailed("user_id is required."))?;
    let message = message.ok_or(ValidationFailed("Message is empty."))?;

    let mut conn = state.pool.get().await?;
    let mut trans = conn.transaction().await?;
    let message = ChatMessage::post(&mut trans, event_id, user_id, &message).await?;
    trans.commit().await?;
    log::debug!("User {} posted message {} to event {}", user_id, message.message_id, event_id);
    Ok(message)
}

async fn list(event_id: i32, state: &AppState) -> Result<Vec<ChatMessage>, AppError> {
    let mut conn = state.pool.get().await?;
    ChatMessage::by_event(&mut *conn, event_id).await.map_err(Into::into)
}

pub async fn router(req: Request<Body>, path: &str, state: &AppState) -> Result<Response, AppError> {
    let event_id = match path.strip_prefix('/') {
        Some(id) if !id.is_empty() => id,
        _ => return missing(req.method(), false),
    };
    let event_id: i32 = event_id
        .parse()
        .map_err(|_| ValidationFailed("The event id must be an integer."))?;

    match req.method().clone() {
        Method::POST => post(req, event_id, state).await.and_then(created_response),
        Method::GET => list(event_id, state).await.and_then(ok_response),
        method => missing(&method, true),
    }
}
