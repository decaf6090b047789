use hyper::{Body, Method, Request};

use super::api::Register;
use super::models::User;
use crate::error::AppError;
use crate::interface::{created_response, missing, ok_response, parse_body, parse_query, IdQuery, Response};
use crate::AppState;

async fn register(req: Request<Body>, state: &AppState) -> Result<User, AppError> {
    let Register { username } = parse_body(req).await?;
    let mut conn = state.pool.get().await?;
    let user = User::create(&mut *conn, &username).await?;
    log::info!("{} ({}) was registered.", user.username, user.user_id);
    Ok(user)
}

async fn query_user(req: Request<Body>, state: &AppState) -> Result<User, AppError> {
    let IdQuery { id } = parse_query(req.uri())?;
    let mut conn = state.pool.get().await?;
    User::get_by_id(&mut *conn, id).await?.ok_or(AppError::NotFound("user"))
}

pub async fn router(req: Request<Body>, path: &str, state: &AppState) -> Result<Response, AppError> {
    match (path, req.method().clone()) {
        ("" | "/", Method::POST) => register(req, state).await.and_then(created_response),
        ("/query", Method::GET) => query_user(req, state).await.and_then(ok_response),
        (path, method) => missing(&method, ["", "/", "/query"].contains(&path)),
    }
}
