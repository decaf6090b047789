use hyper::{Body, Method, Request};

use super::api::{FileKey, PresignUpload, PresignedGet, UploadTicket};
use crate::error::AppError;
use crate::interface::{missing, ok_response, parse_body, Response};
use crate::AppState;

async fn presigned_url(req: Request<Body>, state: &AppState) -> Result<UploadTicket, AppError> {
    let PresignUpload { file_type, file_name } = parse_body(req).await?;
    state
        .resolver
        .issue_upload_ticket(&file_type, file_name.as_deref())
        .await
}

async fn presigned_get_url(req: Request<Body>, state: &AppState) -> Result<PresignedGet, AppError> {
    let FileKey { file_key } = parse_body(req).await?;
    let get_url = state.resolver.to_presigned_get_url(&file_key).await?;
    Ok(PresignedGet { get_url })
}

async fn delete(req: Request<Body>, state: &AppState) -> Result<bool, AppError> {
    let FileKey { file_key } = parse_body(req).await?;
    state.resolver.delete(&file_key).await?;
    log::info!("{} was deleted from object storage", file_key);
    Ok(true)
}

pub async fn router(req: Request<Body>, path: &str, state: &AppState) -> Result<Response, AppError> {
    match (path, req.method().clone()) {
        ("/presigned-url", Method::POST) => presigned_url(req, state).await.and_then(ok_response),
        ("/presigned-get-url", Method::POST) => presigned_get_url(req, state).await.and_then(ok_response),
        ("/delete", Method::DELETE) => delete(req, state).await.and_then(ok_response),
        (path, method) => missing(&method, ["/presigned-url", "/presigned-get-url", "/delete"].contains(&path)),
    }
}
