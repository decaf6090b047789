//! Request parsing and the JSON envelope every endpoint answers with.
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub type Response = hyper::Response<Body>;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Return<T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    value: T,
}

impl<T: Serialize> Return<T> {
    pub fn new(value: T) -> Return<T> {
        Return {
            kind: "return",
            status_code: 200,
            code: None,
            value,
        }
    }

    pub fn status(self, s: StatusCode) -> Return<T> {
        let status_code = s.as_u16();
        Return { status_code, ..self }
    }

    pub fn build(&self) -> Result<Response, AppError> {
        let bytes = serde_json::to_vec(self).map_err(unexpected!())?;
        let mut response = hyper::Response::new(Body::from(bytes));
        *response.status_mut() = StatusCode::from_u16(self.status_code).map_err(unexpected!())?;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(response)
    }
}

impl Return<String> {
    pub fn form_error(e: &AppError) -> Return<String> {
        Return {
            kind: "error",
            status_code: e.status_code().as_u16(),
            code: Some(e.error_code()),
            value: e.to_string(),
        }
    }
}

pub fn ok_response<T: Serialize>(value: T) -> Result<Response, AppError> {
    Return::new(value).build()
}

pub fn created_response<T: Serialize>(value: T) -> Result<Response, AppError> {
    Return::new(value).status(StatusCode::CREATED).build()
}

pub fn error_response(e: &AppError) -> Response {
    Return::form_error(e).build().unwrap_or_else(|_| {
        let mut response = hyper::Response::new(Body::empty());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// The fallback arm of every router: a known path with the wrong method is 405.
pub fn missing(method: &Method, known: bool) -> Result<Response, AppError> {
    if known {
        log::debug!("Method {} is not allowed here", method);
        Err(AppError::MethodNotAllowed)
    } else {
        Err(AppError::NotFound("API"))
    }
}

pub fn parse_query<T>(uri: &hyper::http::Uri) -> Result<T, AppError>
where
    for<'de> T: Deserialize<'de>,
{
    let query = uri.query().unwrap_or("");
    serde_urlencoded::from_str(query).map_err(|e| {
        log::debug!("Failed to parse the query in the URI ({}): {}", uri, e);
        AppError::ValidationFail(format!("Malformed query string: {}", e))
    })
}

pub async fn parse_body<T>(req: Request<Body>) -> Result<T, AppError>
where
    for<'de> T: Deserialize<'de>,
{
    let body = hyper::body::to_bytes(req.into_body()).await.map_err(unexpected!())?;
    serde_json::from_slice(&*body).map_err(|e| {
        log::debug!("Failed to parse the request body: {}", e);
        AppError::ValidationFail(format!("Malformed request body: {}", e))
    })
}

#[derive(Deserialize, Debug, Eq, PartialEq)]
pub struct IdQuery {
    pub id: i32,
}

#[test]
fn test_envelope() {
    let value = serde_json::to_value(Return::new(vec![1, 2]).status(StatusCode::CREATED)).unwrap();
    assert_eq!(
        value,
        serde_json::json!({ "type": "return", "statusCode": 201, "value": [1, 2] })
    );

    let e = AppError::InvalidEvent(3);
    let value = serde_json::to_value(Return::form_error(&e)).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "type": "error",
            "statusCode": 404,
            "code": "INVALID_EVENT",
            "value": "The event 3 does not exist",
        })
    );
    assert_eq!(error_response(&e).status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_parse_query() {
    let uri: hyper::Uri = "/api/users/query?id=42".parse().unwrap();
    assert_eq!(parse_query::<IdQuery>(&uri).unwrap(), IdQuery { id: 42 });

    let uri: hyper::Uri = "/api/users/query?id=abc".parse().unwrap();
    let e = parse_query::<IdQuery>(&uri).unwrap_err();
    assert_eq!(e.error_code(), "VALIDATION_FAIL");

    let uri: hyper::Uri = "/api/users/query".parse().unwrap();
    assert!(parse_query::<IdQuery>(&uri).is_err());
}
