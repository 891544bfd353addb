use std::convert::Infallible;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use warp::{
    filters::body::BodyDeserializeError,
    http::{header, StatusCode},
    reject::{
        InvalidQuery, LengthRequired, MethodNotAllowed, PayloadTooLarge, UnsupportedMediaType,
    },
    reply::Response,
    Filter, Rejection, Reply,
};

use crate::{constants::MAX_BODY_SIZE, error::Error};

pub fn reject(e: Error) -> Rejection {
    warp::reject::custom(e)
}

pub fn json_body<T: DeserializeOwned + Send>(
) -> impl Filter<Extract = (T,), Error = Rejection> + Clone {
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

pub fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(value), status).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn attachment(file_name: &str, content: String) -> Response {
    let reply = warp::reply::with_header(
        content,
        header::CONTENT_TYPE,
        "text/plain; charset=utf-8",
    );
    warp::reply::with_header(
        reply,
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{file_name}\""),
    )
    .into_response()
}

fn message(message: impl Into<String>, status: StatusCode) -> Response {
    json_reply(&json!({ "errors": message.into() }), status)
}

pub fn error_response(e: &Error) -> Response {
    match e {
        Error::Validation { field, message } => {
            let mut body = Map::new();
            body.insert(field.to_owned(), json!([message]));
            json_reply(&Value::Object(body), e.status())
        }
        Error::Internal(details) => {
            log::error!("> {details}");
            self::message("Internal server error", e.status())
        }
        e => self::message(e.to_string(), e.status()),
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<Error>() {
        return Ok(error_response(e));
    }
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return Ok(message(e.to_string(), StatusCode::BAD_REQUEST));
    }
    if err.find::<InvalidQuery>().is_some() {
        return Ok(message("Invalid query string", StatusCode::BAD_REQUEST));
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return Ok(message("Payload too large", StatusCode::PAYLOAD_TOO_LARGE));
    }
    if err.find::<LengthRequired>().is_some() {
        return Ok(message("Content-Length required", StatusCode::LENGTH_REQUIRED));
    }
    if err.find::<UnsupportedMediaType>().is_some() {
        return Ok(message(
            "Expected an application/json body",
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ));
    }
    if err.is_not_found() {
        return Ok(message("Not found", StatusCode::NOT_FOUND));
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return Ok(message("Method not allowed", StatusCode::METHOD_NOT_ALLOWED));
    }

    log::error!("> Unhandled rejection: {err:?}");
    Ok(message(
        "Internal server error",
        StatusCode::INTERNAL_SERVER_ERROR,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = warp::hyper::body::to_bytes(response.into_body())
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_body_is_keyed_by_field() {
        let (status, value) = body(error_response(&Error::validation(
            "cooking_time",
            "Too short",
        )))
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(value, json!({ "cooking_time": ["Too short"] }));
    }

    #[tokio::test]
    async fn test_other_errors_use_errors_key() {
        let (status, value) = body(error_response(&Error::conflict("Already there"))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(value, json!({ "errors": "Already there" }));

        let (status, value) = body(error_response(&Error::internal("db exploded"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(value, json!({ "errors": "Internal server error" }));
    }
}
