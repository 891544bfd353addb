use std::{convert::Infallible, sync::Arc};

use warp::{reject::Rejection, Filter};

use super::jwt::SessionData;
use crate::{constants::AUTH_HEADER_PREFIX, error::Error, state::Context};

fn token_from_header(header: &str) -> Result<&str, Error> {
    header
        .strip_prefix(AUTH_HEADER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| Error::unauthorized("Invalid authorization header"))
}

pub fn with_context(
    context: Arc<Context>,
) -> impl Filter<Extract = (Arc<Context>,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}

/// Requires `Authorization: Token <token>` carrying a valid session.
pub fn with_session(
    context: Arc<Context>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_context(context))
        .and_then(|header: Option<String>, context: Arc<Context>| async move {
            let header = header.ok_or_else(|| {
                warp::reject::custom(Error::unauthorized(
                    "Authentication credentials were not provided",
                ))
            })?;

            token_from_header(&header)
                .and_then(|token| context.keys.verify_session(token))
                .map_err(warp::reject::custom)
        })
}

/// Anonymous callers and callers with an unusable token both yield `None`.
pub fn with_possible_session(
    context: Arc<Context>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_context(context))
        .map(|header: Option<String>, context: Arc<Context>| {
            header.and_then(|header| {
                token_from_header(&header)
                    .and_then(|token| context.keys.verify_session(token))
                    .ok()
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_prefix() {
        assert_eq!(token_from_header("Token abc").unwrap(), "abc");
        assert!(token_from_header("Bearer abc").is_err());
        assert!(token_from_header("Token ").is_err());
    }
}
