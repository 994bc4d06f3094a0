//! # Request Extractors
//!
//! [`JsonOrDefault`] backs the endpoints whose JSON body is optional. An absent
//! body means `T::default()`; a body that is present must deserialize, and any
//! rejection is answered with a 400 before the handler runs.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::web::errors::ApiError;

#[derive(Debug, Clone, Default)]
pub struct JsonOrDefault<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        Json::<T>::from_bytes(&bytes)
            .map(|Json(value)| Self(value))
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Default, PartialEq, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Options {
        #[serde(default)]
        max_items: Option<usize>,
    }

    async fn extract(body: &'static str) -> Result<JsonOrDefault<Options>, ApiError> {
        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(body))
            .unwrap();
        JsonOrDefault::<Options>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_empty_body_is_default() {
        let JsonOrDefault(options) = assert_ok!(extract("").await);
        assert_eq!(options, Options::default());

        let JsonOrDefault(options) = assert_ok!(extract("  \n").await);
        assert_eq!(options, Options::default());
    }

    #[tokio::test]
    async fn test_present_body_is_parsed() {
        let JsonOrDefault(options) = assert_ok!(extract(r#"{"maxItems": 3}"#).await);
        assert_eq!(options.max_items, Some(3));
    }

    #[tokio::test]
    async fn test_invalid_body_is_bad_request() {
        let err = assert_err!(extract(r#"{"maxItems": "all"}"#).await);
        assert_eq!(err.code(), "BAD_REQUEST");

        let err = assert_err!(extract("{").await);
        assert_eq!(err.code(), "BAD_REQUEST");
    }

    #[test]
    fn test_extraction_outside_a_runtime() {
        let JsonOrDefault(options) = assert_ok!(tokio_test::block_on(extract("{}")));
        assert_eq!(options, Options::default());
    }
}
