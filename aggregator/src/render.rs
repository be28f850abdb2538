use crate::errors::{AggregatorError, Result};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

pub type ResponseBody = BoxBody<Bytes, AggregatorError>;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Serializes `payload` as the JSON body of a `status` response.
///
/// Nothing is built when serialization fails, so the caller can still answer
/// with an error status.
pub fn render_json<T: Serialize>(
    status: StatusCode,
    payload: &T,
) -> Result<Response<ResponseBody>> {
    let body = serde_json::to_vec(payload).map_err(AggregatorError::Encoding)?;

    let mut response = Response::new(Full::new(Bytes::from(body)).map_err(|e| match e {}).boxed());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::NumbersPayload;
    use serde::ser::Error as _;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            Err(S::Error::custom("refusing to encode"))
        }
    }

    #[tokio::test]
    async fn test_render_numbers() {
        let payload = NumbersPayload {
            numbers: vec![1, 2, 3, 4],
        };
        let response = render_json(StatusCode::OK, &payload).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body.as_ref(), br#"{"numbers":[1,2,3,4]}"#);
    }

    #[test]
    fn test_render_encoding_error() {
        let err = render_json(StatusCode::OK, &Unencodable).unwrap_err();
        assert!(matches!(err, AggregatorError::Encoding(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
