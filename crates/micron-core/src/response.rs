//! Outbound response type and helpers.

use crate::error::{MicronError, MicronResult};
use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use serde_json::Value;

/// The response produced by the pipeline.
pub type Response = http::Response<Bytes>;

/// Content type of every JSON response.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Extension trait for building and inspecting JSON responses.
pub trait ResponseExt {
    /// Creates a JSON response, pretty-printed with a two-space indent.
    fn json(status: StatusCode, body: &Value) -> MicronResult<Response>;

    /// Parses the body back into a JSON value.
    fn json_value(&self) -> MicronResult<Value>;
}

impl ResponseExt for Response {
    fn json(status: StatusCode, body: &Value) -> MicronResult<Response> {
        let encoded = serde_json::to_vec_pretty(body).map_err(|error| {
            MicronError::implementation(format!("Unsupported type in response data: {error}"))
        })?;
        let mut response = http::Response::new(Bytes::from(encoded));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSON_CONTENT_TYPE),
        );
        Ok(response)
    }

    fn json_value(&self) -> MicronResult<Value> {
        Ok(serde_json::from_slice(self.body())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_response() {
        let response = Response::json(StatusCode::OK, &json!({"a": [1, 2]})).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            JSON_CONTENT_TYPE
        );
        let text = std::str::from_utf8(response.body()).unwrap();
        assert!(text.contains("\n  \"a\""));
        assert_eq!(response.json_value().unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_json_value_of_non_json_body() {
        let response = http::Response::new(Bytes::from_static(b"<html>"));
        let error = response.json_value().unwrap_err();
        assert_eq!(error.code(), crate::error::codes::UNHANDLED_EXCEPTION);
    }
}
