//! Successful responses and envelope normalization

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// 204 No Content
    Empty,
    /// `application/json` bodies
    Json(Value),
    /// Everything else, read as text
    Text(String),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ResponseBody::Empty)
    }
}

/// `{ data, status, headers }` of a successful call.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub data: ResponseBody,
    pub status: u16,
    pub headers: HeaderMap,
}

impl ApiResponse {
    /// Deserialize a JSON body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        match self.data {
            ResponseBody::Json(ref value) => serde_json::from_value(value.clone())
                .map_err(|e| ApiError::decode(self.status, format!("Unexpected response shape: {}", e))),
            ResponseBody::Empty => Err(ApiError::decode(self.status, "Response has no body")),
            ResponseBody::Text(_) => Err(ApiError::decode(self.status, "Response is not JSON")),
        }
    }

    /// The body with a single level of `data` wrapping removed.
    ///
    /// See [`extract_data`].
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let value = match self.data {
            ResponseBody::Json(ref value) => extract_data(value.clone()),
            ResponseBody::Text(ref text) => Value::String(text.clone()),
            ResponseBody::Empty => Value::Null,
        };
        serde_json::from_value(value)
            .map_err(|e| ApiError::decode(self.status, format!("Unexpected response shape: {}", e)))
    }
}

/// Unwrap `{ data: X }` to `X`, but leave `{ data, pagination }` envelopes alone.
///
/// Servers sometimes wrap a paged envelope one level deeper
/// (`{ data: { data: [...], pagination } }` after transport wrapping); both
/// shapes normalize to the envelope itself.
pub fn extract_data(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.contains_key("data") && !map.contains_key("pagination") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}
