use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The one response shape every endpoint produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub status: bool,
    pub message: String,
    #[serde(default = "empty_object", deserialize_with = "object_or_empty")]
    pub data: Value,
    #[serde(default = "empty_object", deserialize_with = "object_or_empty")]
    pub errors: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Anything that is not a JSON object (null included) collapses to `{}`.
pub fn as_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        _ => empty_object(),
    }
}

fn object_or_empty<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(as_object)
}

impl Envelope {
    pub fn success(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: true,
            message: message.into(),
            data: as_object(data),
            errors: empty_object(),
        }
    }

    pub fn failure(message: impl Into<String>, errors: Value) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: empty_object(),
            errors: as_object(errors),
        }
    }
}

/// Payload of update and delete endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AffectedRows {
    pub affected_rows: u64,
}

/// A successful reply: status code plus an enveloped payload.
#[derive(Debug)]
pub struct ApiResponse {
    status: StatusCode,
    body: Envelope,
}

impl ApiResponse {
    pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::OK, message, data)
    }

    pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> Self {
        Self::with_status(StatusCode::CREATED, message, data)
    }

    fn with_status<T: Serialize>(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "response payload serialization failed");
                Value::Null
            }
        };
        Self {
            status,
            body: Envelope::success(message, data),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_object_payloads_become_empty_objects() {
        let env = Envelope::success("ok", json!(null));
        assert_eq!(env.data, json!({}));
        let env = Envelope::success("ok", json!([1, 2]));
        assert_eq!(env.data, json!({}));
        assert_eq!(env.errors, json!({}));
    }

    #[test]
    fn absent_and_null_fields_deserialize_as_empty_objects() {
        let env: Envelope =
            serde_json::from_str(r#"{"status":false,"message":"x","data":null}"#).unwrap();
        assert_eq!(env.data, json!({}));
        assert_eq!(env.errors, json!({}));
    }

    #[test]
    fn serialized_shape_has_all_four_keys() {
        let value = serde_json::to_value(Envelope::failure("nope", json!({"email": "bad"}))).unwrap();
        assert_eq!(
            value,
            json!({"status": false, "message": "nope", "data": {}, "errors": {"email": "bad"}})
        );
    }
}
