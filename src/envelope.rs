//! Uniform response envelope.
//!
//! Every response this service emits, success or failure, has the shape
//!
//! ```json
//! { "header": { "error": 0, "message": "..." }, "body": { "data": ... } }
//! ```
//!
//! where `body` is omitted when there is nothing to carry. Note the asymmetry kept
//! from the storefront's existing clients: an absent payload is always reported
//! with `error: 1`, whatever the caller meant.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Payload
///
/// What a handler hands to the builder. The variant decides both the error flag and
/// whether a `body` key is emitted.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Nothing to return. Always rendered as `error: 1` without a body.
    Empty,
    /// A list of items. An empty list renders `error: 0` without a body.
    Sequence(Vec<Value>),
    /// A single scalar or object.
    Single(Value),
}

impl Payload {
    /// Classifies an arbitrary JSON value: null is `Empty`, arrays are `Sequence`,
    /// everything else is `Single`.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Payload::Empty,
            Value::Array(items) => Payload::Sequence(items),
            other => Payload::Single(other),
        }
    }

    /// Serializes `value` and classifies the result.
    ///
    /// The wire models in this crate always serialize; should one ever fail, the
    /// failure is logged and reported as `Empty`, which yields an error envelope.
    pub fn of<T: Serialize>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(value) => Payload::from_value(value),
            Err(e) => {
                tracing::error!("envelope payload serialization failed: {:?}", e);
                Payload::Empty
            }
        }
    }
}

/// Header
///
/// `error` is 0 on success and 1 on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Header {
    pub error: u8,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Body {
    #[schema(value_type = Object)]
    pub data: Value,
}

/// Envelope
///
/// The serialized response document. Constructed fresh per response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    pub header: Header,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
}

impl Envelope {
    pub fn is_error(&self) -> bool {
        self.header.error != 0
    }
}

/// build
///
/// Pure and total: the same payload and message always produce the same envelope.
pub fn build(payload: Payload, message: impl Into<String>) -> Envelope {
    let message = message.into();
    match payload {
        Payload::Empty => Envelope {
            header: Header { error: 1, message },
            body: None,
        },
        Payload::Sequence(items) if items.is_empty() => Envelope {
            header: Header { error: 0, message },
            body: None,
        },
        Payload::Sequence(items) => Envelope {
            header: Header { error: 0, message },
            body: Some(Body {
                data: Value::Array(items),
            }),
        },
        Payload::Single(data) => Envelope {
            header: Header { error: 0, message },
            body: Some(Body { data }),
        },
    }
}

/// ApiResponse
///
/// An envelope paired with the HTTP status it is sent with. Handlers, gates and the
/// router-level fallbacks all return this, so the wire shape cannot drift.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub envelope: Envelope,
}

impl ApiResponse {
    pub fn new(status: StatusCode, payload: Payload, message: impl Into<String>) -> Self {
        Self {
            status,
            envelope: build(payload, message),
        }
    }

    /// Success response carrying any serializable value.
    pub fn data<T: Serialize>(status: StatusCode, value: &T, message: impl Into<String>) -> Self {
        Self::new(status, Payload::of(value), message)
    }

    /// Failure response: no payload, hence `error: 1`.
    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, Payload::Empty, message)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}
