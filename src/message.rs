//! Request and response shapes carried inside frames.
//!
//! A frame holds one JSON value: an object for a single call or an array
//! for a batch. Requests look like `{"id": "...", "method": "...",
//! "params": ...}` with `id` omitted for notifications. Responses always
//! carry all three of `id`, `result` and `error`, and a batch response lists
//! them in the same order as the requests it answers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// A single call as it appears on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id; `None` for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the method to invoke.
    pub method: String,
    /// Method-defined parameters; `null` when absent.
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Build a request. Pass `None` as `id` for a notification.
    #[must_use]
    pub fn new(id: Option<String>, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    /// Whether this request was sent without a correlation id.
    #[must_use]
    pub fn is_notify(&self) -> bool { self.id.is_none() }
}

/// Reply to a single request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id copied from the request, or `null`.
    pub id: Option<String>,
    /// Method result; `null` on failure.
    #[serde(default)]
    pub result: Value,
    /// Failure message; `null` on success.
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    /// Successful reply carrying `result`.
    #[must_use]
    pub fn success(id: Option<String>, result: Value) -> Self {
        Self {
            id,
            result,
            error: None,
        }
    }

    /// Failed reply carrying the rendered `error`.
    #[must_use]
    pub fn failure(id: Option<String>, error: &ServiceError) -> Self {
        Self {
            id,
            result: Value::Null,
            error: Some(error.to_string()),
        }
    }

    /// Split the reply into its result or its error message.
    ///
    /// # Errors
    ///
    /// Returns the peer's error message when the `error` field is set.
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(message) => Err(message),
            None => Ok(self.result),
        }
    }
}

/// A decoded inbound frame on the server.
#[derive(Debug, PartialEq)]
pub enum Incoming {
    /// A single request object.
    Single(Request),
    /// A batch; malformed elements keep their position as decode errors.
    Batch(Vec<Result<Request, ServiceError>>),
}

impl Incoming {
    /// Decode a frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Decode`] if the payload is not JSON, is an
    /// empty array, or is a single object of the wrong shape.
    pub fn decode(payload: &[u8]) -> Result<Self, ServiceError> {
        let value: Value = serde_json::from_slice(payload).map_err(decode_error)?;
        match value {
            Value::Array(items) if items.is_empty() => {
                Err(ServiceError::Decode("empty batch".to_owned()))
            }
            Value::Array(items) => Ok(Self::Batch(
                items
                    .into_iter()
                    .map(|item| serde_json::from_value(item).map_err(decode_error))
                    .collect(),
            )),
            other => serde_json::from_value(other)
                .map(Self::Single)
                .map_err(decode_error),
        }
    }
}

/// A reply frame produced by the server.
#[derive(Debug, PartialEq)]
pub enum Outgoing {
    /// Reply to a single request.
    Single(Response),
    /// Replies to a batch, in request order.
    Batch(Vec<Response>),
}

impl Outgoing {
    /// Encode the reply as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if a result value cannot be encoded.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        let bytes = match self {
            Self::Single(response) => serde_json::to_vec(response)?,
            Self::Batch(responses) => serde_json::to_vec(responses)?,
        };
        Ok(Bytes::from(bytes))
    }
}

fn decode_error(err: serde_json::Error) -> ServiceError { ServiceError::Decode(err.to_string()) }

/// Encode one request for the wire.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if the parameters cannot be encoded.
pub fn encode_request(request: &Request) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(request).map(Bytes::from)
}

/// Encode a batch of requests as one JSON array, preserving order.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if any parameters cannot be encoded.
pub fn encode_batch(requests: &[Request]) -> Result<Bytes, serde_json::Error> {
    serde_json::to_vec(requests).map(Bytes::from)
}

/// Decode a single response frame.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] for malformed JSON or a wrong shape.
pub fn decode_response(payload: &[u8]) -> Result<Response, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Decode a batch response frame.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] for malformed JSON or a wrong shape.
pub fn decode_batch_response(payload: &[u8]) -> Result<Vec<Response>, serde_json::Error> {
    serde_json::from_slice(payload)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::error::ServiceErrorKind;

    #[rstest]
    #[case::call(Some("1700000000-0".to_owned()), json!({"a": 1, "b": [true, null]}))]
    #[case::notify(None, json!("hi"))]
    #[case::null_params(Some("7".to_owned()), Value::Null)]
    fn requests_survive_the_wire(#[case] id: Option<String>, #[case] params: Value) {
        let request = Request::new(id.clone(), "echo", params.clone());
        let bytes = encode_request(&request).expect("encode");

        let Incoming::Single(decoded) = Incoming::decode(&bytes).expect("decode") else {
            panic!("expected a single request");
        };
        assert_eq!(decoded.method, "echo");
        assert_eq!(decoded.params, params);
        assert_eq!(decoded.id, id);
        assert_eq!(decoded.is_notify(), id.is_none());
    }

    #[test]
    fn notify_requests_omit_the_id_field() {
        let bytes = encode_request(&Request::new(None, "log", json!([1]))).expect("encode");
        let value: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value, json!({"method": "log", "params": [1]}));
    }

    #[test]
    fn missing_params_decode_as_null() {
        let incoming = Incoming::decode(br#"{"id":"1","method":"ping"}"#).expect("decode");
        assert_eq!(
            incoming,
            Incoming::Single(Request::new(Some("1".into()), "ping", Value::Null))
        );
    }

    #[test]
    fn batches_keep_order_and_isolate_bad_elements() {
        let payload = br#"[{"id":"a","method":"one"},{"params":1},{"method":"three"}]"#;
        let Incoming::Batch(items) = Incoming::decode(payload).expect("decode") else {
            panic!("expected a batch");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().map(|r| r.method.as_str()), Ok("one"));
        assert!(matches!(&items[1], Err(ServiceError::Decode(_))));
        assert_eq!(items[2].as_ref().map(Request::is_notify), Ok(true));
    }

    #[rstest]
    #[case::not_json(&b"{\"method\""[..])]
    #[case::empty_batch(&b"[]"[..])]
    #[case::wrong_shape(&b"42"[..])]
    fn malformed_frames_are_decode_errors(#[case] payload: &[u8]) {
        let err = Incoming::decode(payload).expect_err("expected decode error");
        assert_eq!(err.kind(), ServiceErrorKind::Decode);
    }

    #[test]
    fn responses_always_carry_three_fields() {
        let ok = Outgoing::Single(Response::success(Some("9".into()), json!("hi")));
        let value: Value = serde_json::from_slice(&ok.encode().expect("encode")).expect("json");
        assert_eq!(value, json!({"id": "9", "result": "hi", "error": null}));

        let failed = Response::failure(None, &ServiceError::RateLimitExceeded);
        let value = serde_json::to_value(&failed).expect("json");
        assert_eq!(
            value,
            json!({"id": null, "result": null, "error": "rate limit exceeded"})
        );
    }

    #[test]
    fn batch_responses_decode_positionally() {
        let outgoing = Outgoing::Batch(vec![
            Response::success(Some("1".into()), json!(1)),
            Response::failure(Some("2".into()), &ServiceError::MethodNotFound("x".into())),
        ]);
        let decoded = decode_batch_response(&outgoing.encode().expect("encode")).expect("decode");
        assert_eq!(decoded[0].clone().into_result(), Ok(json!(1)));
        assert_eq!(
            decoded[1].clone().into_result(),
            Err("method not found: x".to_owned())
        );
    }
}
