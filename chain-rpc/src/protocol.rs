//! JSON-RPC 2.0 envelope types and inbound frame classification
//!
//! Only the generic envelope is modeled here; domain payloads (block headers,
//! storage values, ...) pass through as raw [`serde_json::Value`]s for the
//! caller to decode.

use crate::{RequestId, RpcError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version sent in every request envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound request envelope: `{"id", "jsonrpc", "method", "params"}`.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a, P: Serialize> {
    pub id: RequestId,
    pub jsonrpc: &'a str,
    pub method: &'a str,
    pub params: P,
}

/// Error object carried by a protocol-level error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorObject {
    pub message: String,
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Inbound response envelope, success or error.
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    pub id: RequestId,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

/// `params` of a subscription notification.
#[derive(Debug, Deserialize)]
pub struct NotificationParams {
    pub subscription: String,
    pub result: Value,
}

/// Subscription notification: a frame with a `method` but no `id`.
#[derive(Debug, Deserialize)]
pub struct NotificationEnvelope {
    pub method: String,
    pub params: NotificationParams,
}

/// The recognized shapes of an inbound frame.
#[derive(Debug)]
pub enum InboundFrame {
    /// Response to a correlated request (success or error).
    Response(ResponseEnvelope),
    /// Server-pushed subscription update.
    Notification(NotificationEnvelope),
    /// Unparseable frame; carries the correlation id if one was present.
    Malformed(Option<RequestId>),
}

/// Serialize the request envelope for a call or subscription.
pub fn encode_request<P: Serialize>(
    id: RequestId,
    version: &str,
    method: &str,
    params: &P,
) -> crate::Result<String> {
    let envelope = RequestEnvelope {
        id,
        jsonrpc: version,
        method,
        params,
    };
    serde_json::to_string(&envelope).map_err(|e| RpcError::Serialization(e.to_string()))
}

/// Classify a raw inbound frame into one of the recognized shapes.
///
/// A frame with an `id` is a response; a frame with a `method` but no `id` is
/// a notification. Anything else is malformed and handled best-effort by the
/// engine.
pub fn classify(raw: &str) -> InboundFrame {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return InboundFrame::Malformed(None),
    };

    let id = value
        .get("id")
        .and_then(Value::as_u64)
        .and_then(|id| RequestId::try_from(id).ok());

    if value.get("id").is_some() {
        return match serde_json::from_value::<ResponseEnvelope>(value) {
            Ok(response) => InboundFrame::Response(response),
            Err(_) => InboundFrame::Malformed(id),
        };
    }

    if value.get("method").is_some() {
        return match serde_json::from_value::<NotificationEnvelope>(value) {
            Ok(notification) => InboundFrame::Notification(notification),
            Err(_) => InboundFrame::Malformed(None),
        };
    }

    InboundFrame::Malformed(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_request_shape() {
        let encoded = encode_request(7, JSONRPC_VERSION, "chain_getBlockHash", &[1u64]).unwrap();
        assert_eq!(
            encoded,
            r#"{"id":7,"jsonrpc":"2.0","method":"chain_getBlockHash","params":[1]}"#
        );
    }

    #[test]
    fn test_classify_success_response() {
        let frame = r#"{"id":3,"jsonrpc":"2.0","result":"0xabc"}"#;
        match classify(frame) {
            InboundFrame::Response(response) => {
                assert_eq!(response.id, 3);
                assert_eq!(response.result.unwrap(), "0xabc");
                assert!(response.error.is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_error_response() {
        let frame = r#"{"id":4,"jsonrpc":"2.0","error":{"message":"bad method","code":-32601}}"#;
        match classify(frame) {
            InboundFrame::Response(response) => {
                let error = response.error.unwrap();
                assert_eq!(error.code, -32601);
                assert_eq!(error.message, "bad method");
                assert!(error.data.is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_notification() {
        let frame =
            r#"{"jsonrpc":"2.0","method":"state_storage","params":{"subscription":"sub1","result":42}}"#;
        match classify(frame) {
            InboundFrame::Notification(notification) => {
                assert_eq!(notification.method, "state_storage");
                assert_eq!(notification.params.subscription, "sub1");
                assert_eq!(notification.params.result, 42);
            }
            other => panic!("expected notification, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_malformed_keeps_id() {
        // Known id but unrecognizable body: the engine maps this to EmptyResult.
        let frame = r#"{"id":9,"jsonrpc":"2.0","error":"not an object"}"#;
        match classify(frame) {
            InboundFrame::Malformed(Some(9)) => {}
            other => panic!("expected malformed with id, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_garbage() {
        assert!(matches!(classify("not json"), InboundFrame::Malformed(None)));
        assert!(matches!(classify("{}"), InboundFrame::Malformed(None)));
    }

    #[test]
    fn test_response_without_result_or_error() {
        let frame = r#"{"id":5,"jsonrpc":"2.0"}"#;
        match classify(frame) {
            InboundFrame::Response(response) => {
                assert!(response.result.is_none());
                assert!(response.error.is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }
}
