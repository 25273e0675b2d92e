// Tool-layer payloads
//
// Tool functions never let a session error escape as-is. They hand the
// caller either the controller JSON untouched or `{error, data: []}`.

use serde::Serialize;
use serde_json::{Value, json};

use crate::error::Error;

/// Result of a tool call, ready to serialize for the agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolPayload {
    /// Controller response, passed through unchanged.
    Data(Value),
    /// Failure description with an empty data set.
    Failure { error: String, data: Vec<Value> },
}

impl ToolPayload {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
            data: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn into_value(self) -> Value {
        match self {
            Self::Data(value) => value,
            Self::Failure { error, data } => json!({ "error": error, "data": data }),
        }
    }
}

impl From<Result<Value, Error>> for ToolPayload {
    fn from(result: Result<Value, Error>) -> Self {
        match result {
            Ok(value) => Self::Data(value),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

/// The `data` array of a legacy `{meta, data}` envelope.
///
/// Bare objects (UniFi OS endpoints) and anything without a `data` array
/// yield an empty slice.
pub fn envelope_data(value: &Value) -> &[Value] {
    value
        .get("data")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn success_passes_through() {
        let body = json!({ "meta": { "rc": "ok" }, "data": [{ "mac": "aa" }] });
        let payload = ToolPayload::from(Ok(body.clone()));
        assert!(!payload.is_failure());
        assert_eq!(payload.into_value(), body);
    }

    #[test]
    fn errors_become_error_payloads() {
        let payload = ToolPayload::from(Err(Error::Request {
            status: 500,
            body: "boom".into(),
        }));
        assert!(payload.is_failure());
        assert_eq!(
            payload.into_value(),
            json!({ "error": "Request failed (HTTP 500): boom", "data": [] })
        );
    }

    #[test]
    fn failure_serializes_flat() {
        let text = serde_json::to_string(&ToolPayload::failure("nope")).expect("serializable");
        assert_eq!(text, r#"{"error":"nope","data":[]}"#);
    }

    #[test]
    fn envelope_data_handles_both_shapes() {
        let legacy = json!({ "meta": { "rc": "ok" }, "data": [1, 2] });
        assert_eq!(envelope_data(&legacy).len(), 2);
        assert!(envelope_data(&json!({ "hostname": "udm" })).is_empty());
    }
}
