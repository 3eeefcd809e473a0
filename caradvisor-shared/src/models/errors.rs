use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the backend.
///
/// FastAPI routes answer with `{"detail": ...}` where `detail` is either a
/// string or a list of field errors; older routes send `{"message": ...}`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ErrorResponse {
    /// FastAPI-style detail, string or list of validation entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    /// Plain message used by non-FastAPI handlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    /// Human-readable reason extracted from the body, if any.
    ///
    /// Validation lists are flattened to their `msg` entries joined by `"; "`.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        let from_detail = match &self.detail {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
            Some(Value::Array(entries)) => {
                let messages: Vec<&str> = entries
                    .iter()
                    .filter_map(|entry| entry.get("msg").and_then(Value::as_str))
                    .collect();
                (!messages.is_empty()).then(|| messages.join("; "))
            }
            _ => None,
        };

        from_detail.or_else(|| {
            self.message
                .as_ref()
                .filter(|message| !message.trim().is_empty())
                .cloned()
        })
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason() {
            Some(reason) => f.write_str(&reason),
            None => f.write_str("unknown error"),
        }
    }
}
