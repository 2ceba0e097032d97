/// Request/response contract between the dashboard and the background coordinator
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoordinatorError;

pub const CSS_QUEUED_MESSAGE: &str = "CSS queued for later injection";
pub const CSS_EMPTY_MESSAGE: &str = "CSS was empty";
pub const CSS_SKIPPED_MESSAGE: &str = "CSS injection skipped for extension page";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeginTracking {
    pub widget_id: Option<String>,
    pub widget_src: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InjectCss {
    pub widget_id: Option<String>,
    pub css: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndTracking {
    pub widget_id: Option<String>,
}

/// A request from the dashboard
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    BeginTracking(BeginTracking),
    InjectCss(InjectCss),
    EndTracking(EndTracking),
}

/// Wire shape before the payload is interpreted
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Request {
    /// Interpret a `{type, payload}` message.
    ///
    /// `None` for message types this background does not handle. A known type
    /// with an absent or malformed payload parses with empty fields so the
    /// coordinator can reject it with a validation error.
    pub fn from_value(message: Value) -> Option<Request> {
        let envelope: Envelope = serde_json::from_value(message).ok()?;
        let payload = envelope.payload;

        let request = match envelope.kind.as_str() {
            "BEGIN_TRACKING" | "PREPARE_WIDGET_TRACKING" => {
                Request::BeginTracking(payload_or_default(payload))
            }
            "INJECT_CSS" => Request::InjectCss(payload_or_default(payload)),
            "END_TRACKING" | "UNREGISTER_WIDGET" => Request::EndTracking(payload_or_default(payload)),
            _ => return None,
        };
        Some(request)
    }
}

fn payload_or_default<T: for<'de> Deserialize<'de> + Default>(payload: Value) -> T {
    serde_json::from_value(payload).unwrap_or_default()
}

/// Reply sent back to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    pub fn ok() -> Response {
        Response {
            success: true,
            message: None,
            error: None,
        }
    }

    pub fn ok_with(message: &str) -> Response {
        Response {
            message: Some(message.to_string()),
            ..Response::ok()
        }
    }

    pub fn failure(error: impl Into<String>) -> Response {
        Response {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

impl From<CoordinatorError> for Response {
    fn from(error: CoordinatorError) -> Self {
        Response::failure(error.to_string())
    }
}

/// Treat empty strings the way the dashboard does: as missing
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
