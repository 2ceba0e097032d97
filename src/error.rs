/// Error types for the background coordinator
use thiserror::Error;

/// Request validation failures, reported back to the GUI
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("Missing tabId")]
    MissingTabId,

    #[error("Missing payload data")]
    MissingPayload,

    #[error("Missing widgetId")]
    MissingWidgetId,
}

/// A failed browser API call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> HostError {
        HostError {
            message: message.into(),
        }
    }

    /// Frame not yet accessible; usually clears up shortly after navigation completes
    pub fn is_access_denied(&self) -> bool {
        self.message.contains("permission") || self.message.contains("Cannot access contents")
    }
}

/// Why CSS could not be applied to a frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectionError {
    #[error("insertCSS failed: {0}")]
    Insert(HostError),

    #[error("insertCSS retry failed: {0}")]
    Retry(HostError),

    #[error("tab lookup failed before retry: {0}")]
    TabLookup(HostError),
}

/// Storage collaborator failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    Read(String),

    #[error("storage write failed: {0}")]
    Write(String),

    #[error("malformed workspace document: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_detection() {
        assert!(HostError::new("Missing host permission for the tab").is_access_denied());
        assert!(HostError::new("Cannot access contents of url \"x\"").is_access_denied());
        assert!(!HostError::new("No frame with id 4 in tab 2").is_access_denied());
    }

    #[test]
    fn test_validation_messages() {
        assert_eq!(CoordinatorError::MissingTabId.to_string(), "Missing tabId");
        assert_eq!(CoordinatorError::MissingPayload.to_string(), "Missing payload data");
        assert_eq!(CoordinatorError::MissingWidgetId.to_string(), "Missing widgetId");
    }
}
