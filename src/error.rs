//! Error types for the inference dispatch core.
//!
//! The taxonomy here is deliberately flat: every fallible operation in this
//! crate returns one of these variants, and callers match on the variant
//! rather than inspecting error strings. The CLI boundary maps each variant
//! to an exit status and, in `--json` mode, a stable `kind` tag.

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the dispatch core.
#[derive(Error, Debug)]
pub enum Error {
    /// A host did not respond within its probe or call deadline.
    #[error("host unreachable: {0}")]
    Unreachable(String),

    /// A response was received but could not be decoded, or violated the
    /// streaming contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The stream closed before a `done:true` frame arrived.
    #[error("response truncated: {0}")]
    Truncated(String),

    /// The router found no host that can serve a request.
    #[error("no host available: {0}")]
    NoHost(String),

    /// A forced model is not available anywhere.
    #[error("model not found: {0}")]
    NoModel(String),

    /// The caller's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Malformed CLI arguments or an unusable prompt.
    #[error("bad input: {0}")]
    BadInput(String),

    /// The on-disk saga file could not be read or parsed.
    #[error("corrupt saga file: {0}")]
    CorruptSaga(String),

    /// A tool call matched the safety denylist and was not executed.
    #[error("tool blocked: {0}")]
    ToolBlocked(String),

    /// A tool executor returned an error.
    #[error("tool failed: {0}")]
    ToolFailed(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Filesystem I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for conditions that don't fit the taxonomy above.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Error::Unreachable(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn truncated(msg: impl Into<String>) -> Self {
        Error::Truncated(msg.into())
    }

    pub fn no_host(msg: impl Into<String>) -> Self {
        Error::NoHost(msg.into())
    }

    pub fn no_model(msg: impl Into<String>) -> Self {
        Error::NoModel(msg.into())
    }

    pub fn bad_input(msg: impl Into<String>) -> Self {
        Error::BadInput(msg.into())
    }

    pub fn corrupt_saga(msg: impl Into<String>) -> Self {
        Error::CorruptSaga(msg.into())
    }

    pub fn tool_blocked(msg: impl Into<String>) -> Self {
        Error::ToolBlocked(msg.into())
    }

    pub fn tool_failed(msg: impl Into<String>) -> Self {
        Error::ToolFailed(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Stable tag used for `--json` error output and log fields. Never
    /// changes between patch releases; scripts may match on it.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unreachable(_) => "unreachable",
            Error::Protocol(_) => "protocol",
            Error::Truncated(_) => "truncated",
            Error::NoHost(_) => "no_host",
            Error::NoModel(_) => "no_model",
            Error::Cancelled => "cancelled",
            Error::BadInput(_) => "bad_input",
            Error::CorruptSaga(_) => "corrupt_saga",
            Error::ToolBlocked(_) => "tool_blocked",
            Error::ToolFailed(_) => "tool_failed",
            Error::Http(_) => "http",
            Error::Json(_) => "json",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Other(_) => "other",
        }
    }

    /// Exit status the CLI should use when this error reaches `main`.
    pub fn exit_status(&self) -> i32 {
        match self {
            Error::BadInput(_) => 2,
            Error::Cancelled => 130,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_unreachable() {
        let err = Error::unreachable("host-a timed out");
        assert!(matches!(err, Error::Unreachable(_)));
        assert_eq!(err.kind(), "unreachable");
    }

    #[test]
    fn test_error_truncated_is_protocol_family() {
        let err = Error::truncated("socket closed before done:true");
        assert_eq!(err.kind(), "truncated");
        assert_eq!(err.exit_status(), 1);
    }

    #[test]
    fn test_error_no_host() {
        let err = Error::no_host("no online host serves qwen2.5");
        assert_eq!(err.kind(), "no_host");
        assert_eq!(err.to_string(), "no host available: no online host serves qwen2.5");
    }

    #[test]
    fn test_error_bad_input_exit_status() {
        let err = Error::bad_input("empty prompt");
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn test_error_cancelled_exit_status() {
        assert_eq!(Error::Cancelled.exit_status(), 130);
        assert_eq!(Error::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_error_tool_blocked_and_failed() {
        assert_eq!(Error::tool_blocked("rm -rf /").kind(), "tool_blocked");
        assert_eq!(Error::tool_failed("exit code 1").kind(), "tool_failed");
    }

    #[test]
    fn test_result_type_alias() {
        fn _returns_result() -> Result<i32> {
            Ok(42)
        }
        fn _returns_error() -> Result<i32> {
            Err(Error::Cancelled)
        }
    }
}
