//! Error types and classification for chain operations

use thiserror::Error;

/// Main error type for all chain operations
///
/// Errors are `Clone` so a single-flight result can be broadcast to every
/// waiter.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key not found in any layer
    #[error("key not found: {0}")]
    NotFound(String),

    /// Operation exceeded the layer timeout
    #[error("operation timed out")]
    Timeout,

    /// Layer short-circuited by its circuit breaker
    #[error("circuit breaker open for layer {0}")]
    CircuitOpen(String),

    /// Transport or connectivity failure
    #[error("connection error: {0}")]
    Connection(String),

    /// Encode or decode failure inside a backend
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend-specific failure
    #[error("backend error: {0}")]
    Backend(String),

    /// Key rejected by validation
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Value rejected by a backend
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Backend explicitly unavailable
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Operation not supported by the layer (e.g. writes to a read-only source)
    #[error("operation not supported by layer {0}")]
    Unsupported(String),

    /// Async writer rejected the write because it is closed
    #[error("async writer is closed")]
    WriterClosed,

    /// Async writer queue stayed full past the enqueue deadline
    #[error("async writer queue is full")]
    QueueFull,

    /// Writer queue did not drain before the flush deadline
    #[error("flush timed out")]
    FlushTimeout,

    /// Invalid construction-time configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for chain operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Classification tag for metrics and logs
///
/// Every error maps to exactly one tag; `is_circuit_failure` decides which
/// tags advance a layer's circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    KeyNotFound,
    Timeout,
    CircuitOpen,
    Connection,
    Serialization,
    Backend,
    InvalidKey,
    InvalidValue,
    Unavailable,
    Unsupported,
    WriterClosed,
    QueueFull,
    FlushTimeout,
    Other,
}

impl ErrorKind {
    /// Get the tag as a stable metric/log label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::KeyNotFound => "key_not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::CircuitOpen => "circuit_breaker_open",
            ErrorKind::Connection => "connection",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Backend => "backend",
            ErrorKind::InvalidKey => "invalid_key",
            ErrorKind::InvalidValue => "invalid_value",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::WriterClosed => "writer_closed",
            ErrorKind::QueueFull => "queue_full",
            ErrorKind::FlushTimeout => "flush_timeout",
            ErrorKind::Other => "other",
        }
    }

    /// Whether this classification counts against a circuit breaker
    ///
    /// Misses never do; neither do validation failures (caller bugs), the
    /// breaker's own short-circuit, or writer backpressure signals.
    pub fn is_circuit_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Connection
                | ErrorKind::Serialization
                | ErrorKind::Backend
                | ErrorKind::Unavailable
                | ErrorKind::Other
        )
    }
}

impl CacheError {
    /// Classify this error for metrics and breaker accounting
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::NotFound(_) => ErrorKind::KeyNotFound,
            CacheError::Timeout => ErrorKind::Timeout,
            CacheError::CircuitOpen(_) => ErrorKind::CircuitOpen,
            CacheError::Connection(_) => ErrorKind::Connection,
            CacheError::Serialization(_) => ErrorKind::Serialization,
            CacheError::Backend(_) => ErrorKind::Backend,
            CacheError::InvalidKey(_) => ErrorKind::InvalidKey,
            CacheError::InvalidValue(_) => ErrorKind::InvalidValue,
            CacheError::Unavailable(_) => ErrorKind::Unavailable,
            CacheError::Unsupported(_) => ErrorKind::Unsupported,
            CacheError::WriterClosed => ErrorKind::WriterClosed,
            CacheError::QueueFull => ErrorKind::QueueFull,
            CacheError::FlushTimeout => ErrorKind::FlushTimeout,
            CacheError::Configuration(_) | CacheError::Internal(_) => ErrorKind::Other,
        }
    }

    /// True when this error is a missing-key signal rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound(_))
    }
}

/// Classify an opaque backend error message by substring hints
///
/// Backends map their transport errors through their sentinel checks first
/// (typed timeout/connection kinds on the driver error) and fall back to this
/// matcher for anything that only carries a message.
pub fn classify_message(message: &str) -> ErrorKind {
    let msg = message.to_ascii_lowercase();
    if msg.contains("not found") || msg.contains("no such key") {
        ErrorKind::KeyNotFound
    } else if msg.contains("timed out") || msg.contains("timeout") || msg.contains("deadline") {
        ErrorKind::Timeout
    } else if msg.contains("connection")
        || msg.contains("refused")
        || msg.contains("reset by peer")
        || msg.contains("broken pipe")
        || msg.contains("unreachable")
    {
        ErrorKind::Connection
    } else if msg.contains("serialize")
        || msg.contains("deserialize")
        || msg.contains("encode")
        || msg.contains("decode")
    {
        ErrorKind::Serialization
    } else if msg.contains("unavailable") || msg.contains("shutting down") {
        ErrorKind::Unavailable
    } else {
        ErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::NotFound("user:1".to_string());
        assert_eq!(err.to_string(), "key not found: user:1");

        let err = CacheError::CircuitOpen("redis".to_string());
        assert_eq!(err.to_string(), "circuit breaker open for layer redis");

        let err = CacheError::QueueFull;
        assert_eq!(err.to_string(), "async writer queue is full");
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(CacheError::Timeout.kind().as_str(), "timeout");
        assert_eq!(
            CacheError::NotFound("k".into()).kind().as_str(),
            "key_not_found"
        );
        assert_eq!(
            CacheError::Internal("boom".into()).kind().as_str(),
            "other"
        );
    }

    #[test]
    fn test_circuit_failure_classification() {
        // Real failures advance the breaker
        assert!(CacheError::Timeout.kind().is_circuit_failure());
        assert!(CacheError::Connection("refused".into()).kind().is_circuit_failure());
        assert!(CacheError::Backend("boom".into()).kind().is_circuit_failure());
        assert!(CacheError::Unavailable("down".into()).kind().is_circuit_failure());

        // Misses, the gate itself, and caller bugs never do
        assert!(!CacheError::NotFound("k".into()).kind().is_circuit_failure());
        assert!(!CacheError::CircuitOpen("l0".into()).kind().is_circuit_failure());
        assert!(!CacheError::InvalidKey("".into()).kind().is_circuit_failure());
        assert!(!CacheError::Unsupported("src".into()).kind().is_circuit_failure());
        assert!(!CacheError::QueueFull.kind().is_circuit_failure());
    }

    #[test]
    fn test_classify_message_hints() {
        assert_eq!(classify_message("dial tcp: connection refused"), ErrorKind::Connection);
        assert_eq!(classify_message("read timed out"), ErrorKind::Timeout);
        assert_eq!(classify_message("failed to decode payload"), ErrorKind::Serialization);
        assert_eq!(classify_message("server is shutting down"), ErrorKind::Unavailable);
        assert_eq!(classify_message("key not found"), ErrorKind::KeyNotFound);
        assert_eq!(classify_message("wat"), ErrorKind::Other);
    }

    #[test]
    fn test_error_clone() {
        let err = CacheError::Timeout;
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
