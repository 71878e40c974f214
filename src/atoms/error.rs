// ── Engram Atoms: Error Types ──────────────────────────────────────────────
// Single canonical error enum for the engine, built with `thiserror`.
//
// Design rules:
//   • Variants are coarse-grained by domain (I/O, DB, Config, Store…).
//   • The `#[from]` attribute wires std/external error conversions automatically.
//   • Collaborator failures (DB, I/O, explicit StoreUnavailable) are grouped by
//     `is_store_failure()` so the router and retrieval engine can degrade
//     instead of failing the turn.

use thiserror::Error;

// ── Primary error enum ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum EngineError {
    /// Filesystem or OS-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration document could not be parsed.
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// SQLite / rusqlite database failure.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Engine configuration is invalid. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store collaborator failed or timed out.
    #[error("Store unavailable: {store}: {message}")]
    StoreUnavailable { store: String, message: String },

    /// A candidate fact is malformed or incomplete.
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),

    /// Catch-all for errors that do not yet have a dedicated variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenience constructors ───────────────────────────────────────────────

impl EngineError {
    /// Create a store-unavailable error with store name and message.
    pub fn store_unavailable(store: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StoreUnavailable { store: store.into(), message: message.into() }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// True when the error came from a store collaborator (failure or timeout)
    /// rather than from the caller's input or configuration.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Database(_) | EngineError::Io(_) | EngineError::StoreUnavailable { .. }
        )
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

// ── Convenience alias ──────────────────────────────────────────────────────

/// All engine operations should return this type.
pub type EngineResult<T> = Result<T, EngineError>;

impl From<EngineError> for String {
    fn from(e: EngineError) -> Self {
        e.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_failures_are_classified() {
        assert!(EngineError::store_unavailable("facts", "timeout").is_store_failure());
        assert!(EngineError::Database(rusqlite::Error::InvalidQuery).is_store_failure());
        assert!(!EngineError::config("bad strategy").is_store_failure());
        assert!(!EngineError::InvalidCandidate("empty".into()).is_store_failure());
    }

    #[test]
    fn display_keeps_store_name() {
        let e = EngineError::store_unavailable("graph", "busy");
        assert_eq!(e.to_string(), "Store unavailable: graph: busy");
    }
}
