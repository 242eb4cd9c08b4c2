//! Error taxonomy shared by every stage of a reconciliation pass.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid http method {0:?}")]
    InvalidMethod(String),

    #[error("lookup failed for {target}: {reason}")]
    LookupFailed { target: String, reason: String },

    #[error("invalid format template {template:?}: expected exactly one %s placeholder, found {found}")]
    FormatInvalid { template: String, found: usize },

    #[error("transport error for {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unexpected status code {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("store write failed for {target}: {reason}")]
    StoreWriteFailed { target: String, reason: String },

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Stable, low-cardinality label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidUrl { .. } => "invalid_url",
            Error::InvalidMethod(_) => "invalid_method",
            Error::LookupFailed { .. } => "lookup_failed",
            Error::FormatInvalid { .. } => "format_invalid",
            Error::Transport { .. } => "transport",
            Error::UnexpectedStatus { .. } => "unexpected_status",
            Error::StoreWriteFailed { .. } => "store_write_failed",
            Error::Cancelled => "cancelled",
        }
    }

    /// Per-entry failures: the request builder drops the offending param or
    /// header and carries on. Everything else fails the pass.
    pub fn is_contained(&self) -> bool {
        matches!(self, Error::LookupFailed { .. } | Error::FormatInvalid { .. })
    }

    pub fn lookup(target: impl ToString, reason: impl ToString) -> Self {
        Error::LookupFailed { target: target.to_string(), reason: reason.to_string() }
    }

    pub fn store_write(target: impl ToString, reason: impl ToString) -> Self {
        Error::StoreWriteFailed { target: target.to_string(), reason: reason.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resolution_errors_are_contained() {
        assert!(Error::lookup("ConfigMap ns/a#k", "boom").is_contained());
        assert!(Error::FormatInvalid { template: "%s%s".into(), found: 2 }.is_contained());
        assert!(!Error::Cancelled.is_contained());
        assert!(!Error::UnexpectedStatus { status: 404, url: "https://x".into() }.is_contained());
        assert!(!Error::store_write("ConfigMap ns/a#k", "denied").is_contained());
    }

    #[test]
    fn messages_carry_context() {
        let e = Error::UnexpectedStatus { status: 503, url: "https://example.com/a".into() };
        assert_eq!(e.to_string(), "unexpected status code 503 from https://example.com/a");
        assert_eq!(e.kind(), "unexpected_status");
        let e = Error::FormatInvalid { template: "Bearer".into(), found: 0 };
        assert!(e.to_string().contains("found 0"), "{}", e);
    }
}
