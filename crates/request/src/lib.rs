//! fetchsync request: turns a declarative `HttpRequestParams` into one
//! executed HTTP request.
//!
//! - [`ValueResolver`] picks the value of a param/header from its source chain
//! - [`build`] assembles url, method and headers, skipping unresolved entries
//! - [`Fetcher`] performs the request and enforces a 2xx status

#![forbid(unsafe_code)]

pub mod builder;
pub mod fetcher;
pub mod resolver;
pub mod sniff;

pub use builder::{build, BuiltRequest, ResolvedRequest, Section, SkippedEntry};
pub use fetcher::Fetcher;
pub use resolver::{apply_format, ValueResolver};
pub use sniff::content_type;
