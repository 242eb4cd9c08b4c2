//! fetchsync core: declarative resource types, value sources, errors and the
//! collaborator traits the resolver, fetcher and reconciler are written against.

#![forbid(unsafe_code)]

pub mod cancel;
pub mod crd;
pub mod digest;
pub mod error;
pub mod store;
pub mod value;

pub use cancel::with_cancel;
pub use crd::{
    Condition, DeletionPolicy, HttpRequest, HttpRequestObservation, HttpRequestParams,
    HttpRequestSpec, HttpRequestStatus, NamedValue, ProviderConfig, ProviderConfigReference,
    ProviderConfigSpec, ValueSelector,
};
pub use digest::{digest, equal, stored_text, Digest};
pub use error::{Error, Result};
pub use store::{KeyedStore, TransportConfig, TransportConfigSource};
pub use value::{KeyRef, SinkKind, ValueSource};

/// API group shared by every custom resource this controller serves.
pub const GROUP: &str = "fetchsync.io";
/// Served version of [`GROUP`].
pub const VERSION: &str = "v1alpha1";

pub mod prelude {
    pub use super::{
        digest, equal, with_cancel, Digest, Error, HttpRequest, HttpRequestParams, KeyRef,
        KeyedStore, NamedValue, Result, SinkKind, TransportConfig, ValueSource,
    };
}
