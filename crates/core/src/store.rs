//! Collaborator seams: the keyed store holding sink and lookup values, and the
//! source of per-resource transport settings.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::{KeyRef, Result};

/// ConfigMap/Secret-like key/value store.
///
/// `get` distinguishes "not there" (`Ok(None)`) from "could not look"
/// (`Err(LookupFailed)`). `set` and `delete` fail with `StoreWriteFailed`;
/// deleting an absent entry succeeds.
#[async_trait]
pub trait KeyedStore: Send + Sync {
    async fn get(&self, at: &KeyRef) -> Result<Option<String>>;
    async fn set(&self, at: &KeyRef, value: &str) -> Result<()>;
    async fn delete(&self, at: &KeyRef) -> Result<()>;
}

#[async_trait]
impl<T: KeyedStore + ?Sized> KeyedStore for Arc<T> {
    async fn get(&self, at: &KeyRef) -> Result<Option<String>> { (**self).get(at).await }
    async fn set(&self, at: &KeyRef, value: &str) -> Result<()> { (**self).set(at, value).await }
    async fn delete(&self, at: &KeyRef) -> Result<()> { (**self).delete(at).await }
}

/// Settings for the outbound HTTP client of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub verbose: bool,
    pub insecure: bool,
    pub timeout: Duration,
}

impl TransportConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { verbose: false, insecure: false, timeout: Self::DEFAULT_TIMEOUT }
    }
}

/// Resolves a ProviderConfig name into transport settings.
#[async_trait]
pub trait TransportConfigSource: Send + Sync {
    async fn transport_config(&self, provider_config: &str) -> anyhow::Result<TransportConfig>;
}
