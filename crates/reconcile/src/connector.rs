use std::sync::Arc;
use std::time::Duration;

use fetchsync_core::{HttpRequest, KeyedStore, Result, TransportConfig, TransportConfigSource};
use fetchsync_request::Fetcher;
use tracing::{debug, info};

use crate::external::HttpRequestExternal;

/// Builds the per-pass [`HttpRequestExternal`] for a resource. A ProviderConfig
/// that cannot be read never fails the pass; the default transport is used.
pub struct Connector<S> {
    store: S,
    configs: Arc<dyn TransportConfigSource>,
    default_provider_config: String,
    timeout: Duration,
}

impl<S: KeyedStore + Clone + 'static> Connector<S> {
    pub fn new(
        store: S,
        configs: Arc<dyn TransportConfigSource>,
        default_provider_config: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self { store, configs, default_provider_config: default_provider_config.into(), timeout }
    }

    pub async fn transport_for(&self, mr: &HttpRequest) -> TransportConfig {
        let name = mr.provider_config_name().unwrap_or(&self.default_provider_config);
        match self.configs.transport_config(name).await {
            Ok(cfg) => {
                debug!(provider_config = name, "using referenced transport");
                cfg
            }
            Err(e) => {
                info!(provider_config = name, error = %format!("{:#}", e), "falling back to default transport");
                TransportConfig::default().with_timeout(self.timeout)
            }
        }
    }

    pub async fn connect(&self, mr: &HttpRequest) -> Result<HttpRequestExternal<S>> {
        let cfg = self.transport_for(mr).await;
        Ok(HttpRequestExternal::new(self.store.clone(), Fetcher::new(&cfg)?))
    }
}
