//! fetchsync kubehub: kube client bootstrap, ConfigMap/Secret keyed store and
//! ProviderConfig lookup.

#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fetchsync_core::{ProviderConfig, ProviderConfigSpec, TransportConfig, TransportConfigSource};
use kube::{Api, Client};
use tokio::sync::OnceCell;
use tracing::{debug, info};

mod keyed;

pub use keyed::KubeStore;

static CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Shared client built from the default kubeconfig / in-cluster environment.
pub async fn get_kube_client() -> Result<Client> {
    let client = CLIENT
        .get_or_try_init(|| async {
            let c = Client::try_default().await.context("building kube client from default config")?;
            info!(namespace = %c.default_namespace(), "kube client ready");
            Ok::<Client, anyhow::Error>(c)
        })
        .await?;
    Ok(client.clone())
}

pub fn transport_from_spec(spec: &ProviderConfigSpec, timeout: Duration) -> TransportConfig {
    TransportConfig {
        verbose: spec.verbose.unwrap_or(false),
        insecure: spec.insecure.unwrap_or(false),
        timeout,
    }
}

/// Reads cluster-scoped `ProviderConfig` objects.
#[derive(Clone)]
pub struct KubeProviderConfigs {
    client: Client,
    timeout: Duration,
}

impl KubeProviderConfigs {
    pub fn new(client: Client, timeout: Duration) -> Self { Self { client, timeout } }
}

#[async_trait]
impl TransportConfigSource for KubeProviderConfigs {
    async fn transport_config(&self, provider_config: &str) -> Result<TransportConfig> {
        let api: Api<ProviderConfig> = Api::all(self.client.clone());
        let pc = api
            .get(provider_config)
            .await
            .with_context(|| format!("cannot get referenced ProviderConfig {:?}", provider_config))?;
        let cfg = transport_from_spec(&pc.spec, self.timeout);
        debug!(provider_config, verbose = cfg.verbose, insecure = cfg.insecure, "provider config loaded");
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flags_mean_secure_and_quiet() {
        let cfg = transport_from_spec(&ProviderConfigSpec::default(), Duration::from_secs(5));
        assert_eq!(cfg, TransportConfig { verbose: false, insecure: false, timeout: Duration::from_secs(5) });

        let spec = ProviderConfigSpec { verbose: Some(true), insecure: Some(true) };
        let cfg = transport_from_spec(&spec, Duration::from_secs(5));
        assert!(cfg.verbose && cfg.insecure);
    }
}
