//! The external-resource client: what "exists", "up to date", "create",
//! "update" and "delete" mean for an `HttpRequest`.
//!
//! The external resource is the sink entry named by
//! `spec.forProvider.writeResponseToConfigMap`. It exists when the entry holds
//! a non-empty value, and it is up to date when that value digests the same as
//! a fresh fetch of the remote content.

use async_trait::async_trait;
use bytes::Bytes;
use fetchsync_core::{
    digest, equal, stored_text, with_cancel, Digest, HttpRequest, HttpRequestObservation,
    HttpRequestParams, KeyedStore, Result,
};
use fetchsync_request::{build, content_type, Fetcher, SkippedEntry, ValueResolver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

/// Result of one Observe step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    pub resource_exists: bool,
    pub resource_up_to_date: bool,
    /// Filled only when the sink is current.
    pub observed: Option<HttpRequestObservation>,
}

impl Observation {
    /// Sink empty or absent. `resource_up_to_date` is vacuously true.
    pub fn absent() -> Self {
        Self { resource_exists: false, resource_up_to_date: true, observed: None }
    }

    pub fn drifted() -> Self {
        Self { resource_exists: true, resource_up_to_date: false, observed: None }
    }

    pub fn current(observed: HttpRequestObservation) -> Self {
        Self { resource_exists: true, resource_up_to_date: true, observed: Some(observed) }
    }
}

/// Remote content of one fetch together with what the builder left out.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: Url,
    pub method: String,
    pub body: Bytes,
    pub skipped: Vec<SkippedEntry>,
}

impl Fetched {
    pub fn content_type(&self) -> &'static str { content_type(&self.body) }

    /// Digest over the form the body takes once stored.
    pub fn digest(&self) -> Digest { digest(stored_text(&self.body)) }
}

/// Summary of a Create or Update, used for events and logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub url: String,
    pub content_type: &'static str,
    pub bytes: usize,
    pub digest: Digest,
    pub observed: HttpRequestObservation,
}

#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn observe(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<Observation>;
    async fn create(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<SyncOutcome>;
    async fn update(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<SyncOutcome>;
    async fn delete(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<()>;
}

/// [`ExternalClient`] backed by a keyed store (lookups and sink) and a
/// [`Fetcher`]. Built once per pass by the connector.
pub struct HttpRequestExternal<S> {
    store: S,
    fetcher: Fetcher,
}

impl<S: KeyedStore + 'static> HttpRequestExternal<S> {
    pub fn new(store: S, fetcher: Fetcher) -> Self { Self { store, fetcher } }

    /// Resolve, build and execute the request described by `params`.
    pub async fn fetch_remote(&self, params: &HttpRequestParams, cancel: &CancellationToken) -> Result<Fetched> {
        let built = build(params, &ValueResolver::new(&self.store), cancel).await?;
        let body = self.fetcher.fetch(&built.request, cancel).await?;
        Ok(Fetched {
            url: built.request.url,
            method: built.request.method,
            body,
            skipped: built.skipped,
        })
    }

    /// Create and Update share this: fetch, then overwrite the sink entry.
    async fn sync(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<SyncOutcome> {
        let params = mr.spec.for_provider.clone();
        let fetched = self.fetch_remote(&params, cancel).await?;
        let sink = params.sink();
        let text = stored_text(&fetched.body);
        with_cancel(cancel, self.store.set(&sink, &text)).await?;

        let outcome = SyncOutcome {
            url: fetched.url.to_string(),
            content_type: fetched.content_type(),
            bytes: fetched.body.len(),
            digest: digest(&text),
            observed: params.observation(),
        };
        info!(
            url = %outcome.url,
            content_type = outcome.content_type,
            bytes = outcome.bytes,
            sink = %sink,
            "remote content stored"
        );
        Ok(outcome)
    }
}

#[async_trait]
impl<S: KeyedStore + 'static> ExternalClient for HttpRequestExternal<S> {
    async fn observe(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<Observation> {
        let params = &mr.spec.for_provider;
        let sink = params.sink();
        let stored = match with_cancel(cancel, self.store.get(&sink)).await? {
            Some(v) if !v.is_empty() => v,
            _ => {
                debug!(sink = %sink, "sink entry absent");
                return Ok(Observation::absent());
            }
        };

        let fetched = self.fetch_remote(params, cancel).await?;
        let (have, want) = (digest(&stored), fetched.digest());
        if !equal(&have, &want) {
            debug!(sink = %sink, stored = %have, remote = %want, "sink content drifted");
            return Ok(Observation::drifted());
        }
        Ok(Observation::current(params.observation()))
    }

    async fn create(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<SyncOutcome> {
        self.sync(mr, cancel).await
    }

    async fn update(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<SyncOutcome> {
        self.sync(mr, cancel).await
    }

    async fn delete(&self, mr: &HttpRequest, cancel: &CancellationToken) -> Result<()> {
        let sink = mr.spec.for_provider.sink();
        with_cancel(cancel, self.store.delete(&sink)).await?;
        info!(sink = %sink, "sink entry removed");
        Ok(())
    }
}
