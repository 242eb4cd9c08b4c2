use fetchsync_core::{Error, HttpRequestParams, KeyedStore, NamedValue, Result};
use metrics::counter;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::resolver::ValueResolver;

/// A request ready for transport. Produced fresh for every pass.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub url: Url,
    /// Method as declared; normalisation happens in the fetcher.
    pub method: String,
    pub headers: HeaderMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Param,
    Header,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Param => "param",
            Section::Header => "header",
        }
    }
}

/// A param or header left out of the request, with the reason.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedEntry {
    pub section: Section,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct BuiltRequest {
    pub request: ResolvedRequest,
    pub skipped: Vec<SkippedEntry>,
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidUrl { url: raw.to_string(), reason: e.to_string() })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(Error::InvalidUrl { url: raw.to_string(), reason: format!("unsupported scheme {:?}", other) }),
    }
}

fn skip(skipped: &mut Vec<SkippedEntry>, section: Section, name: &str, reason: String) {
    warn!(section = section.as_str(), name = %name, reason = %reason, "skipping unresolved entry");
    counter!("resolve_skipped_total", 1, "section" => section.as_str());
    skipped.push(SkippedEntry { section, name: name.to_string(), reason });
}

async fn resolve_entry<S: KeyedStore + ?Sized>(
    resolver: &ValueResolver<'_, S>,
    nv: &NamedValue,
    section: Section,
    skipped: &mut Vec<SkippedEntry>,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    if nv.name.is_empty() {
        skip(skipped, section, &nv.name, "empty name".into());
        return Ok(None);
    }
    match resolver.resolve(nv, cancel).await {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_contained() => {
            skip(skipped, section, &nv.name, e.to_string());
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Assemble the request for `spec`. Params and headers are resolved one at a
/// time in declared order. An entry that fails to resolve is dropped and
/// recorded in [`BuiltRequest::skipped`]; only a bad url or a fatal error
/// (cancellation) aborts the build. No network I/O besides store lookups.
pub async fn build<S: KeyedStore + ?Sized>(
    spec: &HttpRequestParams,
    resolver: &ValueResolver<'_, S>,
    cancel: &CancellationToken,
) -> Result<BuiltRequest> {
    let mut url = parse_url(&spec.url)?;
    let mut skipped = Vec::new();

    // Repeated names are kept: params append, they never replace.
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(spec.params.len());
    for nv in &spec.params {
        if let Some(v) = resolve_entry(resolver, nv, Section::Param, &mut skipped, cancel).await? {
            pairs.push((nv.name.clone(), v));
        }
    }
    if !pairs.is_empty() {
        let mut q = url.query_pairs_mut();
        for (k, v) in &pairs {
            q.append_pair(k, v);
        }
    }

    // Headers use set semantics: a later duplicate replaces the earlier one.
    let mut headers = HeaderMap::new();
    for nv in &spec.headers {
        let Some(v) = resolve_entry(resolver, nv, Section::Header, &mut skipped, cancel).await? else { continue };
        let name = match HeaderName::from_bytes(nv.name.as_bytes()) {
            Ok(n) => n,
            Err(e) => {
                skip(&mut skipped, Section::Header, &nv.name, format!("invalid header name: {}", e));
                continue;
            }
        };
        let value = match HeaderValue::from_str(&v) {
            Ok(hv) => hv,
            Err(e) => {
                skip(&mut skipped, Section::Header, &nv.name, format!("invalid header value: {}", e));
                continue;
            }
        };
        headers.insert(name, value);
    }

    let method = spec.method().to_string();
    debug!(url = %url, method = %method, headers = headers.len(), skipped = skipped.len(), "request built");
    Ok(BuiltRequest { request: ResolvedRequest { url, method, headers }, skipped })
}
