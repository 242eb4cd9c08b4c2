use std::time::Instant;

use bytes::Bytes;
use fetchsync_core::{with_cancel, Error, Result, TransportConfig};
use metrics::{counter, histogram};
use reqwest::{Client, Method};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::builder::ResolvedRequest;
use crate::sniff::content_type;

/// Executes resolved requests: one attempt, no retries, transport-default
/// redirect handling.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    verbose: bool,
}

fn transport(url: &str, e: reqwest::Error) -> Error {
    Error::Transport { url: url.to_string(), source: Box::new(e) }
}

fn normalize_method(raw: &str) -> Result<Method> {
    let m = raw.trim().to_ascii_uppercase();
    if m.is_empty() {
        return Err(Error::InvalidMethod(raw.to_string()));
    }
    Method::from_bytes(m.as_bytes()).map_err(|_| Error::InvalidMethod(raw.to_string()))
}

impl Fetcher {
    pub fn new(cfg: &TransportConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .danger_accept_invalid_certs(cfg.insecure)
            .build()
            .map_err(|e| transport("<client>", e))?;
        Ok(Self { client, verbose: cfg.verbose })
    }

    /// Issue `req` once. Any status outside 200..300 is `UnexpectedStatus`; an
    /// empty body is a successful empty result.
    pub async fn fetch(&self, req: &ResolvedRequest, cancel: &CancellationToken) -> Result<Bytes> {
        let method = normalize_method(&req.method)?;
        let url = req.url.as_str();
        let t0 = Instant::now();
        if self.verbose {
            let names: Vec<&str> = req.headers.keys().map(|k| k.as_str()).collect();
            info!(method = %method, url = %url, headers = ?names, "http request");
        }

        let res = with_cancel(cancel, async {
            let rsp = self
                .client
                .request(method.clone(), req.url.clone())
                .headers(req.headers.clone())
                .send()
                .await
                .map_err(|e| transport(url, e))?;
            let status = rsp.status();
            if !status.is_success() {
                return Err(Error::UnexpectedStatus { status: status.as_u16(), url: url.to_string() });
            }
            let body = rsp.bytes().await.map_err(|e| transport(url, e))?;
            Ok((status, body))
        })
        .await;

        histogram!("fetch_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        match res {
            Ok((status, body)) => {
                counter!("fetch_total", 1, "outcome" => "ok");
                if self.verbose {
                    info!(method = %method, url = %url, status = status.as_u16(), bytes = body.len(), content_type = content_type(&body), took_ms = %t0.elapsed().as_millis(), "http response");
                } else {
                    debug!(url = %url, status = status.as_u16(), bytes = body.len(), "fetched");
                }
                Ok(body)
            }
            Err(e) => {
                counter!("fetch_total", 1, "outcome" => e.kind());
                debug!(url = %url, error = %e, took_ms = %t0.elapsed().as_millis(), "fetch failed");
                Err(e)
            }
        }
    }
}
