//! One reconciliation pass: Observe, then Create or Update when needed.

use std::fmt;

use fetchsync_core::{Error, HttpRequest, HttpRequestObservation};
use metrics::counter;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::external::{ExternalClient, SyncOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Connect,
    Observe,
    Create,
    Update,
    Delete,
}

impl Op {
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Connect => "connect",
            Op::Observe => "observe",
            Op::Create => "create",
            Op::Update => "update",
            Op::Delete => "delete",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A failed step of a pass.
#[derive(Debug, thiserror::Error)]
#[error("{op} failed: {error}")]
pub struct PassError {
    pub op: Op,
    #[source]
    pub error: Error,
}

impl PassError {
    pub fn new(op: Op, error: Error) -> Self { Self { op, error } }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Created(SyncOutcome),
    Updated(SyncOutcome),
    UpToDate(HttpRequestObservation),
}

fn record<T>(op: Op, res: Result<T, Error>) -> Result<T, PassError> {
    match res {
        Ok(v) => {
            counter!("reconcile_total", 1, "op" => op.as_str(), "outcome" => "ok");
            Ok(v)
        }
        Err(e) => {
            counter!("reconcile_total", 1, "op" => op.as_str(), "outcome" => e.kind());
            Err(PassError::new(op, e))
        }
    }
}

/// Drive `external` through one pass for `mr`. Absent sinks are created,
/// drifted sinks are overwritten, current sinks are left alone.
pub async fn drive<E: ExternalClient + ?Sized>(
    external: &E,
    mr: &HttpRequest,
    cancel: &CancellationToken,
) -> Result<PassOutcome, PassError> {
    let obs = record(Op::Observe, external.observe(mr, cancel).await)?;
    if !obs.resource_exists {
        debug!("sink absent; creating");
        let out = record(Op::Create, external.create(mr, cancel).await)?;
        return Ok(PassOutcome::Created(out));
    }
    if !obs.resource_up_to_date {
        debug!("sink drifted; updating");
        let out = record(Op::Update, external.update(mr, cancel).await)?;
        return Ok(PassOutcome::Updated(out));
    }
    Ok(PassOutcome::UpToDate(obs.observed.unwrap_or_default()))
}

/// Remove the sink entry of `mr`.
pub async fn delete<E: ExternalClient + ?Sized>(
    external: &E,
    mr: &HttpRequest,
    cancel: &CancellationToken,
) -> Result<(), PassError> {
    record(Op::Delete, external.delete(mr, cancel).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_error_names_the_step() {
        let e = PassError::new(Op::Update, Error::UnexpectedStatus { status: 503, url: "http://x/".into() });
        let msg = e.to_string();
        assert!(msg.starts_with("update failed: "), "{msg}");
        assert!(msg.contains("503"), "{msg}");
    }
}
