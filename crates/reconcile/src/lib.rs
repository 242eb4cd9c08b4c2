//! fetchsync reconcile: the Observe/Create/Update/Delete lifecycle for
//! `HttpRequest` resources and the kube-runtime controller that drives it.
//!
//! The lifecycle is level-triggered. Nothing is remembered between passes:
//! every Observe re-reads the sink and re-fetches the remote content.

#![forbid(unsafe_code)]

pub mod conditions;
pub mod connector;
pub mod controller;
pub mod external;
pub mod pass;

pub use connector::Connector;
pub use controller::{next_status, run, ControllerSettings, ReconcileError, FINALIZER};
pub use external::{ExternalClient, Fetched, HttpRequestExternal, Observation, SyncOutcome};
pub use pass::{drive, Op, PassError, PassOutcome};
