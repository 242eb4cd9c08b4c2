//! kube-runtime glue: watches `HttpRequest` objects, runs one pass per
//! trigger, keeps the finalizer, status conditions and events up to date.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fetchsync_core::{DeletionPolicy, HttpRequest, HttpRequestStatus};
use fetchsync_kubehub::{KubeProviderConfigs, KubeStore};
use futures::StreamExt;
use kube::api::{ListParams, Patch, PatchParams};
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::runtime::finalizer::{finalizer, Event as Finalizer};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Api, Client, Resource, ResourceExt};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::conditions::{self, set_condition};
use crate::connector::Connector;
use crate::external::SyncOutcome;
use crate::pass::{self, drive, Op, PassError, PassOutcome};

pub const FINALIZER: &str = "fetchsync.io/sink-cleanup";
const CONTROLLER_NAME: &str = "fetchsync-controller";

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Requeue delay once the sink is current.
    pub poll_interval: Duration,
    /// Requeue delay right after a Create or Update.
    pub sync_requeue: Duration,
    pub error_requeue: Duration,
    /// Upper bound for one pass, fetch included.
    pub pass_timeout: Duration,
    /// Client timeout for outbound requests.
    pub http_timeout: Duration,
    /// ProviderConfig used when a resource references none.
    pub default_provider_config: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            sync_requeue: Duration::from_secs(1),
            error_requeue: Duration::from_secs(15),
            pass_timeout: Duration::from_secs(60),
            http_timeout: Duration::from_secs(30),
            default_provider_config: "default".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Pass(#[from] PassError),

    #[error("pass exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("kube api error: {0}")]
    Kube(#[from] kube::Error),

    #[error("finalizer error: {0}")]
    Finalizer(#[source] Box<kube::runtime::finalizer::Error<ReconcileError>>),
}

pub struct Context {
    client: Client,
    connector: Connector<KubeStore>,
    settings: ControllerSettings,
    shutdown: CancellationToken,
    reporter: Reporter,
}

impl Context {
    pub fn new(client: Client, settings: ControllerSettings, shutdown: CancellationToken) -> Self {
        let configs = Arc::new(KubeProviderConfigs::new(client.clone(), settings.http_timeout));
        let connector = Connector::new(
            KubeStore::new(client.clone()),
            configs,
            settings.default_provider_config.clone(),
            settings.http_timeout,
        );
        let reporter = Reporter {
            controller: CONTROLLER_NAME.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self { client, connector, settings, shutdown, reporter }
    }

    /// Run `fut` under a child of the shutdown token and the pass deadline.
    async fn bounded<T, F, Fut>(&self, f: F) -> Result<T, ReconcileError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, PassError>>,
    {
        let cancel = self.shutdown.child_token();
        match tokio::time::timeout(self.settings.pass_timeout, f(cancel.clone())).await {
            Ok(res) => Ok(res?),
            Err(_) => {
                cancel.cancel();
                Err(ReconcileError::DeadlineExceeded(self.settings.pass_timeout))
            }
        }
    }

    async fn publish(&self, mr: &HttpRequest, type_: EventType, reason: &str, note: String, action: &str) {
        let recorder = Recorder::new(self.client.clone(), self.reporter.clone(), mr.object_ref(&()));
        let ev = Event {
            type_,
            reason: reason.to_string(),
            note: Some(note),
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = recorder.publish(ev).await {
            warn!(name = %mr.name_any(), reason, error = %e, "cannot publish event");
        }
    }

    async fn patch_status(&self, mr: &HttpRequest, status: HttpRequestStatus) -> Result<(), ReconcileError> {
        if mr.status.as_ref() == Some(&status) {
            return Ok(());
        }
        let api: Api<HttpRequest> = Api::all(self.client.clone());
        let patch = json!({ "status": status });
        api.patch_status(&mr.name_any(), &PatchParams::default(), &Patch::Merge(&patch)).await?;
        debug!(name = %mr.name_any(), "status updated");
        Ok(())
    }
}

fn stored_note(out: &SyncOutcome) -> String {
    format!(
        "HTTP remote content stored in configMap (url: {}, mimeType: {}, name: {}, namespace: {}, key: {})",
        out.url,
        out.content_type,
        out.observed.name.as_deref().unwrap_or_default(),
        out.observed.namespace.as_deref().unwrap_or_default(),
        out.observed.key.as_deref().unwrap_or_default(),
    )
}

/// Status after a pass. `Ready` turns `Unavailable` on any failure and stays
/// so until a pass finds the sink current again.
pub fn next_status(prev: Option<&HttpRequestStatus>, res: &Result<PassOutcome, ReconcileError>) -> HttpRequestStatus {
    let mut status = prev.cloned().unwrap_or_default();
    match res {
        Ok(PassOutcome::Created(_)) => {
            set_condition(&mut status.conditions, conditions::creating());
            set_condition(&mut status.conditions, conditions::reconcile_success());
        }
        Ok(PassOutcome::Updated(_)) => {
            set_condition(&mut status.conditions, conditions::reconcile_success());
        }
        Ok(PassOutcome::UpToDate(observed)) => {
            set_condition(&mut status.conditions, conditions::available());
            set_condition(&mut status.conditions, conditions::reconcile_success());
            status.at_provider = observed.clone();
        }
        Err(e) => {
            set_condition(&mut status.conditions, conditions::unavailable(e));
            set_condition(&mut status.conditions, conditions::reconcile_error(e));
        }
    }
    status
}

async fn apply(mr: Arc<HttpRequest>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let name = mr.name_any();
    let (c, m) = (&*ctx, &*mr);
    let res = ctx
        .bounded(|cancel| async move {
            let external = c.connector.connect(m).await.map_err(|e| PassError::new(Op::Connect, e))?;
            drive(&external, m, &cancel).await
        })
        .await;

    let status = next_status(mr.status.as_ref(), &res);
    let action = match &res {
        Ok(PassOutcome::Created(out)) | Ok(PassOutcome::Updated(out)) => {
            ctx.publish(&mr, EventType::Normal, "CreatedExternalResource", stored_note(out), "Sync").await;
            info!(name = %name, digest = %out.digest, bytes = out.bytes, "sink synced");
            Action::requeue(ctx.settings.sync_requeue)
        }
        Ok(PassOutcome::UpToDate(_)) => {
            debug!(name = %name, "sink up to date");
            Action::requeue(ctx.settings.poll_interval)
        }
        Err(e) => {
            if let ReconcileError::Pass(PassError { op: Op::Create | Op::Update, .. }) = e {
                ctx.publish(&mr, EventType::Warning, "CannotCreateExternalResource", e.to_string(), "Sync").await;
            }
            Action::requeue(ctx.settings.error_requeue)
        }
    };

    ctx.patch_status(&mr, status).await?;
    res.map(|_| action)
}

async fn cleanup(mr: Arc<HttpRequest>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let name = mr.name_any();
    if mr.spec.deletion_policy == DeletionPolicy::Orphan {
        info!(name = %name, "deletion policy is Orphan; leaving sink entry in place");
        return Ok(Action::await_change());
    }

    let mut status = mr.status.clone().unwrap_or_default();
    set_condition(&mut status.conditions, conditions::deleting());
    if let Err(e) = ctx.patch_status(&mr, status).await {
        debug!(name = %name, error = %e, "cannot mark resource as deleting");
    }

    let (c, m) = (&*ctx, &*mr);
    ctx.bounded(|cancel| async move {
        let external = c.connector.connect(m).await.map_err(|e| PassError::new(Op::Connect, e))?;
        pass::delete(&external, m, &cancel).await
    })
    .await?;

    let sink = mr.spec.for_provider.sink();
    ctx.publish(&mr, EventType::Normal, "DeletedExternalResource", format!("sink entry {} removed", sink), "Delete")
        .await;
    Ok(Action::await_change())
}

/// One reconcile trigger for `mr`.
pub async fn reconcile(mr: Arc<HttpRequest>, ctx: Arc<Context>) -> Result<Action, ReconcileError> {
    let api: Api<HttpRequest> = Api::all(ctx.client.clone());
    finalizer(&api, FINALIZER, mr, |event| async move {
        match event {
            Finalizer::Apply(mr) => apply(mr, ctx.clone()).await,
            Finalizer::Cleanup(mr) => cleanup(mr, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| ReconcileError::Finalizer(Box::new(e)))
}

pub fn error_policy(mr: Arc<HttpRequest>, err: &ReconcileError, ctx: Arc<Context>) -> Action {
    warn!(name = %mr.name_any(), error = %err, "reconcile failed");
    Action::requeue(ctx.settings.error_requeue)
}

fn report_reconciled<QueueErr: std::error::Error + 'static>(
    result: &Result<(ObjectRef<HttpRequest>, Action), controller::Error<ReconcileError, QueueErr>>,
) {
    match result {
        Ok((obj, action)) => debug!(object = %obj, ?action, "reconciled"),
        Err(err) => error!(error = err as &dyn std::error::Error, "failed to reconcile object"),
    }
}

/// Run the controller until SIGINT/SIGTERM.
pub async fn run(client: Client, settings: ControllerSettings) -> anyhow::Result<()> {
    let api: Api<HttpRequest> = Api::all(client.clone());
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        anyhow::bail!("HttpRequest CRD is not queryable ({e}); install it with `fetchsyncctl crd | kubectl apply -f -`");
    }

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    info!(
        poll_secs = settings.poll_interval.as_secs(),
        pass_timeout_secs = settings.pass_timeout.as_secs(),
        "starting HttpRequest controller"
    );
    let ctx = Arc::new(Context::new(client, settings, shutdown));
    Controller::new(api, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move { report_reconciled(&res) })
        .await;
    info!("controller stopped");
    Ok(())
}
