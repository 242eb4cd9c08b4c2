use std::sync::Arc;
use std::time::Duration;

use fetchsync_core::{
    Error, HttpRequest, HttpRequestParams, HttpRequestSpec, KeyRef, NamedValue, TransportConfig, ValueSelector,
};
use fetchsync_reconcile::{drive, ExternalClient, HttpRequestExternal, Observation, Op, PassOutcome};
use fetchsync_request::Fetcher;
use fetchsync_store::MemStore;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sink_selector() -> ValueSelector {
    ValueSelector { name: "cm1".into(), namespace: "ns".into(), key: "data".into() }
}

fn sink() -> KeyRef { KeyRef::config_map(&sink_selector()) }

fn resource(url: String, headers: Vec<NamedValue>) -> HttpRequest {
    HttpRequest::new(
        "fetch-a",
        HttpRequestSpec {
            for_provider: HttpRequestParams {
                url,
                method: None,
                params: vec![],
                headers,
                write_response_to_config_map: sink_selector(),
            },
            provider_config_ref: None,
            deletion_policy: Default::default(),
        },
    )
}

fn external(store: &Arc<MemStore>) -> HttpRequestExternal<Arc<MemStore>> {
    let fetcher = Fetcher::new(&TransportConfig::default().with_timeout(Duration::from_secs(5))).unwrap();
    HttpRequestExternal::new(store.clone(), fetcher)
}

async fn serve(body: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn scenario_a_absent_sink_is_not_drift() {
    let server = MockServer::start().await;
    let store = Arc::new(MemStore::new());
    let mr = resource(format!("{}/a", server.uri()), vec![]);

    let obs = external(&store).observe(&mr, &CancellationToken::new()).await.unwrap();
    assert_eq!(obs, Observation::absent());
    // Absent sinks are reported without touching the remote.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_sink_value_counts_as_absent() {
    let server = serve("hello").await;
    let store = Arc::new(MemStore::new().with_entry(&sink(), ""));
    let mr = resource(format!("{}/a", server.uri()), vec![]);

    let obs = external(&store).observe(&mr, &CancellationToken::new()).await.unwrap();
    assert!(!obs.resource_exists);
    assert!(obs.resource_up_to_date);
}

#[tokio::test]
async fn scenario_b_matching_content_is_up_to_date() {
    let server = serve("hello").await;
    let store = Arc::new(MemStore::new().with_entry(&sink(), "hello"));
    let mr = resource(format!("{}/a", server.uri()), vec![]);

    let obs = external(&store).observe(&mr, &CancellationToken::new()).await.unwrap();
    assert!(obs.resource_exists && obs.resource_up_to_date);
    let observed = obs.observed.unwrap();
    assert_eq!(observed.target.as_deref(), Some("ConfigMap"));
    assert_eq!(observed.name.as_deref(), Some("cm1"));
    assert_eq!(observed.namespace.as_deref(), Some("ns"));
    assert_eq!(observed.key.as_deref(), Some("data"));
}

#[tokio::test]
async fn scenario_c_drift_then_update_overwrites() {
    let server = serve("world").await;
    let store = Arc::new(MemStore::new().with_entry(&sink(), "hello"));
    let mr = resource(format!("{}/a", server.uri()), vec![]);
    let ext = external(&store);
    let cancel = CancellationToken::new();

    assert_eq!(ext.observe(&mr, &cancel).await.unwrap(), Observation::drifted());
    ext.update(&mr, &cancel).await.unwrap();
    assert_eq!(store.peek(&sink()).as_deref(), Some("world"));
    assert!(ext.observe(&mr, &cancel).await.unwrap().resource_up_to_date);
}

#[tokio::test]
async fn scenario_d_missing_secret_header_uses_literal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .and(header("x-api-key", "default"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemStore::new());
    let key = NamedValue {
        name: "X-Api-Key".into(),
        secret_ref: Some(ValueSelector { name: "absent".into(), namespace: "ns".into(), key: "k".into() }),
        value: Some("default".into()),
        ..Default::default()
    };
    let mr = resource(format!("{}/a", server.uri()), vec![key]);
    external(&store).create(&mr, &CancellationToken::new()).await.unwrap();
    assert_eq!(store.peek(&sink()).as_deref(), Some("ok"));
}

#[tokio::test]
async fn scenario_e_not_found_leaves_sink_untouched() {
    let server = MockServer::start().await;
    Mock::given(path("/a")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
    let store = Arc::new(MemStore::new().with_entry(&sink(), "previous"));
    let mr = resource(format!("{}/a", server.uri()), vec![]);
    let ext = external(&store);
    let cancel = CancellationToken::new();
    let epoch = store.epoch();

    for res in [ext.create(&mr, &cancel).await, ext.update(&mr, &cancel).await] {
        assert!(matches!(res, Err(Error::UnexpectedStatus { status: 404, .. })));
    }
    assert_eq!(store.peek(&sink()).as_deref(), Some("previous"));
    assert_eq!(store.epoch(), epoch);
}

#[tokio::test]
async fn scenario_f_delete_absent_entry_succeeds() {
    let store = Arc::new(MemStore::new());
    let mr = resource("https://example.invalid/a".into(), vec![]);
    let ext = external(&store);
    let cancel = CancellationToken::new();

    ext.delete(&mr, &cancel).await.unwrap();
    store.insert(&sink(), "x");
    ext.delete(&mr, &cancel).await.unwrap();
    assert_eq!(store.peek(&sink()), None);
}

#[tokio::test]
async fn create_twice_is_idempotent() {
    let server = serve("same").await;
    let store = Arc::new(MemStore::new());
    let mr = resource(format!("{}/a", server.uri()), vec![]);
    let ext = external(&store);
    let cancel = CancellationToken::new();

    let first = ext.create(&mr, &cancel).await.unwrap();
    let once = store.peek(&sink());
    let second = ext.create(&mr, &cancel).await.unwrap();
    assert_eq!(store.peek(&sink()), once);
    assert_eq!(first.digest, second.digest);
}

#[tokio::test]
async fn non_utf8_body_round_trips_as_up_to_date() {
    let server = MockServer::start().await;
    Mock::given(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x66u8, 0xff, 0x6f]))
        .mount(&server)
        .await;
    let store = Arc::new(MemStore::new());
    let mr = resource(format!("{}/a", server.uri()), vec![]);
    let ext = external(&store);
    let cancel = CancellationToken::new();

    ext.create(&mr, &cancel).await.unwrap();
    let obs = ext.observe(&mr, &cancel).await.unwrap();
    assert!(obs.resource_exists && obs.resource_up_to_date);
}

#[tokio::test]
async fn drive_walks_create_then_steady_state() {
    let server = serve("payload").await;
    let store = Arc::new(MemStore::new());
    let mr = resource(format!("{}/a", server.uri()), vec![]);
    let ext = external(&store);
    let cancel = CancellationToken::new();

    match drive(&ext, &mr, &cancel).await.unwrap() {
        PassOutcome::Created(out) => {
            assert_eq!(out.bytes, 7);
            assert_eq!(out.content_type, "text/plain; charset=utf-8");
        }
        other => panic!("expected create, got {other:?}"),
    }
    match drive(&ext, &mr, &cancel).await.unwrap() {
        PassOutcome::UpToDate(observed) => assert_eq!(observed.key.as_deref(), Some("data")),
        other => panic!("expected steady state, got {other:?}"),
    }

    store.insert(&sink(), "tampered");
    assert!(matches!(drive(&ext, &mr, &cancel).await.unwrap(), PassOutcome::Updated(_)));
    assert_eq!(store.peek(&sink()).as_deref(), Some("payload"));
}

#[tokio::test]
async fn drive_reports_failing_step() {
    let server = serve("fresh").await;
    let store = Arc::new(MemStore::new());
    store.fail_writes(true);
    let mr = resource(format!("{}/a", server.uri()), vec![]);

    let err = drive(&external(&store), &mr, &CancellationToken::new()).await.unwrap_err();
    assert_eq!(err.op, Op::Create);
    assert!(matches!(err.error, Error::StoreWriteFailed { .. }));
}

#[tokio::test]
async fn cancelled_pass_writes_nothing() {
    let server = serve("late").await;
    let store = Arc::new(MemStore::new());
    let mr = resource(format!("{}/a", server.uri()), vec![]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = drive(&external(&store), &mr, &cancel).await.unwrap_err();
    assert_eq!(err.op, Op::Observe);
    assert!(matches!(err.error, Error::Cancelled));
    assert_eq!(store.peek(&sink()), None);
}
