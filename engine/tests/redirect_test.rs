use std::sync::Arc;

use ruse_engine::driver::{BlockingDriver, CallbackDriver};
use ruse_engine::error::EngineError;
use ruse_engine::observer::{ObserverService, TOPIC_MODIFY};
use ruse_engine::policy::RedirectPolicy;
use ruse_engine::redirect::Redirector;
use ruse_engine::transport::Transport;
use ruse_servers::{
    BAIT_BODY, FixtureHandle, FixtureServer, MARKER_HEADER, MARKER_PRIMARY, MARKER_SECONDARY,
    SWITCH_BODY, bait_handler, server_redirect_handler, switch_handler,
};
use ruse_shared::http::HttpResponse;
use ruse_shared::uri::RUri;
use tokio::sync::oneshot;

async fn start_fixtures() -> (FixtureHandle, FixtureHandle) {
    let primary = FixtureServer::new();
    primary.register_handler("/bait", bait_handler());
    primary.register_handler("/bait2", bait_handler());
    primary.register_handler("/switch", switch_handler(MARKER_PRIMARY));
    primary.register_handler("/frog", server_redirect_handler("/bait".to_string()));

    let secondary = FixtureServer::new();
    secondary.register_handler("/switch", switch_handler(MARKER_SECONDARY));

    (
        primary.start_local().await.unwrap(),
        secondary.start_local().await.unwrap(),
    )
}

fn base_policy(primary: &FixtureHandle, secondary: &FixtureHandle) -> RedirectPolicy {
    RedirectPolicy::new()
        .with_rule(
            primary.uri_for("/bait").unwrap(),
            primary.uri_for("/switch").unwrap(),
        )
        .with_rule(
            primary.uri_for("/bait2").unwrap(),
            secondary.uri_for("/switch").unwrap(),
        )
}

struct TestContext {
    transport: Arc<Transport>,
    redirector: Arc<Redirector>,
    primary: FixtureHandle,
    _secondary: FixtureHandle,
}

impl TestContext {
    async fn with_host(host: ObserverService) -> Self {
        ruse_engine::init_test_logging();
        let (primary, secondary) = start_fixtures().await;
        let policy = Arc::new(base_policy(&primary, &secondary));
        let host = Arc::new(host);
        let redirector = Redirector::new(policy);
        redirector.register(&host).unwrap();
        let transport = Arc::new(Transport::new(host));
        TestContext {
            transport,
            redirector,
            primary,
            _secondary: secondary,
        }
    }

    async fn new() -> Self {
        Self::with_host(ObserverService::new()).await
    }

    async fn blocking_get(&self, path: &str) -> HttpResponse {
        let driver = BlockingDriver::new(self.transport.clone());
        let uri = self.primary.uri_for(path).unwrap();
        tokio::task::spawn_blocking(move || driver.get(uri))
            .await
            .unwrap()
            .unwrap()
    }

    async fn callback_get(&self, path: &str) -> HttpResponse {
        let driver = CallbackDriver::new(self.transport.clone());
        let uri = self.primary.uri_for(path).unwrap();
        let (tx, rx) = oneshot::channel();
        driver.open(
            uri,
            None,
            Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }),
        );
        rx.await.unwrap().unwrap()
    }
}

fn assert_marker(response: &HttpResponse, marker: &str, body: &str) {
    assert_eq!(response.status(), 200);
    assert_eq!(response.header_str(MARKER_HEADER), Some(marker));
    assert_eq!(response.body_str(), body);
}

#[tokio::test]
async fn blocking_same_origin_redirect() {
    let cxt = TestContext::new().await;
    let response = cxt.blocking_get("/bait").await;
    assert_marker(&response, MARKER_PRIMARY, SWITCH_BODY);
}

#[tokio::test]
async fn blocking_cross_origin_redirect() {
    let cxt = TestContext::new().await;
    let response = cxt.blocking_get("/bait2").await;
    assert_marker(&response, MARKER_SECONDARY, SWITCH_BODY);
}

#[tokio::test]
async fn callback_same_origin_redirect() {
    let cxt = TestContext::new().await;
    let response = cxt.callback_get("/bait").await;
    assert_marker(&response, MARKER_PRIMARY, SWITCH_BODY);
}

#[tokio::test]
async fn callback_cross_origin_redirect() {
    let cxt = TestContext::new().await;
    let response = cxt.callback_get("/bait2").await;
    assert_marker(&response, MARKER_SECONDARY, SWITCH_BODY);
}

#[tokio::test]
async fn drivers_agree_on_every_policy_entry() {
    let cxt = TestContext::new().await;
    for path in ["/bait", "/bait2"] {
        let blocking = cxt.blocking_get(path).await;
        let callback = cxt.callback_get(path).await;
        assert_eq!(
            blocking.header_str(MARKER_HEADER),
            callback.header_str(MARKER_HEADER),
            "marker diverged for {path}"
        );
        assert_eq!(blocking.body_str(), callback.body_str(), "body diverged for {path}");
    }
}

#[tokio::test]
async fn server_redirect_composes_with_script_redirect() {
    let cxt = TestContext::new().await;
    // /frog answers 302 to /bait; the follow re-enters the policy, so the
    // outcome must equal a direct request to /bait.
    let via_frog = cxt.blocking_get("/frog").await;
    let direct = cxt.blocking_get("/bait").await;
    assert_marker(&via_frog, MARKER_PRIMARY, SWITCH_BODY);
    assert_eq!(via_frog.body_str(), direct.body_str());
}

#[tokio::test]
async fn server_redirect_with_sink_registered() {
    let cxt = TestContext::new().await;
    cxt.transport.set_redirect_sink(cxt.redirector.clone());
    let response = cxt.callback_get("/frog").await;
    assert_marker(&response, MARKER_PRIMARY, SWITCH_BODY);
}

#[tokio::test]
async fn two_hop_script_chaining() {
    ruse_engine::init_test_logging();
    let (primary, secondary) = start_fixtures().await;
    // /prebait never has a handler; its rewrite happens before any bytes
    // move, and the second hop is decided by a fresh lifecycle event.
    let policy = base_policy(&primary, &secondary).with_rule(
        primary.uri_for("/prebait").unwrap(),
        primary.uri_for("/bait").unwrap(),
    );
    let host = Arc::new(ObserverService::new());
    let redirector = Redirector::new(Arc::new(policy));
    redirector.register(&host).unwrap();
    let transport = Arc::new(Transport::new(host));

    let response = transport.fetch(primary.uri_for("/prebait").unwrap()).await.unwrap();
    assert_marker(&response, MARKER_PRIMARY, SWITCH_BODY);
}

#[tokio::test]
async fn legacy_host_accepts_fallback_registration() {
    ruse_engine::init_test_logging();
    let (primary, secondary) = start_fixtures().await;
    let policy = Arc::new(base_policy(&primary, &secondary));
    let host = Arc::new(ObserverService::with_topics(&[TOPIC_MODIFY]));
    let redirector = Redirector::new(policy);
    let accepted = redirector.register(&host).unwrap();
    assert_eq!(accepted, TOPIC_MODIFY);

    let transport = Arc::new(Transport::new(host));
    let response = transport.fetch(primary.uri_for("/bait").unwrap()).await.unwrap();
    assert_marker(&response, MARKER_PRIMARY, SWITCH_BODY);
}

#[tokio::test]
async fn per_request_sink_override_redirects_one_channel_only() {
    ruse_engine::init_test_logging();
    let (primary, secondary) = start_fixtures().await;
    let policy = Arc::new(base_policy(&primary, &secondary));
    // Nothing subscribed at pre-send and no global sink: interception only
    // exists on channels that carry the override.
    let host = Arc::new(ObserverService::new());
    let redirector = Redirector::new(policy);
    let transport = Arc::new(Transport::new(host));
    let driver = CallbackDriver::new(transport.clone());

    let (tx, rx) = oneshot::channel();
    driver.open(
        primary.uri_for("/frog").unwrap(),
        Some(redirector.clone()),
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    );
    let with_override = rx.await.unwrap().unwrap();
    assert_marker(&with_override, MARKER_PRIMARY, SWITCH_BODY);

    let (tx, rx) = oneshot::channel();
    driver.open(
        primary.uri_for("/bait").unwrap(),
        None,
        Box::new(move |outcome| {
            let _ = tx.send(outcome);
        }),
    );
    let without_override = rx.await.unwrap().unwrap();
    assert_marker(&without_override, MARKER_PRIMARY, BAIT_BODY);
}

#[tokio::test]
async fn cyclic_policy_is_fatal() {
    ruse_engine::init_test_logging();
    let a: RUri = "http://127.0.0.1:4/a".parse().unwrap();
    let b: RUri = "http://127.0.0.1:4/b".parse().unwrap();
    let policy = Arc::new(
        RedirectPolicy::new()
            .with_rule(a.clone(), b.clone())
            .with_rule(b, a.clone()),
    );
    let host = Arc::new(ObserverService::new());
    Redirector::new(policy).register(&host).unwrap();
    let transport = Transport::new(host);

    let err = transport.fetch(a).await.unwrap_err();
    assert!(matches!(err, EngineError::RedirectLoop { .. }), "unexpected {err:?}");
}
