//! Integration tests for the hopper monitor.
//!
//! These tests run the real HTTP clients against local fakes of the
//! StokerCloud dataout endpoints and an ntfy server.
//! Run with: cargo test --test integration

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pretty_assertions::assert_eq;
use serde_json::json;
use time::macros::datetime;
use time::OffsetDateTime;

use hopper_monitor::config::Config;
use hopper_monitor::monitor::{CycleOutcome, Monitor};
use hopper_monitor::notify::NtfyClient;
use hopper_monitor::error::StokerError;
use hopper_monitor::stoker::{HopperSource, SessionClient, StokerApi, StokerCloudClient};

const NOW: OffsetDateTime = datetime!(2024-11-20 06:00 UTC);

/// A request received by the fake ntfy server.
#[derive(Debug, Clone)]
struct Published {
    body: String,
    title: Option<String>,
    priority: Option<String>,
    tags: Option<String>,
    authorization: Option<String>,
}

/// Shared state of the fake servers.
#[derive(Clone)]
struct Fake {
    logins: Arc<AtomicU32>,
    terms: Arc<AtomicU32>,
    fetches: Arc<AtomicU32>,
    valid_token: Arc<Mutex<Option<String>>>,
    levels: Arc<Mutex<VecDeque<String>>>,
    reject_next: Arc<AtomicU32>,
    reject_status: Arc<AtomicU16>,
    terms_status: Arc<AtomicU16>,
    hopperdata_only: Arc<AtomicBool>,
    ntfy_status: Arc<AtomicU16>,
    published: Arc<Mutex<Vec<Published>>>,
}

impl Fake {
    fn new() -> Self {
        Self {
            logins: Arc::new(AtomicU32::new(0)),
            terms: Arc::new(AtomicU32::new(0)),
            fetches: Arc::new(AtomicU32::new(0)),
            valid_token: Arc::new(Mutex::new(None)),
            levels: Arc::new(Mutex::new(VecDeque::new())),
            reject_next: Arc::new(AtomicU32::new(0)),
            reject_status: Arc::new(AtomicU16::new(200)),
            terms_status: Arc::new(AtomicU16::new(200)),
            hopperdata_only: Arc::new(AtomicBool::new(false)),
            ntfy_status: Arc::new(AtomicU16::new(200)),
            published: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn push_levels(&self, levels: &[&str]) {
        let mut queue = self.levels.lock().unwrap();
        queue.extend(levels.iter().map(|l| l.to_string()));
    }

    fn reject_next(&self, count: u32) {
        self.reject_next.store(count, Ordering::SeqCst);
    }

    /// Answer rejected fetches with `status` instead of a `notloggedin` body.
    fn set_reject_status(&self, status: u16) {
        self.reject_status.store(status, Ordering::SeqCst);
    }

    fn set_terms_status(&self, status: u16) {
        self.terms_status.store(status, Ordering::SeqCst);
    }

    fn serve_hopperdata_only(&self) {
        self.hopperdata_only.store(true, Ordering::SeqCst);
    }

    fn set_ntfy_status(&self, status: u16) {
        self.ntfy_status.store(status, Ordering::SeqCst);
    }

    fn logins(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    fn terms(&self) -> u32 {
        self.terms.load(Ordering::SeqCst)
    }

    fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }
}

async fn login(State(fake): State<Fake>, Query(params): Query<HashMap<String, String>>) -> Response {
    let user = params.get("user").map(String::as_str);
    let password = params.get("password").map(String::as_str);
    if user != Some("boiler") || password != Some("secret") {
        return Json(json!({"status": "wrong user or password"})).into_response();
    }

    let n = fake.logins.fetch_add(1, Ordering::SeqCst) + 1;
    let token = format!("tok-{}", n);
    *fake.valid_token.lock().unwrap() = Some(token.clone());

    Json(json!({"token": token})).into_response()
}

fn status(code: &AtomicU16) -> StatusCode {
    StatusCode::from_u16(code.load(Ordering::SeqCst)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn accept_terms(State(fake): State<Fake>) -> Response {
    fake.terms.fetch_add(1, Ordering::SeqCst);
    (status(&fake.terms_status), "OK").into_response()
}

async fn controller_data(
    State(fake): State<Fake>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    fake.fetches.fetch_add(1, Ordering::SeqCst);

    if params.get("screen").map_or(true, |s| s.is_empty()) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let valid = fake.valid_token.lock().unwrap().clone();
    if params.get("token") != valid.as_ref() {
        return Json(json!({"notloggedin": 1})).into_response();
    }

    let pending = fake.reject_next.load(Ordering::SeqCst);
    if pending > 0 {
        fake.reject_next.store(pending - 1, Ordering::SeqCst);
        let code = status(&fake.reject_status);
        if code != StatusCode::OK {
            return code.into_response();
        }
        return Json(json!({"notloggedin": 1})).into_response();
    }

    let level = fake.levels.lock().unwrap().pop_front();
    match level {
        Some(level) if fake.hopperdata_only.load(Ordering::SeqCst) => Json(json!({
            "frontdata": [{"id": "boilertemp", "value": "71,5"}],
            "hopperdata": [
                {"id": "3", "unit": "LNG_PCT", "value": "19"},
                {"id": "3", "unit": "LNG_KG", "value": level}
            ]
        }))
        .into_response(),
        Some(level) => Json(json!({
            "frontdata": [
                {"id": "boilertemp", "value": "71,5"},
                {"id": "hoppercontent", "value": level}
            ],
            "hopperdata": []
        }))
        .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn publish(State(fake): State<Fake>, headers: HeaderMap, body: String) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let code = status(&fake.ntfy_status);
    if code == StatusCode::OK {
        fake.published.lock().unwrap().push(Published {
            body,
            title: header("title"),
            priority: header("priority"),
            tags: header("tags"),
            authorization: header("authorization"),
        });
    }

    code.into_response()
}

/// Start the fakes on an ephemeral port.
async fn start_fake() -> (Fake, SocketAddr) {
    let fake = Fake::new();
    let app = Router::new()
        .route("/v2/dataout2/login.php", post(login))
        .route("/v2/dataout2/acceptterms.php", get(accept_terms))
        .route("/v2/dataout2/controllerdata2.php", get(controller_data))
        .route("/ntfy/hopper", post(publish))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (fake, addr)
}

fn test_config(addr: SocketAddr, extra: &[(&str, &str)]) -> Config {
    let base = format!("http://{}", addr);
    let mut pairs: BTreeMap<String, String> = [
        ("STOKERCLOUD_USER".to_string(), "boiler".to_string()),
        ("STOKERCLOUD_PASSWORD".to_string(), "secret".to_string()),
        (
            "STOKERCLOUD_LOGIN_URL".to_string(),
            format!("{}/v2/dataout2/login.php", base),
        ),
        (
            "STOKERCLOUD_ACCEPT_TERMS_URL".to_string(),
            format!("{}/v2/dataout2/acceptterms.php", base),
        ),
        (
            "STOKERCLOUD_CONTROLLERDATA_URL".to_string(),
            format!("{}/v2/dataout2/controllerdata2.php", base),
        ),
        ("NTFY_SERVER".to_string(), format!("{}/ntfy/", base)),
        ("NTFY_TOPIC".to_string(), "hopper".to_string()),
        ("LOW_THRESHOLD_KG".to_string(), "100".to_string()),
        ("MAX_CAPACITY_KG".to_string(), "500".to_string()),
        ("HTTP_TIMEOUT_SECS".to_string(), "5".to_string()),
    ]
    .into_iter()
    .collect();
    for (k, v) in extra {
        pairs.insert(k.to_string(), v.to_string());
    }

    let config = Config::from_iter(pairs).unwrap();
    config.validate().unwrap();
    config
}

fn build_monitor(config: &Config) -> Monitor<StokerCloudClient, NtfyClient> {
    let stoker = StokerCloudClient::new(config).unwrap();
    let ntfy = NtfyClient::new(config).unwrap();
    Monitor::new(SessionClient::new(stoker), ntfy, config)
}

#[tokio::test]
async fn ok_level_sends_no_alert() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["122,0"]);
    let mut monitor = build_monitor(&test_config(addr, &[]));

    let outcome = monitor.tick(NOW).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Ok(_)));
    assert_eq!(outcome.report().kg, 122.0);
    assert!((outcome.report().percent.unwrap() - 24.4).abs() < 1e-9);
    assert_eq!(fake.logins(), 1);
    assert_eq!(fake.terms(), 1);
    assert!(fake.published().is_empty());
}

#[tokio::test]
async fn low_level_publishes_alert_with_headers() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["80,0"]);
    let mut monitor = build_monitor(&test_config(addr, &[]));

    let outcome = monitor.tick(NOW).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::AlertSent(_)));
    let published = fake.published();
    assert_eq!(published.len(), 1);
    assert_eq!(
        published[0].body,
        "Hopper low: 80.0 kg remaining (16.0% of capacity). Threshold: 100.0 kg."
    );
    assert_eq!(published[0].title.as_deref(), Some("Stoker hopper low"));
    assert_eq!(published[0].priority.as_deref(), Some("4"));
    assert_eq!(published[0].tags.as_deref(), Some("warning,fire"));
    assert_eq!(published[0].authorization, None);
}

#[tokio::test]
async fn sustained_low_level_is_throttled() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["80,0", "79,0", "78,0"]);
    let config = test_config(addr, &[("MIN_ALERT_INTERVAL_MIN", "10")]);
    let mut monitor = build_monitor(&config);

    monitor.tick(NOW).await.unwrap();
    let second = monitor.tick(NOW + time::Duration::minutes(5)).await.unwrap();
    let third = monitor.tick(NOW + time::Duration::minutes(10)).await.unwrap();

    assert!(matches!(second, CycleOutcome::AlertSuppressed { .. }));
    assert!(matches!(third, CycleOutcome::AlertSent(_)));
    assert_eq!(fake.published().len(), 2);
}

#[tokio::test]
async fn rejected_token_is_renewed_within_the_cycle() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["150,0", "149,5"]);
    let mut monitor = build_monitor(&test_config(addr, &[]));
    monitor.tick(NOW).await.unwrap();

    fake.reject_next(1);
    let outcome = monitor.tick(NOW).await.unwrap();

    assert_eq!(outcome.report().kg, 149.5);
    assert_eq!(fake.logins(), 2);
    assert_eq!(fake.terms(), 2);
}

#[tokio::test]
async fn repeated_rejection_fails_only_this_cycle() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["150,0", "149,0"]);
    let mut monitor = build_monitor(&test_config(addr, &[]));
    monitor.tick(NOW).await.unwrap();

    fake.reject_next(2);
    let err = monitor.tick(NOW).await.unwrap_err();
    assert_eq!(err.step(), "token");
    assert_eq!(fake.logins(), 2);

    let outcome = monitor.tick(NOW).await.unwrap();
    assert_eq!(outcome.report().kg, 149.0);
    assert_eq!(fake.logins(), 3);
}

#[tokio::test]
async fn ntfy_failure_is_contained_and_retried() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["60,0", "59,0"]);
    fake.set_ntfy_status(500);
    let mut monitor = build_monitor(&test_config(addr, &[]));

    let first = monitor.tick(NOW).await.unwrap();
    assert!(matches!(first, CycleOutcome::AlertFailed { .. }));
    assert_eq!(monitor.throttle().last_alert(), None);

    fake.set_ntfy_status(200);
    let second = monitor.tick(NOW + time::Duration::minutes(1)).await.unwrap();
    assert!(matches!(second, CycleOutcome::AlertSent(_)));
    assert_eq!(fake.published().len(), 1);
}

#[tokio::test]
async fn ntfy_token_is_sent_as_bearer() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["10,0"]);
    let config = test_config(addr, &[("NTFY_TOKEN", "tk_abc"), ("NTFY_PRIORITY", "urgent")]);
    let mut monitor = build_monitor(&config);

    monitor.tick(NOW).await.unwrap();

    let published = fake.published();
    assert_eq!(published[0].authorization.as_deref(), Some("Bearer tk_abc"));
    assert_eq!(published[0].priority.as_deref(), Some("5"));
}

#[tokio::test]
async fn wrong_credentials_fail_login() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["80,0"]);
    let config = test_config(addr, &[("STOKERCLOUD_PASSWORD", "wrong")]);

    let client = StokerCloudClient::new(&config).unwrap();
    let err = client.login().await.unwrap_err();
    assert_eq!(err.step(), "login");

    let mut monitor = build_monitor(&config);
    let err = monitor.tick(NOW).await.unwrap_err();
    assert_eq!(err.step(), "login");
    assert_eq!(fake.logins(), 0);
    assert_eq!(fake.fetches(), 0);
    assert!(fake.published().is_empty());
}

#[tokio::test]
async fn unauthorized_status_renews_token_once() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["150,0", "148,0"]);
    let mut monitor = build_monitor(&test_config(addr, &[]));
    monitor.tick(NOW).await.unwrap();

    fake.set_reject_status(401);
    fake.reject_next(1);
    let outcome = monitor.tick(NOW).await.unwrap();

    assert_eq!(outcome.report().kg, 148.0);
    assert_eq!(fake.logins(), 2);
    assert_eq!(fake.fetches(), 3);
}

#[tokio::test]
async fn forbidden_status_is_token_expiry() {
    let (fake, addr) = start_fake().await;
    let config = test_config(addr, &[]);
    let client = StokerCloudClient::new(&config).unwrap();
    let token = client.login().await.unwrap();

    fake.set_reject_status(403);
    fake.reject_next(1);
    let err = client.fetch_hopper_level(&token).await.unwrap_err();

    assert!(matches!(err, StokerError::TokenExpired));
}

#[tokio::test]
async fn rejected_terms_do_not_stop_the_cycle() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["122,0"]);
    fake.set_terms_status(500);
    let config = test_config(addr, &[]);

    let client = StokerCloudClient::new(&config).unwrap();
    let err = client.accept_terms("tok-x").await.unwrap_err();
    assert_eq!(err.step(), "accept-terms");

    let mut monitor = build_monitor(&config);
    let outcome = monitor.tick(NOW).await.unwrap();

    assert!(matches!(outcome, CycleOutcome::Ok(_)));
    assert_eq!(outcome.report().kg, 122.0);
    assert!(monitor.session().has_token());
}

#[tokio::test]
async fn hopperdata_fallback_is_read_over_http() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["95,5", "90,0"]);
    fake.serve_hopperdata_only();
    let config = test_config(addr, &[]);

    let client = StokerCloudClient::new(&config).unwrap();
    let token = client.login().await.unwrap();
    let reading = client.fetch_hopper_level(&token).await.unwrap();
    assert_eq!(reading.kg, 95.5);
    assert_eq!(reading.source, HopperSource::HopperData);

    let mut monitor = build_monitor(&config);
    let outcome = monitor.tick(NOW).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::AlertSent(_)));
    assert_eq!(outcome.report().kg, 90.0);
}

#[tokio::test]
async fn blank_ntfy_token_sends_no_authorization() {
    let (fake, addr) = start_fake().await;
    fake.push_levels(&["10,0"]);
    let config = test_config(addr, &[("NTFY_TOKEN", ""), ("MAX_CAPACITY_KG", "")]);
    let mut monitor = build_monitor(&config);

    monitor.tick(NOW).await.unwrap();

    let published = fake.published();
    assert_eq!(published[0].authorization, None);
    assert_eq!(
        published[0].body,
        "Hopper low: 10.0 kg remaining. Threshold: 100.0 kg."
    );
}

#[tokio::test]
async fn data_endpoint_outage_is_a_fetch_error() {
    let (fake, addr) = start_fake().await;
    let mut monitor = build_monitor(&test_config(addr, &[]));

    let err = monitor.tick(NOW).await.unwrap_err();

    assert_eq!(err.step(), "fetch");
    assert_eq!(fake.fetches(), 1);
    assert_eq!(fake.logins(), 1);
    assert!(monitor.session().has_token());
}
