// Integration tests for `TokenManager` using wiremock and a manual clock.
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use yolocal_api::{Clock, Error, TokenManager, TransportConfig, verify_credentials};

// ── Helpers ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    fn starting_at(secs: i64) -> Arc<Self> {
        Arc::new(Self(Mutex::new(
            DateTime::<Utc>::from_timestamp(secs, 0).unwrap(),
        )))
    }

    fn advance(&self, secs: i64) {
        *self.0.lock().unwrap() += TimeDelta::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

const START: i64 = 1_750_000_000;

async fn setup() -> (MockServer, TokenManager, Arc<ManualClock>) {
    let server = MockServer::start().await;
    let clock = ManualClock::starting_at(START);
    let base = Url::parse(&server.uri()).unwrap();
    let manager = TokenManager::new(
        reqwest::Client::new(),
        &base,
        "client-1",
        SecretString::from("s3cret"),
    )
    .unwrap()
    .with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
    (server, manager, clock)
}

fn grant(token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "scope": "create"
    }))
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap()
}

// ── Acquisition ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_call_posts_client_credentials() {
    let (server, manager, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-1"))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(grant("tok-1", 7200))
        .expect(1)
        .mount(&server)
        .await;

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.expose(), "tok-1");
    assert_eq!(token.expires_at(), at(START + 7200));

    // Cached: no second grant.
    let again = manager.get_token().await.unwrap();
    assert_eq!(again.expose(), "tok-1");
}

#[tokio::test]
async fn test_missing_expires_in_defaults_to_two_hours() {
    let (server, manager, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access_token": "tok-1" })))
        .mount(&server)
        .await;

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.expires_at(), at(START + 7200));
}

#[tokio::test]
async fn test_fractional_expires_in_is_accepted() {
    let (server, manager, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok-1", "expires_in": 7200.0 })),
        )
        .mount(&server)
        .await;

    let token = manager.get_token().await.unwrap();
    assert_eq!(token.expires_at(), at(START + 7200));
}

#[tokio::test]
async fn test_out_of_range_expires_in_is_authentication_error() {
    let (server, manager, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "access_token": "tok-1", "expires_in": 100_000_000_000_000_000_u64 }),
        ))
        .mount(&server)
        .await;

    let err = tokio::spawn(async move { manager.get_token().await })
        .await
        .expect("token refresh must not panic")
        .unwrap_err();
    assert!(err.is_auth_failure(), "{err:?}");
}

#[tokio::test]
async fn test_negative_expires_in_is_authentication_error() {
    let (server, manager, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(grant("tok-1", -5))
        .mount(&server)
        .await;

    let err = manager.get_token().await.unwrap_err();
    assert!(err.is_auth_failure());
    assert!(manager.current().is_none());
}

// ── Refresh window ──────────────────────────────────────────────────

#[tokio::test]
async fn test_refreshes_exactly_once_at_buffer_boundary() {
    let (server, manager, clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(grant("tok-1", 3600))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(grant("tok-2", 3600))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(manager.get_token().await.unwrap().expose(), "tok-1");

    // One second before the buffer: still valid, no refresh.
    clock.advance(3600 - 300 - 1);
    assert_eq!(manager.get_token().await.unwrap().expose(), "tok-1");

    // now == expires_at - 300: refresh.
    clock.advance(1);
    assert_eq!(manager.get_token().await.unwrap().expose(), "tok-2");
    assert_eq!(manager.get_token().await.unwrap().expose(), "tok-2");
}

// ── Failures ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_access_token_keeps_cached_token() {
    let (server, manager, clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(grant("tok-1", 3600))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": "010104", "desc": "Invalid client" })),
        )
        .mount(&server)
        .await;

    manager.get_token().await.unwrap();
    clock.advance(3600);

    let err = manager.get_token().await.unwrap_err();
    assert!(
        matches!(err, Error::Authentication { .. }),
        "expected Authentication, got: {err:?}"
    );

    let cached = manager.current().unwrap();
    assert_eq!(cached.expose(), "tok-1");
    assert_eq!(cached.expires_at(), at(START + 3600));
}

#[tokio::test]
async fn test_non_2xx_is_authentication_error() {
    let (server, manager, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { ref message } if message.contains("401")));
    assert!(manager.current().is_none());
}

#[tokio::test]
async fn test_malformed_body_is_authentication_error() {
    let (server, manager, _clock) = setup().await;

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let err = manager.get_token().await.unwrap_err();
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_unreachable_hub_is_authentication_error() {
    let base = Url::parse("http://127.0.0.1:1").unwrap();
    let manager = TokenManager::new(
        reqwest::Client::new(),
        &base,
        "client-1",
        SecretString::from("s3cret"),
    )
    .unwrap();

    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
}

// ── verify_credentials ──────────────────────────────────────────────

#[tokio::test]
async fn test_verify_credentials() {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();

    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .and(body_string_contains("client_secret=good"))
        .respond_with(grant("tok-1", 7200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/open/yolink/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let transport = TransportConfig::default();
    verify_credentials(&base, "client-1", SecretString::from("good"), &transport)
        .await
        .unwrap();

    let err = verify_credentials(&base, "client-1", SecretString::from("bad"), &transport)
        .await
        .unwrap_err();
    assert!(err.is_auth_failure());
}
