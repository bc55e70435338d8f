// Tests for building a store from externally supplied settings.
mod common;

use axum::body::Body;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http::Request;
use serde_json::json;
use time::Duration;
use tower::{ServiceBuilder, ServiceExt as _};

use tower_sessions_cookie_jar::{
    ConfigError, CookieSessionManagerLayer, CookieSessionSettings, DEFAULT_COOKIE_NAME, Key,
    SameSite, SessionItems,
};

fn encoded_key(key: &Key) -> String {
    STANDARD.encode(key.master())
}

fn settings(value: serde_json::Value) -> CookieSessionSettings {
    serde_json::from_value(value).expect("settings deserialize")
}

#[test]
fn empty_settings_need_a_key() {
    let err = settings(json!({}))
        .build()
        .expect_err("missing key is rejected");
    assert_eq!(err, ConfigError::MissingKey);
}

#[test]
fn unknown_fields_are_rejected() {
    let result = serde_json::from_value::<CookieSessionSettings>(json!({ "cookieNme": "x" }));
    assert!(result.is_err());
}

#[test]
fn camel_case_fields_apply() {
    let store = settings(json!({
        "cookieName": "app.session",
        "idCookieName": "app.sid",
        "httpOnly": false,
        "secureOnly": true,
        "setExpiration": true,
        "timeoutMinutes": 45,
        "sameSite": "lax",
        "key": encoded_key(&Key::generate()),
    }))
    .build()
    .expect("settings are valid");

    let config = store.config();
    assert_eq!(config.name(), "app.session");
    assert_eq!(config.id_cookie_name(), "app.sid");
    assert_eq!(config.timeout(), Duration::minutes(45));
    assert_eq!(store.timeout(), Duration::minutes(45));
}

#[test]
fn blank_cookie_name_uses_default() {
    let store = settings(json!({
        "cookieName": "",
        "key": encoded_key(&Key::generate()),
    }))
    .build()
    .expect("settings are valid");

    assert_eq!(store.config().name(), DEFAULT_COOKIE_NAME);
}

#[test]
fn invalid_values_are_rejected() {
    let key = encoded_key(&Key::generate());

    let err = settings(json!({ "sameSite": "sometimes", "key": key }))
        .build()
        .expect_err("same-site is rejected");
    assert_eq!(err, ConfigError::InvalidSameSite("sometimes".into()));

    let err = settings(json!({ "timeoutMinutes": 0, "key": key }))
        .build()
        .expect_err("timeout is rejected");
    assert_eq!(err, ConfigError::InvalidTimeout);

    let err = settings(json!({ "timeoutMinutes": i64::MAX, "key": key }))
        .build()
        .expect_err("overflowing timeout is rejected");
    assert_eq!(err, ConfigError::InvalidTimeout);

    let err = settings(json!({ "timeoutMinutes": 60 * 24 * 365 * 20_000i64, "key": key }))
        .build()
        .expect_err("timeout past the end of time is rejected");
    assert_eq!(err, ConfigError::InvalidTimeout);

    let err = settings(json!({ "key": "not base64!" }))
        .build()
        .expect_err("key is rejected");
    assert!(matches!(err, ConfigError::InvalidKey(_)));
}

#[tokio::test]
async fn settings_drive_emitted_cookie() {
    // Exercise: build the layer from settings and write a session.
    // Expectation: the cookie carries the configured name and attributes.
    let store = settings(json!({
        "cookieName": "app.session",
        "sameSite": "Lax",
        "path": "/app",
        "key": encoded_key(&Key::generate()),
    }))
    .build()
    .expect("settings are valid");
    let svc = ServiceBuilder::new()
        .layer(CookieSessionManagerLayer::new(store))
        .service_fn(common::handler);

    let req = Request::builder()
        .body(Body::empty())
        .expect("request builds successfully");
    let res = svc.oneshot(req).await.expect("service call succeeds");

    let cookie = common::find_cookie(res.headers(), "app.session").expect("cookie is set");
    assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    assert_eq!(cookie.path(), Some("/app"));
}

#[test]
fn retired_keys_open_old_cookies() {
    let old = Key::generate();
    let new = Key::generate();
    let id = "sess1";

    let before = settings(json!({ "key": encoded_key(&old) }))
        .build()
        .expect("settings are valid");
    let items: SessionItems = [("n", 1)].into_iter().collect();
    let value = before.seal_items(&items, id).expect("seal succeeds");

    let after = settings(json!({
        "key": encoded_key(&new),
        "retiredKeys": [encoded_key(&old)],
    }))
    .build()
    .expect("settings are valid");

    let loaded = after.load(Some(value.as_str()), id);
    assert!(loaded.matched);
    assert_eq!(loaded.items, items);
}
