#![allow(dead_code)]

// Shared helpers for integration tests.
//
// These helpers use `tower_cookies::Cookie` parsing/encoding to match what the middleware emits in
// `Set-Cookie` and what browsers send back in `Cookie`.
use std::convert::Infallible;

use axum::body::Body;
use http::{HeaderMap, Request, Response, header};
use http_body_util::BodyExt as _;
use tower_cookies::Cookie;
use tower_sessions_cookie_jar::{
    AeadSealer, CookieSessionConfig, CookieSessionManagerLayer, CookieSessionStore,
    DEFAULT_COOKIE_NAME, DEFAULT_ID_COOKIE_NAME, Key, Session, SessionItems,
};

pub async fn body_string(body: Body) -> String {
    // Collect an Axum body into a UTF-8 string for assertions.
    let bytes = body
        .collect()
        .await
        .expect("body collects successfully")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

pub async fn handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Basic handler used by many tests: write a single key into the session.
    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .expect("request includes Session extension");

    session.insert("foo", 42).expect("session insert succeeds");

    Ok(Response::new(Body::empty()))
}

pub async fn noop_handler(_: Request<Body>) -> Result<Response<Body>, Infallible> {
    // Handler that does not access the session at all.
    Ok(Response::new(Body::empty()))
}

pub fn make_layer(config: CookieSessionConfig) -> (Key, CookieSessionManagerLayer) {
    // Create a sealed-cookie session layer and return both the key and the layer for tests that
    // need to open cookie values.
    let key = Key::generate();
    let layer =
        CookieSessionManagerLayer::sealed(key.clone(), config).expect("config is valid");
    (key, layer)
}

pub fn set_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
    // Parse every `Set-Cookie` header; the data and id cookies arrive in no fixed order.
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| {
            let value = value.to_str().expect("set-cookie header is valid utf-8");
            Cookie::parse_encoded(value)
                .expect("set-cookie parses successfully")
                .into_owned()
        })
        .collect()
}

pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<Cookie<'static>> {
    set_cookies(headers)
        .into_iter()
        .find(|cookie| cookie.name() == name)
}

pub fn session_cookie(headers: &HeaderMap) -> Cookie<'static> {
    find_cookie(headers, DEFAULT_COOKIE_NAME).expect("response sets the session cookie")
}

pub fn id_cookie(headers: &HeaderMap) -> Cookie<'static> {
    find_cookie(headers, DEFAULT_ID_COOKIE_NAME).expect("response sets the id cookie")
}

pub fn cookie_header(cookies: &[&Cookie<'_>]) -> String {
    // Encode cookies for a `Cookie` request header, without attributes.
    cookies
        .iter()
        .map(|cookie| cookie.encoded().stripped().to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn open_cookie(key: &Key, value: &str) -> SessionItems {
    // Open a cookie value into the raw collection, identity marker included.
    let store = CookieSessionStore::new(
        CookieSessionConfig::default(),
        AeadSealer::new(key.clone()),
    )
    .expect("config is valid");
    store.open_items(value).expect("cookie opens")
}
