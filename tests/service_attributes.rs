// Tests for how `CookieSessionConfig` maps to emitted cookie attributes, and for the transport
// checks that withhold secure-only cookies.
mod common;

use axum::body::Body;
use http::{Request, header};
use tower::{ServiceBuilder, ServiceExt as _};

use tower_sessions_cookie_jar::{
    CookieSessionConfig, DEFAULT_COOKIE_NAME, DEFAULT_ID_COOKIE_NAME, SameSite, Transport,
};

async fn call(config: CookieSessionConfig, req: Request<Body>) -> http::Response<Body> {
    let (_key, layer) = common::make_layer(config);
    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::handler);
    svc.oneshot(req).await.expect("service call succeeds")
}

fn plain_request() -> Request<Body> {
    Request::builder()
        .uri("/")
        .body(Body::empty())
        .expect("request builds successfully")
}

#[tokio::test]
async fn basic_service() {
    // Exercise: first request writes to the session, then a read-only request sends both cookies
    // back through the same layer.
    // Expectation: the second response carries no `Set-Cookie`.
    let (_key, layer) = common::make_layer(CookieSessionConfig::default());
    let write = ServiceBuilder::new()
        .layer(layer.clone())
        .service_fn(common::handler);
    let read = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::noop_handler);

    let res = write
        .oneshot(plain_request())
        .await
        .expect("service call succeeds");
    let data = common::session_cookie(res.headers());
    let id = common::id_cookie(res.headers());

    let req = Request::builder()
        .header(header::COOKIE, common::cookie_header(&[&data, &id]))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = read.oneshot(req).await.expect("service call succeeds");
    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn no_set_cookie_when_unused() {
    // Exercise: handler does not touch session state at all.
    // Expectation: no `Set-Cookie` should be emitted.
    let (_key, layer) = common::make_layer(CookieSessionConfig::default());
    let svc = ServiceBuilder::new()
        .layer(layer)
        .service_fn(common::noop_handler);

    let res = svc
        .oneshot(plain_request())
        .await
        .expect("service call succeeds");

    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn default_attributes() {
    // Exercise: write with the default config.
    // Expectation: HttpOnly, SameSite=Strict, Path=/, no Secure, no Expires, no Domain, on both
    // the data and the id cookie.
    let res = call(CookieSessionConfig::default(), plain_request()).await;

    for cookie in [
        common::session_cookie(res.headers()),
        common::id_cookie(res.headers()),
    ] {
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.secure(), None);
        assert_eq!(cookie.domain(), None);
        assert!(cookie.expires().is_none());
    }
}

#[tokio::test]
async fn name() {
    // Exercise: configure custom cookie names.
    // Expectation: the emitted cookies use them.
    let config = CookieSessionConfig::default()
        .with_name("my.sess")
        .with_id_cookie_name("my.sid");
    let res = call(config, plain_request()).await;

    assert!(common::find_cookie(res.headers(), "my.sess").is_some());
    assert!(common::find_cookie(res.headers(), "my.sid").is_some());
    assert!(common::find_cookie(res.headers(), DEFAULT_COOKIE_NAME).is_none());
    assert!(common::find_cookie(res.headers(), DEFAULT_ID_COOKIE_NAME).is_none());
}

#[tokio::test]
async fn http_only() {
    // Exercise: disable `HttpOnly`.
    // Expectation: the attribute is absent.
    let res = call(
        CookieSessionConfig::default().with_http_only(false),
        plain_request(),
    )
    .await;

    let cookie = common::session_cookie(res.headers());
    assert_ne!(cookie.http_only(), Some(true));
}

#[tokio::test]
async fn same_site_lax() {
    // Exercise: `SameSite=Lax`.
    // Expectation: the attribute is emitted as configured.
    let res = call(
        CookieSessionConfig::default().with_same_site(SameSite::Lax),
        plain_request(),
    )
    .await;

    assert_eq!(
        common::session_cookie(res.headers()).same_site(),
        Some(SameSite::Lax)
    );
}

#[tokio::test]
async fn same_site_none() {
    let res = call(
        CookieSessionConfig::default().with_same_site(SameSite::None),
        plain_request(),
    )
    .await;

    assert_eq!(
        common::session_cookie(res.headers()).same_site(),
        Some(SameSite::None)
    );
}

#[tokio::test]
async fn path_and_domain() {
    // Exercise: custom path and domain.
    // Expectation: both are emitted on the session cookie.
    let config = CookieSessionConfig::default()
        .with_path("/app")
        .with_domain("example.com");
    let res = call(config, plain_request()).await;

    let cookie = common::session_cookie(res.headers());
    assert_eq!(cookie.path(), Some("/app"));
    assert_eq!(cookie.domain(), Some("example.com"));
}

#[tokio::test]
async fn secure_withheld_on_plaintext() {
    // Exercise: secure-only cookies over a plain `http` request.
    // Expectation: nothing is written, not even the id cookie.
    let res = call(CookieSessionConfig::default().with_secure(true), plain_request()).await;

    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn secure_over_https_uri() {
    // Exercise: secure-only cookies with an absolute `https` request URI.
    // Expectation: the cookies are written with the `Secure` attribute.
    let req = Request::builder()
        .uri("https://example.com/")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = call(CookieSessionConfig::default().with_secure(true), req).await;

    assert_eq!(common::session_cookie(res.headers()).secure(), Some(true));
    assert_eq!(common::id_cookie(res.headers()).secure(), Some(true));
}

#[tokio::test]
async fn secure_with_transport_extension() {
    // Exercise: a TLS-terminating server marks the request via the `Transport` extension.
    // Expectation: the extension is trusted and the cookie is written.
    let req = Request::builder()
        .extension(Transport::Secure)
        .body(Body::empty())
        .expect("request builds successfully");
    let res = call(CookieSessionConfig::default().with_secure(true), req).await;

    assert_eq!(common::session_cookie(res.headers()).secure(), Some(true));
}

#[tokio::test]
async fn forwarded_proto_untrusted_by_default() {
    // Exercise: `X-Forwarded-Proto: https` without opting in.
    // Expectation: the request is still treated as plaintext and nothing is written.
    let req = Request::builder()
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .expect("request builds successfully");
    let res = call(CookieSessionConfig::default().with_secure(true), req).await;

    assert!(res.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn forwarded_proto_when_trusted() {
    // Exercise: same header with `trust_forwarded_proto` enabled.
    // Expectation: the secure-only cookie is written.
    let req = Request::builder()
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .expect("request builds successfully");
    let config = CookieSessionConfig::default()
        .with_secure(true)
        .with_trust_forwarded_proto(true);
    let res = call(config, req).await;

    assert_eq!(common::session_cookie(res.headers()).secure(), Some(true));
}

#[tokio::test]
async fn bogus_cookie() {
    // Exercise: the client sends the session cookie name with a value that cannot be opened.
    // Expectation: the layer recovers by overwriting the broken cookie.
    let req = Request::builder()
        .header(header::COOKIE, format!("{DEFAULT_COOKIE_NAME}=bogus"))
        .body(Body::empty())
        .expect("request builds successfully");
    let res = call(CookieSessionConfig::default(), req).await;

    let cookie = common::session_cookie(res.headers());
    assert_ne!(cookie.value(), "bogus");
    assert!(!cookie.value().is_empty());
}
