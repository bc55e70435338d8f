use std::net::SocketAddr;

use axum::{Extension, Router, routing::get};
use time::Duration;
use tower_sessions_cookie_jar::{
    CookieSessionConfig, CookieSessionManagerLayer, Key, SameSite, Session,
};

async fn index(Extension(session): Extension<Session>) -> String {
    let n = session
        .get("n")
        .and_then(|value| value.as_i64())
        .unwrap_or(0);
    session
        .insert("n", n + 1)
        .expect("session insert succeeds");
    format!("n={n} sid={}", session.id())
}

async fn logout(Extension(session): Extension<Session>) -> &'static str {
    session.abandon();
    "bye"
}

#[tokio::main]
async fn main() {
    let key = Key::generate();
    let session_config = CookieSessionConfig::default()
        // Default: ".DTSTR"
        .with_name(".DTSTR")
        // Default: "sid"
        .with_id_cookie_name("sid")
        // Default: true
        .with_http_only(true)
        // Default: SameSite::Strict
        .with_same_site(SameSite::Strict)
        // Default: false (cookies last for the browser session)
        .with_set_expiration(true)
        // Default: 20 minutes
        .with_timeout(Duration::hours(1))
        // Default: false (enable behind TLS)
        .with_secure(false)
        // Default: "/"
        .with_path("/")
        // Default: None
        .without_domain()
        // Default: false
        .with_always_save(false)
        // Default: 4096
        .with_max_cookie_bytes(4096)
        // Default: true
        .with_clear_on_decode_error(true);
    let session_layer = CookieSessionManagerLayer::sealed(key, session_config)
        .expect("session config is valid");

    let app = Router::new()
        .route("/", get(index))
        .route("/logout", get(logout))
        .layer(session_layer);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("tcp listener binds successfully");
    let local_addr = listener.local_addr().expect("local address is available");
    println!("listening at http://{local_addr}");

    axum::serve(listener, app)
        .await
        .expect("server runs successfully");
}
