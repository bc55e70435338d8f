use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use http::{Request, Response, Uri, uri::Scheme};
use time::OffsetDateTime;
use tower_cookies::{CookieManager, Cookies, Key};
use tower_layer::Layer;
use tower_service::Service;

use crate::{
    config::CookieSessionConfig,
    error::ConfigError,
    seal::{AeadSealer, Sealer},
    session::{IdSource, Session, SessionId},
    store::CookieSessionStore,
    transcode::Transport,
};

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Clone)]
pub struct CookieSessionManagerLayer<S: Sealer = AeadSealer> {
    store: CookieSessionStore<S>,
}

impl CookieSessionManagerLayer<AeadSealer> {
    /// AES-256-GCM sealed cookies under `key`.
    pub fn sealed(key: Key, config: CookieSessionConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(CookieSessionStore::new(
            config,
            AeadSealer::new(key),
        )?))
    }
}

impl<S: Sealer> CookieSessionManagerLayer<S> {
    #[must_use]
    pub fn new(store: CookieSessionStore<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CookieSessionStore<S> {
        &self.store
    }
}

#[derive(Debug, Clone)]
pub struct CookieSessionManager<T, S: Sealer> {
    inner: T,
    store: CookieSessionStore<S>,
}

impl<T, S: Sealer> Layer<T> for CookieSessionManagerLayer<S> {
    type Service = CookieManager<CookieSessionManager<T, S>>;

    fn layer(&self, inner: T) -> Self::Service {
        CookieManager::new(CookieSessionManager {
            inner,
            store: self.store.clone(),
        })
    }
}

fn is_https(uri: &Uri) -> bool {
    uri.scheme() == Some(&Scheme::HTTPS)
}

fn transport<B>(req: &Request<B>, config: &CookieSessionConfig) -> Transport {
    if let Some(transport) = req.extensions().get::<Transport>() {
        return *transport;
    }
    if is_https(req.uri()) {
        return Transport::Secure;
    }
    if config.trust_forwarded_proto
        && req
            .headers()
            .get(X_FORWARDED_PROTO)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
    {
        return Transport::Secure;
    }
    Transport::Plaintext
}

/// Upstream id wins, then the id cookie, then a fresh id.
fn resolve_id<B>(
    req: &Request<B>,
    cookies: &Cookies,
    config: &CookieSessionConfig,
) -> (SessionId, IdSource) {
    if let Some(id) = req.extensions().get::<SessionId>() {
        return (id.clone(), IdSource::Host);
    }
    match cookies.get(config.id_cookie_name()) {
        Some(cookie) if !cookie.value().is_empty() => {
            (SessionId::new(cookie.value()), IdSource::Cookie)
        }
        _ => (SessionId::generate(), IdSource::Generated),
    }
}

impl<ReqBody, ResBody, T, S> Service<Request<ReqBody>> for CookieSessionManager<T, S>
where
    T: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    T::Future: Send,
    ReqBody: Send + 'static,
    ResBody: Default + Send,
    S: Sealer,
{
    type Response = T::Response;
    type Error = T::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let store = self.store.clone();

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let cookies = match req.extensions().get::<Cookies>().cloned() {
                Some(cookies) => cookies,
                None => {
                    let mut res = Response::default();
                    *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                    return Ok(res);
                }
            };

            let config = store.config();
            let transport = transport(&req, config);
            let (session_id, id_source) = resolve_id(&req, &cookies, config);

            let inbound = cookies
                .get(config.name())
                .map(|cookie| cookie.value().to_owned());
            let loaded = store.load(inbound.as_deref(), session_id.as_str());
            let stale = inbound.is_some() && !loaded.matched;

            let session = Session::new(session_id, loaded, id_source);
            req.extensions_mut().insert(session.clone());

            let res = inner.call(req).await?;

            if session.is_abandoned() {
                if inbound.is_some() {
                    cookies.remove(store.remove());
                }
                return Ok(res);
            }

            let wants_save = session.is_modified() || (config.always_save && session.matched());
            if wants_save && !res.status().is_server_error() {
                let id = session.id();
                let items = session.snapshot();
                match store.save(&items, id.as_str(), transport, session.is_new()) {
                    Ok(Some(record)) => {
                        cookies.add(record.into_cookie());
                        if session.needs_id_cookie() {
                            let now = OffsetDateTime::now_utc();
                            cookies.add(config.build_id_record(id.as_str(), now).into_cookie());
                        }
                        return Ok(res);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::error!(err = %err, "cookie session save failed");
                        let mut res = Response::default();
                        *res.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                        return Ok(res);
                    }
                }
            }

            if stale && config.clear_on_decode_error {
                cookies.remove(store.remove());
            }

            Ok(res)
        })
    }
}
