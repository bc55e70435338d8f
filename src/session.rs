//! The per-request session handle.

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

use crate::{
    binder::Binder,
    error::Error,
    item::{SessionItems, Value},
    store::LoadedSession,
};

/// Opaque identifier of a logical session, issued by the host.
///
/// A host that manages ids itself inserts a `SessionId` into request extensions before the
/// session layer runs; otherwise the layer reads or issues its own id cookie.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// 192 random bits, URL-safe base64.
    pub fn generate() -> Self {
        let bytes: [u8; 24] = rand::random();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the current request's session id came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdSource {
    /// A [`SessionId`] request extension set by the host.
    Host,
    /// The layer's own id cookie.
    Cookie,
    /// Freshly generated; the client has not seen it yet.
    Generated,
}

/// Session state for one request, shared between the layer and the handler.
///
/// Never shared across requests: each request rebuilds its own from its own cookie.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

struct Inner {
    id: Mutex<SessionId>,
    items: Mutex<SessionItems>,
    matched: bool,
    host_managed: bool,
    issue_id: AtomicBool,
    regenerated: AtomicBool,
    abandoned: AtomicBool,
}

impl Session {
    pub(crate) fn new(id: SessionId, loaded: LoadedSession, source: IdSource) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: Mutex::new(id),
                items: Mutex::new(loaded.items),
                matched: loaded.matched,
                host_managed: source == IdSource::Host,
                issue_id: AtomicBool::new(source == IdSource::Generated),
                regenerated: AtomicBool::new(false),
                abandoned: AtomicBool::new(false),
            }),
        }
    }

    fn items(&self) -> MutexGuard<'_, SessionItems> {
        self.inner
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> SessionId {
        self.inner
            .id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the inbound cookie opened and was bound to this session's id.
    pub fn matched(&self) -> bool {
        self.inner.matched
    }

    /// True until a cookie for this session has been loaded successfully.
    pub fn is_new(&self) -> bool {
        !self.inner.matched
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.items().get(key).cloned()
    }

    /// Inserts a value, returning the one it replaced.
    ///
    /// Keys in the namespace reserved for the identity marker are rejected.
    pub fn insert<V: Into<Value>>(&self, key: &str, value: V) -> Result<Option<Value>, Error> {
        if Binder::is_reserved(key) {
            return Err(Error::ReservedKey(key.to_owned()));
        }
        Ok(self.items().insert(key, value))
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.items().remove(key)
    }

    pub fn clear(&self) {
        self.items().clear();
    }

    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.items().keys().map(str::to_owned).collect()
    }

    /// A copy of the current collection.
    pub fn snapshot(&self) -> SessionItems {
        self.items().clone()
    }

    pub fn is_modified(&self) -> bool {
        self.items().is_dirty() || self.inner.regenerated.load(Ordering::Acquire)
    }

    /// Moves the data to a fresh session id, e.g. after login.
    ///
    /// The cookie is rebound to the new id when the response is saved; the old id no longer
    /// matches it. For a layer-managed id the new id cookie is issued with the data cookie.
    /// For a host-managed id (see [`Session::is_host_managed`]) no id cookie is issued: the host
    /// must supply the returned id as the [`SessionId`] extension from the next request on, or
    /// the rebound data will not match.
    pub fn regenerate_id(&self) -> SessionId {
        let id = SessionId::generate();
        *self.inner.id.lock().unwrap_or_else(PoisonError::into_inner) = id.clone();
        self.inner.regenerated.store(true, Ordering::Release);
        if !self.inner.host_managed {
            self.inner.issue_id.store(true, Ordering::Release);
        }
        id
    }

    /// Whether the id was supplied by the host as a [`SessionId`] request extension.
    pub fn is_host_managed(&self) -> bool {
        self.inner.host_managed
    }

    pub(crate) fn needs_id_cookie(&self) -> bool {
        self.inner.issue_id.load(Ordering::Acquire)
    }

    /// Drops the session: the response clears the session cookie instead of writing it.
    pub fn abandon(&self) {
        self.items().clear();
        self.inner.abandoned.store(true, Ordering::Release);
    }

    pub fn is_abandoned(&self) -> bool {
        self.inner.abandoned.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("matched", &self.inner.matched)
            .field("len", &self.len())
            .field("modified", &self.is_modified())
            .finish_non_exhaustive()
    }
}
