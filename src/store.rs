//! The store facade: the load and save pipelines, and the no-op locking capability.
//!
//! Load is `from_cookie_text -> open -> decode -> verify`; save is
//! `bind -> encode -> seal -> to_cookie_text -> attribute policy`.
//!
//! # Concurrent requests
//!
//! Every save replaces the cookie wholesale. If two requests for the same session run
//! concurrently, whichever response the client stores last wins in its entirety. There is no
//! merge and no detection of the race, so parallel modification of one session loses updates.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tower_cookies::Cookie;

use crate::{
    binder::Binder,
    config::CookieSessionConfig,
    error::{ConfigError, Error, LoadError},
    format,
    item::SessionItems,
    seal::{AeadSealer, SESSION_PURPOSE, Sealer},
    transcode::{self, CookieRecord, Transport},
};

/// Why a load produced what it did.
#[derive(Debug, Clone, PartialEq)]
enum LoadOutcome {
    Absent,
    Unopened(LoadError),
    Mismatched,
    Matched,
}

/// A collection handed to the caller, and whether its cookie was bound to the current id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoadedSession {
    pub items: SessionItems,
    pub matched: bool,
}

#[derive(Debug, Clone)]
pub struct CookieSessionStore<S: Sealer = AeadSealer> {
    config: Arc<CookieSessionConfig>,
    sealer: S,
    binder: Binder,
}

impl<S: Sealer> CookieSessionStore<S> {
    pub fn new(config: CookieSessionConfig, sealer: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let binder = Binder::new(config.name());
        Ok(Self {
            config: Arc::new(config),
            sealer,
            binder,
        })
    }

    pub fn config(&self) -> &CookieSessionConfig {
        &self.config
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    /// Nominal session timeout reported to callers.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Loads the collection carried by `cookie_value` for `session_id`.
    ///
    /// Never fails: an absent, malformed, tampered or foreign cookie is indistinguishable from
    /// "no session yet" and yields an empty, unmatched collection.
    pub fn load(&self, cookie_value: Option<&str>, session_id: &str) -> LoadedSession {
        let (items, outcome) = self.classify(cookie_value, session_id);
        match &outcome {
            LoadOutcome::Absent | LoadOutcome::Matched => {}
            LoadOutcome::Unopened(err) => {
                tracing::warn!(err = %err, "session cookie could not be opened");
            }
            LoadOutcome::Mismatched => {
                tracing::debug!("session cookie bound to a different session id");
            }
        }
        LoadedSession {
            items,
            matched: outcome == LoadOutcome::Matched,
        }
    }

    fn classify(
        &self,
        cookie_value: Option<&str>,
        session_id: &str,
    ) -> (SessionItems, LoadOutcome) {
        let Some(cookie_value) = cookie_value else {
            return (SessionItems::new(), LoadOutcome::Absent);
        };

        let items = match self.open_items(cookie_value) {
            Ok(items) => items,
            Err(err) => return (SessionItems::new(), LoadOutcome::Unopened(err)),
        };

        match self.binder.verify(items, session_id) {
            (items, true) => (items, LoadOutcome::Matched),
            (items, false) => (items, LoadOutcome::Mismatched),
        }
    }

    /// Opens a cookie value into the raw collection, marker included.
    pub fn open_items(&self, cookie_value: &str) -> Result<SessionItems, LoadError> {
        let sealed = transcode::from_cookie_text(cookie_value)?;
        let plaintext = self.sealer.open(&sealed, SESSION_PURPOSE)?;
        Ok(format::decode(&plaintext)?)
    }

    /// Produces the cookie value for `items` bound to `session_id`.
    pub fn seal_items(&self, items: &SessionItems, session_id: &str) -> Result<String, Error> {
        if format::exceeds_max_depth(items) {
            return Err(Error::TooDeep {
                max: format::MAX_DEPTH,
            });
        }

        let bound = self.binder.bind(items, session_id);
        let sealed = self.sealer.seal(&format::encode(&bound), SESSION_PURPOSE)?;
        let value = transcode::to_cookie_text(&sealed);

        if value.len() > self.config.max_cookie_bytes {
            return Err(Error::CookieTooLarge {
                size: value.len(),
                max: self.config.max_cookie_bytes,
            });
        }
        Ok(value)
    }

    /// Builds the replacement cookie for this response.
    ///
    /// Returns `Ok(None)` when the cookie is secure-only and the transport is not: session
    /// state is then silently not written. `new_item` marks the first write of a session.
    pub fn save(
        &self,
        items: &SessionItems,
        session_id: &str,
        transport: Transport,
        new_item: bool,
    ) -> Result<Option<CookieRecord>, Error> {
        if !self.config.permits(transport) {
            tracing::debug!("secure-only session cookie withheld on plaintext transport");
            return Ok(None);
        }

        let value = self.seal_items(items, session_id)?;
        tracing::trace!(new_item, items = items.len(), "session cookie sealed");
        Ok(Some(
            self.config.build_record(value, OffsetDateTime::now_utc()),
        ))
    }

    /// The cookie that instructs the client to drop the session cookie.
    pub fn remove(&self) -> Cookie<'static> {
        self.config.removal_cookie()
    }

    /// A fresh, empty collection for a new session.
    pub fn create_new_store_data(&self) -> LoadedSession {
        LoadedSession::default()
    }

    /// No-op: cookieless sessions are not supported, so there is nothing to pre-create.
    pub fn create_uninitialized(&self, _session_id: &str, _timeout: Duration) {}
}

/// Lock bookkeeping reported by [`SessionLocking::get_item_exclusive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockState {
    pub locked: bool,
    pub lock_age: Duration,
}

pub type ExpireCallback = Box<dyn Fn(&str, &SessionItems) + Send + Sync>;

/// Exclusive access and expiry hooks of a server-side session store.
///
/// Supported for interface compatibility only: each request carries its own copy of the
/// session, so there is nothing shared to lock, expire or touch.
pub trait SessionLocking {
    fn get_item_exclusive(
        &self,
        cookie_value: Option<&str>,
        session_id: &str,
    ) -> (LoadedSession, LockState);

    fn release_item_exclusive(&self, session_id: &str);

    fn reset_item_timeout(&self, session_id: &str);

    /// Returns whether expiry callbacks are supported.
    fn set_item_expire_callback(&self, callback: ExpireCallback) -> bool;
}

impl<S: Sealer> SessionLocking for CookieSessionStore<S> {
    fn get_item_exclusive(
        &self,
        cookie_value: Option<&str>,
        session_id: &str,
    ) -> (LoadedSession, LockState) {
        let lock = LockState {
            locked: false,
            lock_age: Duration::ZERO,
        };
        (self.load(cookie_value, session_id), lock)
    }

    fn release_item_exclusive(&self, _session_id: &str) {}

    fn reset_item_timeout(&self, _session_id: &str) {}

    fn set_item_expire_callback(&self, _callback: ExpireCallback) -> bool {
        false
    }
}
