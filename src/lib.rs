//! Session state kept entirely in an encrypted client cookie.
//!
//! The session collection is bound to the current session id, encoded, sealed with AES-256-GCM
//! and written to a single cookie on every response that changes it. Nothing is stored
//! server-side, so any instance can serve any request.
//!
//! # Security
//! Cookies are sealed under a purpose-specific key, so a tampered cookie, or one sealed by an
//! unrelated feature sharing the same key, never opens. A cookie that opens but was bound to a
//! different session id is discarded whole. In every such case the request simply sees an empty
//! session; no error reaches the handler.
//!
//! # Concurrency
//! Each response replaces the cookie wholesale. Two concurrent requests for the same session race,
//! and whichever response the client stores last wins. Updates made by the other are lost.

pub mod binder;
mod config;
mod error;
pub mod format;
mod item;
pub mod layer;
pub mod seal;
mod session;
mod store;
pub mod transcode;

pub use tower_cookies::{Key, cookie::SameSite};

pub use crate::config::{
    CookieSessionConfig, CookieSessionSettings, DEFAULT_COOKIE_NAME, DEFAULT_ID_COOKIE_NAME,
    DEFAULT_TIMEOUT,
};
pub use crate::error::{ConfigError, DecodeError, Error, FormatError, LoadError, SealError};
pub use crate::item::{SessionItems, Value};
pub use crate::layer::CookieSessionManagerLayer;
pub use crate::seal::{AeadSealer, SESSION_PURPOSE, Sealer};
pub use crate::session::{Session, SessionId};
pub use crate::store::{
    CookieSessionStore, ExpireCallback, LoadedSession, LockState, SessionLocking,
};
pub use crate::transcode::{CookieRecord, Transport};
