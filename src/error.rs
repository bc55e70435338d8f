//! Error types for each stage of the cookie pipeline.
//!
//! Load-path failures ([`FormatError`], [`SealError`], [`DecodeError`]) never escape
//! [`CookieSessionStore::load`](crate::CookieSessionStore::load); they are collapsed into an
//! empty, unmatched session there. Save-path failures surface as [`Error`].

/// Invalid or missing settings, reported once when the store is constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid cookie name {0:?}")]
    InvalidCookieName(String),

    /// The data cookie and the id cookie must not share a name.
    #[error("data cookie and id cookie both named {0:?}")]
    CookieNameConflict(String),

    #[error("session timeout must be positive")]
    InvalidTimeout,

    #[error("max_cookie_bytes must be greater than zero")]
    InvalidMaxCookieBytes,

    #[error("unrecognized SameSite policy {0:?}")]
    InvalidSameSite(String),

    #[error("no sealing key configured")]
    MissingKey,

    #[error("invalid sealing key: {0}")]
    InvalidKey(String),
}

/// Malformed serialized session bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("unexpected end of input")]
    Truncated,

    #[error("unknown value tag {0}")]
    UnknownTag(u8),

    #[error("invalid boolean byte {0}")]
    InvalidBool(u8),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("date/time out of range")]
    InvalidDateTime,

    #[error("duplicate key in collection")]
    DuplicateKey,

    #[error("collections nested too deeply")]
    TooDeep,

    #[error("length prefix overflows")]
    LengthOverflow,

    #[error("{0} trailing bytes after collection")]
    TrailingBytes(usize),
}

/// Authentication, integrity or key failure in the sealing layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SealError {
    #[error("sealed payload is malformed")]
    Malformed,

    /// Tag mismatch: tampered ciphertext, wrong purpose, or no key that can open it.
    #[error("sealed payload failed authentication")]
    Unauthenticated,

    #[error("sealing key unavailable: {0}")]
    KeyUnavailable(String),

    #[error("encryption failed")]
    Encrypt,
}

/// The cookie value is not valid base64.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cookie value is not valid base64: {0}")]
pub struct FormatError(#[from] pub base64::DecodeError);

/// Any failure on the way from cookie text to an item collection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Seal(#[from] SealError),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Save-path and session handle errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Seal(#[from] SealError),

    #[error("cookie value exceeds max_cookie_bytes ({size} > {max})")]
    CookieTooLarge { size: usize, max: usize },

    #[error("session collections nest deeper than {max} levels")]
    TooDeep { max: usize },

    /// The key lives in the namespace reserved for the identity marker.
    #[error("session key {0:?} is reserved")]
    ReservedKey(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
