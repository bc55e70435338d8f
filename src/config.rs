use std::borrow::Cow;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use tower_cookies::{Cookie, Key};

use crate::{
    SameSite,
    error::ConfigError,
    seal::AeadSealer,
    store::CookieSessionStore,
    transcode::{CookieRecord, Transport},
};

pub const DEFAULT_COOKIE_NAME: &str = ".DTSTR";
pub const DEFAULT_ID_COOKIE_NAME: &str = "sid";
pub const DEFAULT_TIMEOUT: Duration = Duration::minutes(20);

#[derive(Debug, Clone)]
pub struct CookieSessionConfig {
    pub(crate) name: Cow<'static, str>,
    pub(crate) id_cookie_name: Cow<'static, str>,
    pub(crate) http_only: bool,
    pub(crate) secure: bool,
    pub(crate) set_expiration: bool,
    pub(crate) timeout: Duration,
    pub(crate) same_site: SameSite,
    pub(crate) path: Cow<'static, str>,
    pub(crate) domain: Option<Cow<'static, str>>,
    pub(crate) always_save: bool,
    pub(crate) max_cookie_bytes: usize,
    pub(crate) clear_on_decode_error: bool,
    pub(crate) trust_forwarded_proto: bool,
}

impl Default for CookieSessionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            id_cookie_name: DEFAULT_ID_COOKIE_NAME.into(),
            http_only: true,
            secure: false,
            set_expiration: false,
            timeout: DEFAULT_TIMEOUT,
            same_site: SameSite::Strict,
            path: "/".into(),
            domain: None,
            always_save: false,
            max_cookie_bytes: 4096,
            clear_on_decode_error: true,
            trust_forwarded_proto: false,
        }
    }
}

impl CookieSessionConfig {
    #[must_use]
    pub fn with_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Name of the cookie carrying the session id when no upstream
    /// [`SessionId`](crate::SessionId) extension is present.
    #[must_use]
    pub fn with_id_cookie_name<N: Into<Cow<'static, str>>>(mut self, name: N) -> Self {
        self.id_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Marks cookies `Secure` and withholds them entirely on plaintext transports.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// When set, cookies expire `timeout` after they are written. Otherwise they last for the
    /// browser session.
    #[must_use]
    pub fn with_set_expiration(mut self, set_expiration: bool) -> Self {
        self.set_expiration = set_expiration;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_path<P: Into<Cow<'static, str>>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_domain<D: Into<Cow<'static, str>>>(mut self, domain: D) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn without_domain(mut self) -> Self {
        self.domain = None;
        self
    }

    #[must_use]
    pub fn with_always_save(mut self, always_save: bool) -> Self {
        self.always_save = always_save;
        self
    }

    #[must_use]
    pub fn with_max_cookie_bytes(mut self, max_cookie_bytes: usize) -> Self {
        self.max_cookie_bytes = max_cookie_bytes;
        self
    }

    #[must_use]
    pub fn with_clear_on_decode_error(mut self, clear_on_decode_error: bool) -> Self {
        self.clear_on_decode_error = clear_on_decode_error;
        self
    }

    /// Trust `X-Forwarded-Proto` when deciding whether the transport is encrypted. Only enable
    /// this behind a proxy that overwrites the header.
    #[must_use]
    pub fn with_trust_forwarded_proto(mut self, trust_forwarded_proto: bool) -> Self {
        self.trust_forwarded_proto = trust_forwarded_proto;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_cookie_name(&self) -> &str {
        &self.id_cookie_name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in [&self.name, &self.id_cookie_name] {
            if !is_cookie_token(name) {
                return Err(ConfigError::InvalidCookieName(name.to_string()));
            }
        }
        if self.name == self.id_cookie_name {
            return Err(ConfigError::CookieNameConflict(self.name.to_string()));
        }
        if !self.timeout.is_positive()
            || OffsetDateTime::now_utc().checked_add(self.timeout).is_none()
        {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.max_cookie_bytes == 0 {
            return Err(ConfigError::InvalidMaxCookieBytes);
        }
        Ok(())
    }

    /// Secure-only cookies are never written over a plaintext transport.
    pub(crate) fn permits(&self, transport: Transport) -> bool {
        !self.secure || transport.is_secure()
    }

    pub(crate) fn build_record(&self, value: String, now: OffsetDateTime) -> CookieRecord {
        self.record_for(self.name.to_string(), value, now)
    }

    pub(crate) fn build_id_record(&self, session_id: &str, now: OffsetDateTime) -> CookieRecord {
        self.record_for(self.id_cookie_name.to_string(), session_id.to_owned(), now)
    }

    fn record_for(&self, name: String, value: String, now: OffsetDateTime) -> CookieRecord {
        CookieRecord {
            name,
            value,
            http_only: self.http_only,
            secure: self.secure,
            expires_at: self
                .set_expiration
                .then(|| now.checked_add(self.timeout))
                .flatten(),
            same_site: self.same_site,
            path: self.path.to_string(),
            domain: self.domain.as_ref().map(|domain| domain.to_string()),
        }
    }

    pub(crate) fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), "");
        cookie.set_path(self.path.clone());
        if let Some(domain) = self.domain.clone() {
            cookie.set_domain(domain);
        }
        cookie
    }
}

/// RFC 6265 cookie-name token: visible ASCII without separators.
fn is_cookie_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}

/// Externally supplied settings, e.g. read from a JSON or TOML file.
///
/// Keys are camelCase. Absent or blank values fall back to the defaults of
/// [`CookieSessionConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CookieSessionSettings {
    pub cookie_name: Option<String>,
    pub id_cookie_name: Option<String>,
    pub http_only: Option<bool>,
    pub secure_only: Option<bool>,
    pub set_expiration: Option<bool>,
    pub timeout_minutes: Option<i64>,
    pub same_site: Option<String>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub always_save: Option<bool>,
    pub max_cookie_bytes: Option<usize>,
    pub clear_on_decode_error: Option<bool>,
    pub trust_forwarded_proto: Option<bool>,
    /// Standard base64 of at least 64 bytes of key material.
    pub key: Option<String>,
    pub retired_keys: Vec<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_key(encoded: &str) -> Result<Key, ConfigError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|err| ConfigError::InvalidKey(err.to_string()))?;
    Key::try_from(bytes.as_slice()).map_err(|err| ConfigError::InvalidKey(err.to_string()))
}

fn parse_same_site(value: &str) -> Result<SameSite, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "strict" => Ok(SameSite::Strict),
        "lax" => Ok(SameSite::Lax),
        "none" => Ok(SameSite::None),
        _ => Err(ConfigError::InvalidSameSite(value.to_owned())),
    }
}

impl CookieSessionSettings {
    pub fn into_config(self) -> Result<CookieSessionConfig, ConfigError> {
        let mut config = CookieSessionConfig::default();
        if let Some(name) = non_blank(self.cookie_name) {
            config = config.with_name(name);
        }
        if let Some(name) = non_blank(self.id_cookie_name) {
            config = config.with_id_cookie_name(name);
        }
        if let Some(http_only) = self.http_only {
            config = config.with_http_only(http_only);
        }
        if let Some(secure) = self.secure_only {
            config = config.with_secure(secure);
        }
        if let Some(set_expiration) = self.set_expiration {
            config = config.with_set_expiration(set_expiration);
        }
        if let Some(minutes) = self.timeout_minutes {
            let timeout = minutes
                .checked_mul(60)
                .map(Duration::seconds)
                .ok_or(ConfigError::InvalidTimeout)?;
            config = config.with_timeout(timeout);
        }
        if let Some(same_site) = non_blank(self.same_site) {
            config = config.with_same_site(parse_same_site(&same_site)?);
        }
        if let Some(path) = non_blank(self.path) {
            config = config.with_path(path);
        }
        if let Some(domain) = non_blank(self.domain) {
            config = config.with_domain(domain);
        }
        if let Some(always_save) = self.always_save {
            config = config.with_always_save(always_save);
        }
        if let Some(max_cookie_bytes) = self.max_cookie_bytes {
            config = config.with_max_cookie_bytes(max_cookie_bytes);
        }
        if let Some(clear) = self.clear_on_decode_error {
            config = config.with_clear_on_decode_error(clear);
        }
        if let Some(trust) = self.trust_forwarded_proto {
            config = config.with_trust_forwarded_proto(trust);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validates everything and builds a store sealing with the configured keys.
    pub fn build(self) -> Result<CookieSessionStore<AeadSealer>, ConfigError> {
        let key = non_blank(self.key.clone()).ok_or(ConfigError::MissingKey)?;
        let mut sealer = AeadSealer::new(parse_key(&key)?);
        for retired in &self.retired_keys {
            sealer = sealer.with_retired_key(parse_key(retired)?);
        }
        CookieSessionStore::new(self.into_config()?, sealer)
    }
}
