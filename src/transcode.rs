//! Cookie text encoding of sealed bytes, and the cookie a save produces.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use time::OffsetDateTime;
use tower_cookies::{Cookie, cookie::SameSite};

use crate::error::FormatError;

/// Standard base64 with padding.
pub fn to_cookie_text(sealed: &[u8]) -> String {
    STANDARD.encode(sealed)
}

pub fn from_cookie_text(text: &str) -> Result<Vec<u8>, FormatError> {
    Ok(STANDARD.decode(text.as_bytes())?)
}

/// Whether the current request arrived over an encrypted transport.
///
/// Hosts that terminate TLS themselves can insert this into request extensions; it overrides the
/// layer's own detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Secure,
    Plaintext,
}

impl Transport {
    pub fn is_secure(self) -> bool {
        self == Transport::Secure
    }
}

/// A fully attributed outbound cookie.
///
/// Each save produces a fresh record that replaces the previous cookie wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub expires_at: Option<OffsetDateTime>,
    pub same_site: SameSite,
    pub path: String,
    pub domain: Option<String>,
}

impl CookieRecord {
    pub fn into_cookie(self) -> Cookie<'static> {
        let mut cookie_builder = Cookie::build((self.name, self.value))
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(self.same_site)
            .path(self.path);

        if let Some(expires_at) = self.expires_at {
            cookie_builder = cookie_builder.expires(expires_at);
        }

        if let Some(domain) = self.domain {
            cookie_builder = cookie_builder.domain(domain);
        }

        cookie_builder.build()
    }
}
