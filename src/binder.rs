//! Binding a collection to the session identifier it was saved under.

use crate::item::{SessionItems, Value};

/// Prefix of the reserved key namespace. Application keys may not start with it.
pub const RESERVED_PREFIX: &str = "__cookie_jar:";

/// Embeds the session id into a collection before sealing and checks it after opening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binder {
    marker: String,
}

impl Binder {
    /// The marker key is namespaced by the data cookie name, so two stores sharing a key never
    /// accept each other's cookies.
    pub fn new(cookie_name: &str) -> Self {
        Self {
            marker: format!("{RESERVED_PREFIX}{cookie_name}"),
        }
    }

    pub fn marker_key(&self) -> &str {
        &self.marker
    }

    pub fn is_reserved(key: &str) -> bool {
        key.starts_with(RESERVED_PREFIX)
    }

    /// Returns a copy of `items` carrying `session_id` under the marker key.
    pub fn bind(&self, items: &SessionItems, session_id: &str) -> SessionItems {
        let mut bound = items.clone();
        bound.insert(self.marker.as_str(), session_id);
        bound
    }

    /// Strips the marker if it matches `session_id`. Otherwise the whole collection is
    /// discarded: a missing or foreign marker exposes nothing.
    pub fn verify(&self, mut items: SessionItems, session_id: &str) -> (SessionItems, bool) {
        let matched = matches!(
            items.remove(&self.marker),
            Some(Value::String(bound)) if bound == session_id
        );

        if !matched {
            items.clear();
        }
        items.mark_clean();
        (items, matched)
    }
}
