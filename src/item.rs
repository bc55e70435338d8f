//! The in-memory session collection.

use time::OffsetDateTime;

/// A single session value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    DateTime(OffsetDateTime),
    Bytes(Vec<u8>),
    Map(SessionItems),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<OffsetDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&SessionItems> {
        match self {
            Value::Map(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(n.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(dt: OffsetDateTime) -> Self {
        Value::DateTime(dt)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::Bytes(bytes)
    }
}

impl From<&[u8]> for Value {
    fn from(bytes: &[u8]) -> Self {
        Value::Bytes(bytes.to_vec())
    }
}

impl From<SessionItems> for Value {
    fn from(items: SessionItems) -> Self {
        Value::Map(items)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// An insertion-ordered set of uniquely keyed session values plus a dirty flag.
///
/// Lookups are linear; a collection that fits in a cookie is small.
#[derive(Debug, Clone, Default)]
pub struct SessionItems {
    entries: Vec<(String, Value)>,
    dirty: bool,
}

impl SessionItems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Inserts or replaces a value. A replaced value keeps its original position.
    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) -> Option<Value> {
        let key = key.into();
        let value = value.into();
        self.dirty = true;
        match self.position(&key) {
            Some(i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.position(key)?;
        self.dirty = true;
        Some(self.entries.remove(i).1)
    }

    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
            self.dirty = true;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Whether anything was added, changed or removed since load (or the last `mark_clean`).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    /// Appends without the uniqueness scan; the decoder checks duplicates itself.
    pub(crate) fn push_unchecked(&mut self, key: String, value: Value) {
        self.entries.push((key, value));
    }
}

impl PartialEq for SessionItems {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for SessionItems {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut items = SessionItems::new();
        for (k, v) in iter {
            items.insert(k, v);
        }
        items.mark_clean();
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut items: SessionItems = [("a", 1), ("b", 2)].into_iter().collect();
        assert!(!items.is_dirty());

        let previous = items.insert("a", "one");

        assert_eq!(previous, Some(Value::Int(1)));
        assert_eq!(items.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(items.get("a").and_then(Value::as_str), Some("one"));
        assert!(items.is_dirty());
    }

    #[test]
    fn remove_missing_key_stays_clean() {
        let mut items: SessionItems = [("a", true)].into_iter().collect();

        assert_eq!(items.remove("missing"), None);
        assert!(!items.is_dirty());

        assert_eq!(items.remove("a"), Some(Value::Bool(true)));
        assert!(items.is_dirty());
        assert!(items.is_empty());
    }

    #[test]
    fn clearing_empty_collection_is_not_a_change() {
        let mut items = SessionItems::new();
        items.clear();
        assert!(!items.is_dirty());
    }

    #[test]
    fn equality_ignores_dirty_flag() {
        let clean: SessionItems = [("k", "v")].into_iter().collect();
        let mut dirty = SessionItems::new();
        dirty.insert("k", "v");

        assert!(dirty.is_dirty());
        assert_eq!(clean, dirty);
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3)), Value::Int(3));
    }
}
