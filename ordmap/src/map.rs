use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Index;

use bytes::Bytes;
use serde::de::{self, MapAccess, Visitor};

use crate::{Config, Result};

/// A key/value pair borrowed from an [`OrderedMap`].
#[derive(Debug)]
pub struct Entry<'a, T> {
    key: &'a str,
    value: &'a T,
}

impl<'a, T> Entry<'a, T> {
    pub fn key(&self) -> &'a str {
        self.key
    }

    pub fn value(&self) -> &'a T {
        self.value
    }
}

/// A string-keyed map that remembers the order in which keys were first
/// inserted.
///
/// Re-inserting an existing key replaces its value in place. The key order
/// is used when encoding, and is rebuilt from the input when decoding (see
/// the [`Deserialize`](serde::Deserialize) impl for how duplicate keys are
/// placed).
///
/// The map also carries an `escape_html` flag. Whichever of this crate's
/// encoders writes it (`to_json`, [`to_bytes`](crate::to_bytes),
/// [`to_string`](crate::to_string), or a struct holding the map), the flag of
/// the outermost map decides escaping for everything inside it. Other serde
/// serializers ignore the flag.
#[derive(Clone)]
pub struct OrderedMap<T> {
    keys: Vec<String>,
    values: HashMap<String, T>,
    escape_html: bool,
}

impl<T> Default for OrderedMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OrderedMap<T> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            values: HashMap::with_capacity(capacity),
            escape_html: true,
        }
    }

    pub fn escape_html(&self) -> bool {
        self.escape_html
    }

    pub fn set_escape_html(&mut self, on: bool) {
        self.escape_html = on;
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.values.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Sets `key` to `value`, returning the previous value.
    ///
    /// A new key goes to the end of the order; an existing key keeps its
    /// position.
    pub fn insert(&mut self, key: impl Into<String>, value: T) -> Option<T> {
        let key = key.into();
        match self.values.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.keys.push(key.clone());
                self.values.insert(key, value);
                None
            }
        }
    }

    /// Removes `key` from both the order and the values. Removing a key
    /// that is not present does nothing.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        let value = self.values.remove(key)?;
        if let Some(idx) = self.keys.iter().position(|k| k == key) {
            self.keys.remove(idx);
        }
        Some(value)
    }

    /// The keys in order. This is a view of the map's own order, not a copy.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            keys: self.keys.iter(),
            values: &self.values,
        }
    }

    /// Sorts the keys lexicographically by their bytes.
    pub fn sort_keys(&mut self) {
        self.keys.sort();
    }

    /// Reorders the keys with `compare`. Values are untouched.
    pub fn sort_keys_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&str, &str) -> Ordering,
    {
        self.keys.sort_by(|a, b| compare(a, b));
    }

    /// Reorders the keys with a comparator that can also look at the values.
    ///
    /// The sort is stable: entries that compare equal keep their relative
    /// order.
    pub fn sort_by<F>(&mut self, mut compare: F)
    where
        F: FnMut(&Entry<'_, T>, &Entry<'_, T>) -> Ordering,
    {
        let mut entries: Vec<Entry<'_, T>> = self
            .keys
            .iter()
            .filter_map(|key| self.values.get(key).map(|value| Entry { key, value }))
            .collect();

        entries.sort_by(|a, b| compare(a, b));

        let keys = entries.into_iter().map(|e| e.key.to_string()).collect();
        self.keys = keys;
    }

    /// Builds a map from decoded members, applying the duplicate key rule:
    /// the last value wins, and the key takes the position of its last
    /// occurrence relative to the last occurrences of the other keys.
    pub(crate) fn from_map_access<'de, A>(mut access: A) -> std::result::Result<Self, A::Error>
    where
        A: MapAccess<'de>,
        T: de::Deserialize<'de>,
    {
        let hint = access.size_hint().unwrap_or(0).min(4096);
        let mut members: Vec<Option<(String, T)>> = Vec::with_capacity(hint);
        let mut last_seen: HashMap<String, usize> = HashMap::with_capacity(hint);

        while let Some((key, value)) = access.next_entry::<String, T>()? {
            let slot = members.len();
            if let Some(prev) = last_seen.insert(key.clone(), slot) {
                tracing::debug!(key = %key, from = prev, to = slot, "moving duplicate key");
                members[prev] = None;
            }
            members.push(Some((key, value)));
        }

        Ok(members.into_iter().flatten().collect())
    }
}

impl<T: serde::Serialize> OrderedMap<T> {
    pub fn to_json(&self) -> Result<Bytes> {
        crate::to_bytes(self)
    }

    pub fn to_json_pretty(&self, indent: &str) -> Result<Bytes> {
        crate::to_bytes_with(self, &Config::default().with_indent(indent))
    }
}

impl<T: de::DeserializeOwned> OrderedMap<T> {
    pub fn from_json(input: &[u8]) -> Result<Self> {
        Self::from_json_with(input, &Config::default())
    }

    /// Decodes a JSON object, taking `escape_html` and the depth limit from
    /// `config`.
    pub fn from_json_with(input: &[u8], config: &Config) -> Result<Self> {
        let mut map: Self = crate::from_slice_with(input, config)?;
        map.escape_html = config.escape_html;
        Ok(map)
    }
}

impl<T: PartialEq> PartialEq for OrderedMap<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: fmt::Debug> fmt::Debug for OrderedMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T> Index<&str> for OrderedMap<T> {
    type Output = T;

    fn index(&self, key: &str) -> &T {
        match self.values.get(key) {
            Some(v) => v,
            None => panic!("key not present in OrderedMap: {key:?}"),
        }
    }
}

pub struct Iter<'a, T> {
    keys: std::slice::Iter<'a, String>,
    values: &'a HashMap<String, T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (&'a str, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        self.values.get(key).map(|v| (key.as_str(), v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

pub struct IntoIter<T> {
    keys: std::vec::IntoIter<String>,
    values: HashMap<String, T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = (String, T);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        self.values.remove(&key).map(|v| (key, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.keys.size_hint()
    }
}

impl<T> IntoIterator for OrderedMap<T> {
    type Item = (String, T);
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            keys: self.keys.into_iter(),
            values: self.values,
        }
    }
}

impl<'a, T> IntoIterator for &'a OrderedMap<T> {
    type Item = (&'a str, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for OrderedMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, T> Extend<(K, T)> for OrderedMap<T> {
    fn extend<I: IntoIterator<Item = (K, T)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<T> serde::Serialize for OrderedMap<T>
where
    T: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let name = if self.escape_html {
            ESCAPE_HTML_ON
        } else {
            ESCAPE_HTML_OFF
        };
        serializer.serialize_newtype_struct(name, &Members(self))
    }
}

/// Newtype names that hand a map's `escape_html` flag to
/// [`Serializer`](crate::Serializer). Serializers that write newtypes
/// transparently, serde_json among them, never see them.
pub(crate) const ESCAPE_HTML_ON: &str = "$ordmap::EscapeHtml";
pub(crate) const ESCAPE_HTML_OFF: &str = "$ordmap::NoEscapeHtml";

struct Members<'a, T>(&'a OrderedMap<T>);

impl<T: serde::Serialize> serde::Serialize for Members<'_, T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.0.len()))?;

        for (k, v) in self.0 {
            map.serialize_key(k)?;
            map.serialize_value(v)?;
        }

        map.end()
    }
}

struct OrderedMapVisitor<T>(PhantomData<T>);

impl<'de, T: de::Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<T> {
    type Value = OrderedMap<T>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A>(self, access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        OrderedMap::from_map_access(access)
    }
}

impl<'de, T> de::Deserialize<'de> for OrderedMap<T>
where
    T: de::Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

#[cfg(feature = "fuzz")]
impl<'a, T: arbitrary::Arbitrary<'a>> arbitrary::Arbitrary<'a> for OrderedMap<T> {
    fn arbitrary(u: &mut arbitrary::Unstructured<'a>) -> arbitrary::Result<Self> {
        let entries: Vec<(String, T)> = u.arbitrary()?;
        Ok(entries.into_iter().collect())
    }
}
