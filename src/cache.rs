// src/cache.rs
use std::collections::HashMap;

/// String-keyed memo table with case-insensitive keys.
///
/// The only invalidation is [`FieldCache::clear`]; there is no per-key removal
/// and no size bound. Not synchronized: the owner serializes writers.
#[derive(Debug, Clone)]
pub struct FieldCache<V> {
    entries: HashMap<String, V>,
}

impl<V> Default for FieldCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

fn fold(key: &str) -> String {
    key.to_lowercase()
}

impl<V> FieldCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(&fold(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&fold(key))
    }

    /// Inserts or overwrites the value stored under `key`.
    pub fn set(&mut self, key: &str, value: V) {
        self.entries.insert(fold(key), value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folded keys, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for FieldCache<String> {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut cache = Self::new();
        for (name, value) in iter {
            cache.set(name, value.to_string());
        }
        cache
    }
}
