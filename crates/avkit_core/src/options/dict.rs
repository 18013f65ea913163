//! Ordered key/value dictionary for codec, format and metadata options.

use serde::{Deserialize, Serialize};

/// Insertion-ordered dictionary with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDict {
    entries: Vec<(String, String)>,
}

impl OptionDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an existing entry in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Set a value only when the key is not present yet.
    pub fn set_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.contains(&key) {
            self.entries.push((key, value.into()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Copy every entry of `other`, keeping existing keys untouched.
    pub fn merge_missing(&mut self, other: &OptionDict) {
        for (k, v) in other.iter() {
            self.set_if_absent(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Take all entries, leaving the dictionary empty.
    pub fn take(&mut self) -> OptionDict {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut d = OptionDict::new();
        d.set("b", "1");
        d.set("g", "15");
        d.set("b", "2");
        let keys: Vec<_> = d.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "g"]);
        assert_eq!(d.get("b"), Some("2"));
    }

    #[test]
    fn set_if_absent_keeps_user_value() {
        let mut d = OptionDict::new();
        d.set("b", "5000k");
        d.set_if_absent("b", "1150000");
        d.set_if_absent("maxrate", "1150000");
        assert_eq!(d.get("b"), Some("5000k"));
        assert_eq!(d.get("maxrate"), Some("1150000"));
    }
}
