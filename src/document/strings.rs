use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Distinct strings in first-seen order.
///
/// Insertion order is the traversal order of the source document, so batch
/// boundaries derived from it are deterministic for a given document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct StringSet {
    items: Vec<String>,
    positions: HashMap<String, usize>,
}

impl StringSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, returning `false` if it was already present.
    pub fn insert(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.positions.contains_key(&value) {
            return false;
        }
        self.positions.insert(value.clone(), self.items.len());
        self.items.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.positions.contains_key(value)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.items
    }
}

impl From<Vec<String>> for StringSet {
    fn from(values: Vec<String>) -> Self {
        values.into_iter().collect()
    }
}

impl From<StringSet> for Vec<String> {
    fn from(set: StringSet) -> Self {
        set.items
    }
}

impl<S: Into<String>> FromIterator<S> for StringSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = StringSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

/// Source string to translated string, ordered by first insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, String)>", into = "Vec<(String, String)>")]
pub struct StringTable {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table mapping every string to itself.
    pub fn identity<'a>(strings: impl IntoIterator<Item = &'a str>) -> Self {
        let mut table = Self::new();
        table.insert_identity(strings);
        table
    }

    /// Insert or overwrite a mapping. An overwritten key keeps its position.
    pub fn insert(&mut self, source: impl Into<String>, translated: impl Into<String>) {
        let source = source.into();
        let translated = translated.into();
        match self.positions.get(&source) {
            Some(&idx) => self.entries[idx].1 = translated,
            None => {
                self.positions.insert(source.clone(), self.entries.len());
                self.entries.push((source, translated));
            }
        }
    }

    pub fn insert_identity<'a>(&mut self, strings: impl IntoIterator<Item = &'a str>) {
        for s in strings {
            self.insert(s, s);
        }
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.positions
            .get(source)
            .map(|&idx| self.entries[idx].1.as_str())
    }

    pub fn contains_key(&self, source: &str) -> bool {
        self.positions.contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(s, t)| (s.as_str(), t.as_str()))
    }

    /// Number of entries whose translation differs from the source.
    pub fn changed_count(&self) -> usize {
        self.entries.iter().filter(|(s, t)| s != t).count()
    }
}

impl From<Vec<(String, String)>> for StringTable {
    fn from(entries: Vec<(String, String)>) -> Self {
        let mut table = StringTable::new();
        for (source, translated) in entries {
            table.insert(source, translated);
        }
        table
    }
}

impl From<StringTable> for Vec<(String, String)> {
    fn from(table: StringTable) -> Self {
        table.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_set_keeps_first_seen_order() {
        let set: StringSet = ["b", "a", "b", "c", "a"].into_iter().collect();
        assert_eq!(set.as_slice(), &["b", "a", "c"]);
        assert!(set.contains("c"));
        assert!(!set.contains("B"));
    }

    #[test]
    fn test_string_set_is_whitespace_sensitive() {
        let set: StringSet = ["Hello", "Hello ", "hello"].into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_fifty_occurrences_collapse_to_one_entry() {
        let set: StringSet = std::iter::repeat("Hello").take(50).collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_table_overwrite_keeps_position() {
        let mut table = StringTable::identity(["one", "two"]);
        table.insert("one", "eins");
        let entries: Vec<_> = table.iter().collect();
        assert_eq!(entries, vec![("one", "eins"), ("two", "two")]);
        assert_eq!(table.changed_count(), 1);
    }

    #[test]
    fn test_serde_preserves_order() {
        let mut table = StringTable::new();
        table.insert("zeta", "Z");
        table.insert("alpha", "A");
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[["zeta","Z"],["alpha","A"]]"#);
        let back: StringTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get("alpha"), Some("A"));
        assert_eq!(back, table);

        let set: StringSet = serde_json::from_str(r#"["x","y","x"]"#).unwrap();
        assert_eq!(set.as_slice(), &["x", "y"]);
    }
}
