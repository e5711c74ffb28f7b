use serde::Serialize;

/// Sorted, duplicate-free list of names supporting prefix lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CompletionIndex {
    names: Vec<String>,
}

impl CompletionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `name` at its sorted position. Returns false if it was
    /// already present.
    pub fn insert(&mut self, name: &str) -> bool {
        match self.names.binary_search_by(|probe| probe.as_str().cmp(name)) {
            Ok(_) => false,
            Err(pos) => {
                self.names.insert(pos, name.to_string());
                true
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names
            .binary_search_by(|probe| probe.as_str().cmp(name))
            .is_ok()
    }

    /// All names starting with `prefix`, in ascending order
    pub fn prefix_matches(&self, prefix: &str) -> &[String] {
        let start = self.names.partition_point(|name| name.as_str() < prefix);
        let len = self.names[start..]
            .iter()
            .take_while(|name| name.starts_with(prefix))
            .count();
        &self.names[start..start + len]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl<S: AsRef<str>> FromIterator<S> for CompletionIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut index = Self::new();
        for name in iter {
            index.insert(name.as_ref());
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn index(names: &[&str]) -> CompletionIndex {
        names.iter().collect()
    }

    #[test]
    fn test_insert_keeps_order_and_is_idempotent() {
        let mut idx = CompletionIndex::new();
        assert!(idx.insert("map"));
        assert!(idx.insert("car"));
        assert!(idx.insert("list"));
        assert!(!idx.insert("car"));

        assert_eq!(idx.as_slice(), ["car", "list", "map"]);
        assert!(idx.as_slice().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_prefix_matches() {
        let idx = index(&["string-ref", "car", "string", "string-append", "strip", "cdr"]);

        assert_eq!(
            idx.prefix_matches("string"),
            ["string", "string-append", "string-ref"]
        );
        assert_eq!(idx.prefix_matches("str"), ["string", "string-append", "string-ref", "strip"]);
        assert_eq!(idx.prefix_matches("c"), ["car", "cdr"]);
        assert!(idx.prefix_matches("zz").is_empty());
        assert!(idx.prefix_matches("strings").is_empty());
    }

    #[test]
    fn test_empty_prefix_matches_everything() {
        let idx = index(&["b", "a", "c"]);
        assert_eq!(idx.prefix_matches(""), ["a", "b", "c"]);
        assert!(CompletionIndex::new().prefix_matches("").is_empty());
    }

    #[test]
    fn test_byte_order_sorting() {
        // Uppercase sorts before lowercase, symbols by code point
        let idx = index(&["list", "List", "*", "λ", "<="]);
        assert_eq!(idx.as_slice(), ["*", "<=", "List", "list", "λ"]);
        assert!(idx.contains("λ"));
        assert!(!idx.contains("lambda"));
    }
}
