//! Symbol index
//!
//! Every documented name is kept twice: in a hash set for existence checks
//! and in a sorted [`CompletionIndex`] for prefix completion. Both are filled
//! together so they always hold the same names.

mod completion;
mod search;

pub use completion::CompletionIndex;
pub use search::CompletionQuery;

use std::collections::HashSet;

use crate::documentation::DocumentationStore;

#[derive(Debug, Clone, Default)]
pub struct SymbolIndex {
    symbols: HashSet<String>,
    completions: CompletionIndex,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every symbol documented in `store`
    pub fn build(store: &DocumentationStore) -> Self {
        let mut index = Self::new();
        for name in store.symbol_names() {
            index.insert(name);
        }
        index
    }

    pub fn insert(&mut self, name: &str) {
        if self.symbols.insert(name.to_string()) {
            self.completions.insert(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains(name)
    }

    pub fn completions(&self, prefix: &str) -> &[String] {
        self.completions.prefix_matches(prefix)
    }

    pub fn search(&self, query: &CompletionQuery) -> &[String] {
        query.execute(&self.completions)
    }

    pub fn completion_index(&self) -> &CompletionIndex {
        &self.completions
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documentation::LibraryPath;
    use crate::markdown::Parser;

    const SPAN: &str = r#"<span style="float:right;text-align:rigth;">"#;

    #[test]
    fn test_set_and_index_stay_consistent() {
        let mut index = SymbolIndex::new();
        for name in ["car", "cdr", "car", "cons", "cdr"] {
            index.insert(name);
        }

        assert_eq!(index.len(), 3);
        assert_eq!(index.completion_index().len(), index.len());
        for name in index.completion_index().iter() {
            assert!(index.contains(name));
        }
    }

    #[test]
    fn test_build_from_store() {
        let mut store = DocumentationStore::new();
        let parser = Parser::new();
        let base = format!(
            "**(cons a b)** {SPAN}[procedure]</span>\n\nPairs.\n\n**car** {SPAN}[procedure]</span>\n"
        );
        let lists = format!("**(cons-tree a b)** {SPAN}[procedure]</span>\n\n**car** {SPAN}[procedure]</span>\n");
        store.add_source(LibraryPath::from_name("scheme base"), &base, &parser).unwrap();
        store.add_source(LibraryPath::from_name("srfi 1"), &lists, &parser).unwrap();

        let index = SymbolIndex::build(&store);

        assert_eq!(index.len(), 3);
        assert!(index.contains("cons-tree"));
        assert!(!index.contains("cdr"));
        assert_eq!(index.completions("con"), ["cons", "cons-tree"]);
        assert_eq!(index.search(&CompletionQuery::prefix("c").with_limit(1)), ["car"]);
    }

    #[test]
    fn test_empty_index() {
        let index = SymbolIndex::new();
        assert!(index.is_empty());
        assert!(index.completions("").is_empty());
        assert!(!index.contains(""));
    }
}
