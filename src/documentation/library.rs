use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::markdown::{Block, Document};

/// Name of a Scheme library, e.g. `(scheme base)` is `["scheme", "base"]`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryPath(Vec<String>);

impl LibraryPath {
    pub fn new<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// Splits a configured library name such as `"scheme base"` on spaces.
    /// Empty components from repeated spaces are dropped.
    pub fn from_name(name: &str) -> Self {
        Self(
            name.split(' ')
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Builds a path from the elements of a list-like expression, using each
    /// element's printed form as a component
    pub fn from_expr<I>(elements: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        Self(elements.into_iter().map(|e| e.to_string()).collect())
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LibraryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Documentation of one symbol within one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDoc {
    /// Category from the signature line, e.g. `procedure` or `syntax`
    pub kind: String,
    /// Signature paragraph followed by the blocks describing it
    pub body: Vec<Block>,
}

/// Everything known about one library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryDocumentation {
    /// The whole library document, prepared for display
    pub content: Option<Document>,
    pub symbol_docs: HashMap<String, SymbolDoc>,
}

impl LibraryDocumentation {
    pub fn symbol(&self, name: &str) -> Option<&SymbolDoc> {
        self.symbol_docs.get(name)
    }

    pub fn documents(&self, name: &str) -> bool {
        self.symbol_docs.contains_key(name)
    }

    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.symbol_docs.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name() {
        assert_eq!(
            LibraryPath::from_name("scheme base"),
            LibraryPath::new(["scheme", "base"])
        );
        assert_eq!(
            LibraryPath::from_name("lisppad  system"),
            LibraryPath::new(["lisppad", "system"])
        );
    }

    #[test]
    fn test_from_expr_uses_display() {
        let path = LibraryPath::from_expr(vec![
            Box::new("srfi") as Box<dyn fmt::Display>,
            Box::new(1),
        ]);
        assert_eq!(path.components(), ["srfi", "1"]);
        assert_eq!(path.to_string(), "srfi 1");
    }

    #[test]
    fn test_paths_order_by_components() {
        let mut paths = vec![
            LibraryPath::new(["scheme", "char"]),
            LibraryPath::new(["lisppad", "draw"]),
            LibraryPath::new(["scheme", "base"]),
            LibraryPath::new(["scheme"]),
        ];
        paths.sort();
        let printed: Vec<String> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(printed, ["lisppad draw", "scheme", "scheme base", "scheme char"]);
    }
}
