//! Completion queries

use super::completion::CompletionIndex;

/// Prefix completion request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionQuery {
    pub prefix: String,
    /// Maximum number of names to return
    pub limit: Option<usize>,
}

impl CompletionQuery {
    pub fn prefix(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Runs the query; matches stay in ascending order
    pub fn execute<'a>(&self, index: &'a CompletionIndex) -> &'a [String] {
        let matches = index.prefix_matches(&self.prefix);
        match self.limit {
            Some(limit) => &matches[..limit.min(matches.len())],
            None => matches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_truncates_in_order() {
        let index: CompletionIndex = ["vector-ref", "vector", "vector-set!", "values"]
            .into_iter()
            .collect();

        let query = CompletionQuery::prefix("vector").with_limit(2);
        assert_eq!(query.execute(&index), ["vector", "vector-ref"]);

        let unlimited = CompletionQuery::prefix("v");
        assert_eq!(unlimited.execute(&index).len(), 4);

        let zero = CompletionQuery::prefix("v").with_limit(0);
        assert!(zero.execute(&index).is_empty());
    }

    #[test]
    fn test_limit_larger_than_matches() {
        let index: CompletionIndex = ["car", "cdr"].into_iter().collect();
        assert_eq!(CompletionQuery::prefix("c").with_limit(10).execute(&index), ["car", "cdr"]);
    }
}
