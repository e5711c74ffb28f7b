//! Background loading of the documentation and read access to it
//!
//! [`DocumentationManager::spawn`] hands the load to tokio's blocking pool and
//! returns immediately. Queries made while the load is still running behave as
//! if nothing were documented; callers that need the documentation can await
//! [`DocumentationManager::ready`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;

use crate::config::{load_documentation_config, DocumentationConfig, DEFAULT_CONFIG_FILE};
use crate::documentation::{DocumentationStore, LibraryPath};
use crate::markdown::{Document, DocumentParser, Parser};
use crate::symbol_index::{CompletionQuery, SymbolIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Loading,
    Ready,
}

/// Fully loaded documentation together with its symbol index
#[derive(Debug, Default)]
pub struct Documentation {
    store: DocumentationStore,
    symbols: SymbolIndex,
}

impl Documentation {
    pub fn from_store(store: DocumentationStore) -> Self {
        let symbols = SymbolIndex::build(&store);
        Self { store, symbols }
    }

    /// Loads every configured library below `base_dir`, skipping files that
    /// cannot be read or parsed
    pub fn load<D>(config: &DocumentationConfig, base_dir: &Path, parser: &D) -> Self
    where
        D: DocumentParser + ?Sized,
    {
        let started = Instant::now();
        let mut store = DocumentationStore::new();
        let report = store.load(config.libraries(), base_dir, parser);
        let docs = Self::from_store(store);

        tracing::info!(
            libraries = docs.store.library_count(),
            symbols = docs.symbols.len(),
            files_loaded = report.files_loaded,
            files_skipped = report.files_skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "documentation loaded"
        );
        docs
    }

    pub fn store(&self) -> &DocumentationStore {
        &self.store
    }

    pub fn symbols(&self) -> &SymbolIndex {
        &self.symbols
    }

    pub fn library_documentation(&self, path: &LibraryPath) -> Option<&Document> {
        self.store.library_documentation(path)
    }

    pub fn library_documentation_for<I>(&self, expr: I) -> Option<&Document>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.store.library_documentation_for(expr)
    }

    pub fn symbol_documentation(&self, name: &str) -> Option<Document> {
        self.store.symbol_documentation(name)
    }

    pub fn has_documentation(&self, name: &str) -> bool {
        self.store.has_documentation(name)
    }

    pub fn completions(&self, prefix: &str) -> &[String] {
        self.symbols.completions(prefix)
    }

    pub fn documentation_available(&self, name: &str) -> bool {
        self.symbols.contains(name)
    }
}

/// Shared handle to documentation that is loaded in the background.
///
/// Clones share the same documentation and load state.
#[derive(Clone)]
pub struct DocumentationManager {
    docs: Arc<OnceLock<Documentation>>,
    state: watch::Receiver<LoadState>,
}

impl DocumentationManager {
    /// Starts loading `config` relative to `base_dir` with the built-in
    /// Markdown parser. Must be called from within a tokio runtime.
    pub fn spawn(config: DocumentationConfig, base_dir: PathBuf) -> Self {
        Self::spawn_with_parser(config, base_dir, Parser::new())
    }

    pub fn spawn_with_parser<D>(config: DocumentationConfig, base_dir: PathBuf, parser: D) -> Self
    where
        D: DocumentParser + Send + 'static,
    {
        Self::spawn_loader(move || Documentation::load(&config, &base_dir, &parser))
    }

    /// Reads [`DEFAULT_CONFIG_FILE`] from `bundle_dir` and loads the libraries
    /// it lists, all in the background
    pub fn spawn_from_bundle(bundle_dir: PathBuf) -> Self {
        Self::spawn_loader(move || {
            let config = load_documentation_config(&bundle_dir.join(DEFAULT_CONFIG_FILE));
            Documentation::load(&config, &bundle_dir, &Parser::new())
        })
    }

    fn spawn_loader<F>(load: F) -> Self
    where
        F: FnOnce() -> Documentation + Send + 'static,
    {
        let docs = Arc::new(OnceLock::new());
        let (tx, rx) = watch::channel(LoadState::Loading);

        let slot = docs.clone();
        tokio::task::spawn_blocking(move || {
            if slot.set(load()).is_ok() {
                // No receivers left means nobody is waiting.
                let _ = tx.send(LoadState::Ready);
            }
        });

        Self { docs, state: rx }
    }

    /// A manager over documentation that is already loaded
    pub fn from_documentation(docs: Documentation) -> Self {
        let slot = OnceLock::new();
        let _ = slot.set(docs);
        let (_tx, rx) = watch::channel(LoadState::Ready);
        Self {
            docs: Arc::new(slot),
            state: rx,
        }
    }

    pub fn state(&self) -> LoadState {
        *self.state.borrow()
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == LoadState::Ready
    }

    /// Waits for the load to finish. Returns `None` if the loader stopped
    /// without publishing any documentation.
    pub async fn ready(&self) -> Option<&Documentation> {
        let mut state = self.state.clone();
        if state.wait_for(|s| *s == LoadState::Ready).await.is_err() {
            tracing::warn!("documentation loader exited before becoming ready");
        }
        self.docs.get()
    }

    /// The documentation, if loading has finished
    pub fn documentation(&self) -> Option<&Documentation> {
        self.docs.get()
    }

    pub fn library_documentation(&self, path: &LibraryPath) -> Option<&Document> {
        self.documentation()?.library_documentation(path)
    }

    pub fn library_documentation_for<I>(&self, expr: I) -> Option<&Document>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.documentation()?.library_documentation_for(expr)
    }

    pub fn symbol_documentation(&self, name: &str) -> Option<Document> {
        self.documentation()?.symbol_documentation(name)
    }

    pub fn has_documentation(&self, name: &str) -> bool {
        self.documentation()
            .is_some_and(|docs| docs.has_documentation(name))
    }

    pub fn completions(&self, prefix: &str) -> &[String] {
        match self.documentation() {
            Some(docs) => docs.completions(prefix),
            None => &[],
        }
    }

    pub fn search(&self, query: &CompletionQuery) -> &[String] {
        match self.documentation() {
            Some(docs) => docs.symbols().search(query),
            None => &[],
        }
    }

    pub fn documentation_available(&self, name: &str) -> bool {
        self.documentation()
            .is_some_and(|docs| docs.documentation_available(name))
    }
}

impl fmt::Debug for DocumentationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentationManager")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{Block, MarkdownError};
    use std::fs;
    use std::sync::mpsc;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const SPAN: &str = r#"<span style="float:right;text-align:rigth;">"#;

    fn bundle() -> (TempDir, DocumentationConfig) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("Libraries")).unwrap();
        fs::write(
            dir.path().join("Libraries/base.md"),
            format!(
                "# (scheme base)\n\n**(vector-ref v k)** {SPAN}[procedure]</span>\n\nElement access.\n\n\
                 **(vector-set! v k x)** {SPAN}[procedure]</span>\n\nElement update.\n"
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("Libraries/vectors.md"),
            format!("**(vector-ref v k)** {SPAN}[procedure]</span>\n\nSRFI 133 access.\n"),
        )
        .unwrap();
        let config = DocumentationConfig::new()
            .with_library("scheme base", "Libraries/base.md")
            .with_library("srfi 133", "Libraries/vectors.md")
            .with_library("lisppad missing", "Libraries/missing.md");
        (dir, config)
    }

    /// Parser that blocks until the test releases it
    struct GatedParser {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl DocumentParser for GatedParser {
        fn parse(&self, source: &str) -> Result<Document, MarkdownError> {
            if let Ok(gate) = self.gate.lock() {
                let _ = gate.recv();
            }
            Parser::new().parse(source)
        }
    }

    #[test]
    fn test_load_synchronously() {
        let (dir, config) = bundle();
        let docs = Documentation::load(&config, dir.path(), &Parser::new());

        assert_eq!(docs.store().library_count(), 2);
        assert_eq!(docs.completions("vector"), ["vector-ref", "vector-set!"]);
        assert!(docs.documentation_available("vector-set!"));
        assert!(docs.has_documentation("vector-ref"));
        assert!(docs
            .library_documentation(&LibraryPath::new(["scheme", "base"]))
            .is_some());
        assert!(docs.library_documentation_for(["lisppad", "missing"]).is_none());

        let combined = docs.symbol_documentation("vector-ref").unwrap();
        let headings = combined
            .blocks()
            .iter()
            .filter(|b| matches!(b, Block::Heading { .. }))
            .count();
        assert_eq!(headings, 2);
    }

    #[tokio::test]
    async fn test_spawn_becomes_ready() {
        let (dir, config) = bundle();
        let manager = DocumentationManager::spawn(config, dir.path().to_path_buf());

        let docs = manager.ready().await.unwrap();
        assert!(manager.is_initialized());
        assert_eq!(manager.state(), LoadState::Ready);
        assert_eq!(docs.symbols().len(), 2);
        assert_eq!(manager.completions("vector-s"), ["vector-set!"]);
        assert!(manager.has_documentation("vector-ref"));
        assert_eq!(
            manager.search(&CompletionQuery::prefix("vector").with_limit(1)),
            ["vector-ref"]
        );
    }

    #[tokio::test]
    async fn test_queries_are_empty_while_loading() {
        let (dir, config) = bundle();
        let (release, gate) = mpsc::channel();
        let parser = GatedParser {
            gate: Mutex::new(gate),
        };
        let manager = DocumentationManager::spawn_with_parser(config, dir.path().to_path_buf(), parser);

        assert_eq!(manager.state(), LoadState::Loading);
        assert!(!manager.is_initialized());
        assert!(manager.completions("vector").is_empty());
        assert!(!manager.documentation_available("vector-ref"));
        assert!(!manager.has_documentation("vector-ref"));
        assert!(manager.symbol_documentation("vector-ref").is_none());
        assert!(manager
            .library_documentation(&LibraryPath::new(["scheme", "base"]))
            .is_none());

        // Two parses per loaded file
        for _ in 0..4 {
            release.send(()).unwrap();
        }
        let clone = manager.clone();
        assert!(clone.ready().await.is_some());
        assert!(manager.is_initialized());
        assert!(manager.documentation_available("vector-ref"));
    }

    #[tokio::test]
    async fn test_spawn_from_bundle() {
        let (dir, config) = bundle();
        fs::write(
            dir.path().join(DEFAULT_CONFIG_FILE),
            serde_json::to_vec(&config).unwrap(),
        )
        .unwrap();

        let manager = DocumentationManager::spawn_from_bundle(dir.path().to_path_buf());
        let docs = manager.ready().await.unwrap();
        assert_eq!(docs.store().library_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_bundle_is_ready_with_nothing() {
        let dir = TempDir::new().unwrap();
        let manager = DocumentationManager::spawn_from_bundle(dir.path().to_path_buf());

        let docs = manager.ready().await.unwrap();
        assert!(docs.store().is_empty());
        assert!(manager.completions("").is_empty());
    }

    #[tokio::test]
    async fn test_from_documentation_is_ready() {
        let manager = DocumentationManager::from_documentation(Documentation::default());
        assert!(manager.is_initialized());
        assert!(manager.ready().await.is_some());
        assert!(format!("{:?}", manager).contains("Ready"));
    }
}
