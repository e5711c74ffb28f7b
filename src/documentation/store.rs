use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use super::library::{LibraryDocumentation, LibraryPath, SymbolDoc};
use super::segment::segment;
use crate::error::DocumentationError;
use crate::markdown::{Block, Document, DocumentParser, MarkdownError, Text};

/// Opening tag that right-aligns the category of a signature line
pub const SIGNATURE_SPAN_OPEN: &str = r#"<span style="float:right;text-align:rigth;">"#;
const SIGNATURE_SPAN_OPEN_DISPLAY: &str = "&nbsp;&nbsp;&nbsp;";
const SIGNATURE_SPAN_CLOSE: &str = "</span>  ";
const SIGNATURE_SPAN_CLOSE_DISPLAY: &str = "  ";

/// Heading level of the per-library sections in symbol documentation
pub const SECTION_HEADING_LEVEL: u8 = 3;

/// Rewrites signature spans into plain spacing for display
pub fn normalize_display_text(source: &str) -> String {
    source
        .replace(SIGNATURE_SPAN_OPEN, SIGNATURE_SPAN_OPEN_DISPLAY)
        .replace(SIGNATURE_SPAN_CLOSE, SIGNATURE_SPAN_CLOSE_DISPLAY)
}

/// Outcome of loading a set of documentation files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files_loaded: usize,
    pub files_skipped: usize,
    /// Symbol registrations, counting a name once per library
    pub entries: usize,
}

/// Documentation of all libraries, keyed and ordered by library path
#[derive(Debug, Clone, Default)]
pub struct DocumentationStore {
    libraries: BTreeMap<LibraryPath, LibraryDocumentation>,
}

impl DocumentationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every `(library name, relative path)` entry below `base_dir`.
    ///
    /// Files that cannot be read or parsed are logged and skipped.
    pub fn load<I, N, P, D>(&mut self, entries: I, base_dir: &Path, parser: &D) -> LoadReport
    where
        I: IntoIterator<Item = (N, P)>,
        N: AsRef<str>,
        P: AsRef<Path>,
        D: DocumentParser + ?Sized,
    {
        let mut report = LoadReport::default();

        for (name, relative) in entries {
            let name = name.as_ref();
            let path = base_dir.join(relative.as_ref());
            match self.load_file(name, &path, parser) {
                Ok(count) => {
                    tracing::debug!(
                        library = name,
                        path = %path.display(),
                        entries = count,
                        "loaded documentation file"
                    );
                    report.files_loaded += 1;
                    report.entries += count;
                }
                Err(e) => {
                    tracing::warn!(library = name, error = %e, "skipping documentation file");
                    report.files_skipped += 1;
                }
            }
        }

        report
    }

    /// Reads and registers one library file, returning the number of symbols
    /// it documents
    pub fn load_file<D>(&mut self, library: &str, path: &Path, parser: &D) -> Result<usize, DocumentationError>
    where
        D: DocumentParser + ?Sized,
    {
        let source = fs::read_to_string(path).map_err(|source| DocumentationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_source(LibraryPath::from_name(library), &source, parser)
            .map_err(|source| DocumentationError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Registers a library from Markdown source.
    ///
    /// The display content comes from the normalized source, symbol entries
    /// from the original one. Nothing is stored unless both parse. A later
    /// source for the same library replaces its content and overrides
    /// entries with the same name.
    pub fn add_source<D>(&mut self, library: LibraryPath, source: &str, parser: &D) -> Result<usize, MarkdownError>
    where
        D: DocumentParser + ?Sized,
    {
        let content = parser.parse(&normalize_display_text(source))?;
        let original = parser.parse(source)?;
        let entries = segment(original.blocks());

        let doc = self.libraries.entry(library).or_default();
        doc.content = Some(content);

        let mut count = 0;
        for entry in entries {
            for name in &entry.names {
                doc.symbol_docs.insert(
                    name.clone(),
                    SymbolDoc {
                        kind: entry.kind.clone(),
                        body: entry.body.clone(),
                    },
                );
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn library(&self, path: &LibraryPath) -> Option<&LibraryDocumentation> {
        self.libraries.get(path)
    }

    /// Display document of a library
    pub fn library_documentation(&self, path: &LibraryPath) -> Option<&Document> {
        self.libraries.get(path)?.content.as_ref()
    }

    /// Display document of the library named by a list-like expression such
    /// as `(scheme base)`
    pub fn library_documentation_for<I>(&self, expr: I) -> Option<&Document>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.library_documentation(&LibraryPath::from_expr(expr))
    }

    /// Every library documenting `name`, in library order
    pub fn symbol_entries(&self, name: &str) -> Vec<(&LibraryPath, &SymbolDoc)> {
        self.libraries
            .iter()
            .filter_map(|(path, lib)| lib.symbol(name).map(|doc| (path, doc)))
            .collect()
    }

    /// Combined documentation of `name` across all libraries.
    ///
    /// Each library contributes a heading `(<library>) <kind>` followed by its
    /// entry body; sections are separated by an empty paragraph.
    pub fn symbol_documentation(&self, name: &str) -> Option<Document> {
        let mut blocks = Vec::new();
        for (path, doc) in self.symbol_entries(name) {
            if !blocks.is_empty() {
                blocks.push(Block::Paragraph(Text::new()));
            }
            blocks.push(Block::Heading {
                level: SECTION_HEADING_LEVEL,
                text: Text::from(format!("({}) {}", path, doc.kind)),
            });
            blocks.extend(doc.body.iter().cloned());
        }

        if blocks.is_empty() {
            None
        } else {
            Some(Document::new(blocks))
        }
    }

    pub fn has_documentation(&self, name: &str) -> bool {
        self.libraries.values().any(|lib| lib.documents(name))
    }

    pub fn libraries(&self) -> impl Iterator<Item = &LibraryPath> {
        self.libraries.keys()
    }

    pub fn library_count(&self) -> usize {
        self.libraries.len()
    }

    /// Documented names of all libraries; a name appears once per library
    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.libraries.values().flat_map(LibraryDocumentation::symbol_names)
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}
