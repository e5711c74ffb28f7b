//! Library documentation: signature recognition, entry segmentation and the
//! per-library store.

mod library;
mod segment;
mod signature;
mod store;

pub use library::{LibraryDocumentation, LibraryPath, SymbolDoc};
pub use segment::{segment, Entry};
pub use signature::{
    isolate_name, match_bold_name_type_header, match_continuation_signature, name_and_type,
    signature, Signature,
};
pub use store::{
    normalize_display_text, DocumentationStore, LoadReport, SECTION_HEADING_LEVEL,
    SIGNATURE_SPAN_OPEN,
};
