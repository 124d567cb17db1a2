//! Core traits for language analysis.

use std::path::Path;

use super::FileFacts;
use crate::profile::LanguageProfile;

/// Holds a parsed tree-sitter tree and associated metadata.
///
/// This is kept separate from FileFacts to allow reusing the tree
/// for multiple analysis passes without re-parsing.
pub struct ParsedFile {
    /// The tree-sitter parse tree.
    pub tree: tree_sitter::Tree,
    /// The original source code (kept for node text extraction).
    pub source: Vec<u8>,
    /// The file path (for diagnostics).
    pub path: String,
}

impl ParsedFile {
    /// Get the source code as a string slice.
    pub fn source_str(&self) -> &str {
        std::str::from_utf8(&self.source).unwrap_or("")
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: tree_sitter::Node) -> &str {
        node.utf8_text(&self.source).unwrap_or("")
    }

    /// Text of a named field of `node`, if present.
    pub fn field_text(&self, node: tree_sitter::Node, field: &str) -> Option<&str> {
        node.child_by_field_name(field).map(|n| self.node_text(n))
    }
}

/// Language-specific analyzer trait.
///
/// Each language (Go, Rust, etc.) implements this trait to turn source text
/// into `FileFacts`. Everything after that point is language-agnostic and
/// driven by the analyzer's `LanguageProfile`.
///
/// # Thread Safety
///
/// Note: tree_sitter::Parser is not Sync, so implementations create a
/// parser per call.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "go", "rust").
    fn language_id(&self) -> &'static str;

    /// Returns file extensions this analyzer handles (without dot).
    ///
    /// Examples: `["go"]`, `["rs"]`
    fn file_extensions(&self) -> &'static [&'static str];

    /// Default visibility rule and annotation vocabulary for the language.
    fn default_profile(&self) -> LanguageProfile;

    /// Parse a source file into a tree-sitter tree.
    ///
    /// Partial parse errors are still returned as a valid tree with ERROR nodes.
    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile>;

    /// Extract all facts from a parsed file.
    ///
    /// This is the main analysis entry point. It extracts:
    /// - Declarations (functions, methods, types, constants, variables)
    /// - Standalone comment lines
    /// - Imports
    /// - Enumeration candidates and record fields
    /// - Lowered method bodies for state-machine detection
    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts>;

    /// Check if this analyzer handles the given file extension.
    fn handles_extension(&self, ext: &str) -> bool {
        self.file_extensions().contains(&ext)
    }
}
