//! AST-backed fact extraction.
//!
//! This module turns source text into language-neutral `FileFacts` using
//! tree-sitter. Facts include:
//! - Declarations (functions, methods, types, constants, variables)
//! - Standalone comments and docstrings
//! - Imports
//! - Enumeration candidates and record fields
//! - Method bodies lowered into a small statement tree
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source Text     │────▶│ Analyzers    │────▶│ FileFacts     │
//! └─────────────────┘     │ (Go, Rust..) │     │ (Declarations,│
//!                         └──────────────┘     │  Comments, ..)│
//!                                              └───────────────┘
//!                                                      │
//!                                                      ▼
//!                ┌─────────────┬──────────────┬────────────────┐
//!                │ visibility  │ contracts    │ state_machine  │
//!                └─────────────┴──────────────┴────────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement `LanguageAnalyzer` and describe its bodies with a `BodyGrammar`
//! 3. Add a `LanguageProfile` constructor in `profile.rs`
//! 4. Register the analyzer in `languages/mod.rs`
//!
//! See `languages/go.rs` for a reference implementation.

pub mod body;
mod facts;
mod languages;
pub mod syntax;
mod traits;

pub use facts::{
    CommentLine, CompareOp, Comparison, Condition, DeclarationCategory, DeclarationFacts,
    DeclarationKind, EnumFacts, EnumMemberFacts, FieldFacts, FileFacts, FunctionBody, Import,
    Span, Statement, TypeFacts,
};
pub use languages::{
    get_analyzer, get_analyzer_by_id, language_for_extension, register_analyzers,
    registered_extensions, registered_languages, Dialect, GoAnalyzer, JavaAnalyzer,
    PythonAnalyzer, RustAnalyzer, TypeScriptAnalyzer,
};
pub use traits::{LanguageAnalyzer, ParsedFile};
