//! Codefacts - multi-language extraction of API surface, contracts and
//! state machines.
//!
//! Given a file's text and language tag, codefacts produces a normalized
//! model of:
//! - the exported API surface (public functions, types, constants)
//! - behavioral contracts written in documentation comments
//!   (preconditions, postconditions, errors, lifecycle order)
//! - state machines implied by an enumeration and the methods that
//!   write it
//!
//! # Architecture
//!
//! - `analysis`: tree-sitter analyzers that turn text into `FileFacts`
//! - `profile`: per-language visibility rules and annotation vocabulary
//! - `visibility`, `contracts`, `state_machine`: language-agnostic stages
//! - `engine`: the `Extractor` that runs the stages for one unit
//! - `aggregate`, `report`: the merged model and its JSON projection
//! - `config`: YAML overrides for the language profiles
//!
//! File discovery, reading and rendering belong to the caller.
//!
//! # Adding a New Language
//!
//! See `src/analysis/languages/` for examples. Implement `LanguageAnalyzer`
//! and register it in `languages/mod.rs`.

pub mod aggregate;
pub mod analysis;
pub mod config;
pub mod contracts;
pub mod engine;
pub mod error;
pub mod model;
pub mod profile;
pub mod report;
pub mod state_machine;
pub mod visibility;

pub use aggregate::{aggregate, AnalysisModel};
pub use analysis::{language_for_extension, register_analyzers, registered_languages};
pub use config::ExtractorConfig;
pub use engine::{Extractor, SourceInput};
pub use error::{AnalyzeError, ConfigError, ReportError};
pub use model::{
    Clause, ClauseTag, ContractAnnotation, Declaration, Diagnostic, DiagnosticKind, Guard,
    GuardSource, LifecycleHook, ReExport, SourceUnit, StateEnum, StateMachine, StateMember, Transition,
    TransitionTarget, Visibility,
};
pub use profile::{AnnotationVocabulary, ExportRule, LanguageProfile};
pub use report::{deserialize, serialize};

/// Analyze one unit with the default profiles.
pub fn analyze(text: &str, language: &str, path: &str) -> Result<SourceUnit, AnalyzeError> {
    Extractor::new().analyze(text, language, path)
}
