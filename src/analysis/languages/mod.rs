//! Language-specific analyzer implementations.

mod go;
mod java;
mod python;
mod rust_lang;
mod typescript;

pub use go::GoAnalyzer;
pub use java::JavaAnalyzer;
pub use python::PythonAnalyzer;
pub use rust_lang::RustAnalyzer;
pub use typescript::{Dialect, TypeScriptAnalyzer};

use super::LanguageAnalyzer;
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// Static storage for Go analyzer.
static GO_ANALYZER: OnceCell<GoAnalyzer> = OnceCell::new();

/// Static storage for Java analyzer.
static JAVA_ANALYZER: OnceCell<JavaAnalyzer> = OnceCell::new();

/// Static storage for JavaScript analyzer.
static JAVASCRIPT_ANALYZER: OnceCell<TypeScriptAnalyzer> = OnceCell::new();

/// Static storage for Python analyzer.
static PYTHON_ANALYZER: OnceCell<PythonAnalyzer> = OnceCell::new();

/// Static storage for Rust analyzer.
static RUST_ANALYZER: OnceCell<RustAnalyzer> = OnceCell::new();

/// Static storage for TypeScript analyzer.
static TYPESCRIPT_ANALYZER: OnceCell<TypeScriptAnalyzer> = OnceCell::new();

/// Whether analyzers have been registered.
static REGISTERED: AtomicBool = AtomicBool::new(false);

/// Register all available language analyzers.
///
/// This is idempotent - calling it multiple times is safe.
pub fn register_analyzers() {
    if REGISTERED.swap(true, Ordering::SeqCst) {
        return;
    }

    GO_ANALYZER.get_or_init(GoAnalyzer::new);
    JAVA_ANALYZER.get_or_init(JavaAnalyzer::new);
    JAVASCRIPT_ANALYZER.get_or_init(TypeScriptAnalyzer::javascript);
    PYTHON_ANALYZER.get_or_init(PythonAnalyzer::new);
    RUST_ANALYZER.get_or_init(RustAnalyzer::new);
    TYPESCRIPT_ANALYZER.get_or_init(TypeScriptAnalyzer::new);
}

fn all_analyzers() -> Vec<&'static dyn LanguageAnalyzer> {
    register_analyzers();

    let mut analyzers: Vec<&'static dyn LanguageAnalyzer> = Vec::new();
    if let Some(a) = GO_ANALYZER.get() {
        analyzers.push(a);
    }
    if let Some(a) = JAVA_ANALYZER.get() {
        analyzers.push(a);
    }
    if let Some(a) = JAVASCRIPT_ANALYZER.get() {
        analyzers.push(a);
    }
    if let Some(a) = PYTHON_ANALYZER.get() {
        analyzers.push(a);
    }
    if let Some(a) = RUST_ANALYZER.get() {
        analyzers.push(a);
    }
    if let Some(a) = TYPESCRIPT_ANALYZER.get() {
        analyzers.push(a);
    }
    analyzers
}

/// Get an analyzer for the given file extension (without dot).
///
/// Returns None if no analyzer is registered for the extension.
pub fn get_analyzer(ext: &str) -> Option<&'static dyn LanguageAnalyzer> {
    all_analyzers()
        .into_iter()
        .find(|a| a.handles_extension(ext))
}

/// Get an analyzer by language ID.
pub fn get_analyzer_by_id(lang_id: &str) -> Option<&'static dyn LanguageAnalyzer> {
    all_analyzers()
        .into_iter()
        .find(|a| a.language_id() == lang_id)
}

/// Language ID for a file extension, e.g. `"rs"` -> `"rust"`.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    get_analyzer(ext).map(|a| a.language_id())
}

/// Get all registered language IDs, sorted.
pub fn registered_languages() -> Vec<String> {
    let mut ids: Vec<String> = all_analyzers()
        .iter()
        .map(|a| a.language_id().to_string())
        .collect();
    ids.sort();
    ids
}

/// Get all registered file extensions.
pub fn registered_extensions() -> Vec<String> {
    all_analyzers()
        .iter()
        .flat_map(|a| a.file_extensions().iter().map(|e| e.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_extension() {
        assert_eq!(language_for_extension("go"), Some("go"));
        assert_eq!(language_for_extension("rs"), Some("rust"));
        assert_eq!(language_for_extension("pyi"), Some("python"));
        assert_eq!(language_for_extension("tsx"), Some("typescript"));
        assert_eq!(language_for_extension("mjs"), Some("javascript"));
        assert_eq!(language_for_extension("java"), Some("java"));
        assert_eq!(language_for_extension("kt"), None);
    }

    #[test]
    fn test_lookup_by_id() {
        for id in registered_languages() {
            let analyzer = get_analyzer_by_id(&id).unwrap();
            assert_eq!(analyzer.language_id(), id);
            assert_eq!(analyzer.default_profile().language, id);
        }
        assert!(get_analyzer_by_id("kotlin").is_none());
    }

    #[test]
    fn test_registered_languages() {
        assert_eq!(
            registered_languages(),
            vec!["go", "java", "javascript", "python", "rust", "typescript"]
        );
        assert!(registered_extensions().contains(&"cjs".to_string()));
    }
}
