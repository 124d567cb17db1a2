//! Per-language capability configuration.
//!
//! A `LanguageProfile` supplies everything the language-agnostic stages
//! need to know about a language: how to tell an exported identifier from
//! an internal one, and which comment prefixes and section headings carry
//! contract clauses. Binder, classifier and detector never branch on the
//! language tag themselves.

use serde::{Deserialize, Serialize};

use crate::model::ClauseTag;

/// Words that make an argument description a constraint.
const CONSTRAINT_WORDS: &[&str] = &["must", "required", "non-empty", "should", "cannot"];

/// Named exported-identifier conventions, usable from configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportRule {
    /// The first character is an uppercase letter (Go).
    LeadingUppercase,
    /// The name does not start with `_` (Python).
    NoLeadingUnderscore,
    /// Every name qualifies; the export modifier decides.
    Any,
}

impl ExportRule {
    pub fn as_fn(self) -> fn(&str) -> bool {
        match self {
            ExportRule::LeadingUppercase => leading_uppercase,
            ExportRule::NoLeadingUnderscore => no_leading_underscore,
            ExportRule::Any => any_name,
        }
    }
}

fn leading_uppercase(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn no_leading_underscore(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('_')
}

fn any_name(name: &str) -> bool {
    !name.is_empty()
}

/// A comment-line prefix that introduces a clause (`Precondition:`, `@throws`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRule {
    pub prefix: String,
    pub tag: ClauseTag,
    /// Only keep the clause when its payload states a constraint.
    #[serde(default)]
    pub constraint_only: bool,
}

/// A heading whose following lines are clauses (`# Errors`, `Raises:`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRule {
    pub heading: String,
    pub tag: ClauseTag,
    #[serde(default)]
    pub constraint_only: bool,
}

/// The set of recognized annotation tags and sections for one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationVocabulary {
    pub tags: Vec<TagRule>,
    pub sections: Vec<SectionRule>,
}

impl AnnotationVocabulary {
    pub fn tag(mut self, prefix: &str, tag: ClauseTag) -> Self {
        self.tags.push(TagRule {
            prefix: prefix.to_string(),
            tag,
            constraint_only: false,
        });
        self
    }

    pub fn constraint_tag(mut self, prefix: &str, tag: ClauseTag) -> Self {
        self.tags.push(TagRule {
            prefix: prefix.to_string(),
            tag,
            constraint_only: true,
        });
        self
    }

    pub fn section(mut self, heading: &str, tag: ClauseTag) -> Self {
        self.sections.push(SectionRule {
            heading: heading.to_string(),
            tag,
            constraint_only: false,
        });
        self
    }

    pub fn constraint_section(mut self, heading: &str, tag: ClauseTag) -> Self {
        self.sections.push(SectionRule {
            heading: heading.to_string(),
            tag,
            constraint_only: true,
        });
        self
    }

    /// Find the longest tag prefix that starts `line` (case-insensitive)
    /// and return it together with the remaining payload.
    pub fn match_tag<'a>(&self, line: &'a str) -> Option<(&TagRule, &'a str)> {
        let lower = line.to_lowercase();
        self.tags
            .iter()
            .filter(|rule| {
                let prefix = rule.prefix.to_lowercase();
                if !lower.starts_with(&prefix) {
                    return false;
                }
                // `@pre` must not match `@prefix`.
                let word_prefix = prefix.chars().last().is_some_and(char::is_alphanumeric);
                let next = lower.get(prefix.len()..).and_then(|rest| rest.chars().next());
                !(word_prefix && next.is_some_and(|c| c.is_alphanumeric() || c == '_'))
            })
            .max_by_key(|rule| rule.prefix.len())
            .map(|rule| {
                let payload = line.get(rule.prefix.len()..).unwrap_or("");
                (rule, payload.trim_start_matches(':').trim())
            })
    }

    /// Find the section whose heading is exactly `line`, ignoring case and
    /// a trailing colon.
    pub fn match_section(&self, line: &str) -> Option<&SectionRule> {
        let normalized = normalize_heading(line);
        self.sections
            .iter()
            .find(|rule| normalize_heading(&rule.heading) == normalized)
    }

    /// Add entries, replacing rules with the same prefix or heading.
    pub fn extend(&mut self, tags: Vec<TagRule>, sections: Vec<SectionRule>) {
        for rule in tags {
            self.tags
                .retain(|t| !t.prefix.eq_ignore_ascii_case(&rule.prefix));
            self.tags.push(rule);
        }
        for rule in sections {
            let heading = normalize_heading(&rule.heading);
            self.sections
                .retain(|s| normalize_heading(&s.heading) != heading);
            self.sections.push(rule);
        }
    }
}

fn normalize_heading(text: &str) -> String {
    text.trim().trim_end_matches(':').trim().to_lowercase()
}

/// Whether a clause payload states a constraint.
pub fn states_constraint(text: &str) -> bool {
    let lower = text.to_lowercase();
    CONSTRAINT_WORDS.iter().any(|w| lower.contains(w))
}

/// Everything language-specific the downstream stages consume.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    pub language: String,
    /// Naming convention for exported identifiers.
    pub exported_identifier: fn(&str) -> bool,
    /// Whether an explicit export modifier (`pub`, `export`, `public`) is
    /// also needed.
    pub export_modifier_required: bool,
    pub vocabulary: AnnotationVocabulary,
}

impl LanguageProfile {
    pub fn new(language: &str, rule: ExportRule, export_modifier_required: bool) -> Self {
        Self {
            language: language.to_string(),
            exported_identifier: rule.as_fn(),
            export_modifier_required,
            vocabulary: AnnotationVocabulary::default(),
        }
    }

    pub fn with_vocabulary(mut self, vocabulary: AnnotationVocabulary) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    pub fn go() -> Self {
        Self::new("go", ExportRule::LeadingUppercase, false).with_vocabulary(line_tags())
    }

    pub fn rust() -> Self {
        let vocabulary = line_tags()
            .section("# Errors", ClauseTag::Error)
            .section("# Panics", ClauseTag::Error)
            .section("# Returns", ClauseTag::Postcondition)
            .constraint_section("# Arguments", ClauseTag::Precondition);
        Self::new("rust", ExportRule::Any, true).with_vocabulary(vocabulary)
    }

    pub fn python() -> Self {
        let vocabulary = line_tags()
            .section("Raises:", ClauseTag::Error)
            .section("Returns:", ClauseTag::Postcondition)
            .constraint_section("Args:", ClauseTag::Precondition);
        Self::new("python", ExportRule::NoLeadingUnderscore, false).with_vocabulary(vocabulary)
    }

    pub fn typescript() -> Self {
        Self::new("typescript", ExportRule::Any, true).with_vocabulary(doc_block_tags())
    }

    pub fn javascript() -> Self {
        Self::new("javascript", ExportRule::Any, true).with_vocabulary(doc_block_tags())
    }

    pub fn java() -> Self {
        Self::new("java", ExportRule::Any, true).with_vocabulary(doc_block_tags())
    }

    /// Whether a bare name passes the exported-identifier convention.
    pub fn is_exported_name(&self, name: &str) -> bool {
        (self.exported_identifier)(name)
    }
}

/// `Tag: payload` lines used by Go, Rust and Python comments.
fn line_tags() -> AnnotationVocabulary {
    AnnotationVocabulary::default()
        .tag("Precondition:", ClauseTag::Precondition)
        .tag("Postcondition:", ClauseTag::Postcondition)
        .tag("Error:", ClauseTag::Error)
        .tag("Errors:", ClauseTag::Error)
        .tag("Invariant:", ClauseTag::Invariant)
        .tag("@lifecycle", ClauseTag::Lifecycle)
}

/// JSDoc / Javadoc block tags.
fn doc_block_tags() -> AnnotationVocabulary {
    AnnotationVocabulary::default()
        .tag("@precondition", ClauseTag::Precondition)
        .tag("@pre", ClauseTag::Precondition)
        .tag("@postcondition", ClauseTag::Postcondition)
        .tag("@post", ClauseTag::Postcondition)
        .tag("@returns", ClauseTag::Postcondition)
        .tag("@return", ClauseTag::Postcondition)
        .tag("@throws", ClauseTag::Error)
        .tag("@exception", ClauseTag::Error)
        .tag("@invariant", ClauseTag::Invariant)
        .tag("@lifecycle", ClauseTag::Lifecycle)
        .constraint_tag("@param", ClauseTag::Precondition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_rules() {
        let go = LanguageProfile::go();
        assert!(go.is_exported_name("MaxRetries"));
        assert!(!go.is_exported_name("internalLimit"));
        assert!(!go.is_exported_name("_x"));

        let py = LanguageProfile::python();
        assert!(py.is_exported_name("validate_token"));
        assert!(!py.is_exported_name("_helper"));
        assert!(!py.is_exported_name("__init__"));

        assert!(LanguageProfile::rust().is_exported_name("anything"));
    }

    #[test]
    fn test_match_tag_is_case_insensitive() {
        let vocab = LanguageProfile::go().vocabulary;
        let (rule, payload) = vocab.match_tag("precondition: x > 0").unwrap();
        assert_eq!(rule.tag, ClauseTag::Precondition);
        assert_eq!(payload, "x > 0");
    }

    #[test]
    fn test_match_tag_prefers_longest_prefix() {
        let vocab = LanguageProfile::java().vocabulary;
        let (rule, payload) = vocab.match_tag("@precondition token is set").unwrap();
        assert_eq!(rule.prefix, "@precondition");
        assert_eq!(payload, "token is set");

        let (rule, _) = vocab.match_tag("@returns the claims").unwrap();
        assert_eq!(rule.prefix, "@returns");
    }

    #[test]
    fn test_match_tag_respects_word_boundary() {
        let vocab = LanguageProfile::typescript().vocabulary;
        assert!(vocab.match_tag("@prefix something").is_none());
        assert!(vocab.match_tag("@lifecycle 2").is_some());
    }

    #[test]
    fn test_match_section() {
        let vocab = LanguageProfile::python().vocabulary;
        assert_eq!(vocab.match_section("Raises:").unwrap().tag, ClauseTag::Error);
        assert_eq!(vocab.match_section("raises").unwrap().tag, ClauseTag::Error);
        assert!(vocab.match_section("Raises: ValueError").is_none());

        let rust = LanguageProfile::rust().vocabulary;
        assert!(rust.match_section("# Errors").is_some());
    }

    #[test]
    fn test_extend_replaces_same_prefix() {
        let mut vocab = LanguageProfile::go().vocabulary;
        let before = vocab.tags.len();
        vocab.extend(
            vec![TagRule {
                prefix: "error:".to_string(),
                tag: ClauseTag::Postcondition,
                constraint_only: false,
            }],
            vec![],
        );
        assert_eq!(vocab.tags.len(), before);
        let (rule, _) = vocab.match_tag("Error: boom").unwrap();
        assert_eq!(rule.tag, ClauseTag::Postcondition);
    }

    #[test]
    fn test_states_constraint() {
        assert!(states_constraint("token: must be non-empty"));
        assert!(!states_constraint("token: the raw token"));
    }
}
