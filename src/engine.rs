//! The extraction front door.
//!
//! `Extractor` wires the stages together for one unit of source text:
//! parse and recognize (language analyzer), bind comments (contracts),
//! classify (visibility) and reconstruct state machines (state_machine).
//! It holds nothing but per-language profiles, so one instance can be
//! shared across worker threads.

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::analysis::{get_analyzer_by_id, registered_languages, DeclarationFacts};
use crate::config::ExtractorConfig;
use crate::contracts;
use crate::error::{AnalyzeError, ConfigError};
use crate::model::{ContractAnnotation, Declaration, Diagnostic, DiagnosticKind, SourceUnit};
use crate::profile::LanguageProfile;
use crate::state_machine;
use crate::visibility;

/// One unit of already-loaded source text.
#[derive(Debug, Clone)]
pub struct SourceInput {
    pub path: String,
    /// Language tag (`go`, `rust`, ...).
    pub language: String,
    pub text: String,
}

impl SourceInput {
    pub fn new(path: impl Into<String>, language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language: language.into(),
            text: text.into(),
        }
    }
}

/// Extraction engine configured with one profile per language.
#[derive(Debug, Clone)]
pub struct Extractor {
    profiles: HashMap<String, LanguageProfile>,
}

impl Extractor {
    /// Extractor with the default profile of every registered language.
    pub fn new() -> Self {
        let profiles = registered_languages()
            .into_iter()
            .filter_map(|id| {
                get_analyzer_by_id(&id).map(|analyzer| (id, analyzer.default_profile()))
            })
            .collect();
        Self { profiles }
    }

    /// Extractor with the default profiles adjusted by `config`.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ConfigError> {
        config.apply(Self::new())
    }

    /// Replace the profile for `profile.language`.
    pub fn with_profile(mut self, profile: LanguageProfile) -> Self {
        self.profiles.insert(profile.language.clone(), profile);
        self
    }

    pub fn profile(&self, language: &str) -> Option<&LanguageProfile> {
        self.profiles.get(language)
    }

    pub(crate) fn profile_mut(&mut self, language: &str) -> Option<&mut LanguageProfile> {
        self.profiles.get_mut(language)
    }

    /// Analyze one unit of source text.
    ///
    /// Fails only when no analyzer handles `language`; anything the
    /// analyzer cannot interpret is skipped and reported as a diagnostic.
    pub fn analyze(&self, text: &str, language: &str, path: &str) -> Result<SourceUnit, AnalyzeError> {
        let analyzer = get_analyzer_by_id(language)
            .ok_or_else(|| AnalyzeError::UnsupportedLanguage(language.to_string()))?;
        let default_profile;
        let profile = match self.profiles.get(language) {
            Some(profile) => profile,
            None => {
                default_profile = analyzer.default_profile();
                &default_profile
            }
        };

        let parsed = analyzer
            .parse(Path::new(path), text.as_bytes())
            .map_err(|e| AnalyzeError::backend(language, e))?;
        let mut facts = analyzer
            .extract_facts(&parsed)
            .map_err(|e| AnalyzeError::backend(language, e))?;

        let binding = contracts::bind(&facts, &profile.vocabulary);
        let state_machines = state_machine::detect(&facts, &binding.annotations);

        let export_list = facts.export_list.as_deref();
        let declarations: Vec<Declaration> = facts
            .declarations
            .iter()
            .zip(binding.annotations)
            .map(|(decl, contract)| declaration(decl, contract, profile, export_list))
            .collect();

        let mut diagnostics = std::mem::take(&mut facts.diagnostics);
        diagnostics.extend(binding.diagnostics);
        diagnostics.sort_by_key(|d| d.line);
        log_diagnostics(&diagnostics);

        debug!(
            path,
            language,
            declarations = declarations.len(),
            state_machines = state_machines.len(),
            diagnostics = diagnostics.len(),
            "analyzed unit"
        );

        Ok(SourceUnit {
            path: path.to_string(),
            language: language.to_string(),
            package: facts.package,
            declarations,
            imports: facts.imports,
            re_exports: facts.re_exports,
            state_machines,
            diagnostics,
        })
    }

    /// Analyze many units on the rayon pool. Results come back in input
    /// order; a failing unit does not affect the others.
    pub fn analyze_batch(&self, inputs: &[SourceInput]) -> Vec<Result<SourceUnit, AnalyzeError>> {
        inputs
            .par_iter()
            .map(|input| self.analyze(&input.text, &input.language, &input.path))
            .collect()
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

fn declaration(
    facts: &DeclarationFacts,
    contract: ContractAnnotation,
    profile: &LanguageProfile,
    export_list: Option<&[String]>,
) -> Declaration {
    let visibility = match export_list {
        Some(listed) => visibility::classify_listed(facts, profile, listed),
        None => visibility::classify(facts, profile),
    };
    Declaration {
        name: facts.name.clone(),
        kind: facts.kind,
        category: facts.kind.category(),
        visibility,
        span: facts.span.clone(),
        receiver: facts.receiver.clone(),
        signature: facts.signature.clone(),
        contract,
    }
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        match diagnostic.kind {
            DiagnosticKind::MalformedButRecoverable => warn!(
                path = %diagnostic.path,
                line = diagnostic.line,
                "{}",
                diagnostic.message
            ),
            DiagnosticKind::OrphanComment => debug!(
                path = %diagnostic.path,
                line = diagnostic.line,
                "{}",
                diagnostic.message
            ),
        }
    }
}
