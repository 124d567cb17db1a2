//! YAML configuration for per-language profiles.
//!
//! ```yaml
//! version: "1"
//! languages:
//!   go:
//!     exported_rule: leading_uppercase
//!     extra_tags:
//!       "Requires:": precondition
//!       "Ensures:": postcondition
//!   python:
//!     extra_sections:
//!       "Yields:": postcondition
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::Extractor;
use crate::error::ConfigError;
use crate::model::ClauseTag;
use crate::profile::{ExportRule, SectionRule, TagRule};

/// Config schema version understood by this crate.
pub const CONFIG_VERSION: &str = "1";

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ExtractorConfig {
    /// Schema version; empty means the current one.
    #[serde(default)]
    pub version: String,
    /// Overrides keyed by language tag.
    #[serde(default)]
    pub languages: BTreeMap<String, LanguageOverride>,
}

/// Changes applied on top of a language's default profile.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct LanguageOverride {
    #[serde(default)]
    pub exported_rule: Option<ExportRule>,
    #[serde(default)]
    pub export_modifier_required: Option<bool>,
    /// Additional tag prefixes (`"Requires:": precondition`).
    #[serde(default)]
    pub extra_tags: BTreeMap<String, ClauseTag>,
    /// Additional section headings (`"Yields:": postcondition`).
    #[serde(default)]
    pub extra_sections: BTreeMap<String, ClauseTag>,
}

impl ExtractorConfig {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse_str(&content)
    }

    /// Parse a config from YAML text.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: ExtractorConfig = serde_yaml::from_str(content)?;
        if !config.version.is_empty() && config.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version));
        }
        Ok(config)
    }

    /// Apply every override to `extractor`.
    pub fn apply(&self, mut extractor: Extractor) -> Result<Extractor, ConfigError> {
        for (language, overrides) in &self.languages {
            let profile = extractor
                .profile_mut(language)
                .ok_or_else(|| ConfigError::UnknownLanguage(language.clone()))?;

            if let Some(rule) = overrides.exported_rule {
                profile.exported_identifier = rule.as_fn();
            }
            if let Some(required) = overrides.export_modifier_required {
                profile.export_modifier_required = required;
            }

            let tags = overrides
                .extra_tags
                .iter()
                .map(|(prefix, tag)| TagRule {
                    prefix: prefix.clone(),
                    tag: *tag,
                    constraint_only: false,
                })
                .collect();
            let sections = overrides
                .extra_sections
                .iter()
                .map(|(heading, tag)| SectionRule {
                    heading: heading.clone(),
                    tag: *tag,
                    constraint_only: false,
                })
                .collect();
            profile.vocabulary.extend(tags, sections);
        }
        Ok(extractor)
    }
}
