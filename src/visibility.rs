//! Visibility classification.
//!
//! A declaration is exported when its own name passes the language's
//! exported-identifier convention and, for languages that need one, it
//! carries the export modifier. Type aliases are judged by their own name,
//! never by the aliased type.

use crate::analysis::DeclarationFacts;
use crate::model::Visibility;
use crate::profile::LanguageProfile;

/// Classify a recognized declaration.
pub fn classify(facts: &DeclarationFacts, profile: &LanguageProfile) -> Visibility {
    let modifier_ok = !profile.export_modifier_required || facts.export_modifier;
    if modifier_ok && profile.is_exported_name(&facts.name) {
        Visibility::Exported
    } else {
        Visibility::Internal
    }
}

/// Classify against an explicit export list. Top-level declarations are
/// exported exactly when listed, whatever their name; members follow their
/// owner and the naming convention.
pub fn classify_listed(
    facts: &DeclarationFacts,
    profile: &LanguageProfile,
    listed: &[String],
) -> Visibility {
    let owner = facts.receiver.as_deref().unwrap_or(&facts.name);
    let owner_listed = listed.iter().any(|n| n == owner);
    if owner_listed && (facts.receiver.is_none() || profile.is_exported_name(&facts.name)) {
        Visibility::Exported
    } else {
        Visibility::Internal
    }
}

/// Classify a bare name, ignoring export modifiers.
pub fn classify_name(name: &str, profile: &LanguageProfile) -> Visibility {
    if profile.is_exported_name(name) {
        Visibility::Exported
    } else {
        Visibility::Internal
    }
}
