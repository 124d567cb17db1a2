//! Model aggregation.
//!
//! Units are kept exactly as analyzed and in caller order. Same-named
//! declarations in different units are never merged.

use serde::{Deserialize, Serialize};

use crate::model::{Declaration, Diagnostic, ReExport, SourceUnit, StateMachine};

/// Root of the extracted model.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisModel {
    pub units: Vec<SourceUnit>,
}

/// Merge per-unit results into one model, preserving input order.
pub fn aggregate<I>(units: I) -> AnalysisModel
where
    I: IntoIterator<Item = SourceUnit>,
{
    AnalysisModel {
        units: units.into_iter().collect(),
    }
}

impl AnalysisModel {
    pub fn unit(&self, path: &str) -> Option<&SourceUnit> {
        self.units.iter().find(|u| u.path == path)
    }

    /// Exported declarations of every unit.
    pub fn exports(&self) -> impl Iterator<Item = (&SourceUnit, &Declaration)> {
        self.units
            .iter()
            .flat_map(|u| u.exports().map(move |d| (u, d)))
    }

    /// Declarations that carry a non-empty contract.
    pub fn contracts(&self) -> impl Iterator<Item = (&SourceUnit, &Declaration)> {
        self.units.iter().flat_map(|u| {
            u.declarations
                .iter()
                .filter(|d| !d.contract.is_empty())
                .map(move |d| (u, d))
        })
    }

    pub fn re_exports(&self) -> impl Iterator<Item = (&SourceUnit, &ReExport)> {
        self.units
            .iter()
            .flat_map(|u| u.re_exports.iter().map(move |r| (u, r)))
    }

    pub fn state_machines(&self) -> impl Iterator<Item = (&SourceUnit, &StateMachine)> {
        self.units
            .iter()
            .flat_map(|u| u.state_machines.iter().map(move |m| (u, m)))
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.units.iter().flat_map(|u| u.diagnostics.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(path: &str) -> SourceUnit {
        SourceUnit {
            path: path.to_string(),
            language: "go".to_string(),
            package: None,
            declarations: Vec::new(),
            imports: Vec::new(),
            re_exports: Vec::new(),
            state_machines: Vec::new(),
            diagnostics: vec![Diagnostic::orphan(path, 1, "stray comment")],
        }
    }

    #[test]
    fn test_keeps_input_order() {
        let model = aggregate(vec![unit("b.go"), unit("a.go"), unit("b.go")]);
        let paths: Vec<_> = model.units.iter().map(|u| u.path.as_str()).collect();
        assert_eq!(paths, vec!["b.go", "a.go", "b.go"]);
        assert_eq!(model.diagnostics().count(), 3);
    }

    #[test]
    fn test_empty() {
        let model = aggregate(Vec::new());
        assert!(model.units.is_empty());
        assert_eq!(model.exports().count(), 0);
    }
}
