//! Comment-contract binding.
//!
//! Standalone comment lines are grouped into runs of consecutive lines. A
//! run binds to the declaration that starts on the line right after it;
//! runs followed by anything else are orphans. Each bound run is parsed
//! into tagged clauses and a free-text summary using the language's
//! annotation vocabulary.

use crate::analysis::{CommentLine, DeclarationFacts, FileFacts};
use crate::model::{Clause, ClauseTag, ContractAnnotation, Diagnostic};
use crate::profile::{states_constraint, AnnotationVocabulary, SectionRule};

/// Result of binding one file's comments.
#[derive(Debug, Default)]
pub struct Binding {
    /// One annotation per declaration, parallel to `FileFacts::declarations`.
    pub annotations: Vec<ContractAnnotation>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Bind every comment run of `facts` to its declaration.
pub fn bind(facts: &FileFacts, vocabulary: &AnnotationVocabulary) -> Binding {
    let mut runs: Vec<Option<&[CommentLine]>> = vec![None; facts.declarations.len()];
    let mut binding = Binding::default();

    for run in comment_runs(&facts.comments) {
        let Some(last) = run.last() else { continue };
        match attached_declaration(&facts.declarations, last.line) {
            Some(index) if runs[index].is_none() => runs[index] = Some(run),
            _ => binding.diagnostics.push(Diagnostic::orphan(
                &facts.path,
                run[0].line,
                format!(
                    "comment run of {} line(s) is not followed by a declaration",
                    run.len()
                ),
            )),
        }
    }

    for (decl, run) in facts.declarations.iter().zip(runs) {
        // A docstring wins over a preceding comment run.
        if let (Some(_), Some(run)) = (&decl.docstring, run) {
            binding.diagnostics.push(Diagnostic::orphan(
                &facts.path,
                run[0].line,
                format!(
                    "comment run of {} line(s) is shadowed by the docstring of `{}`",
                    run.len(),
                    decl.name
                ),
            ));
        }
        let lines = decl.docstring.as_deref().or(run);
        let annotation = match lines {
            Some(lines) => parse_run(lines, vocabulary, &facts.path, &mut binding.diagnostics),
            None => ContractAnnotation::default(),
        };
        binding.annotations.push(annotation);
    }

    binding
}

/// Split comment lines into runs of consecutive lines.
fn comment_runs(comments: &[CommentLine]) -> Vec<&[CommentLine]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..=comments.len() {
        let breaks = i == comments.len() || comments[i].line != comments[i - 1].line + 1;
        if breaks {
            if start < i {
                runs.push(&comments[start..i]);
            }
            start = i;
        }
    }
    runs
}

/// Index of the declaration that starts right below `line`.
fn attached_declaration(declarations: &[DeclarationFacts], line: usize) -> Option<usize> {
    declarations
        .iter()
        .position(|d| d.anchor_line == line + 1)
        .or_else(|| {
            declarations
                .iter()
                .position(|d| d.span.start_line == line + 1)
        })
}

/// Parse one comment run into an annotation.
pub fn parse_run(
    lines: &[CommentLine],
    vocabulary: &AnnotationVocabulary,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> ContractAnnotation {
    let mut summary: Vec<&str> = Vec::new();
    let mut clauses = Vec::new();
    let mut section: Option<(&SectionRule, usize)> = None;

    for line in lines {
        let text = line.text.trim();

        if text.is_empty() {
            // A blank line right under a heading does not end the section.
            if matches!(section, Some((_, items)) if items > 0) {
                section = None;
            }
            continue;
        }

        if let Some(rule) = vocabulary.match_section(text) {
            section = Some((rule, 0));
            continue;
        }

        if let Some((rule, payload)) = vocabulary.match_tag(text) {
            section = None;
            if payload.is_empty() || (rule.constraint_only && !states_constraint(payload)) {
                continue;
            }
            let clause = Clause {
                tag: rule.tag,
                text: payload.to_string(),
                line: line.line,
            };
            if clause.tag == ClauseTag::Lifecycle && clause.lifecycle_order().is_none() {
                diagnostics.push(Diagnostic::malformed(
                    path,
                    line.line,
                    format!("lifecycle marker without an order number: `{}`", text),
                ));
                continue;
            }
            clauses.push(clause);
            continue;
        }

        if let Some((rule, items)) = section.as_mut() {
            *items += 1;
            let item = strip_bullet(text);
            if !item.is_empty() && (!rule.constraint_only || states_constraint(item)) {
                clauses.push(Clause {
                    tag: rule.tag,
                    text: item.to_string(),
                    line: line.line,
                });
            }
            continue;
        }

        summary.push(text);
    }

    ContractAnnotation {
        summary: if summary.is_empty() {
            None
        } else {
            Some(summary.join(" "))
        },
        clauses,
    }
}

fn strip_bullet(text: &str) -> &str {
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|b| text.strip_prefix(b))
        .unwrap_or(text)
        .trim()
}
