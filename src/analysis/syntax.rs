//! Tree-sitter helpers shared by the language analyzers.

use tree_sitter::Node;

use super::{CommentLine, DeclarationFacts, ParsedFile};
use crate::model::Diagnostic;

/// Visit every node of the tree in document order.
///
/// The callback returns `false` to skip a node's children.
pub fn walk<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>) -> bool) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if !visit(node) {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Signature text from the start of `node` up to its body.
pub fn signature(parsed: &ParsedFile, node: Node, body: Option<Node>) -> String {
    let end = body.map(|b| b.start_byte()).unwrap_or_else(|| node.end_byte());
    let raw = parsed
        .source
        .get(node.start_byte()..end)
        .and_then(|bytes| std::str::from_utf8(bytes).ok())
        .unwrap_or("");
    let collapsed = collapse_whitespace(raw);
    collapsed.trim_end_matches([':', '{', '=', '>']).trim_end().to_string()
}

/// True when `node` sits inside an ERROR node.
pub fn inside_error(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.is_error() {
            return true;
        }
        current = n.parent();
    }
    false
}

/// Whether only whitespace precedes `node` on its first line.
pub fn is_standalone(parsed: &ParsedFile, node: Node) -> bool {
    let start = node.start_byte();
    let line_start = parsed.source[..start]
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    parsed.source[line_start..start]
        .iter()
        .all(|b| b.is_ascii_whitespace())
}

/// Remove comment markers from every line of a raw comment.
pub fn strip_comment_markers(raw: &str) -> Vec<String> {
    let block = raw.trim_start().starts_with("/*");
    raw.lines()
        .map(|line| {
            let mut text = line.trim();
            if block {
                text = text
                    .strip_prefix("/**")
                    .or_else(|| text.strip_prefix("/*"))
                    .unwrap_or(text);
                text = text.strip_suffix("*/").unwrap_or(text);
                text = text.trim().trim_start_matches('*');
            } else {
                for marker in ["///", "//!", "//", "#"] {
                    if let Some(rest) = text.strip_prefix(marker) {
                        text = rest;
                        break;
                    }
                }
            }
            text.trim().to_string()
        })
        .collect()
}

/// Split a comment node into stripped lines.
pub fn comment_lines(parsed: &ParsedFile, node: Node) -> Vec<CommentLine> {
    let first_line = node.start_position().row + 1;
    strip_comment_markers(parsed.node_text(node))
        .into_iter()
        .enumerate()
        .map(|(i, text)| CommentLine {
            line: first_line + i,
            text,
        })
        .collect()
}

/// Collect standalone comments of the given kinds, skipping comments that
/// live inside callable bodies.
pub fn collect_comments(
    parsed: &ParsedFile,
    kinds: &[&str],
    declarations: &[DeclarationFacts],
) -> Vec<CommentLine> {
    let bodies: Vec<(usize, usize)> = declarations
        .iter()
        .filter(|d| d.body.is_some())
        .map(|d| (d.span.start_line + 1, d.span.end_line))
        .collect();

    let mut lines = Vec::new();
    walk(parsed.tree.root_node(), |node| {
        if kinds.contains(&node.kind()) {
            let line = node.start_position().row + 1;
            let in_body = bodies.iter().any(|&(s, e)| line >= s && line <= e);
            let text = parsed.node_text(node);
            // Inner doc comments describe the enclosing module.
            let inner_doc = text.starts_with("//!") || text.starts_with("/*!");
            if !in_body && !inner_doc && is_standalone(parsed, node) {
                lines.extend(comment_lines(parsed, node));
            }
            return false;
        }
        true
    });
    lines.sort_by_key(|c| c.line);
    lines
}

/// Diagnostics for every outermost ERROR node and every token the parser
/// had to invent.
pub fn error_diagnostics(parsed: &ParsedFile) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    walk(parsed.tree.root_node(), |node| {
        if node.is_missing() {
            diagnostics.push(Diagnostic::malformed(
                &parsed.path,
                node.start_position().row + 1,
                format!("missing `{}`", node.kind()),
            ));
            return false;
        }
        if node.is_error() {
            let snippet = collapse_whitespace(parsed.node_text(node));
            let snippet: String = snippet.chars().take(40).collect();
            diagnostics.push(Diagnostic::malformed(
                &parsed.path,
                node.start_position().row + 1,
                format!("skipped unparseable construct `{}`", snippet),
            ));
            return false;
        }
        true
    });
    diagnostics
}

/// Lines of a string-literal docstring with quotes removed and the
/// common indentation stripped.
pub fn docstring_lines(parsed: &ParsedFile, node: Node) -> Vec<CommentLine> {
    let first_line = node.start_position().row + 1;
    let raw = parsed.node_text(node);
    let unquoted = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| raw.strip_prefix(q).and_then(|r| r.strip_suffix(q)))
        .unwrap_or(raw);

    unquoted
        .lines()
        .enumerate()
        .map(|(i, text)| CommentLine {
            line: first_line + i,
            text: text.trim().to_string(),
        })
        .collect()
}

/// Identifier-ish type name with pointer, reference and generic noise
/// removed: `*StateContext` -> `StateContext`, `Option<State>` stays as is.
pub fn clean_type(text: &str) -> String {
    text.trim()
        .trim_start_matches(':')
        .trim()
        .trim_start_matches(['*', '&'])
        .trim_start_matches("mut ")
        .trim()
        .to_string()
}
