//! Java language analyzer using tree-sitter.

use std::collections::HashSet;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::body::{lower_body, BodyGrammar, SwitchGrammar};
use crate::analysis::syntax;
use crate::analysis::{
    DeclarationFacts, DeclarationKind, EnumFacts, EnumMemberFacts, FieldFacts, FileFacts, Import,
    LanguageAnalyzer, ParsedFile, Span, TypeFacts,
};
use crate::model::Diagnostic;
use crate::profile::LanguageProfile;

const DECLARATION_QUERY: &str = r#"
; Method declarations
(method_declaration
  name: (identifier) @method_name
) @method

; Constructor declarations
(constructor_declaration
  name: (identifier) @constructor_name
) @constructor

; Class declarations
(class_declaration
  name: (identifier) @class_name
) @class

; Interface declarations
(interface_declaration
  name: (identifier) @interface_name
) @interface

; Enum declarations
(enum_declaration
  name: (identifier) @enum_name
) @enum

; Record declarations
(record_declaration
  name: (identifier) @record_name
) @record

; Fields, one match per declarator
(field_declaration
  declarator: (variable_declarator
    name: (identifier) @field_name
  )
) @field
"#;

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
(import_declaration
  [(scoped_identifier) (identifier)] @import_path
) @import
"#;

/// Tree-sitter query for package declaration.
const PACKAGE_QUERY: &str = r#"
(package_declaration
  [(scoped_identifier) (identifier)] @package_name
)
"#;

/// Node kinds that own members.
const TYPE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
];

const BODY_GRAMMAR: BodyGrammar = BodyGrammar {
    if_kinds: &["if_statement"],
    elif_kinds: &[],
    condition_field: "condition",
    consequence_field: "consequence",
    alternative_field: "alternative",
    assignment_kinds: &["assignment_expression"],
    list_kinds: &[],
    exit_kinds: &["return_statement", "throw_statement"],
    exit_calls: &[],
    binary_kinds: &["binary_expression"],
    paren_kinds: &["parenthesized_expression"],
    switches: &[SwitchGrammar {
        kind: "switch_expression",
        subject_field: "condition",
        cases_field: "body",
        case_kinds: &["switch_block_statement_group", "switch_rule"],
        value_field: "",
        label_kinds: &["switch_label"],
        value_list_kinds: &[],
        constructor_kinds: &[],
        guard_field: "",
        body_field: "",
        empty_falls_through: true,
    }],
    transparent_kinds: &["block", "expression_statement", "constructor_body"],
    opaque_kinds: &["line_comment", "block_comment"],
};

pub struct JavaAnalyzer {
    language: Language,
}

impl JavaAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_java::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    fn extract_package(&self, parsed: &ParsedFile) -> Option<String> {
        let query = Query::new(&self.language, PACKAGE_QUERY).ok()?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        if let Some(m) = matches.next() {
            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                if name == "package_name" {
                    return Some(parsed.node_text(capture.node).to_string());
                }
            }
        }
        None
    }

    fn extract_declarations(
        &self,
        parsed: &ParsedFile,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> anyhow::Result<Vec<DeclarationFacts>> {
        let query = Query::new(&self.language, DECLARATION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut declarations = Vec::new();
        let mut seen_positions = HashSet::new();

        while let Some(m) = matches.next() {
            let mut name = String::new();
            let mut kind = DeclarationKind::Method;
            let mut decl_node = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "method_name" | "constructor_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Method;
                    }
                    "class_name" | "record_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Class;
                    }
                    "interface_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Interface;
                    }
                    "enum_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Enum;
                    }
                    "field_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Variable;
                    }
                    "method" | "constructor" | "class" | "interface" | "enum" | "record"
                    | "field" => {
                        decl_node = Some(capture.node);
                    }
                    _ => {}
                }
            }

            let Some(node) = decl_node else { continue };
            if name.is_empty() || !seen_positions.insert((node.start_byte(), name.clone())) {
                continue;
            }

            if syntax::inside_error(node) {
                diagnostics.push(Diagnostic::malformed(
                    &parsed.path,
                    node.start_position().row + 1,
                    format!("skipped member `{}` inside an unparseable region", name),
                ));
                continue;
            }
            if is_local(node) {
                continue;
            }

            let modifiers = modifiers(parsed, node);
            if kind == DeclarationKind::Variable
                && modifiers.contains(&"static")
                && modifiers.contains(&"final")
            {
                kind = DeclarationKind::Const;
            }

            let owner = owning_type(node).and_then(|t| parsed.field_text(t, "name"));
            let mut facts = DeclarationFacts::new(name, kind, Span::from_node(node));
            facts.export_modifier = modifiers.contains(&"public");
            if !TYPE_KINDS.contains(&node.kind()) {
                facts.receiver = owner.map(str::to_string);
            }

            if kind.is_callable() {
                let body = node.child_by_field_name("body");
                facts.signature = Some(syntax::signature(parsed, node, body));
                if let Some(body) = body {
                    let receiver_var = facts.receiver.as_ref().map(|_| "this".to_string());
                    facts.body = Some(lower_body(&BODY_GRAMMAR, parsed, body, receiver_var));
                }
            }

            declarations.push(facts);
        }

        declarations.sort_by_key(|d| (d.span.start_byte, d.name.clone()));
        Ok(declarations)
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();
        let mut seen_paths = HashSet::new();

        while let Some(m) = matches.next() {
            let mut path = String::new();
            let mut line = 0;

            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "import_path" => path = parsed.node_text(capture.node).to_string(),
                    "import" => {
                        line = capture.node.start_position().row + 1;
                        if parsed.node_text(capture.node).trim_end_matches(';').ends_with(".*") {
                            path.push_str(".*");
                        }
                    }
                    _ => {}
                }
            }

            if !path.is_empty() && seen_paths.insert(path.clone()) {
                imports.push(Import {
                    path,
                    alias: None,
                    line,
                });
            }
        }

        imports.sort_by_key(|i| i.line);
        Ok(imports)
    }

    /// Enum declarations at any nesting level outside method bodies.
    fn extract_enums(&self, parsed: &ParsedFile) -> Vec<EnumFacts> {
        let mut enums = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| match node.kind() {
            "method_declaration" | "constructor_declaration" => false,
            "enum_declaration" => {
                let name = parsed.field_text(node, "name").unwrap_or_default();
                let mut members = Vec::new();
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for constant in body.named_children(&mut cursor) {
                        if constant.kind() != "enum_constant" {
                            continue;
                        }
                        if let Some(member) = parsed.field_text(constant, "name") {
                            members.push(EnumMemberFacts {
                                constant: member.to_string(),
                                line: constant.start_position().row + 1,
                            });
                        }
                    }
                }
                if members.len() >= 2 {
                    enums.push(EnumFacts {
                        name: name.to_string(),
                        span: Span::from_node(node),
                        members,
                    });
                }
                true
            }
            _ => true,
        });
        enums.extend(self.extract_sealed(parsed));
        enums
    }

    /// Sealed hierarchies: the permitted subtypes are the members. Without
    /// a `permits` clause the subtypes declared in the file are used.
    fn extract_sealed(&self, parsed: &ParsedFile) -> Vec<EnumFacts> {
        let mut sealed: Vec<(Node, String)> = Vec::new();
        let mut subtypes: Vec<(Node, String, Vec<String>)> = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            if matches!(node.kind(), "method_declaration" | "constructor_declaration") {
                return false;
            }
            if !matches!(
                node.kind(),
                "class_declaration" | "interface_declaration" | "record_declaration"
            ) {
                return true;
            }
            let Some(name) = parsed.field_text(node, "name") else {
                return true;
            };
            if modifiers(parsed, node).contains(&"sealed") {
                sealed.push((node, name.to_string()));
            }
            let mut supers = Vec::new();
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if matches!(child.kind(), "superclass" | "super_interfaces" | "extends_interfaces") {
                    supers.extend(type_names(parsed, child).into_iter().map(|(n, _)| n));
                }
            }
            subtypes.push((node, name.to_string(), supers));
            true
        });

        let mut enums = Vec::new();
        for (node, name) in sealed {
            let members: Vec<EnumMemberFacts> = match node.child_by_field_name("permits") {
                Some(permits) => type_names(parsed, permits)
                    .into_iter()
                    .map(|(constant, line)| EnumMemberFacts { constant, line })
                    .collect(),
                None => subtypes
                    .iter()
                    .filter(|(_, _, supers)| supers.iter().any(|s| *s == name))
                    .map(|(sub, sub_name, _)| EnumMemberFacts {
                        constant: sub_name.clone(),
                        line: sub.start_position().row + 1,
                    })
                    .collect(),
            };
            if members.len() >= 2 {
                enums.push(EnumFacts {
                    name,
                    span: Span::from_node(node),
                    members,
                });
            }
        }
        enums
    }

    /// Classes and their fields.
    fn extract_types(&self, parsed: &ParsedFile) -> Vec<TypeFacts> {
        let mut types = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            if matches!(node.kind(), "method_declaration" | "constructor_declaration") {
                return false;
            }
            if node.kind() != "class_declaration" {
                return true;
            }
            let name = parsed.field_text(node, "name").unwrap_or_default();
            let mut fields = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    if member.kind() != "field_declaration" {
                        continue;
                    }
                    let type_name = parsed.field_text(member, "type").map(str::to_string);
                    let mut declarators = member.walk();
                    for declarator in member.children_by_field_name("declarator", &mut declarators)
                    {
                        if let Some(field_name) = parsed.field_text(declarator, "name") {
                            fields.push(FieldFacts {
                                name: field_name.to_string(),
                                type_name: type_name.clone(),
                            });
                        }
                    }
                }
            }
            types.push(TypeFacts {
                name: name.to_string(),
                span: Span::from_node(node),
                fields,
            });
            true
        });
        types
    }
}

impl Default for JavaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for JavaAnalyzer {
    fn language_id(&self) -> &'static str {
        "java"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["java"]
    }

    fn default_profile(&self) -> LanguageProfile {
        LanguageProfile::java()
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse Java file: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts> {
        let mut facts = FileFacts::empty(&parsed.path, "java");
        facts.package = self.extract_package(parsed);
        facts.diagnostics = syntax::error_diagnostics(parsed);
        facts.imports = self.extract_imports(parsed)?;
        facts.declarations = self.extract_declarations(parsed, &mut facts.diagnostics)?;
        facts.enums = self.extract_enums(parsed);
        facts.types = self.extract_types(parsed);
        facts.comments = syntax::collect_comments(
            parsed,
            &["line_comment", "block_comment"],
            &facts.declarations,
        );
        Ok(facts)
    }
}

/// Modifier keywords (`public`, `static`, ...) of a declaration.
fn modifiers<'p>(parsed: &'p ParsedFile, node: Node) -> Vec<&'p str> {
    let mut cursor = node.walk();
    let Some(list) = node.children(&mut cursor).find(|c| c.kind() == "modifiers") else {
        return Vec::new();
    };
    let mut inner = list.walk();
    let words: Vec<&str> = list
        .children(&mut inner)
        .map(|c| parsed.node_text(c))
        .collect();
    words
}

/// Simple names of the types listed under `node`, with their lines.
/// `Outer.Idle` names `Idle`; type arguments are skipped.
fn type_names(parsed: &ParsedFile, node: Node) -> Vec<(String, usize)> {
    let mut names = Vec::new();
    syntax::walk(node, |n| match n.kind() {
        "type_arguments" => false,
        "scoped_type_identifier" => {
            let mut cursor = n.walk();
            let last = n
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "type_identifier")
                .last();
            if let Some(last) = last {
                names.push((parsed.node_text(last).to_string(), last.start_position().row + 1));
            }
            false
        }
        "type_identifier" => {
            names.push((parsed.node_text(n).to_string(), n.start_position().row + 1));
            false
        }
        _ => true,
    });
    names
}

/// Nearest enclosing type declaration.
fn owning_type(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if TYPE_KINDS.contains(&n.kind()) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// Declared inside a method, constructor or lambda body.
fn is_local(node: Node) -> bool {
    let mut current = node.parent();
    while let Some(n) = current {
        match n.kind() {
            "block" | "constructor_body" | "lambda_expression" => return true,
            "program" => return false,
            _ => current = n.parent(),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(source: &str) -> FileFacts {
        let analyzer = JavaAnalyzer::new();
        let parsed = analyzer.parse(Path::new("Loader.java"), source.as_bytes()).unwrap();
        analyzer.extract_facts(&parsed).unwrap()
    }

    #[test]
    fn test_classes_methods_and_fields() {
        let facts = analyze(
            r#"package com.example;

import java.util.List;

public class Loader {
    public static final int MAX = 3;
    private State state = State.IDLE;

    public void start() {
        this.state = State.LOADING;
    }

    void helper() {}
}
"#,
        );

        assert_eq!(facts.package.as_deref(), Some("com.example"));
        assert_eq!(facts.imports[0].path, "java.util.List");

        let loader = facts.find_declaration("Loader").unwrap();
        assert_eq!(loader.kind, DeclarationKind::Class);
        assert!(loader.export_modifier);
        assert!(loader.receiver.is_none());

        let max = facts.find_declaration("MAX").unwrap();
        assert_eq!(max.kind, DeclarationKind::Const);

        let start = facts.find_declaration("start").unwrap();
        assert_eq!(start.receiver.as_deref(), Some("Loader"));
        assert!(start.export_modifier);
        assert_eq!(start.body.as_ref().unwrap().receiver_var.as_deref(), Some("this"));

        assert!(!facts.find_declaration("helper").unwrap().export_modifier);

        let fields = &facts.find_type("Loader").unwrap().fields;
        assert!(fields.iter().any(|f| f.name == "state" && f.type_name.as_deref() == Some("State")));
    }

    #[test]
    fn test_nested_enum() {
        let facts = analyze(
            r#"public class Machine {
    public enum State { IDLE, RUNNING, DONE }
}
"#,
        );
        assert_eq!(facts.enums.len(), 1);
        assert_eq!(facts.enums[0].members.len(), 3);
        assert_eq!(facts.find_declaration("State").unwrap().kind, DeclarationKind::Enum);
    }

    #[test]
    fn test_sealed_hierarchies_are_enum_candidates() {
        let facts = analyze(
            r#"public sealed class State permits Idle, Loading, Loaded {}
final class Idle extends State {}
final class Loading extends State {}
final class Loaded extends State {}

sealed interface Event {}
record Start() implements Event {}
record Stop(String reason) implements Event {}

sealed interface Lonely permits Only {}
final class Only implements Lonely {}
"#,
        );
        let members = |name: &str| -> Vec<String> {
            facts
                .enums
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.members.iter().map(|m| m.constant.clone()).collect())
                .unwrap_or_default()
        };
        assert_eq!(members("State"), vec!["Idle", "Loading", "Loaded"]);
        assert_eq!(members("Event"), vec!["Start", "Stop"]);
        assert!(members("Lonely").is_empty());
    }

    #[test]
    fn test_local_classes_are_ignored() {
        let facts = analyze(
            r#"public class Outer {
    public void run() {
        class Local {}
    }
}
"#,
        );
        assert!(facts.find_declaration("Local").is_none());
    }
}
