//! Go language analyzer using tree-sitter.
//!
//! Extracts:
//! - Function declarations (including methods with receivers)
//! - Type declarations (struct, interface, defined types, aliases)
//! - Constant and variable declarations, one per spec
//! - Imports (an import after other declarations is skipped)
//! - Typed const groups as enumeration candidates
//! - Struct fields and lowered method bodies

use std::collections::HashSet;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::body::{lower_body, BodyGrammar, ExitCall, SwitchGrammar};
use crate::analysis::syntax;
use crate::analysis::{
    DeclarationFacts, DeclarationKind, EnumFacts, EnumMemberFacts, FieldFacts, FileFacts, Import,
    LanguageAnalyzer, ParsedFile, Span, TypeFacts,
};
use crate::model::Diagnostic;
use crate::profile::LanguageProfile;

/// Tree-sitter query for extracting Go declarations.
const DECLARATION_QUERY: &str = r#"
; Function declarations
(function_declaration
  name: (identifier) @func_name
) @function

; Method declarations (with receiver)
(method_declaration
  receiver: (parameter_list
    (parameter_declaration
      type: [
        (pointer_type (type_identifier) @receiver_type)
        (type_identifier) @receiver_type
        (pointer_type (generic_type type: (type_identifier) @receiver_type))
        (generic_type type: (type_identifier) @receiver_type)
      ]
    )
  )
  name: (field_identifier) @method_name
) @method

; Type definitions; the kind comes from the type node
(type_spec
  name: (type_identifier) @type_name
  type: (_) @type_body
) @type_spec

; Type aliases (type A = B)
(type_alias
  name: (type_identifier) @alias_name
) @type_alias

; Constants and variables, one match per name
(const_spec
  name: (identifier) @const_name
) @const

(var_spec
  name: (identifier) @var_name
) @var
"#;

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
(import_spec
  name: (_)? @alias
  path: (_) @path
) @import_spec
"#;

/// Tree-sitter query for package declaration.
const PACKAGE_QUERY: &str = r#"
(package_clause
  (package_identifier) @package_name
)
"#;

/// Top-level node kinds that count as declarations for import ordering.
const TOP_LEVEL_DECLARATIONS: &[&str] = &[
    "function_declaration",
    "method_declaration",
    "type_declaration",
    "const_declaration",
    "var_declaration",
];

const BODY_GRAMMAR: BodyGrammar = BodyGrammar {
    if_kinds: &["if_statement"],
    elif_kinds: &[],
    condition_field: "condition",
    consequence_field: "consequence",
    alternative_field: "alternative",
    assignment_kinds: &["assignment_statement"],
    list_kinds: &["expression_list"],
    exit_kinds: &["return_statement"],
    exit_calls: &[ExitCall {
        kind: "call_expression",
        callee_field: "function",
        names: &["panic", "os.Exit", "log.Fatal", "log.Fatalf"],
    }],
    binary_kinds: &["binary_expression"],
    paren_kinds: &["parenthesized_expression"],
    switches: &[SwitchGrammar {
        kind: "expression_switch_statement",
        subject_field: "value",
        cases_field: "",
        case_kinds: &["expression_case", "default_case"],
        value_field: "value",
        label_kinds: &[],
        value_list_kinds: &["expression_list"],
        constructor_kinds: &[],
        guard_field: "",
        body_field: "",
        empty_falls_through: false,
    }],
    transparent_kinds: &["block", "statement_list", "expression_statement"],
    opaque_kinds: &["comment"],
};

/// Go language analyzer.
pub struct GoAnalyzer {
    language: Language,
}

impl GoAnalyzer {
    /// Create a new Go analyzer.
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// Create a new parser for this thread.
    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
    }

    /// Extract the package name from a parsed file.
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

    /// Extract declarations from a parsed file.
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
            let mut kind = DeclarationKind::Function;
            let mut decl_node = None;
            let mut receiver = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "func_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Function;
                    }
                    "method_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Method;
                    }
                    "receiver_type" => {
                        receiver = Some(parsed.node_text(capture.node).to_string());
                    }
                    "type_name" | "alias_name" => {
                        name = parsed.node_text(capture.node).to_string();
                    }
                    "type_body" => {
                        kind = match capture.node.kind() {
                            "struct_type" => DeclarationKind::Struct,
                            "interface_type" => DeclarationKind::Interface,
                            _ => DeclarationKind::TypeAlias,
                        };
                    }
                    "type_alias" => {
                        decl_node = Some(capture.node);
                        kind = DeclarationKind::TypeAlias;
                    }
                    "const_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Const;
                    }
                    "var_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Variable;
                    }
                    "function" | "method" | "type_spec" | "const" | "var" => {
                        decl_node = Some(capture.node);
                    }
                    _ => {}
                }
            }

            let Some(node) = decl_node else { continue };
            if name.is_empty() || name == "_" {
                continue;
            }
            let pos_key = (node.start_byte(), name.clone());
            if !seen_positions.insert(pos_key) {
                continue;
            }

            if syntax::inside_error(node) {
                diagnostics.push(Diagnostic::malformed(
                    &parsed.path,
                    node.start_position().row + 1,
                    format!("skipped declaration `{}` inside an unparseable region", name),
                ));
                continue;
            }
            let Some(group) = top_level_ancestor(node) else {
                continue;
            };

            let mut facts = DeclarationFacts::new(name, kind, Span::from_node(node));
            facts.receiver = receiver;
            facts.anchor_line = anchor_line(node, group);

            if kind.is_callable() {
                let body = node.child_by_field_name("body");
                facts.signature = Some(syntax::signature(parsed, node, body));
                if let Some(body) = body {
                    let receiver_var = receiver_name(parsed, node);
                    facts.body = Some(lower_body(&BODY_GRAMMAR, parsed, body, receiver_var));
                }
            }

            declarations.push(facts);
        }

        // Sort by position for deterministic output
        declarations.sort_by_key(|d| (d.span.start_byte, d.name.clone()));

        Ok(declarations)
    }

    /// Extract imports from a parsed file.
    fn extract_imports(
        &self,
        parsed: &ParsedFile,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();
        let mut seen_paths = HashSet::new();

        while let Some(m) = matches.next() {
            let mut path = String::new();
            let mut alias = None;
            let mut spec_node = None;

            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "path" => {
                        path = parsed.node_text(capture.node).trim_matches('"').to_string();
                    }
                    "alias" => {
                        alias = Some(parsed.node_text(capture.node).to_string());
                    }
                    "import_spec" => spec_node = Some(capture.node),
                    _ => {}
                }
            }

            let Some(node) = spec_node else { continue };
            let line = node.start_position().row + 1;

            let misplaced = import_declaration(node).is_some_and(follows_declarations);
            if misplaced {
                diagnostics.push(Diagnostic::malformed(
                    &parsed.path,
                    line,
                    format!("skipped import \"{}\" placed after declarations", path),
                ));
                continue;
            }

            if !path.is_empty() && seen_paths.insert(path.clone()) {
                imports.push(Import { path, alias, line });
            }
        }

        imports.sort_by_key(|i| i.line);

        Ok(imports)
    }

    /// Typed const groups: `const ( A State = iota; B; C )`.
    ///
    /// A spec without type or value repeats the previous spec's type.
    fn extract_enums(&self, parsed: &ParsedFile) -> Vec<EnumFacts> {
        let root = parsed.tree.root_node();
        let mut enums = Vec::new();

        let mut cursor = root.walk();
        for decl in root.named_children(&mut cursor) {
            if decl.kind() != "const_declaration" {
                continue;
            }

            let mut current_type: Option<String> = None;
            let mut run: Option<EnumFacts> = None;

            let mut spec_cursor = decl.walk();
            for spec in decl.named_children(&mut spec_cursor) {
                if spec.kind() != "const_spec" {
                    continue;
                }
                match spec.child_by_field_name("type") {
                    Some(t) => current_type = Some(parsed.node_text(t).to_string()),
                    None if spec.child_by_field_name("value").is_some() => current_type = None,
                    None => {}
                }

                let same_run = matches!(
                    (&run, &current_type),
                    (Some(r), Some(t)) if &r.name == t
                );
                if !same_run {
                    if let Some(done) = run.take() {
                        push_enum(&mut enums, done);
                    }
                    run = current_type
                        .as_ref()
                        .filter(|t| is_identifier(t))
                        .map(|t| EnumFacts {
                            name: t.clone(),
                            span: Span::from_node(decl),
                            members: Vec::new(),
                        });
                }

                if let Some(r) = run.as_mut() {
                    let mut name_cursor = spec.walk();
                    for name in spec.children_by_field_name("name", &mut name_cursor) {
                        let constant = parsed.node_text(name);
                        if constant != "_" {
                            r.members.push(EnumMemberFacts {
                                constant: constant.to_string(),
                                line: name.start_position().row + 1,
                            });
                        }
                    }
                }
            }

            if let Some(done) = run.take() {
                push_enum(&mut enums, done);
            }
        }

        enums
    }

    /// Struct types and their fields.
    fn extract_types(&self, parsed: &ParsedFile) -> Vec<TypeFacts> {
        let mut types = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            match node.kind() {
                "type_spec" => {
                    let name = parsed.field_text(node, "name");
                    let body = node.child_by_field_name("type");
                    if let (Some(name), Some(body)) = (name, body) {
                        if body.kind() == "struct_type" {
                            types.push(TypeFacts {
                                name: name.to_string(),
                                span: Span::from_node(node),
                                fields: struct_fields(parsed, body),
                            });
                        }
                    }
                    false
                }
                "function_declaration" | "method_declaration" => false,
                _ => true,
            }
        });
        types
    }
}

impl Default for GoAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for GoAnalyzer {
    fn language_id(&self) -> &'static str {
        "go"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["go"]
    }

    fn default_profile(&self) -> LanguageProfile {
        LanguageProfile::go()
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse Go file: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts> {
        let mut facts = FileFacts::empty(&parsed.path, "go");
        facts.package = self.extract_package(parsed);
        facts.diagnostics = syntax::error_diagnostics(parsed);
        facts.imports = self.extract_imports(parsed, &mut facts.diagnostics)?;
        facts.declarations = self.extract_declarations(parsed, &mut facts.diagnostics)?;
        facts.enums = self.extract_enums(parsed);
        facts.types = self.extract_types(parsed);
        facts.comments = syntax::collect_comments(parsed, &["comment"], &facts.declarations);
        Ok(facts)
    }
}

/// The direct child of `source_file` that holds `node`, unless `node`
/// sits inside a function.
fn top_level_ancestor(node: Node) -> Option<Node> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        match parent.kind() {
            "source_file" => return Some(current),
            "block" | "func_literal" => return None,
            _ => current = parent,
        }
    }
    None
}

/// The first spec of a group is documented above the group keyword.
fn anchor_line(node: Node, group: Node) -> usize {
    let line = node.start_position().row + 1;
    if group.id() == node.id() {
        return line;
    }
    let mut first_spec = None;
    syntax::walk(group, |n| {
        if first_spec.is_some() {
            return false;
        }
        if n.kind().ends_with("_spec") {
            first_spec = Some(n.start_position().row + 1);
            return false;
        }
        true
    });
    if first_spec == Some(line) {
        group.start_position().row + 1
    } else {
        line
    }
}

fn receiver_name(parsed: &ParsedFile, method: Node) -> Option<String> {
    let receiver = method.child_by_field_name("receiver")?;
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|n| n.kind() == "parameter_declaration")?;
    parsed.field_text(param, "name").map(str::to_string)
}

fn import_declaration(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == "import_declaration" {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

fn follows_declarations(import: Node) -> bool {
    let mut sibling = import.prev_named_sibling();
    while let Some(s) = sibling {
        if TOP_LEVEL_DECLARATIONS.contains(&s.kind()) {
            return true;
        }
        sibling = s.prev_named_sibling();
    }
    false
}

fn struct_fields(parsed: &ParsedFile, struct_type: Node) -> Vec<FieldFacts> {
    let mut fields = Vec::new();
    syntax::walk(struct_type, |node| {
        if node.kind() != "field_declaration" {
            return true;
        }
        let type_name = parsed.field_text(node, "type").map(str::to_string);
        let mut cursor = node.walk();
        let names: Vec<String> = node
            .children_by_field_name("name", &mut cursor)
            .map(|n| parsed.node_text(n).to_string())
            .collect();
        if names.is_empty() {
            // Embedded field: named after its type.
            if let Some(t) = &type_name {
                let embedded = syntax::clean_type(t);
                let short = embedded.rsplit('.').next().unwrap_or(&embedded).to_string();
                fields.push(FieldFacts {
                    name: short,
                    type_name: Some(embedded),
                });
            }
        } else {
            for name in names {
                fields.push(FieldFacts {
                    name,
                    type_name: type_name.clone(),
                });
            }
        }
        false
    });
    fields
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn push_enum(enums: &mut Vec<EnumFacts>, candidate: EnumFacts) {
    let distinct: HashSet<&str> = candidate.members.iter().map(|m| m.constant.as_str()).collect();
    if distinct.len() >= 2 {
        enums.push(candidate);
    }
}
