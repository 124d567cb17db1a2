//! Rust language analyzer using tree-sitter.
//!
//! Extracts:
//! - Function declarations and impl methods
//! - Struct/enum/trait definitions and type aliases
//! - Constant and static items
//! - Use statements (imports)
//! - Fieldless enums as enumeration candidates
//! - Struct fields and lowered method bodies

use std::collections::{BTreeMap, HashSet};
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

/// Tree-sitter query for extracting Rust declarations.
const DECLARATION_QUERY: &str = r#"
(function_item
  name: (identifier) @func_name
) @function

(struct_item
  name: (type_identifier) @struct_name
) @struct

(enum_item
  name: (type_identifier) @enum_name
) @enum

(trait_item
  name: (type_identifier) @trait_name
) @trait

(type_item
  name: (type_identifier) @type_name
) @type_alias

(const_item
  name: (identifier) @const_name
) @const

(static_item
  name: (identifier) @static_name
) @static
"#;

/// Tree-sitter query for extracting imports (use statements).
const IMPORT_QUERY: &str = r#"
(use_declaration
  argument: (use_as_clause
    path: (_) @path
    alias: (identifier) @alias
  )
) @use_alias

(use_declaration
  argument: (_) @argument
) @use
"#;

const BODY_GRAMMAR: BodyGrammar = BodyGrammar {
    if_kinds: &["if_expression"],
    elif_kinds: &[],
    condition_field: "condition",
    consequence_field: "consequence",
    alternative_field: "alternative",
    assignment_kinds: &["assignment_expression"],
    list_kinds: &[],
    exit_kinds: &["return_expression"],
    exit_calls: &[ExitCall {
        kind: "macro_invocation",
        callee_field: "macro",
        names: &["panic", "unreachable", "unimplemented", "todo"],
    }],
    binary_kinds: &["binary_expression"],
    paren_kinds: &["parenthesized_expression"],
    switches: &[SwitchGrammar {
        kind: "match_expression",
        subject_field: "value",
        cases_field: "body",
        case_kinds: &["match_arm"],
        value_field: "pattern",
        label_kinds: &[],
        value_list_kinds: &["match_pattern", "or_pattern"],
        constructor_kinds: &["tuple_struct_pattern", "struct_pattern"],
        guard_field: "condition",
        body_field: "value",
        empty_falls_through: false,
    }],
    transparent_kinds: &["block", "expression_statement", "else_clause"],
    opaque_kinds: &["line_comment", "block_comment"],
};

/// Where an item lives.
enum Scope<'t> {
    TopLevel,
    /// Inside `impl Type` or `impl Trait for Type`.
    Impl(Node<'t>),
    /// Inside a function body or trait definition.
    Local,
}

/// Rust language analyzer.
pub struct RustAnalyzer {
    language: Language,
}

impl RustAnalyzer {
    /// Create a new Rust analyzer.
    pub fn new() -> Self {
        Self {
            language: tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Create a new parser for this thread.
    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
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

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "func_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Function;
                    }
                    "struct_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Struct;
                    }
                    "enum_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Enum;
                    }
                    "trait_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Trait;
                    }
                    "type_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::TypeAlias;
                    }
                    "const_name" | "static_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Const;
                    }
                    "function" | "struct" | "enum" | "trait" | "type_alias" | "const" | "static" => {
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
                    format!("skipped item `{}` inside an unparseable region", name),
                ));
                continue;
            }

            let mut export_modifier = has_pub(parsed, node);
            let receiver = match scope_of(node) {
                Scope::Local => continue,
                Scope::TopLevel => None,
                Scope::Impl(impl_item) => {
                    if kind == DeclarationKind::Function {
                        kind = DeclarationKind::Method;
                    }
                    // Trait impl members are as visible as the trait.
                    if impl_item.child_by_field_name("trait").is_some() {
                        export_modifier = true;
                    }
                    impl_item
                        .child_by_field_name("type")
                        .map(|t| base_type_name(parsed, t))
                }
            };

            let mut facts = DeclarationFacts::new(name, kind, Span::from_node(node));
            facts.receiver = receiver;
            facts.export_modifier = export_modifier;
            facts.anchor_line = attribute_anchor(node);

            if kind.is_callable() {
                let body = node.child_by_field_name("body");
                facts.signature = Some(syntax::signature(parsed, node, body));
                if let Some(body) = body {
                    let receiver_var = takes_self(node).then(|| "self".to_string());
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
    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        // Both patterns match an aliased use; the aliased reading wins.
        let mut by_line: BTreeMap<usize, Import> = BTreeMap::new();

        while let Some(m) = matches.next() {
            let mut path = String::new();
            let mut alias = None;
            let mut line = 0;

            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "path" | "argument" => {
                        path = syntax::collapse_whitespace(parsed.node_text(capture.node));
                    }
                    "alias" => alias = Some(parsed.node_text(capture.node).to_string()),
                    "use" | "use_alias" => line = capture.node.start_position().row + 1,
                    _ => {}
                }
            }

            if path.is_empty() {
                continue;
            }
            if alias.is_some() || !by_line.contains_key(&line) {
                by_line.insert(line, Import { path, alias, line });
            }
        }

        let imports = by_line.into_values().collect();
        Ok(imports)
    }

    /// Enums whose variants are all fieldless.
    fn extract_enums(&self, parsed: &ParsedFile) -> Vec<EnumFacts> {
        let mut enums = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            if node.kind() == "function_item" {
                return false;
            }
            if node.kind() != "enum_item" {
                return true;
            }

            let name = parsed.field_text(node, "name").unwrap_or_default();
            // Variants with payloads (`Loaded(String)`) are states too.
            let mut members = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for variant in body.named_children(&mut cursor) {
                    if variant.kind() != "enum_variant" {
                        continue;
                    }
                    if let Some(constant) = parsed.field_text(variant, "name") {
                        members.push(EnumMemberFacts {
                            constant: constant.to_string(),
                            line: variant.start_position().row + 1,
                        });
                    }
                }
            }

            if members.len() >= 2 && !name.is_empty() {
                enums.push(EnumFacts {
                    name: name.to_string(),
                    span: Span::from_node(node),
                    members,
                });
            }
            false
        });
        enums
    }

    /// Structs with named fields.
    fn extract_types(&self, parsed: &ParsedFile) -> Vec<TypeFacts> {
        let mut types = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| match node.kind() {
            "function_item" => false,
            "struct_item" => {
                let name = parsed.field_text(node, "name").unwrap_or_default();
                let mut fields = Vec::new();
                if let Some(body) = node.child_by_field_name("body") {
                    let mut cursor = body.walk();
                    for field in body.named_children(&mut cursor) {
                        if field.kind() != "field_declaration" {
                            continue;
                        }
                        if let Some(field_name) = parsed.field_text(field, "name") {
                            fields.push(FieldFacts {
                                name: field_name.to_string(),
                                type_name: parsed.field_text(field, "type").map(str::to_string),
                            });
                        }
                    }
                }
                types.push(TypeFacts {
                    name: name.to_string(),
                    span: Span::from_node(node),
                    fields,
                });
                false
            }
            _ => true,
        });
        types
    }
}

impl Default for RustAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for RustAnalyzer {
    fn language_id(&self) -> &'static str {
        "rust"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["rs"]
    }

    fn default_profile(&self) -> LanguageProfile {
        LanguageProfile::rust()
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse Rust file: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts> {
        let mut facts = FileFacts::empty(&parsed.path, "rust");
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

fn scope_of(node: Node) -> Scope<'_> {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            "impl_item" => return Scope::Impl(parent),
            "function_item" | "block" | "closure_expression" | "trait_item" => return Scope::Local,
            "source_file" => return Scope::TopLevel,
            _ => current = parent.parent(),
        }
    }
    Scope::TopLevel
}

/// Plain `pub` only; `pub(crate)` and friends are internal.
fn has_pub(parsed: &ParsedFile, node: Node) -> bool {
    let mut cursor = node.walk();
    let visibility = node
        .children(&mut cursor)
        .find(|c| c.kind() == "visibility_modifier");
    visibility.is_some_and(|v| parsed.node_text(v).trim() == "pub")
}

/// First line of the attributes directly above an item.
fn attribute_anchor(node: Node) -> usize {
    let mut anchor = node.start_position().row + 1;
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        if s.kind() != "attribute_item" || s.end_position().row + 2 < anchor {
            break;
        }
        anchor = s.start_position().row + 1;
        sibling = s.prev_sibling();
    }
    anchor
}

fn takes_self(function: Node) -> bool {
    let Some(params) = function.child_by_field_name("parameters") else {
        return false;
    };
    let mut cursor = params.walk();
    let found = params
        .named_children(&mut cursor)
        .any(|p| p.kind() == "self_parameter");
    found
}

/// `Loader<T>` -> `Loader`, `crate::Loader` -> `Loader`.
fn base_type_name(parsed: &ParsedFile, node: Node) -> String {
    let text = match node.kind() {
        "generic_type" => node
            .child_by_field_name("type")
            .map(|t| parsed.node_text(t))
            .unwrap_or_else(|| parsed.node_text(node)),
        _ => parsed.node_text(node),
    };
    text.rsplit("::").next().unwrap_or(text).to_string()
}
