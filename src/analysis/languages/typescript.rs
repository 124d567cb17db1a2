//! TypeScript and JavaScript analyzer using tree-sitter.
//!
//! JavaScript is parsed with the TSX grammar, which accepts plain JS and
//! JSX alike.

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
use crate::model::{Diagnostic, ReExport};
use crate::profile::LanguageProfile;

const DECLARATION_QUERY: &str = r#"
; Function declarations
(function_declaration
  name: (identifier) @function_name
) @function

(generator_function_declaration
  name: (identifier) @function_name
) @function

; Class declarations
(class_declaration
  name: (type_identifier) @class_name
) @class

(abstract_class_declaration
  name: (type_identifier) @class_name
) @class

; Interface declarations
(interface_declaration
  name: (type_identifier) @interface_name
) @interface

; Type alias declarations
(type_alias_declaration
  name: (type_identifier) @type_alias_name
) @type_alias

; Enum declarations
(enum_declaration
  name: (identifier) @enum_name
) @enum

; Method definitions in classes and object literals
(method_definition
  name: [(property_identifier) (private_property_identifier)] @method_name
) @method

; Variables, including function expressions and arrow functions
(variable_declarator
  name: (identifier) @variable_name
) @variable
"#;

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
(import_statement
  source: (string) @import_source
) @import
"#;

/// `export { a, b as c }` without a source module.
const EXPORT_CLAUSE_QUERY: &str = r#"
(export_statement
  (export_clause
    (export_specifier
      name: (identifier) @exported_name
    )
  )
) @export
"#;

/// Property names that tag the variants of a discriminated union.
const DISCRIMINATORS: &[&str] = &["kind", "type", "status", "tag"];

const CLASS_KINDS: &[&str] = &["class_declaration", "abstract_class_declaration", "class"];

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
        kind: "switch_statement",
        subject_field: "value",
        cases_field: "body",
        case_kinds: &["switch_case", "switch_default"],
        value_field: "value",
        label_kinds: &[],
        value_list_kinds: &[],
        constructor_kinds: &[],
        guard_field: "",
        body_field: "body",
        empty_falls_through: true,
    }],
    transparent_kinds: &["statement_block", "expression_statement", "else_clause"],
    opaque_kinds: &["comment", "arrow_function", "function_expression"],
};

/// Which flavour of the grammar family a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    TypeScript,
    JavaScript,
}

pub struct TypeScriptAnalyzer {
    dialect: Dialect,
    typescript: Language,
    tsx: Language,
}

impl TypeScriptAnalyzer {
    pub fn new() -> Self {
        Self::with_dialect(Dialect::TypeScript)
    }

    pub fn javascript() -> Self {
        Self::with_dialect(Dialect::JavaScript)
    }

    fn with_dialect(dialect: Dialect) -> Self {
        Self {
            dialect,
            typescript: tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            tsx: tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    /// Grammar for a file: plain `.ts` sources use the TypeScript grammar,
    /// everything else the TSX grammar.
    fn grammar_for(&self, path: &str) -> &Language {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        match (self.dialect, ext) {
            (Dialect::TypeScript, "tsx") | (Dialect::JavaScript, _) => &self.tsx,
            (Dialect::TypeScript, _) => &self.typescript,
        }
    }

    fn create_parser(&self, path: &str) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(self.grammar_for(path))?;
        Ok(parser)
    }

    fn extract_declarations(
        &self,
        parsed: &ParsedFile,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> anyhow::Result<Vec<DeclarationFacts>> {
        let language = self.grammar_for(&parsed.path);
        let query = Query::new(language, DECLARATION_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let listed = self.export_clause_names(parsed)?;
        let mut declarations = Vec::new();
        let mut seen_positions = HashSet::new();

        while let Some(m) = matches.next() {
            let mut name = String::new();
            let mut kind = DeclarationKind::Function;
            let mut decl_node = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "function_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Function;
                    }
                    "class_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Class;
                    }
                    "interface_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Interface;
                    }
                    "type_alias_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::TypeAlias;
                    }
                    "enum_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Enum;
                    }
                    "method_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Method;
                    }
                    "variable_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Variable;
                    }
                    "function" | "class" | "interface" | "type_alias" | "enum" | "method"
                    | "variable" => {
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
                    format!("skipped declaration `{}` inside an unparseable region", name),
                ));
                continue;
            }

            let facts = match kind {
                DeclarationKind::Method => self.method_facts(parsed, node, name, &listed),
                DeclarationKind::Variable => self.variable_facts(parsed, node, name, &listed),
                _ => self.item_facts(parsed, node, name, kind, &listed),
            };
            if let Some(facts) = facts {
                declarations.push(facts);
            }
        }

        declarations.sort_by_key(|d| (d.span.start_byte, d.name.clone()));
        Ok(declarations)
    }

    /// Top-level functions, classes, interfaces, aliases and enums.
    fn item_facts(
        &self,
        parsed: &ParsedFile,
        node: Node,
        name: String,
        kind: DeclarationKind,
        listed: &HashSet<String>,
    ) -> Option<DeclarationFacts> {
        let wrapper = top_level_statement(node)?;
        let mut facts = DeclarationFacts::new(name, kind, Span::from_node(node));
        facts.anchor_line = wrapper.start_position().row + 1;
        facts.export_modifier = is_export(wrapper) || listed.contains(&facts.name);

        if kind.is_callable() {
            let body = node.child_by_field_name("body");
            facts.signature = Some(syntax::signature(parsed, node, body));
            if let Some(body) = body {
                facts.body = Some(lower_body(&BODY_GRAMMAR, parsed, body, None));
            }
        }
        Some(facts)
    }

    /// Class members. Object-literal methods and local classes are skipped.
    fn method_facts(
        &self,
        parsed: &ParsedFile,
        node: Node,
        name: String,
        listed: &HashSet<String>,
    ) -> Option<DeclarationFacts> {
        let class = node
            .parent()
            .filter(|p| p.kind() == "class_body")
            .and_then(|p| p.parent())
            .filter(|p| CLASS_KINDS.contains(&p.kind()))?;
        let class_name = parsed.field_text(class, "name")?.to_string();
        let class_wrapper = top_level_statement(class)?;
        let class_exported = is_export(class_wrapper) || listed.contains(&class_name);

        let private = name.starts_with('#') || has_restricted_accessibility(parsed, node);

        let mut facts = DeclarationFacts::new(name, DeclarationKind::Method, Span::from_node(node));
        facts.receiver = Some(class_name);
        facts.export_modifier = class_exported && !private;

        let body = node.child_by_field_name("body");
        facts.signature = Some(syntax::signature(parsed, node, body));
        if let Some(body) = body {
            facts.body = Some(lower_body(
                &BODY_GRAMMAR,
                parsed,
                body,
                Some("this".to_string()),
            ));
        }
        Some(facts)
    }

    /// Module-level `const`, `let` and `var` bindings. Bindings holding a
    /// function expression are reported as functions.
    fn variable_facts(
        &self,
        parsed: &ParsedFile,
        node: Node,
        name: String,
        listed: &HashSet<String>,
    ) -> Option<DeclarationFacts> {
        let statement = node
            .parent()
            .filter(|p| matches!(p.kind(), "lexical_declaration" | "variable_declaration"))?;
        let wrapper = top_level_statement(statement)?;

        let value = node.child_by_field_name("value");
        let function_value =
            value.filter(|v| matches!(v.kind(), "arrow_function" | "function_expression"));
        let kind = if function_value.is_some() {
            DeclarationKind::Function
        } else if statement.child(0).map(|c| c.kind()) == Some("const") {
            DeclarationKind::Const
        } else {
            DeclarationKind::Variable
        };

        let mut facts = DeclarationFacts::new(name, kind, Span::from_node(node));
        facts.anchor_line = wrapper.start_position().row + 1;
        facts.export_modifier = is_export(wrapper) || listed.contains(&facts.name);

        if let Some(function) = function_value {
            let body = function
                .child_by_field_name("body")
                .filter(|b| b.kind() == "statement_block");
            facts.signature = Some(syntax::signature(parsed, node, body));
            if let Some(body) = body {
                facts.body = Some(lower_body(&BODY_GRAMMAR, parsed, body, None));
            }
        }
        Some(facts)
    }

    fn export_clause_names(&self, parsed: &ParsedFile) -> anyhow::Result<HashSet<String>> {
        let query = Query::new(self.grammar_for(&parsed.path), EXPORT_CLAUSE_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut names = HashSet::new();
        while let Some(m) = matches.next() {
            let mut name = None;
            let mut reexport = false;
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "exported_name" => name = Some(parsed.node_text(capture.node).to_string()),
                    "export" => reexport = capture.node.child_by_field_name("source").is_some(),
                    _ => {}
                }
            }
            if let (Some(name), false) = (name, reexport) {
                names.insert(name);
            }
        }
        Ok(names)
    }

    /// `export { a, b as c } from './m'`, `export * from './m'` and
    /// `export * as ns from './m'`.
    fn extract_re_exports(&self, parsed: &ParsedFile) -> Vec<ReExport> {
        let mut re_exports = Vec::new();
        let root = parsed.tree.root_node();
        let mut cursor = root.walk();
        for statement in root.named_children(&mut cursor) {
            if statement.kind() != "export_statement" {
                continue;
            }
            let Some(source) = statement.child_by_field_name("source") else {
                continue;
            };
            let source = trim_quotes(parsed.node_text(source)).to_string();
            let line = statement.start_position().row + 1;

            let mut names = Vec::new();
            let mut inner = statement.walk();
            for child in statement.named_children(&mut inner) {
                match child.kind() {
                    "export_clause" => {
                        let mut specifiers = child.walk();
                        for specifier in child.named_children(&mut specifiers) {
                            if specifier.kind() != "export_specifier" {
                                continue;
                            }
                            let name = specifier
                                .child_by_field_name("alias")
                                .or_else(|| specifier.child_by_field_name("name"));
                            if let Some(name) = name {
                                names.push(trim_quotes(parsed.node_text(name)).to_string());
                            }
                        }
                    }
                    "namespace_export" => {
                        if let Some(alias) = child.named_child(0) {
                            names.push(trim_quotes(parsed.node_text(alias)).to_string());
                        }
                    }
                    _ => {}
                }
            }
            if names.is_empty() {
                names.push("*".to_string());
            }
            re_exports.extend(names.into_iter().map(|name| ReExport {
                name,
                source: source.clone(),
                line,
            }));
        }
        re_exports
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(self.grammar_for(&parsed.path), IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();
        let mut seen_paths = HashSet::new();

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                if name != "import_source" {
                    continue;
                }
                let path = trim_quotes(parsed.node_text(capture.node)).to_string();
                if !path.is_empty() && seen_paths.insert(path.clone()) {
                    imports.push(Import {
                        path,
                        alias: None,
                        line: capture.node.start_position().row + 1,
                    });
                }
            }
        }

        imports.sort_by_key(|i| i.line);
        Ok(imports)
    }

    fn extract_enums(&self, parsed: &ParsedFile) -> Vec<EnumFacts> {
        let mut enums = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            if node.kind() == "type_alias_declaration" {
                if let Some(found) = union_enum(parsed, node) {
                    enums.push(found);
                }
                return false;
            }
            if node.kind() != "enum_declaration" {
                return !matches!(node.kind(), "statement_block" | "class_body");
            }
            let name = parsed.field_text(node, "name").unwrap_or_default();
            let mut members = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    let constant = match member.kind() {
                        "property_identifier" => Some(parsed.node_text(member)),
                        "enum_assignment" => parsed.field_text(member, "name"),
                        _ => None,
                    };
                    if let Some(constant) = constant {
                        members.push(EnumMemberFacts {
                            constant: constant.to_string(),
                            line: member.start_position().row + 1,
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
            false
        });
        enums
    }

    /// Classes with their field definitions and interfaces with their
    /// property signatures.
    fn extract_types(&self, parsed: &ParsedFile) -> Vec<TypeFacts> {
        let mut types = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            let member_kind = if CLASS_KINDS.contains(&node.kind()) {
                "public_field_definition"
            } else if node.kind() == "interface_declaration" {
                "property_signature"
            } else {
                return node.kind() != "statement_block";
            };

            let name = parsed.field_text(node, "name").unwrap_or_default();
            let mut fields = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for member in body.named_children(&mut cursor) {
                    if member.kind() != member_kind {
                        continue;
                    }
                    if let Some(field_name) = parsed.field_text(member, "name") {
                        fields.push(FieldFacts {
                            name: field_name.to_string(),
                            type_name: parsed.field_text(member, "type").map(syntax::clean_type),
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
        });
        types
    }
}

impl Default for TypeScriptAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for TypeScriptAnalyzer {
    fn language_id(&self) -> &'static str {
        match self.dialect {
            Dialect::TypeScript => "typescript",
            Dialect::JavaScript => "javascript",
        }
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        match self.dialect {
            Dialect::TypeScript => &["ts", "tsx", "mts", "cts"],
            Dialect::JavaScript => &["js", "jsx", "mjs", "cjs"],
        }
    }

    fn default_profile(&self) -> LanguageProfile {
        match self.dialect {
            Dialect::TypeScript => LanguageProfile::typescript(),
            Dialect::JavaScript => LanguageProfile::javascript(),
        }
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let path_str = path.to_string_lossy().to_string();
        let mut parser = self.create_parser(&path_str)?;
        let tree = parser.parse(source, None).ok_or_else(|| {
            anyhow::anyhow!(
                "Failed to parse {} file: {}",
                self.language_id(),
                path.display()
            )
        })?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path_str,
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts> {
        let mut facts = FileFacts::empty(&parsed.path, self.language_id());
        facts.diagnostics = syntax::error_diagnostics(parsed);
        facts.imports = self.extract_imports(parsed)?;
        facts.declarations = self.extract_declarations(parsed, &mut facts.diagnostics)?;
        facts.re_exports = self.extract_re_exports(parsed);
        facts.enums = self.extract_enums(parsed);
        facts.types = self.extract_types(parsed);
        facts.comments = syntax::collect_comments(parsed, &["comment"], &facts.declarations);
        Ok(facts)
    }
}

fn trim_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

/// A type alias whose value is a union of at least two variants, each
/// named by a string literal, a discriminator property, or a type name.
fn union_enum(parsed: &ParsedFile, alias: Node) -> Option<EnumFacts> {
    let name = parsed.field_text(alias, "name")?;
    let value = alias.child_by_field_name("value")?;
    if value.kind() != "union_type" {
        return None;
    }
    let mut variants = Vec::new();
    flatten_union(value, &mut variants);

    let mut members = Vec::new();
    for variant in variants {
        let constant = variant_name(parsed, variant)?;
        members.push(EnumMemberFacts {
            constant,
            line: variant.start_position().row + 1,
        });
    }
    if members.len() < 2 {
        return None;
    }
    Some(EnumFacts {
        name: name.to_string(),
        span: Span::from_node(alias),
        members,
    })
}

fn flatten_union<'t>(node: Node<'t>, out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "union_type" {
            flatten_union(child, out);
        } else {
            out.push(child);
        }
    }
}

fn variant_name(parsed: &ParsedFile, variant: Node) -> Option<String> {
    match variant.kind() {
        "literal_type" => {
            let literal = variant.named_child(0)?;
            (literal.kind() == "string").then(|| trim_quotes(parsed.node_text(literal)).to_string())
        }
        "type_identifier" => Some(parsed.node_text(variant).to_string()),
        "generic_type" => parsed.field_text(variant, "name").map(str::to_string),
        "object_type" => {
            let mut cursor = variant.walk();
            let found = variant.named_children(&mut cursor).find_map(|member| {
                if member.kind() != "property_signature" {
                    return None;
                }
                let key = parsed.field_text(member, "name")?;
                if !DISCRIMINATORS.contains(&key) {
                    return None;
                }
                let annotation = member.child_by_field_name("type")?;
                let literal = annotation.named_child(0)?;
                (literal.kind() == "literal_type")
                    .then(|| variant_name(parsed, literal))
                    .flatten()
            });
            found
        }
        _ => None,
    }
}

/// The statement that places `node` at module level: the node itself or
/// its `export` wrapper. `None` for nested declarations.
fn top_level_statement(node: Node) -> Option<Node> {
    let parent = node.parent()?;
    match parent.kind() {
        "program" => Some(node),
        "export_statement" if parent.parent().map(|p| p.kind()) == Some("program") => {
            Some(parent)
        }
        _ => None,
    }
}

fn is_export(statement: Node) -> bool {
    statement.kind() == "export_statement"
}

/// `private` or `protected` members.
fn has_restricted_accessibility(parsed: &ParsedFile, node: Node) -> bool {
    let mut cursor = node.walk();
    let restricted = node.children(&mut cursor).any(|c| {
        c.kind() == "accessibility_modifier"
            && matches!(parsed.node_text(c), "private" | "protected")
    });
    restricted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_as(analyzer: TypeScriptAnalyzer, path: &str, source: &str) -> FileFacts {
        let parsed = analyzer.parse(Path::new(path), source.as_bytes()).unwrap();
        analyzer.extract_facts(&parsed).unwrap()
    }

    fn analyze(source: &str) -> FileFacts {
        analyze_as(TypeScriptAnalyzer::new(), "loader.ts", source)
    }

    #[test]
    fn test_extract_imports() {
        let facts = analyze(
            r#"import { readFile } from 'fs';
import * as path from "path";
"#,
        );
        let paths: Vec<_> = facts.imports.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["fs", "path"]);
    }

    #[test]
    fn test_export_modifiers() {
        let facts = analyze(
            r#"export function validate(token: string): boolean {
  return token.length > 0;
}

function helper(): void {}

export const MAX_RETRIES = 3;
let counter = 0;

export const handler = async (req: Request) => {
  return req;
};

interface Hidden { id: string }
export { Hidden };
"#,
        );

        let validate = facts.find_declaration("validate").unwrap();
        assert_eq!(validate.kind, DeclarationKind::Function);
        assert!(validate.export_modifier);
        assert_eq!(
            validate.signature.as_deref(),
            Some("function validate(token: string): boolean")
        );

        assert!(!facts.find_declaration("helper").unwrap().export_modifier);
        assert_eq!(facts.find_declaration("MAX_RETRIES").unwrap().kind, DeclarationKind::Const);
        assert_eq!(facts.find_declaration("counter").unwrap().kind, DeclarationKind::Variable);
        assert_eq!(facts.find_declaration("handler").unwrap().kind, DeclarationKind::Function);
        assert!(facts.find_declaration("Hidden").unwrap().export_modifier);
    }

    #[test]
    fn test_class_members() {
        let facts = analyze(
            r#"export class Loader {
  private context: Context = { state: State.Idle };

  start(): void {
    this.context.state = State.Loading;
  }

  private reset(): void {}

  #secret(): void {}
}
"#,
        );

        let start = facts.find_declaration("start").unwrap();
        assert_eq!(start.receiver.as_deref(), Some("Loader"));
        assert!(start.export_modifier);
        let body = start.body.as_ref().unwrap();
        assert_eq!(body.receiver_var.as_deref(), Some("this"));
        assert_eq!(body.statements.len(), 1);

        assert!(!facts.find_declaration("reset").unwrap().export_modifier);
        assert!(!facts.find_declaration("#secret").unwrap().export_modifier);

        let loader = facts.find_type("Loader").unwrap();
        assert_eq!(
            loader.field("context").unwrap().type_name.as_deref(),
            Some("Context")
        );
    }

    #[test]
    fn test_enums_and_interfaces() {
        let facts = analyze(
            r#"export enum State {
  Idle = 'idle',
  Loading = 'loading',
}

export interface StateContext {
  state: State;
  data: unknown | null;
}
"#,
        );
        assert_eq!(facts.enums.len(), 1);
        let constants: Vec<_> = facts.enums[0].members.iter().map(|m| m.constant.as_str()).collect();
        assert_eq!(constants, vec!["Idle", "Loading"]);

        let ctx = facts.find_type("StateContext").unwrap();
        assert_eq!(ctx.field("state").unwrap().type_name.as_deref(), Some("State"));
    }

    #[test]
    fn test_union_aliases_are_enum_candidates() {
        let facts = analyze(
            r#"type Phase = 'idle' | 'running' | 'done';

type Event =
  | { type: 'START' }
  | { type: 'STOP'; reason: string };

type AppState = IdleState | LoadingState;

type Maybe = string | null;
"#,
        );
        let by_name = |name: &str| -> Vec<String> {
            facts
                .enums
                .iter()
                .find(|e| e.name == name)
                .map(|e| e.members.iter().map(|m| m.constant.clone()).collect())
                .unwrap_or_default()
        };
        assert_eq!(by_name("Phase"), vec!["idle", "running", "done"]);
        assert_eq!(by_name("Event"), vec!["START", "STOP"]);
        assert_eq!(by_name("AppState"), vec!["IdleState", "LoadingState"]);
        assert!(by_name("Maybe").is_empty());
        assert_eq!(facts.enums.len(), 3);
    }

    #[test]
    fn test_re_exports() {
        let facts = analyze(
            r#"export { validateToken, Claims as TokenClaims } from './auth';
export * from './utils';
export * as schema from "./schema";
const local = 1;
export { local };
"#,
        );
        let found: Vec<_> = facts
            .re_exports
            .iter()
            .map(|r| (r.name.as_str(), r.source.as_str(), r.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("validateToken", "./auth", 1),
                ("TokenClaims", "./auth", 1),
                ("*", "./utils", 2),
                ("schema", "./schema", 3),
            ]
        );
        assert!(facts.find_declaration("local").unwrap().export_modifier);
    }

    #[test]
    fn test_javascript_dialect() {
        let facts = analyze_as(
            TypeScriptAnalyzer::javascript(),
            "widget.jsx",
            r#"export function Widget() {
  return <div />;
}

class Internal {
  render() {}
}
"#,
        );
        assert_eq!(facts.language, "javascript");
        assert!(facts.find_declaration("Widget").unwrap().export_modifier);
        assert!(!facts.find_declaration("render").unwrap().export_modifier);
    }

    #[test]
    fn test_nested_functions_ignored() {
        let facts = analyze(
            r#"export function outer() {
  function inner() {}
  const local = 1;
}
"#,
        );
        assert!(facts.find_declaration("inner").is_none());
        assert!(facts.find_declaration("local").is_none());
    }
}
