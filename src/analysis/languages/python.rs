//! Python language analyzer using tree-sitter.
//!
//! Classes are the receiver types: their methods are methods, their
//! attributes come from class-level annotations and `self.x = ...`
//! assignments. `Enum` subclasses and module-level `Union[...]` aliases
//! are enumeration candidates; `__all__` lists the exported names.

use std::collections::HashSet;
use std::path::Path;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::body::{lower_body, BodyGrammar, ExitCall, SwitchGrammar};
use crate::analysis::syntax;
use crate::analysis::{
    CommentLine, DeclarationFacts, DeclarationKind, EnumFacts, EnumMemberFacts, FieldFacts,
    FileFacts, Import, LanguageAnalyzer, ParsedFile, Span, TypeFacts,
};
use crate::model::Diagnostic;
use crate::profile::LanguageProfile;

const DECLARATION_QUERY: &str = r#"
(function_definition
  name: (identifier) @func_name
) @function

(class_definition
  name: (identifier) @class_name
) @class
"#;

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
; import module
(import_statement
  name: (dotted_name) @module_name
) @import

; import module as alias
(import_statement
  name: (aliased_import
    name: (dotted_name) @module_name
    alias: (identifier) @alias
  )
) @import

; from module import name
(import_from_statement
  module_name: (_) @module_name
) @import
"#;

/// Base classes that make a class an enumeration.
const ENUM_BASES: &[&str] = &["Enum", "IntEnum", "StrEnum", "Flag", "IntFlag"];

const BODY_GRAMMAR: BodyGrammar = BodyGrammar {
    if_kinds: &["if_statement"],
    elif_kinds: &["elif_clause"],
    condition_field: "condition",
    consequence_field: "consequence",
    alternative_field: "alternative",
    assignment_kinds: &["assignment"],
    list_kinds: &["pattern_list", "expression_list", "tuple_pattern"],
    exit_kinds: &["return_statement", "raise_statement"],
    exit_calls: &[ExitCall {
        kind: "call",
        callee_field: "function",
        names: &["sys.exit", "exit"],
    }],
    binary_kinds: &["comparison_operator", "boolean_operator"],
    paren_kinds: &["parenthesized_expression"],
    switches: &[SwitchGrammar {
        kind: "match_statement",
        subject_field: "subject",
        cases_field: "body",
        case_kinds: &["case_clause"],
        value_field: "",
        label_kinds: &["case_pattern"],
        value_list_kinds: &["union_pattern"],
        constructor_kinds: &["class_pattern"],
        guard_field: "guard",
        body_field: "consequence",
        empty_falls_through: false,
    }],
    transparent_kinds: &["block", "expression_statement", "else_clause"],
    opaque_kinds: &["comment", "string"],
};

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self) -> anyhow::Result<Parser> {
        let mut parser = Parser::new();
        parser.set_language(&self.language)?;
        Ok(parser)
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
            let mut kind = DeclarationKind::Function;
            let mut decl_node = None;

            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                match capture_name {
                    "func_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Function;
                    }
                    "class_name" => {
                        name = parsed.node_text(capture.node).to_string();
                        kind = DeclarationKind::Class;
                    }
                    "function" | "class" => {
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
                    format!("skipped definition `{}` inside an unparseable region", name),
                ));
                continue;
            }

            let receiver = match enclosing_scope(node) {
                Some(scope) if scope.kind() == "function_definition" => continue,
                Some(class) => parsed.field_text(class, "name").map(str::to_string),
                None => None,
            };
            if kind == DeclarationKind::Function && receiver.is_some() {
                kind = DeclarationKind::Method;
            }

            let decorated = node
                .parent()
                .filter(|p| p.kind() == "decorated_definition");

            let mut facts = DeclarationFacts::new(name, kind, Span::from_node(node));
            facts.receiver = receiver;
            facts.anchor_line = decorated
                .map(|d| d.start_position().row + 1)
                .unwrap_or(facts.anchor_line);

            let body = node.child_by_field_name("body");
            facts.docstring = body.and_then(|b| docstring(parsed, b));

            if kind.is_callable() {
                facts.signature = Some(syntax::signature(parsed, node, body));
                if let Some(body) = body {
                    let is_static = decorated
                        .map(|d| parsed.node_text(d).contains("@staticmethod"))
                        .unwrap_or(false);
                    let receiver_var = if kind == DeclarationKind::Method && !is_static {
                        first_parameter(parsed, node)
                    } else {
                        None
                    };
                    facts.body = Some(lower_body(&BODY_GRAMMAR, parsed, body, receiver_var));
                }
            }

            declarations.push(facts);
        }

        declarations.extend(self.extract_module_assignments(parsed));
        declarations.sort_by_key(|d| (d.span.start_byte, d.name.clone()));
        Ok(declarations)
    }

    /// Module-level `NAME = value` bindings. SCREAMING_CASE names are
    /// constants.
    fn extract_module_assignments(&self, parsed: &ParsedFile) -> Vec<DeclarationFacts> {
        let root = parsed.tree.root_node();
        let mut declarations = Vec::new();
        let mut cursor = root.walk();
        for stmt in root.named_children(&mut cursor) {
            if stmt.kind() != "expression_statement" {
                continue;
            }
            let Some(assignment) = stmt.named_child(0).filter(|n| n.kind() == "assignment") else {
                continue;
            };
            let Some(left) = assignment.child_by_field_name("left") else {
                continue;
            };
            if left.kind() != "identifier" {
                continue;
            }
            let name = parsed.node_text(left);
            let is_union = assignment
                .child_by_field_name("right")
                .is_some_and(|right| union_members(parsed, right).is_some());
            let kind = if is_union {
                DeclarationKind::TypeAlias
            } else if is_screaming_case(name) {
                DeclarationKind::Const
            } else {
                DeclarationKind::Variable
            };
            declarations.push(DeclarationFacts::new(name, kind, Span::from_node(stmt)));
        }
        declarations
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<Import>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();
        let mut seen = HashSet::new();

        while let Some(m) = matches.next() {
            let mut path = String::new();
            let mut alias = None;
            let mut line = 0;

            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize];
                match name {
                    "module_name" => path = parsed.node_text(capture.node).to_string(),
                    "alias" => alias = Some(parsed.node_text(capture.node).to_string()),
                    "import" => line = capture.node.start_position().row + 1,
                    _ => {}
                }
            }

            // `import a, b` yields one match per module.
            if !path.is_empty() && seen.insert((line, path.clone())) {
                imports.push(Import { path, alias, line });
            }
        }

        imports.sort_by_key(|i| i.line);
        Ok(imports)
    }

    /// `class State(Enum)` with at least two member assignments.
    /// `__all__ = [...]`, extended by `__all__ += [...]`.
    fn extract_export_list(&self, parsed: &ParsedFile) -> Option<Vec<String>> {
        let root = parsed.tree.root_node();
        let mut listed: Option<Vec<String>> = None;
        let mut cursor = root.walk();
        for stmt in root.named_children(&mut cursor) {
            let Some(assignment) = stmt
                .named_child(0)
                .filter(|n| matches!(n.kind(), "assignment" | "augmented_assignment"))
            else {
                continue;
            };
            let target = assignment.child_by_field_name("left").map(|l| parsed.node_text(l));
            if target != Some("__all__") {
                continue;
            }
            let Some(right) = assignment.child_by_field_name("right") else {
                continue;
            };
            if !matches!(right.kind(), "list" | "tuple") {
                continue;
            }
            let names = listed.get_or_insert_with(Vec::new);
            if assignment.kind() == "assignment" {
                names.clear();
            }
            let mut items = right.walk();
            for item in right.named_children(&mut items) {
                if item.kind() == "string" {
                    let name = parsed.node_text(item).trim_matches(|c| c == '"' || c == '\'');
                    names.push(name.to_string());
                }
            }
        }
        listed
    }

    /// Module-level aliases that name a closed set of classes:
    /// `State = Union[Idle, Loading]`, `State = Idle | Loading` and
    /// `type State = Idle | Loading`.
    fn extract_unions(&self, parsed: &ParsedFile) -> Vec<EnumFacts> {
        let root = parsed.tree.root_node();
        let mut enums = Vec::new();
        let mut cursor = root.walk();
        for stmt in root.named_children(&mut cursor) {
            let alias = match stmt.kind() {
                "type_alias_statement" => Some(stmt),
                "expression_statement" => stmt.named_child(0).filter(|n| n.kind() == "assignment"),
                _ => None,
            };
            let Some(alias) = alias else { continue };
            let (Some(left), Some(right)) = (
                alias.child_by_field_name("left"),
                alias.child_by_field_name("right"),
            ) else {
                continue;
            };
            let Some(members) = union_members(parsed, right) else {
                continue;
            };
            let members: Vec<EnumMemberFacts> = members
                .into_iter()
                .map(|m| EnumMemberFacts {
                    constant: parsed.node_text(m).rsplit('.').next().unwrap_or_default().to_string(),
                    line: m.start_position().row + 1,
                })
                .collect();
            if members.len() >= 2 {
                enums.push(EnumFacts {
                    name: parsed.node_text(left).trim().to_string(),
                    span: Span::from_node(stmt),
                    members,
                });
            }
        }
        enums
    }

    fn extract_enums(&self, parsed: &ParsedFile) -> Vec<EnumFacts> {
        let mut enums = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            match node.kind() {
                "function_definition" => return false,
                "class_definition" => {}
                _ => return true,
            }
            if !has_enum_base(parsed, node) {
                return true;
            }
            let name = parsed.field_text(node, "name").unwrap_or_default();
            let mut members = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for stmt in body.named_children(&mut cursor) {
                    let target = stmt
                        .named_child(0)
                        .filter(|n| n.kind() == "assignment")
                        .and_then(|a| a.child_by_field_name("left"))
                        .filter(|l| l.kind() == "identifier");
                    if let Some(target) = target {
                        let constant = parsed.node_text(target);
                        if !constant.starts_with('_') {
                            members.push(EnumMemberFacts {
                                constant: constant.to_string(),
                                line: target.start_position().row + 1,
                            });
                        }
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

    /// Classes and the attributes their bodies and methods assign.
    fn extract_types(&self, parsed: &ParsedFile) -> Vec<TypeFacts> {
        let mut types = Vec::new();
        syntax::walk(parsed.tree.root_node(), |node| {
            if node.kind() == "function_definition" {
                return false;
            }
            if node.kind() != "class_definition" {
                return true;
            }
            let name = parsed.field_text(node, "name").unwrap_or_default();
            let mut fields: Vec<FieldFacts> = Vec::new();
            if let Some(body) = node.child_by_field_name("body") {
                collect_attributes(parsed, body, &mut fields);
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

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py", "pyi"]
    }

    fn default_profile(&self) -> LanguageProfile {
        LanguageProfile::python()
    }

    fn parse(&self, path: &Path, source: &[u8]) -> anyhow::Result<ParsedFile> {
        let mut parser = self.create_parser()?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| anyhow::anyhow!("Failed to parse Python file: {}", path.display()))?;

        Ok(ParsedFile {
            tree,
            source: source.to_vec(),
            path: path.to_string_lossy().to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFacts> {
        let mut facts = FileFacts::empty(&parsed.path, "python");
        facts.diagnostics = syntax::error_diagnostics(parsed);
        facts.imports = self.extract_imports(parsed)?;
        facts.declarations = self.extract_declarations(parsed, &mut facts.diagnostics)?;
        facts.export_list = self.extract_export_list(parsed);
        facts.enums = self.extract_enums(parsed);
        facts.enums.extend(self.extract_unions(parsed));
        facts.types = self.extract_types(parsed);
        facts.comments = syntax::collect_comments(parsed, &["comment"], &facts.declarations);
        Ok(facts)
    }
}

/// Class names joined by `Union[...]` or `|`, or `None` when `node` is not
/// such a union. `None` and `Optional` members disqualify it.
fn union_members<'t>(parsed: &ParsedFile, node: Node<'t>) -> Option<Vec<Node<'t>>> {
    let node = if node.kind() == "type" {
        node.named_child(0)?
    } else {
        node
    };
    let mut members = Vec::new();
    match node.kind() {
        "subscript" => {
            let value = node.child_by_field_name("value")?;
            if !matches!(parsed.node_text(value), "Union" | "typing.Union") {
                return None;
            }
            let mut cursor = node.walk();
            members.extend(node.children_by_field_name("subscript", &mut cursor));
        }
        "binary_operator" | "union_type" => collect_union(parsed, node, &mut members)?,
        _ => return None,
    }
    let classes = members.iter().all(|m| {
        matches!(m.kind(), "identifier" | "attribute") && is_class_name(parsed.node_text(*m))
    });
    (classes && members.len() >= 2).then_some(members)
}

/// CamelCase last segment; rules out `None`, builtins and flag constants.
fn is_class_name(path: &str) -> bool {
    let name = path.rsplit('.').next().unwrap_or_default();
    name != "None"
        && name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().any(|c| c.is_ascii_lowercase())
}

fn collect_union<'t>(parsed: &ParsedFile, node: Node<'t>, members: &mut Vec<Node<'t>>) -> Option<()> {
    match node.kind() {
        "binary_operator" => {
            let op = node.child_by_field_name("operator")?;
            if parsed.node_text(op) != "|" {
                return None;
            }
            collect_union(parsed, node.child_by_field_name("left")?, members)?;
            collect_union(parsed, node.child_by_field_name("right")?, members)
        }
        "union_type" => {
            let mut cursor = node.walk();
            let parts: Vec<Node> = node.named_children(&mut cursor).collect();
            for part in parts {
                collect_union(parsed, part, members)?;
            }
            Some(())
        }
        "type" => collect_union(parsed, node.named_child(0)?, members),
        _ => {
            members.push(node);
            Some(())
        }
    }
}

/// Nearest enclosing class or function definition.
fn enclosing_scope(node: Node) -> Option<Node> {
    let mut current = node.parent();
    while let Some(n) = current {
        if matches!(n.kind(), "class_definition" | "function_definition") {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

/// The string literal that opens a body, as comment lines.
fn docstring(parsed: &ParsedFile, body: Node) -> Option<Vec<CommentLine>> {
    let first = body.named_child(0)?;
    if first.kind() != "expression_statement" || first.named_child_count() != 1 {
        return None;
    }
    let string = first.named_child(0).filter(|n| n.kind() == "string")?;
    Some(syntax::docstring_lines(parsed, string))
}

fn first_parameter(parsed: &ParsedFile, function: Node) -> Option<String> {
    let params = function.child_by_field_name("parameters")?;
    let first = params.named_child(0)?;
    let ident = match first.kind() {
        "identifier" => first,
        "typed_parameter" => first.named_child(0)?,
        _ => return None,
    };
    Some(parsed.node_text(ident).to_string())
}

fn has_enum_base(parsed: &ParsedFile, class: Node) -> bool {
    let Some(bases) = class.child_by_field_name("superclasses") else {
        return false;
    };
    let mut cursor = bases.walk();
    let found = bases.named_children(&mut cursor).any(|base| {
        let text = parsed.node_text(base);
        let last = text.rsplit('.').next().unwrap_or(text);
        ENUM_BASES.contains(&last)
    });
    found
}

/// Class-level annotations plus every `self.attr = ...` in its methods.
fn collect_attributes(parsed: &ParsedFile, class_body: Node, fields: &mut Vec<FieldFacts>) {
    let mut push = |name: &str, type_name: Option<String>| {
        if let Some(existing) = fields.iter_mut().find(|f| f.name == name) {
            if existing.type_name.is_none() {
                existing.type_name = type_name;
            }
        } else {
            fields.push(FieldFacts {
                name: name.to_string(),
                type_name,
            });
        }
    };

    syntax::walk(class_body, |node| {
        if node.kind() == "class_definition" {
            return false;
        }
        if node.kind() != "assignment" {
            return true;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return false;
        };
        let declared = node
            .child_by_field_name("type")
            .map(|t| parsed.node_text(t).to_string());
        let inferred = || {
            node.child_by_field_name("right")
                .filter(|r| r.kind() == "call")
                .and_then(|call| call.child_by_field_name("function"))
                .map(|f| parsed.node_text(f).to_string())
        };

        match left.kind() {
            // Class-level attribute (only directly in the class body).
            "identifier" if is_class_level(node, class_body) => {
                push(parsed.node_text(left), declared.or_else(inferred));
            }
            "attribute" => {
                let object = left.child_by_field_name("object").map(|o| parsed.node_text(o));
                let attr = parsed.field_text(left, "attribute");
                if let (Some("self"), Some(attr)) = (object, attr) {
                    push(attr, declared.or_else(inferred));
                }
            }
            _ => {}
        }
        false
    });
}

fn is_class_level(assignment: Node, class_body: Node) -> bool {
    assignment
        .parent()
        .and_then(|stmt| stmt.parent())
        .is_some_and(|p| p.id() == class_body.id())
}

fn is_screaming_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
