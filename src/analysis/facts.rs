//! Fact structures extracted from AST analysis.
//!
//! Facts are the raw, language-neutral output of a `LanguageAnalyzer`.
//! They are not yet classified (visibility) or annotated (contracts); the
//! engine turns them into the public model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Diagnostic, ReExport};

/// Source location span with byte offsets and line/column positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (0-indexed).
    pub start_byte: usize,
    /// End byte offset (0-indexed, exclusive).
    pub end_byte: usize,
    /// Start line (1-indexed).
    pub start_line: usize,
    /// Start column (1-indexed).
    pub start_col: usize,
    /// End line (1-indexed).
    pub end_line: usize,
    /// End column (1-indexed).
    pub end_col: usize,
}

impl Span {
    /// Create a span from a tree-sitter node.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        let end = node.end_position();
        Self {
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: start.row + 1, // tree-sitter is 0-indexed
            start_col: start.column + 1,
            end_line: end.row + 1,
            end_col: end.column + 1,
        }
    }

    /// Whether `line` falls inside this span (inclusive).
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start_line, self.start_col)
    }
}

/// Kind of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    Function,
    Method,
    Struct,
    Class,
    Interface,
    Enum,
    Trait,
    TypeAlias,
    Const,
    Variable,
}

impl DeclarationKind {
    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Method => "method",
            DeclarationKind::Struct => "struct",
            DeclarationKind::Class => "class",
            DeclarationKind::Interface => "interface",
            DeclarationKind::Enum => "enum",
            DeclarationKind::Trait => "trait",
            DeclarationKind::TypeAlias => "type_alias",
            DeclarationKind::Const => "const",
            DeclarationKind::Variable => "variable",
        }
    }

    /// Check if this is a callable (function or method).
    pub fn is_callable(&self) -> bool {
        matches!(self, DeclarationKind::Function | DeclarationKind::Method)
    }

    /// Collapse the kind into one of the four model categories.
    pub fn category(&self) -> DeclarationCategory {
        match self {
            DeclarationKind::Function | DeclarationKind::Method => DeclarationCategory::Function,
            DeclarationKind::Struct
            | DeclarationKind::Class
            | DeclarationKind::Interface
            | DeclarationKind::Enum
            | DeclarationKind::Trait
            | DeclarationKind::TypeAlias => DeclarationCategory::Type,
            DeclarationKind::Const => DeclarationCategory::Constant,
            DeclarationKind::Variable => DeclarationCategory::Variable,
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse declaration category: function, type, constant or variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationCategory {
    Function,
    Type,
    Constant,
    Variable,
}

/// One physical comment line with its markers (`//`, `#`, `*`, ...) removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentLine {
    /// Line number (1-indexed).
    pub line: usize,
    /// Comment text without markers, trimmed.
    pub text: String,
}

/// A declaration as recognized by a language analyzer.
#[derive(Debug, Clone)]
pub struct DeclarationFacts {
    /// The declaration name.
    pub name: String,
    /// The kind of declaration.
    pub kind: DeclarationKind,
    /// Source span for the entire declaration.
    pub span: Span,
    /// First line that belongs to the declaration, including attributes,
    /// decorators and group keywords. A comment run must end right above it.
    pub anchor_line: usize,
    /// For methods: the receiver type (e.g., "Config" for `func (c *Config) Validate()`).
    pub receiver: Option<String>,
    /// Whether the declaration carries the language's export modifier
    /// (`pub`, `export`, `public`).
    pub export_modifier: bool,
    /// Normalized signature for callables.
    pub signature: Option<String>,
    /// Documentation that lives inside the declaration (Python docstrings).
    pub docstring: Option<Vec<CommentLine>>,
    /// Lowered body (only for functions/methods).
    pub body: Option<FunctionBody>,
}

impl DeclarationFacts {
    /// Create facts with the common defaults filled in.
    pub fn new(name: impl Into<String>, kind: DeclarationKind, span: Span) -> Self {
        let anchor_line = span.start_line;
        Self {
            name: name.into(),
            kind,
            span,
            anchor_line,
            receiver: None,
            export_modifier: false,
            signature: None,
            docstring: None,
            body: None,
        }
    }

    /// Get the fully qualified name (receiver.name for methods).
    pub fn qualified_name(&self) -> String {
        if let Some(ref recv) = self.receiver {
            format!("{}.{}", recv, self.name)
        } else {
            self.name.clone()
        }
    }
}

/// A callable body lowered into the language-neutral statement tree.
#[derive(Debug, Clone)]
pub struct FunctionBody {
    /// Span of the body block.
    pub span: Span,
    /// Name the body uses for its receiver (`r`, `self`, `this`).
    pub receiver_var: Option<String>,
    /// Top-level statements in source order.
    pub statements: Vec<Statement>,
}

/// A statement shape the state-machine detector understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `target = value`.
    Assign {
        target: String,
        value: String,
        line: usize,
    },
    /// `if condition { then } else { else }`.
    Branch {
        condition: Condition,
        condition_text: String,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
        line: usize,
    },
    /// return / throw / raise / panic.
    Exit { line: usize },
    /// Any other compound statement (loop, switch, closure) that contains
    /// interesting statements. Its contents run conditionally.
    Nested {
        kind: String,
        statements: Vec<Statement>,
        line: usize,
    },
}

impl Statement {
    /// Whether executing `statements` always leaves the function.
    pub fn always_exits(statements: &[Statement]) -> bool {
        match statements.last() {
            Some(Statement::Exit { .. }) => true,
            Some(Statement::Branch {
                then_branch,
                else_branch,
                ..
            }) => Self::always_exits(then_branch) && Self::always_exits(else_branch),
            _ => false,
        }
    }
}

/// A boolean condition, reduced to the comparisons it is made of.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare(Comparison),
    /// Conjunction (`&&`, `and`).
    All(Vec<Condition>),
    /// Disjunction (`||`, `or`).
    Any(Vec<Condition>),
    /// Anything else; never constrains the state.
    Opaque(String),
}

/// An equality or inequality comparison between two expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub left: String,
    pub op: CompareOp,
    pub right: String,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// An enumeration candidate: a named type with an ordered list of constants.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumFacts {
    /// Type name (`State`).
    pub name: String,
    /// Span of the enum definition (or of the const group for Go).
    pub span: Span,
    /// Members in declaration order.
    pub members: Vec<EnumMemberFacts>,
}

/// One enumeration constant.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberFacts {
    /// Identifier as written in source (`StateIdle`, `IDLE`).
    pub constant: String,
    /// Line number (1-indexed).
    pub line: usize,
}

/// A record-like type (struct, class, interface) and its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeFacts {
    pub name: String,
    pub span: Span,
    pub fields: Vec<FieldFacts>,
}

impl TypeFacts {
    /// Find a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldFacts> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A field of a record-like type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFacts {
    pub name: String,
    /// Type text as written, when it could be determined.
    pub type_name: Option<String>,
}

/// An import/dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// The import path or module name.
    pub path: String,
    /// Optional alias (e.g., `import foo "bar"` -> alias is "foo").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Line number (1-indexed).
    pub line: usize,
}

/// All facts extracted from a single file.
#[derive(Debug, Clone)]
pub struct FileFacts {
    /// File path.
    pub path: String,
    /// Language identifier.
    pub language: String,
    /// Package/module name (if applicable).
    pub package: Option<String>,
    /// All declarations in the file, in source order.
    pub declarations: Vec<DeclarationFacts>,
    /// Standalone comment lines outside callable bodies, in source order.
    pub comments: Vec<CommentLine>,
    /// All imports in the file.
    pub imports: Vec<Import>,
    /// Names the file exports from other modules.
    pub re_exports: Vec<ReExport>,
    /// Explicit list of exported names (`__all__`); when present it
    /// replaces the naming convention for top-level declarations.
    pub export_list: Option<Vec<String>>,
    /// Enumeration candidates.
    pub enums: Vec<EnumFacts>,
    /// Record-like types with their fields.
    pub types: Vec<TypeFacts>,
    /// Constructs the analyzer skipped.
    pub diagnostics: Vec<Diagnostic>,
}

impl FileFacts {
    /// Create empty facts for a file.
    pub fn empty(path: &str, language: &str) -> Self {
        Self {
            path: path.to_string(),
            language: language.to_string(),
            package: None,
            declarations: Vec::new(),
            comments: Vec::new(),
            imports: Vec::new(),
            re_exports: Vec::new(),
            export_list: None,
            enums: Vec::new(),
            types: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Find a declaration by name.
    pub fn find_declaration(&self, name: &str) -> Option<&DeclarationFacts> {
        self.declarations.iter().find(|d| d.name == name)
    }

    /// Find declarations by kind.
    pub fn declarations_by_kind(
        &self,
        kind: DeclarationKind,
    ) -> impl Iterator<Item = &DeclarationFacts> {
        self.declarations.iter().filter(move |d| d.kind == kind)
    }

    /// Get all functions and methods.
    pub fn callables(&self) -> impl Iterator<Item = &DeclarationFacts> {
        self.declarations.iter().filter(|d| d.kind.is_callable())
    }

    /// Find a record-like type by name.
    pub fn find_type(&self, name: &str) -> Option<&TypeFacts> {
        self.types.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start_line: usize, end_line: usize) -> Span {
        Span {
            start_byte: 0,
            end_byte: 10,
            start_line,
            start_col: 1,
            end_line,
            end_col: 11,
        }
    }

    #[test]
    fn test_declaration_qualified_name() {
        let func = DeclarationFacts::new("main", DeclarationKind::Function, span(1, 1));
        assert_eq!(func.qualified_name(), "main");

        let mut method = DeclarationFacts::new("Validate", DeclarationKind::Method, span(1, 1));
        method.receiver = Some("Config".to_string());
        assert_eq!(method.qualified_name(), "Config.Validate");
    }

    #[test]
    fn test_kind_categories() {
        assert_eq!(DeclarationKind::Method.category(), DeclarationCategory::Function);
        assert_eq!(DeclarationKind::TypeAlias.category(), DeclarationCategory::Type);
        assert_eq!(DeclarationKind::Const.category(), DeclarationCategory::Constant);
        assert_eq!(DeclarationKind::Variable.category(), DeclarationCategory::Variable);
    }

    #[test]
    fn test_always_exits() {
        let exit = Statement::Exit { line: 3 };
        assert!(Statement::always_exits(&[exit.clone()]));

        let assign = Statement::Assign {
            target: "r.state".to_string(),
            value: "StateIdle".to_string(),
            line: 2,
        };
        assert!(!Statement::always_exits(&[exit.clone(), assign]));

        let half = Statement::Branch {
            condition: Condition::Opaque("ok".to_string()),
            condition_text: "ok".to_string(),
            then_branch: vec![exit.clone()],
            else_branch: vec![],
            line: 1,
        };
        assert!(!Statement::always_exits(&[half]));

        let both = Statement::Branch {
            condition: Condition::Opaque("ok".to_string()),
            condition_text: "ok".to_string(),
            then_branch: vec![exit.clone()],
            else_branch: vec![exit],
            line: 1,
        };
        assert!(Statement::always_exits(&[both]));
    }

    #[test]
    fn test_span_contains_line() {
        let s = span(4, 9);
        assert!(s.contains_line(4));
        assert!(s.contains_line(9));
        assert!(!s.contains_line(3));
        assert!(!s.contains_line(10));
    }
}
