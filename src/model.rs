//! The structured model handed to renderers.
//!
//! Every type here is immutable once built by the engine and serializes
//! with a stable field order (declaration order of the struct fields).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::{DeclarationCategory, DeclarationKind, Import, Span};

/// Whether a declaration is part of the public API surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Exported,
    Internal,
}

/// Tag of a contract clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseTag {
    Precondition,
    Postcondition,
    Error,
    /// Lifecycle-order marker; the clause text is the order number.
    Lifecycle,
    Invariant,
}

impl ClauseTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClauseTag::Precondition => "precondition",
            ClauseTag::Postcondition => "postcondition",
            ClauseTag::Error => "error",
            ClauseTag::Lifecycle => "lifecycle",
            ClauseTag::Invariant => "invariant",
        }
    }
}

impl fmt::Display for ClauseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tagged clause harvested from a documentation comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub tag: ClauseTag,
    pub text: String,
    /// Source line of the comment the clause came from.
    pub line: usize,
}

impl Clause {
    /// Parse the order number of a lifecycle clause.
    pub fn lifecycle_order(&self) -> Option<u32> {
        if self.tag != ClauseTag::Lifecycle {
            return None;
        }
        self.text
            .split_whitespace()
            .next()
            .and_then(|n| n.trim_end_matches(['.', ':', ',']).parse().ok())
    }
}

/// Contract annotation bound to a declaration. Empty when no comment run
/// precedes the declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContractAnnotation {
    /// Free-text lines of the comment run that are not clauses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Clauses in comment order.
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

impl ContractAnnotation {
    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.clauses.is_empty()
    }

    /// Clauses with the given tag, in source order.
    pub fn clauses_with(&self, tag: ClauseTag) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(move |c| c.tag == tag)
    }

    pub fn preconditions(&self) -> Vec<&str> {
        self.clauses_with(ClauseTag::Precondition)
            .map(|c| c.text.as_str())
            .collect()
    }

    pub fn postconditions(&self) -> Vec<&str> {
        self.clauses_with(ClauseTag::Postcondition)
            .map(|c| c.text.as_str())
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.clauses_with(ClauseTag::Error)
            .map(|c| c.text.as_str())
            .collect()
    }

    /// Order of the first lifecycle marker, if any.
    pub fn lifecycle_order(&self) -> Option<u32> {
        self.clauses_with(ClauseTag::Lifecycle)
            .find_map(Clause::lifecycle_order)
    }
}

/// A classified, annotated declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    pub category: DeclarationCategory,
    pub visibility: Visibility,
    pub span: Span,
    /// Owning receiver type for methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default)]
    pub contract: ContractAnnotation,
}

impl Declaration {
    pub fn is_exported(&self) -> bool {
        self.visibility == Visibility::Exported
    }

    pub fn qualified_name(&self) -> String {
        match &self.receiver {
            Some(recv) => format!("{}.{}", recv, self.name),
            None => self.name.clone(),
        }
    }
}

/// One member of a state enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMember {
    /// Display name (`Idle`).
    pub name: String,
    /// Identifier as written in source (`StateIdle`).
    pub constant: String,
    pub line: usize,
}

/// A named enumeration whose members are machine states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEnum {
    pub name: String,
    /// Unique members in declaration order.
    pub members: Vec<StateMember>,
    /// The zero/default member (the first declared).
    pub default_member: String,
}

impl StateEnum {
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.name.as_str()).collect()
    }

    /// Index of a member by display name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    /// Index of a member by source constant.
    pub fn position_of_constant(&self, constant: &str) -> Option<usize> {
        self.members.iter().position(|m| m.constant == constant)
    }
}

/// Source states a transition accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
    Any,
    States(Vec<String>),
}

impl Guard {
    pub fn accepts(&self, state: &str) -> bool {
        match self {
            Guard::Any => true,
            Guard::States(states) => states.iter().any(|s| s == state),
        }
    }
}

/// Where a guard was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardSource {
    /// A comparison in the method body.
    Code,
    /// The method's documentation names the source state.
    Comment,
    /// No guard at all.
    None,
}

/// Outcome of a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTarget {
    State(String),
    /// The method sets the state to something that is not a known member,
    /// so no specific outcome is guaranteed.
    Unchanged,
}

impl fmt::Display for TransitionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionTarget::State(s) => f.write_str(s),
            TransitionTarget::Unchanged => f.write_str("unchanged"),
        }
    }
}

/// A method that moves the machine between states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub method: String,
    pub guard: Guard,
    pub guard_source: GuardSource,
    pub target: TransitionTarget,
    /// Condition that selects this outcome when a method has several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Whether the method also writes other receiver fields (payload, error).
    pub mutates_aux: bool,
}

/// A lifecycle-ordered hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleHook {
    pub order: u32,
    pub method: String,
}

/// A state machine reconstructed from a receiver type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachine {
    pub receiver: String,
    /// Field path from the receiver to the state field (`context.State`).
    pub state_field: String,
    /// Shared with every other machine that uses the same enum.
    pub state_enum: Arc<StateEnum>,
    pub initial_state: String,
    /// Method whose lifecycle annotation designated the initial state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state_source: Option<String>,
    pub transitions: Vec<Transition>,
    #[serde(default)]
    pub lifecycle: Vec<LifecycleHook>,
    /// States reachable from the initial state (derived).
    pub reachable_states: Vec<String>,
    /// States no transition accepts as a source (derived).
    pub terminal_states: Vec<String>,
}

impl StateMachine {
    /// All transitions fired by one method.
    pub fn transitions_of<'a>(&'a self, method: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.iter().filter(move |t| t.method == method)
    }
}

/// Kind of a recoverable problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A construct that could not be interpreted and was skipped.
    MalformedButRecoverable,
    /// A comment run not followed by a declaration.
    OrphanComment,
}

/// A recoverable problem, located by file and line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub path: String,
    pub line: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn malformed(path: &str, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::MalformedButRecoverable,
            path: path.to_string(),
            line,
            message: message.into(),
        }
    }

    pub fn orphan(path: &str, line: usize, message: impl Into<String>) -> Self {
        Self {
            kind: DiagnosticKind::OrphanComment,
            path: path.to_string(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.path, self.line, self.message)
    }
}

/// A name exported from another module (`export { a as b } from './m'`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReExport {
    /// Name under which the symbol is exported; `*` for a wildcard.
    pub name: String,
    /// Module specifier the symbol comes from.
    pub source: String,
    pub line: usize,
}

/// Everything extracted from one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub path: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub re_exports: Vec<ReExport>,
    #[serde(default)]
    pub state_machines: Vec<StateMachine>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceUnit {
    /// Exported declarations in source order.
    pub fn exports(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.iter().filter(|d| d.is_exported())
    }

    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }

    pub fn find_state_machine(&self, receiver: &str) -> Option<&StateMachine> {
        self.state_machines.iter().find(|m| m.receiver == receiver)
    }
}
