//! Lowering of callable bodies into the language-neutral statement tree.
//!
//! Every language describes its syntax through a static `BodyGrammar`
//! table; the walker itself knows nothing about individual languages.

use tree_sitter::Node;

use super::syntax::collapse_whitespace;
use super::{CompareOp, Comparison, Condition, FunctionBody, ParsedFile, Span, Statement};

/// A call that never returns (`panic(..)`, `unreachable!()`).
#[derive(Debug, Clone, Copy)]
pub struct ExitCall {
    /// Node kind of the call.
    pub kind: &'static str,
    /// Field holding the callee.
    pub callee_field: &'static str,
    pub names: &'static [&'static str],
}

/// A multi-way branch on one subject (`switch`, `match`).
///
/// Each case becomes a `Branch` comparing the subject with the case values;
/// the default case is the final else.
#[derive(Debug, Clone, Copy)]
pub struct SwitchGrammar {
    pub kind: &'static str,
    /// Field holding the subject. Without a subject every case value is a
    /// condition of its own (Go's `switch { case x > 0: }`).
    pub subject_field: &'static str,
    /// Field holding the case container; empty when cases are children.
    pub cases_field: &'static str,
    pub case_kinds: &'static [&'static str],
    /// Field of a case holding its values; empty to use `label_kinds`.
    pub value_field: &'static str,
    /// Case children that carry values (`switch_label`, `case_pattern`).
    pub label_kinds: &'static [&'static str],
    /// Value wrappers whose children are values (`expression_list`, `A | B`).
    pub value_list_kinds: &'static [&'static str],
    /// Patterns naming a variant with a payload (`Loaded(_)`), unwrapped
    /// through their `type` field or else their first child.
    pub constructor_kinds: &'static [&'static str],
    /// Field with an extra condition on a case or a pattern.
    pub guard_field: &'static str,
    /// Field of a case holding its body; empty for the remaining children.
    pub body_field: &'static str,
    /// A case with an empty body shares the next case's body.
    pub empty_falls_through: bool,
}

/// Node kinds and field names the walker needs for one language.
#[derive(Debug, Clone, Copy)]
pub struct BodyGrammar {
    pub if_kinds: &'static [&'static str],
    /// `elif` clauses chained through the `alternative` field.
    pub elif_kinds: &'static [&'static str],
    pub condition_field: &'static str,
    pub consequence_field: &'static str,
    pub alternative_field: &'static str,
    pub assignment_kinds: &'static [&'static str],
    /// Multi-target lists on either side of an assignment.
    pub list_kinds: &'static [&'static str],
    pub exit_kinds: &'static [&'static str],
    pub exit_calls: &'static [ExitCall],
    pub binary_kinds: &'static [&'static str],
    pub paren_kinds: &'static [&'static str],
    pub switches: &'static [SwitchGrammar],
    /// Wrappers whose children are lowered in place.
    pub transparent_kinds: &'static [&'static str],
    /// Subtrees that never contain statements of interest.
    pub opaque_kinds: &'static [&'static str],
}

const AND_OPS: &[&str] = &["&&", "and"];
const OR_OPS: &[&str] = &["||", "or"];
const EQ_OPS: &[&str] = &["==", "==="];
const NE_OPS: &[&str] = &["!=", "!=="];

/// Lower the body of a callable.
pub fn lower_body(
    grammar: &BodyGrammar,
    parsed: &ParsedFile,
    body: Node,
    receiver_var: Option<String>,
) -> FunctionBody {
    let walker = Walker { grammar, parsed };
    let mut statements = Vec::new();
    walker.lower_children(body, &mut statements);
    FunctionBody {
        span: Span::from_node(body),
        receiver_var,
        statements,
    }
}

struct Walker<'a> {
    grammar: &'a BodyGrammar,
    parsed: &'a ParsedFile,
}

/// One non-default case of a switch, before lowering into a branch.
struct SwitchCase<'t> {
    values: Vec<Node<'t>>,
    guard: Option<Node<'t>>,
    body: Vec<Statement>,
    line: usize,
}

impl Walker<'_> {
    fn lower_children(&self, node: Node, out: &mut Vec<Statement>) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.lower_node(child, out);
        }
    }

    fn lower_node(&self, node: Node, out: &mut Vec<Statement>) {
        let g = self.grammar;
        let kind = node.kind();
        let line = node.start_position().row + 1;

        if g.if_kinds.contains(&kind) || g.elif_kinds.contains(&kind) {
            out.push(self.lower_if(node));
        } else if let Some(switch) = g.switches.iter().find(|s| s.kind == kind) {
            self.lower_switch(switch, node, out);
        } else if g.assignment_kinds.contains(&kind) {
            self.lower_assignment(node, out);
        } else if g.exit_kinds.contains(&kind) || self.is_exit_call(node) {
            out.push(Statement::Exit { line });
        } else if g.transparent_kinds.contains(&kind) {
            self.lower_children(node, out);
        } else if g.opaque_kinds.contains(&kind) || node.named_child_count() == 0 {
            // nothing inside
        } else {
            let mut nested = Vec::new();
            self.lower_children(node, &mut nested);
            if !nested.is_empty() {
                out.push(Statement::Nested {
                    kind: kind.to_string(),
                    statements: nested,
                    line,
                });
            }
        }
    }

    fn is_exit_call(&self, node: Node) -> bool {
        self.grammar.exit_calls.iter().any(|call| {
            call.kind == node.kind()
                && node
                    .child_by_field_name(call.callee_field)
                    .map(|callee| call.names.contains(&self.parsed.node_text(callee)))
                    .unwrap_or(false)
        })
    }

    fn lower_if(&self, node: Node) -> Statement {
        let mut cursor = node.walk();
        let alternatives: Vec<Node> = node
            .children_by_field_name(self.grammar.alternative_field, &mut cursor)
            .collect();
        self.lower_conditional(node, &alternatives)
    }

    /// Build a branch whose else part is the chain of `alternatives`.
    fn lower_conditional(&self, node: Node, alternatives: &[Node]) -> Statement {
        let g = self.grammar;
        let condition_node = node.child_by_field_name(g.condition_field);
        let condition = condition_node
            .map(|c| self.lower_condition(c))
            .unwrap_or_else(|| Condition::Opaque(String::new()));
        let condition_text = condition_node
            .map(|c| self.condition_text(c))
            .unwrap_or_default();

        let mut then_branch = Vec::new();
        if let Some(consequence) = node.child_by_field_name(g.consequence_field) {
            self.lower_node(consequence, &mut then_branch);
        }

        let mut else_branch = Vec::new();
        if let Some((first, rest)) = alternatives.split_first() {
            if g.elif_kinds.contains(&first.kind()) {
                else_branch.push(self.lower_conditional(*first, rest));
            } else {
                self.lower_node(*first, &mut else_branch);
            }
        }

        Statement::Branch {
            condition,
            condition_text,
            then_branch,
            else_branch,
            line: node.start_position().row + 1,
        }
    }

    fn lower_switch(&self, switch: &SwitchGrammar, node: Node, out: &mut Vec<Statement>) {
        let subject = node
            .child_by_field_name(switch.subject_field)
            .map(|s| self.unwrap_parens(s));
        let container = if switch.cases_field.is_empty() {
            Some(node)
        } else {
            node.child_by_field_name(switch.cases_field)
        };
        let Some(container) = container else { return };

        let mut cases: Vec<SwitchCase> = Vec::new();
        let mut default_body: Option<Vec<Statement>> = None;
        let mut pending: Vec<Node> = Vec::new();

        let mut cursor = container.walk();
        let case_nodes: Vec<Node> = container
            .named_children(&mut cursor)
            .filter(|c| switch.case_kinds.contains(&c.kind()))
            .collect();

        for case in case_nodes {
            let mut values = std::mem::take(&mut pending);
            let mut guard = None;
            let mut value_roots = Vec::new();
            self.case_values(switch, case, &mut values, &mut guard, &mut value_roots);

            let body_nodes = self.case_body(switch, case, &value_roots, guard);
            let is_default = values.is_empty()
                || values.iter().any(|v| self.parsed.node_text(*v).trim() == "_");

            if body_nodes.is_empty() && switch.empty_falls_through && !is_default {
                pending = values;
                continue;
            }

            let mut body = Vec::new();
            for child in body_nodes {
                self.lower_node(child, &mut body);
            }

            if is_default {
                default_body = Some(body);
            } else {
                cases.push(SwitchCase {
                    values,
                    guard,
                    body,
                    line: case.start_position().row + 1,
                });
            }
        }

        let mut chain = default_body.unwrap_or_default();
        for case in cases.into_iter().rev() {
            let (condition, condition_text) = self.case_condition(subject, &case);
            chain = vec![Statement::Branch {
                condition,
                condition_text,
                then_branch: case.body,
                else_branch: chain,
                line: case.line,
            }];
        }
        out.extend(chain);
    }

    /// Collect the value nodes of one case, and its guard if any.
    fn case_values<'t>(
        &self,
        switch: &SwitchGrammar,
        case: Node<'t>,
        values: &mut Vec<Node<'t>>,
        guard: &mut Option<Node<'t>>,
        roots: &mut Vec<Node<'t>>,
    ) {
        if let Some(g) = case.child_by_field_name(switch.guard_field) {
            *guard = Some(g);
        }
        if switch.value_field.is_empty() {
            let mut cursor = case.walk();
            roots.extend(
                case.named_children(&mut cursor)
                    .filter(|c| switch.label_kinds.contains(&c.kind())),
            );
        } else if let Some(value) = case.child_by_field_name(switch.value_field) {
            roots.push(value);
        }
        for root in roots.iter() {
            self.expand_value(switch, *root, values, guard);
        }
    }

    fn expand_value<'t>(
        &self,
        switch: &SwitchGrammar,
        node: Node<'t>,
        values: &mut Vec<Node<'t>>,
        guard: &mut Option<Node<'t>>,
    ) {
        let kind = node.kind();
        if switch.value_list_kinds.contains(&kind) || switch.label_kinds.contains(&kind) {
            let own_guard = node.child_by_field_name(switch.guard_field);
            if own_guard.is_some() {
                *guard = own_guard;
            }
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                if Some(child.id()) == own_guard.map(|g| g.id()) || self.is_comment(child) {
                    continue;
                }
                self.expand_value(switch, child, values, guard);
            }
        } else if switch.constructor_kinds.contains(&kind) {
            if let Some(ty) = node
                .child_by_field_name("type")
                .or_else(|| node.named_child(0))
            {
                values.push(ty);
            }
        } else {
            values.push(node);
        }
    }

    fn case_body<'t>(
        &self,
        switch: &SwitchGrammar,
        case: Node<'t>,
        value_roots: &[Node<'t>],
        guard: Option<Node<'t>>,
    ) -> Vec<Node<'t>> {
        let mut cursor = case.walk();
        if !switch.body_field.is_empty() {
            return case
                .children_by_field_name(switch.body_field, &mut cursor)
                .collect();
        }
        let skipped: Vec<usize> = value_roots
            .iter()
            .chain(guard.iter())
            .map(|n| n.id())
            .collect();
        case.named_children(&mut cursor)
            .filter(|c| !skipped.contains(&c.id()) && !switch.label_kinds.contains(&c.kind()))
            .collect()
    }

    fn case_condition(&self, subject: Option<Node>, case: &SwitchCase) -> (Condition, String) {
        let mut parts = Vec::new();
        let mut texts = Vec::new();
        for value in &case.values {
            let value_text = compact(self.parsed.node_text(*value));
            match subject {
                Some(subject) => {
                    let subject_text = compact(self.parsed.node_text(subject));
                    texts.push(format!("{} == {}", subject_text, value_text));
                    parts.push(Condition::Compare(Comparison {
                        left: subject_text,
                        op: CompareOp::Eq,
                        right: value_text,
                    }));
                }
                None => {
                    texts.push(collapse_whitespace(self.parsed.node_text(*value)));
                    parts.push(self.lower_condition(*value));
                }
            }
        }

        let mut condition = if parts.len() == 1 {
            parts.remove(0)
        } else {
            Condition::Any(parts)
        };
        let mut text = texts.join(" || ");
        if let Some(guard) = case.guard {
            let guard = self.unwrap_guard(guard);
            condition = Condition::All(vec![condition, self.lower_condition(guard)]);
            text = format!("{} && {}", text, self.condition_text(guard));
        }
        (condition, text)
    }

    /// The expression inside a guard clause (`if x` -> `x`).
    fn unwrap_guard<'t>(&self, guard: Node<'t>) -> Node<'t> {
        if guard.kind().ends_with("_clause") && guard.named_child_count() == 1 {
            if let Some(inner) = guard.named_child(0) {
                return inner;
            }
        }
        guard
    }

    fn unwrap_parens<'t>(&self, node: Node<'t>) -> Node<'t> {
        if self.grammar.paren_kinds.contains(&node.kind()) {
            let mut cursor = node.walk();
            let inner = node.named_children(&mut cursor).find(|c| !self.is_comment(*c));
            if let Some(inner) = inner {
                return inner;
            }
        }
        node
    }

    fn is_comment(&self, node: Node) -> bool {
        self.grammar.opaque_kinds.contains(&node.kind()) && node.kind().contains("comment")
    }

    /// Source text of a condition without its outer parentheses.
    fn condition_text(&self, node: Node) -> String {
        if self.grammar.paren_kinds.contains(&node.kind()) {
            let mut cursor = node.walk();
            let inner = node.named_children(&mut cursor).find(|c| c.kind() != "comment");
            if let Some(inner) = inner {
                return collapse_whitespace(self.parsed.node_text(inner));
            }
        }
        collapse_whitespace(self.parsed.node_text(node))
    }

    fn lower_assignment(&self, node: Node, out: &mut Vec<Statement>) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        let line = node.start_position().row + 1;
        let g = self.grammar;

        let pairs: Vec<(Node, Node)> =
            if g.list_kinds.contains(&left.kind()) && g.list_kinds.contains(&right.kind()) {
                let mut lc = left.walk();
                let mut rc = right.walk();
                left.named_children(&mut lc)
                    .zip(right.named_children(&mut rc))
                    .collect()
            } else if g.list_kinds.contains(&left.kind()) {
                // `a, b = f()` assigns nothing we can attribute
                return;
            } else {
                vec![(left, right)]
            };

        for (target, value) in pairs {
            out.push(Statement::Assign {
                target: compact(self.parsed.node_text(target)),
                value: collapse_whitespace(self.parsed.node_text(value)),
                line,
            });
        }
    }

    fn lower_condition(&self, node: Node) -> Condition {
        let g = self.grammar;
        let kind = node.kind();

        if g.paren_kinds.contains(&kind) {
            let mut cursor = node.walk();
            let inner = node.named_children(&mut cursor).find(|c| c.kind() != "comment");
            if let Some(inner) = inner {
                return self.lower_condition(inner);
            }
        }

        if g.binary_kinds.contains(&kind) {
            if let (Some(op), Some((left, right))) = (operator(self.parsed, node), operands(node)) {
                if AND_OPS.contains(&op) {
                    return Condition::All(self.flatten(left, right, AND_OPS));
                }
                if OR_OPS.contains(&op) {
                    return Condition::Any(self.flatten(left, right, OR_OPS));
                }
                let op = if EQ_OPS.contains(&op) {
                    Some(CompareOp::Eq)
                } else if NE_OPS.contains(&op) {
                    Some(CompareOp::Ne)
                } else {
                    None
                };
                if let Some(op) = op {
                    return Condition::Compare(Comparison {
                        left: compact(self.parsed.node_text(left)),
                        op,
                        right: compact(self.parsed.node_text(right)),
                    });
                }
            }
        }

        Condition::Opaque(collapse_whitespace(self.parsed.node_text(node)))
    }

    /// Lower both operands, merging nested operators of the same kind.
    fn flatten(&self, left: Node, right: Node, ops: &[&str]) -> Vec<Condition> {
        let mut parts = Vec::new();
        for side in [left, right] {
            match self.lower_condition(side) {
                Condition::All(inner) if ops == AND_OPS => parts.extend(inner),
                Condition::Any(inner) if ops == OR_OPS => parts.extend(inner),
                other => parts.push(other),
            }
        }
        parts
    }
}

/// Operator token of a binary node.
fn operator<'p>(parsed: &'p ParsedFile, node: Node) -> Option<&'p str> {
    if let Some(op) = node.child_by_field_name("operator") {
        return Some(parsed.node_text(op));
    }
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|c| !c.is_named() && !matches!(c.kind(), "(" | ")"));
    found.map(|c| parsed.node_text(c))
}

fn operands(node: Node) -> Option<(Node, Node)> {
    if let (Some(left), Some(right)) = (
        node.child_by_field_name("left"),
        node.child_by_field_name("right"),
    ) {
        return Some((left, right));
    }
    let mut cursor = node.walk();
    let named: Vec<Node> = node
        .named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect();
    match named.as_slice() {
        [left, right] => Some((*left, *right)),
        _ => None,
    }
}

/// Remove all whitespace from an expression (`r . state` -> `r.state`).
fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact() {
        assert_eq!(compact("self . context\n .state"), "self.context.state");
    }
}
