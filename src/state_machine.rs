//! State-machine detection.
//!
//! Works purely on `FileFacts`: enumeration candidates become state enums,
//! record types whose fields reach such an enum (directly or through one
//! holder type) become receivers, and the lowered bodies of the receiver's
//! methods are scanned for writes to the state field. Every write is
//! paired with the set of states in which it can fire, derived from the
//! state comparisons that enclose it.

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::analysis::{
    CompareOp, Comparison, Condition, DeclarationFacts, EnumFacts, FileFacts, FunctionBody,
    Statement, TypeFacts,
};
use crate::model::{
    ContractAnnotation, Guard, GuardSource, LifecycleHook, StateEnum, StateMachine, StateMember,
    Transition, TransitionTarget,
};

lazy_static! {
    /// A dotted or `::`-separated identifier path (`State.Idle`, `State::Idle`).
    static ref MEMBER_PATH: Regex =
        Regex::new(r"[A-Za-z_]\w*(?:\s*(?:\.|::)\s*[A-Za-z_]\w*)*").unwrap();
    /// A variant built with a payload (`new Loading(0)`, `State::Loaded(data)`,
    /// `Loading { progress: 0 }`).
    static ref CONSTRUCTOR: Regex = Regex::new(
        r"(?s)^(?:new\s+)?([A-Za-z_]\w*(?:\s*(?:\.|::)\s*[A-Za-z_]\w*)*)\s*(?:<[^()]*>)?\s*(?:\(.*\)|\{.*\})$"
    )
    .unwrap();
    /// An object literal tagged by its first property (`{ kind: 'loading', .. }`).
    static ref TAGGED_LITERAL: Regex =
        Regex::new(r#"(?s)^\{\s*(?:kind|type|status|tag)\s*:\s*['"`]([^'"`]+)['"`]"#).unwrap();
    /// `State transition: Idle -> Loading`
    static ref ARROW_HINT: Regex =
        Regex::new(r"(?i)state\s+transition:\s*(\w+)\s*(?:->|→)\s*(\w+)").unwrap();
    /// `transitions from Idle to Loading`
    static ref FROM_TO_HINT: Regex =
        Regex::new(r"(?i)transitions?\s+from\s+(\w+)\s+to\s+(\w+)").unwrap();
}

/// Method names that count as initializers for initial-state inference.
const INITIALIZER_PREFIXES: &[&str] = &["init", "reset", "setup", "new", "constructor"];

type StateSet = BTreeSet<usize>;

/// Detect every state machine in one file.
///
/// `annotations` is parallel to `facts.declarations`.
pub fn detect(facts: &FileFacts, annotations: &[ContractAnnotation]) -> Vec<StateMachine> {
    let enums: Vec<Arc<StateEnum>> = facts.enums.iter().filter_map(state_enum).collect();
    if enums.is_empty() {
        return Vec::new();
    }

    let mut machines = Vec::new();
    let mut holders: HashSet<String> = HashSet::new();

    for ty in &facts.types {
        let methods: Vec<(&DeclarationFacts, &ContractAnnotation)> = facts
            .declarations
            .iter()
            .zip(annotations)
            .filter(|(d, _)| d.kind.is_callable() && d.receiver.as_deref() == Some(ty.name.as_str()))
            .collect();
        if methods.is_empty() {
            continue;
        }
        let Some(binding) = locate_state_field(ty, facts, &enums) else {
            continue;
        };

        let Some(machine) = build_machine(ty, &binding, &methods) else {
            continue;
        };
        debug!(
            receiver = %machine.receiver,
            state_field = %machine.state_field,
            transitions = machine.transitions.len(),
            "detected state machine"
        );
        if let Some(holder) = &binding.holder {
            holders.insert(holder.clone());
        }
        machines.push(machine);
    }

    machines.retain(|m| !holders.contains(&m.receiver));
    machines
}

/// Turn an enumeration candidate into a state enum. Members are made
/// unique; a common type-name prefix on every constant is dropped from the
/// display names (`StateIdle` -> `Idle`).
fn state_enum(facts: &EnumFacts) -> Option<Arc<StateEnum>> {
    let mut seen = HashSet::new();
    let constants: Vec<_> = facts
        .members
        .iter()
        .filter(|m| seen.insert(m.constant.as_str()))
        .collect();
    if constants.len() < 2 {
        return None;
    }

    let strip_prefix = constants.iter().all(|m| {
        m.constant
            .strip_prefix(facts.name.as_str())
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c.is_uppercase() || c == '_')
    });

    let stripped: Vec<String> = constants
        .iter()
        .map(|m| {
            m.constant
                .strip_prefix(facts.name.as_str())
                .map_or(m.constant.as_str(), |rest| rest.trim_start_matches('_'))
                .to_string()
        })
        .collect();
    // Stripping must keep display names distinct (`State_Idle` vs `StateIdle`).
    let mut distinct = HashSet::new();
    let strip_prefix = strip_prefix && stripped.iter().all(|n| distinct.insert(n.as_str()));

    let members: Vec<StateMember> = constants
        .iter()
        .zip(stripped)
        .map(|(m, short)| StateMember {
            name: if strip_prefix { short } else { m.constant.clone() },
            constant: m.constant.clone(),
            line: m.line,
        })
        .collect();

    Some(Arc::new(StateEnum {
        name: facts.name.clone(),
        default_member: members[0].name.clone(),
        members,
    }))
}

/// Where a receiver keeps its state.
struct StateBinding {
    /// Field path from the receiver (`["context", "State"]`).
    path: Vec<String>,
    /// Holder type when the state sits one level down.
    holder: Option<String>,
    state_enum: Arc<StateEnum>,
}

fn type_tokens(type_name: &str) -> impl Iterator<Item = &str> {
    type_name
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
}

fn field_of_enum(ty: &TypeFacts, state_enum: &StateEnum) -> Option<String> {
    ty.fields
        .iter()
        .find(|f| {
            f.type_name
                .as_deref()
                .is_some_and(|t| type_tokens(t).any(|tok| tok == state_enum.name))
        })
        .map(|f| f.name.clone())
}

fn locate_state_field(
    receiver: &TypeFacts,
    facts: &FileFacts,
    enums: &[Arc<StateEnum>],
) -> Option<StateBinding> {
    for state_enum in enums {
        if let Some(field) = field_of_enum(receiver, state_enum) {
            return Some(StateBinding {
                path: vec![field],
                holder: None,
                state_enum: Arc::clone(state_enum),
            });
        }
    }

    for state_enum in enums {
        for field in &receiver.fields {
            let Some(type_name) = field.type_name.as_deref() else {
                continue;
            };
            let holder = type_tokens(type_name)
                .filter(|tok| *tok != receiver.name)
                .find_map(|tok| facts.find_type(tok));
            let Some(holder) = holder else { continue };
            if let Some(inner) = field_of_enum(holder, state_enum) {
                return Some(StateBinding {
                    path: vec![field.name.clone(), inner],
                    holder: Some(holder.name.clone()),
                    state_enum: Arc::clone(state_enum),
                });
            }
        }
    }
    None
}

/// One write to the state field.
struct Site {
    allowed: StateSet,
    target: TransitionTarget,
    branch: Option<String>,
    /// Some path through this write also writes another receiver field.
    mutates_aux: bool,
}

/// What is known about one execution path at a point in the body.
#[derive(Debug, Clone, Default)]
struct PathState {
    /// Sites already written on this path.
    live: BTreeSet<usize>,
    /// An auxiliary write already happened on this path.
    aux_written: bool,
}

impl PathState {
    fn join(self, other: PathState) -> PathState {
        PathState {
            live: &self.live | &other.live,
            aux_written: self.aux_written || other.aux_written,
        }
    }

    /// Merge the fall-through states of two alternatives; `None` means
    /// the alternative left the function.
    fn merge(a: Option<PathState>, b: Option<PathState>) -> Option<PathState> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.join(b)),
            (a, b) => a.or(b),
        }
    }
}

/// Walks one method body.
struct MethodScan<'a> {
    binding: &'a StateBinding,
    receiver: &'a TypeFacts,
    receiver_var: Option<&'a str>,
    sites: Vec<Site>,
}

impl<'a> MethodScan<'a> {
    fn new(binding: &'a StateBinding, receiver: &'a TypeFacts, body: &'a FunctionBody) -> Self {
        Self {
            binding,
            receiver,
            receiver_var: body.receiver_var.as_deref(),
            sites: Vec::new(),
        }
    }

    fn all_states(&self) -> StateSet {
        (0..self.binding.state_enum.members.len()).collect()
    }

    /// Field path of an expression rooted at the receiver, or `None`.
    fn receiver_path(&self, expr: &str) -> Option<Vec<String>> {
        let segments: Vec<&str> = expr.split('.').collect();
        let (first, rest) = segments.split_first()?;
        if Some(*first) == self.receiver_var {
            if rest.is_empty() {
                return None;
            }
            return Some(rest.iter().map(|s| s.to_string()).collect());
        }
        // Java lets members be written without `this.`.
        if self.receiver_var == Some("this") && self.receiver.field(first).is_some() {
            return Some(segments.iter().map(|s| s.to_string()).collect());
        }
        None
    }

    fn is_state_expr(&self, expr: &str) -> bool {
        self.receiver_path(expr).as_deref() == Some(self.binding.path.as_slice())
    }

    /// Resolve an expression that is exactly a member reference, a quoted
    /// literal member (`'idle'`) or a member built with a payload.
    fn member_exact(&self, expr: &str) -> Option<usize> {
        let expr = expr.trim();
        if let Some(literal) = unquote(expr) {
            return self.binding.state_enum.position_of_constant(literal);
        }
        if let Some(caps) = TAGGED_LITERAL.captures(expr) {
            return self.binding.state_enum.position_of_constant(caps.get(1)?.as_str());
        }
        if let Some(caps) = CONSTRUCTOR.captures(expr) {
            return self.member_of_path(caps.get(1)?.as_str());
        }
        let m = MEMBER_PATH.find(expr)?;
        if m.start() != 0 || m.end() != expr.len() {
            return None;
        }
        self.member_of_path(m.as_str())
    }

    /// First member referenced anywhere inside `expr`.
    fn member_within(&self, expr: &str) -> Option<usize> {
        MEMBER_PATH
            .find_iter(expr)
            .find_map(|m| self.member_of_path(m.as_str()))
    }

    fn member_of_path(&self, path: &str) -> Option<usize> {
        let compact: String = path.chars().filter(|c| !c.is_whitespace()).collect();
        let segments: Vec<&str> = compact
            .split(|c: char| c == '.' || c == ':')
            .filter(|s| !s.is_empty())
            .collect();
        let state_enum = &self.binding.state_enum;
        match segments.as_slice() {
            [constant] => state_enum.position_of_constant(constant),
            [.., owner, constant] if *owner == state_enum.name => {
                state_enum.position_of_constant(constant)
            }
            _ => None,
        }
    }

    /// True and false sets of a condition, or `None` when it does not
    /// mention the state.
    fn condition_sets(&self, condition: &Condition) -> Option<(StateSet, StateSet)> {
        let all = self.all_states();
        match condition {
            Condition::Compare(cmp) => self.compare_sets(cmp, &all),
            Condition::All(parts) => {
                let sets: Vec<_> = parts.iter().map(|p| self.condition_sets(p)).collect();
                if sets.iter().all(Option::is_none) {
                    return None;
                }
                let mut when_true = all.clone();
                let mut when_false = StateSet::new();
                for set in sets {
                    let (t, f) = set.unwrap_or_else(|| (all.clone(), all.clone()));
                    when_true = &when_true & &t;
                    when_false = &when_false | &f;
                }
                Some((when_true, when_false))
            }
            Condition::Any(parts) => {
                let sets: Vec<_> = parts.iter().map(|p| self.condition_sets(p)).collect();
                if sets.iter().all(Option::is_none) {
                    return None;
                }
                let mut when_true = StateSet::new();
                let mut when_false = all.clone();
                for set in sets {
                    let (t, f) = set.unwrap_or_else(|| (all.clone(), all.clone()));
                    when_true = &when_true | &t;
                    when_false = &when_false & &f;
                }
                Some((when_true, when_false))
            }
            Condition::Opaque(_) => None,
        }
    }

    fn compare_sets(&self, cmp: &Comparison, all: &StateSet) -> Option<(StateSet, StateSet)> {
        let other = if self.is_state_expr(&cmp.left) {
            &cmp.right
        } else if self.is_state_expr(&cmp.right) {
            &cmp.left
        } else {
            return None;
        };
        let member = self.member_exact(other)?;
        let equal: StateSet = [member].into_iter().collect();
        let differ: StateSet = all - &equal;
        match cmp.op {
            CompareOp::Eq => Some((equal, differ)),
            CompareOp::Ne => Some((differ, equal)),
        }
    }

    /// Scan `statements` entered with `path`; returns the path state at
    /// fall-through, or `None` when every path leaves the function.
    fn scan(
        &mut self,
        statements: &[Statement],
        allowed: &StateSet,
        label: Option<&str>,
        path: PathState,
    ) -> Option<PathState> {
        let mut allowed = allowed.clone();
        let mut label = label.map(str::to_string);
        let mut path = path;

        for statement in statements {
            match statement {
                Statement::Assign {
                    target,
                    value,
                    line,
                } => self.assign(target, value, *line, &allowed, label.as_deref(), &mut path),
                Statement::Exit { .. } => return None,
                Statement::Nested { statements, .. } => {
                    // The nested body may not run at all.
                    let inner = self.scan(statements, &allowed, label.as_deref(), path.clone());
                    path = PathState::merge(Some(path), inner)?;
                }
                Statement::Branch {
                    condition,
                    condition_text,
                    then_branch,
                    else_branch,
                    ..
                } => {
                    let then_exits = Statement::always_exits(then_branch);
                    let else_exits = Statement::always_exits(else_branch);

                    let (then_path, else_path);
                    if let Some((when_true, when_false)) = self.condition_sets(condition) {
                        let then_allowed = &allowed & &when_true;
                        let else_allowed = &allowed & &when_false;
                        then_path =
                            self.scan(then_branch, &then_allowed, label.as_deref(), path.clone());
                        else_path =
                            self.scan(else_branch, &else_allowed, label.as_deref(), path.clone());
                        if then_exits && !else_exits {
                            allowed = else_allowed;
                        } else if else_exits && !then_exits {
                            allowed = then_allowed;
                        }
                    } else {
                        let negated = format!("!({})", condition_text);
                        then_path = self.scan(
                            then_branch,
                            &allowed,
                            Some(condition_text.as_str()),
                            path.clone(),
                        );
                        else_path =
                            self.scan(else_branch, &allowed, Some(negated.as_str()), path.clone());
                        if then_exits && !else_exits {
                            label = Some(negated);
                        } else if else_exits && !then_exits {
                            label = Some(condition_text.clone());
                        }
                    }

                    if then_exits && else_exits {
                        return None;
                    }
                    path = PathState::merge(then_path, else_path)?;
                }
            }
        }
        Some(path)
    }

    fn assign(
        &mut self,
        target: &str,
        value: &str,
        line: usize,
        allowed: &StateSet,
        label: Option<&str>,
        path_state: &mut PathState,
    ) {
        let Some(path) = self.receiver_path(target) else {
            return;
        };
        let state_path = &self.binding.path;

        let resolved = if path == *state_path {
            Some(match self.member_exact(value) {
                Some(member) => self.state_target(member),
                None => TransitionTarget::Unchanged,
            })
        } else if state_path.len() > 1 && path == state_path[..1] {
            // Whole holder replaced; only a literal naming a member counts.
            let member = self.member_within(value);
            if member.is_none() {
                trace!(line, value, "holder assignment names no state member");
            }
            member.map(|m| self.state_target(m))
        } else {
            path_state.aux_written = true;
            for &site in &path_state.live {
                self.sites[site].mutates_aux = true;
            }
            None
        };

        if let Some(target) = resolved {
            if !allowed.is_empty() {
                path_state.live.insert(self.sites.len());
                self.sites.push(Site {
                    allowed: allowed.clone(),
                    target,
                    branch: label.map(str::to_string),
                    mutates_aux: path_state.aux_written,
                });
            }
        }
    }

    fn state_target(&self, member: usize) -> TransitionTarget {
        TransitionTarget::State(self.binding.state_enum.members[member].name.clone())
    }
}

/// Contents of a string literal in single, double or back quotes.
fn unquote(expr: &str) -> Option<&str> {
    ['\'', '"', '`'].iter().find_map(|q| {
        expr.strip_prefix(*q)
            .and_then(|rest| rest.strip_suffix(*q))
            .filter(|inner| !inner.contains(*q))
    })
}

/// Transitions of one method, grouped by outcome.
fn method_transitions(
    method: &DeclarationFacts,
    annotation: &ContractAnnotation,
    binding: &StateBinding,
    receiver: &TypeFacts,
) -> Vec<Transition> {
    let Some(body) = &method.body else {
        return Vec::new();
    };
    let mut scan = MethodScan::new(binding, receiver, body);
    let all = scan.all_states();
    scan.scan(&body.statements, &all, None, PathState::default());

    let mut groups: Vec<Site> = Vec::new();
    for site in scan.sites {
        match groups.iter_mut().find(|g| g.target == site.target) {
            Some(group) => {
                group.allowed = &group.allowed | &site.allowed;
                group.mutates_aux |= site.mutates_aux;
                if group.branch.is_none() {
                    group.branch = site.branch;
                }
            }
            None => groups.push(site),
        }
    }

    let several = groups.len() > 1;
    let state_enum = &binding.state_enum;
    groups
        .into_iter()
        .map(|group| {
            let (mut guard, mut guard_source) = if group.allowed == all {
                (Guard::Any, GuardSource::None)
            } else {
                let states = group
                    .allowed
                    .iter()
                    .map(|&i| state_enum.members[i].name.clone())
                    .collect();
                (Guard::States(states), GuardSource::Code)
            };
            if guard == Guard::Any {
                if let Some(source) = documented_source(annotation, state_enum, &group.target) {
                    guard = Guard::States(vec![source]);
                    guard_source = GuardSource::Comment;
                }
            }
            Transition {
                method: method.name.clone(),
                guard,
                guard_source,
                target: group.target,
                branch: if several { group.branch } else { None },
                mutates_aux: group.mutates_aux,
            }
        })
        .collect()
}

/// Source state named by the method's documentation, when the documented
/// target agrees with the code.
fn documented_source(
    annotation: &ContractAnnotation,
    state_enum: &StateEnum,
    target: &TransitionTarget,
) -> Option<String> {
    let TransitionTarget::State(target) = target else {
        return None;
    };
    let summary = annotation.summary.as_deref()?;
    let caps = ARROW_HINT
        .captures(summary)
        .or_else(|| FROM_TO_HINT.captures(summary))?;
    let source = lookup_member(state_enum, caps.get(1)?.as_str())?;
    let documented_target = lookup_member(state_enum, caps.get(2)?.as_str())?;
    (documented_target == *target).then_some(source)
}

/// Member display name for a word that names it by display name or constant.
fn lookup_member(state_enum: &StateEnum, word: &str) -> Option<String> {
    state_enum
        .members
        .iter()
        .find(|m| m.name.eq_ignore_ascii_case(word) || m.constant.eq_ignore_ascii_case(word))
        .map(|m| m.name.clone())
}

fn build_machine(
    receiver: &TypeFacts,
    binding: &StateBinding,
    methods: &[(&DeclarationFacts, &ContractAnnotation)],
) -> Option<StateMachine> {
    let transitions: Vec<Transition> = methods
        .iter()
        .flat_map(|(method, annotation)| method_transitions(method, annotation, binding, receiver))
        .collect();
    if transitions.is_empty() {
        return None;
    }

    let mut lifecycle: Vec<LifecycleHook> = methods
        .iter()
        .filter_map(|(method, annotation)| {
            annotation.lifecycle_order().map(|order| LifecycleHook {
                order,
                method: method.name.clone(),
            })
        })
        .collect();
    lifecycle.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.method.cmp(&b.method)));

    let state_enum = Arc::clone(&binding.state_enum);
    let (initial_state, initial_state_source) = initial_state(&state_enum, &lifecycle, &transitions);
    let reachable_states = reachable(&state_enum, &initial_state, &transitions);
    let terminal_states = state_enum
        .members
        .iter()
        .filter(|m| !transitions.iter().any(|t| t.guard.accepts(&m.name)))
        .map(|m| m.name.clone())
        .collect();

    Some(StateMachine {
        receiver: receiver.name.clone(),
        state_field: binding.path.join("."),
        state_enum,
        initial_state,
        initial_state_source,
        transitions,
        lifecycle,
        reachable_states,
        terminal_states,
    })
}

/// The first member, unless the earliest lifecycle-annotated initializer
/// resets the state to a single member.
fn initial_state(
    state_enum: &StateEnum,
    lifecycle: &[LifecycleHook],
    transitions: &[Transition],
) -> (String, Option<String>) {
    for hook in lifecycle {
        let lower = hook.method.to_lowercase();
        let name = lower.trim_start_matches('_');
        if !INITIALIZER_PREFIXES.iter().any(|p| name.starts_with(p)) {
            continue;
        }
        let mut targets: Vec<&TransitionTarget> = Vec::new();
        for t in transitions.iter().filter(|t| t.method == hook.method) {
            if !targets.contains(&&t.target) {
                targets.push(&t.target);
            }
        }
        if let [TransitionTarget::State(state)] = targets.as_slice() {
            return (state.clone(), Some(hook.method.clone()));
        }
    }
    (state_enum.default_member.clone(), None)
}

/// States reachable from `initial`, in declaration order.
fn reachable(state_enum: &StateEnum, initial: &str, transitions: &[Transition]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(initial.to_string());
    queue.push_back(initial.to_string());

    while let Some(state) = queue.pop_front() {
        for transition in transitions.iter().filter(|t| t.guard.accepts(&state)) {
            if let TransitionTarget::State(next) = &transition.target {
                if seen.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }
    }

    state_enum
        .members
        .iter()
        .filter(|m| seen.contains(&m.name))
        .map(|m| m.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DeclarationKind, EnumMemberFacts, FieldFacts, Span};

    fn span(line: usize) -> Span {
        Span {
            start_byte: line * 10,
            end_byte: line * 10 + 5,
            start_line: line,
            start_col: 1,
            end_line: line,
            end_col: 5,
        }
    }

    fn assign(target: &str, value: &str) -> Statement {
        Statement::Assign {
            target: target.to_string(),
            value: value.to_string(),
            line: 1,
        }
    }

    fn compare(left: &str, op: CompareOp, right: &str) -> Condition {
        Condition::Compare(Comparison {
            left: left.to_string(),
            op,
            right: right.to_string(),
        })
    }

    fn branch(condition: Condition, then_branch: Vec<Statement>, else_branch: Vec<Statement>) -> Statement {
        Statement::Branch {
            condition,
            condition_text: "cond".to_string(),
            then_branch,
            else_branch,
            line: 1,
        }
    }

    fn method(name: &str, statements: Vec<Statement>) -> DeclarationFacts {
        let mut facts = DeclarationFacts::new(name, DeclarationKind::Method, span(1));
        facts.receiver = Some("Job".to_string());
        facts.body = Some(FunctionBody {
            span: span(1),
            receiver_var: Some("j".to_string()),
            statements,
        });
        facts
    }

    fn job_facts(methods: Vec<DeclarationFacts>) -> FileFacts {
        let mut facts = FileFacts::empty("job.go", "go");
        facts.enums = vec![EnumFacts {
            name: "Phase".to_string(),
            span: span(1),
            members: ["PhaseQueued", "PhaseRunning", "PhaseDone", "PhaseFailed"]
                .iter()
                .enumerate()
                .map(|(i, c)| EnumMemberFacts {
                    constant: c.to_string(),
                    line: i + 2,
                })
                .collect(),
        }];
        facts.types = vec![TypeFacts {
            name: "Job".to_string(),
            span: span(10),
            fields: vec![
                FieldFacts {
                    name: "phase".to_string(),
                    type_name: Some("Phase".to_string()),
                },
                FieldFacts {
                    name: "err".to_string(),
                    type_name: Some("error".to_string()),
                },
            ],
        }];
        facts.declarations = methods;
        facts
    }

    fn detect_one(facts: &FileFacts, annotations: Vec<ContractAnnotation>) -> StateMachine {
        let mut machines = detect(facts, &annotations);
        assert_eq!(machines.len(), 1);
        machines.remove(0)
    }

    #[test]
    fn test_prefix_stripped_members() {
        let facts = job_facts(vec![method("Run", vec![assign("j.phase", "PhaseRunning")])]);
        let machine = detect_one(&facts, vec![ContractAnnotation::default()]);
        assert_eq!(
            machine.state_enum.member_names(),
            vec!["Queued", "Running", "Done", "Failed"]
        );
        assert_eq!(machine.initial_state, "Queued");
        assert_eq!(machine.state_field, "phase");
    }

    #[test]
    fn test_guard_after_early_exit() {
        let facts = job_facts(vec![method(
            "Run",
            vec![
                branch(
                    compare("j.phase", CompareOp::Ne, "PhaseQueued"),
                    vec![Statement::Exit { line: 2 }],
                    vec![],
                ),
                assign("j.phase", "PhaseRunning"),
            ],
        )]);
        let machine = detect_one(&facts, vec![ContractAnnotation::default()]);
        let t = &machine.transitions[0];
        assert_eq!(t.guard, Guard::States(vec!["Queued".to_string()]));
        assert_eq!(t.guard_source, GuardSource::Code);
        assert_eq!(t.target, TransitionTarget::State("Running".to_string()));
        assert!(!t.mutates_aux);
    }

    #[test]
    fn test_conditional_outcomes_share_guard() {
        let facts = job_facts(vec![method(
            "Finish",
            vec![branch(
                compare("j.phase", CompareOp::Eq, "PhaseRunning"),
                vec![branch(
                    Condition::Opaque("err != nil".to_string()),
                    vec![assign("j.phase", "PhaseFailed"), assign("j.err", "err")],
                    vec![assign("j.phase", "PhaseDone")],
                )],
                vec![],
            )],
        )]);
        let machine = detect_one(&facts, vec![ContractAnnotation::default()]);
        let transitions: Vec<_> = machine.transitions_of("Finish").collect();
        assert_eq!(transitions.len(), 2);
        for t in &transitions {
            assert_eq!(t.guard, Guard::States(vec!["Running".to_string()]));
        }
        assert!(transitions[0].mutates_aux);
        assert!(!transitions[1].mutates_aux);
        assert_eq!(transitions[0].branch.as_deref(), Some("cond"));
        assert_eq!(transitions[1].branch.as_deref(), Some("!(cond)"));
    }

    #[test]
    fn test_aux_write_belongs_to_its_path() {
        let facts = job_facts(vec![method(
            "Finish",
            vec![
                branch(
                    Condition::Opaque("err != nil".to_string()),
                    vec![
                        assign("j.phase", "PhaseFailed"),
                        assign("j.err", "err"),
                        Statement::Exit { line: 4 },
                    ],
                    vec![],
                ),
                assign("j.phase", "PhaseDone"),
            ],
        )]);
        let machine = detect_one(&facts, vec![ContractAnnotation::default()]);
        let failed = machine
            .transitions
            .iter()
            .find(|t| t.target == TransitionTarget::State("Failed".to_string()))
            .unwrap();
        let done = machine
            .transitions
            .iter()
            .find(|t| t.target == TransitionTarget::State("Done".to_string()))
            .unwrap();
        assert!(failed.mutates_aux);
        assert!(!done.mutates_aux);
    }

    #[test]
    fn test_aux_write_before_branch_reaches_both_outcomes() {
        let facts = job_facts(vec![method(
            "Settle",
            vec![
                assign("j.err", "nil"),
                branch(
                    Condition::Opaque("ok".to_string()),
                    vec![assign("j.phase", "PhaseDone")],
                    vec![assign("j.phase", "PhaseFailed")],
                ),
            ],
        )]);
        let machine = detect_one(&facts, vec![ContractAnnotation::default()]);
        assert_eq!(machine.transitions.len(), 2);
        assert!(machine.transitions.iter().all(|t| t.mutates_aux));
    }

    #[test]
    fn test_compound_conditions() {
        let facts = job_facts(vec![method(
            "Reset",
            vec![branch(
                Condition::Any(vec![
                    compare("j.phase", CompareOp::Eq, "PhaseDone"),
                    compare("j.phase", CompareOp::Eq, "PhaseFailed"),
                ]),
                vec![assign("j.phase", "PhaseQueued")],
                vec![],
            )],
        )]);
        let machine = detect_one(&facts, vec![ContractAnnotation::default()]);
        assert_eq!(
            machine.transitions[0].guard,
            Guard::States(vec!["Done".to_string(), "Failed".to_string()])
        );
        assert_eq!(machine.terminal_states, vec!["Queued", "Running"]);
    }

    #[test]
    fn test_unresolved_value_is_unchanged() {
        let facts = job_facts(vec![method("Restore", vec![assign("j.phase", "saved")])]);
        let machine = detect_one(&facts, vec![ContractAnnotation::default()]);
        assert_eq!(machine.transitions[0].target, TransitionTarget::Unchanged);
    }

    #[test]
    fn test_reader_is_not_a_transition() {
        let facts = job_facts(vec![
            method(
                "IsDone",
                vec![branch(
                    compare("j.phase", CompareOp::Eq, "PhaseDone"),
                    vec![Statement::Exit { line: 3 }],
                    vec![],
                )],
            ),
            method("Run", vec![assign("j.phase", "PhaseRunning")]),
        ]);
        let machine = detect_one(
            &facts,
            vec![ContractAnnotation::default(), ContractAnnotation::default()],
        );
        assert_eq!(machine.transitions.len(), 1);
        assert_eq!(machine.transitions[0].method, "Run");
    }

    #[test]
    fn test_documented_guard() {
        let facts = job_facts(vec![method("Run", vec![assign("j.phase", "PhaseRunning")])]);
        let annotation = ContractAnnotation {
            summary: Some("Run transitions from Queued to Running.".to_string()),
            clauses: Vec::new(),
        };
        let machine = detect_one(&facts, vec![annotation]);
        let t = &machine.transitions[0];
        assert_eq!(t.guard, Guard::States(vec!["Queued".to_string()]));
        assert_eq!(t.guard_source, GuardSource::Comment);
    }

    #[test]
    fn test_documented_guard_needs_matching_target() {
        let facts = job_facts(vec![method("Run", vec![assign("j.phase", "PhaseRunning")])]);
        let annotation = ContractAnnotation {
            summary: Some("State transition: Queued -> Done".to_string()),
            clauses: Vec::new(),
        };
        let machine = detect_one(&facts, vec![annotation]);
        assert_eq!(machine.transitions[0].guard, Guard::Any);
    }

    #[test]
    fn test_no_enum_no_machine() {
        let mut facts = job_facts(vec![method("Run", vec![assign("j.phase", "PhaseRunning")])]);
        facts.enums.clear();
        assert!(detect(&facts, &[ContractAnnotation::default()]).is_empty());
    }

    #[test]
    fn test_single_member_enum_is_not_a_state_enum() {
        let enum_facts = EnumFacts {
            name: "Mode".to_string(),
            span: span(1),
            members: vec![
                EnumMemberFacts {
                    constant: "ModeOnly".to_string(),
                    line: 2,
                },
                EnumMemberFacts {
                    constant: "ModeOnly".to_string(),
                    line: 3,
                },
            ],
        };
        assert!(state_enum(&enum_facts).is_none());
    }

    #[test]
    fn test_colliding_stripped_names_keep_constants() {
        let enum_facts = EnumFacts {
            name: "State".to_string(),
            span: span(1),
            members: ["State_Idle", "StateIdle", "StateBusy"]
                .iter()
                .enumerate()
                .map(|(i, c)| EnumMemberFacts {
                    constant: c.to_string(),
                    line: i + 2,
                })
                .collect(),
        };
        let state_enum = state_enum(&enum_facts).unwrap();
        assert_eq!(
            state_enum.member_names(),
            vec!["State_Idle", "StateIdle", "StateBusy"]
        );
        assert_eq!(state_enum.default_member, "State_Idle");
    }

    #[test]
    fn test_payload_and_literal_members_resolve() {
        let mut facts = job_facts(vec![
            method("Start", vec![assign("j.phase", "new Loading(0)")]),
            method("Finish", vec![assign("j.phase", "Phase::Loaded(data)")]),
            method("Fail", vec![assign("j.phase", "{ kind: 'Error', message: m }")]),
            method("Reset", vec![assign("j.phase", "\"Idle\"")]),
            method("Wrap", vec![assign("j.phase", "Other::Loaded(data)")]),
        ]);
        facts.enums[0].members = ["Idle", "Loading", "Loaded", "Error"]
            .iter()
            .enumerate()
            .map(|(i, c)| EnumMemberFacts {
                constant: c.to_string(),
                line: i + 2,
            })
            .collect();
        let machine = detect_one(&facts, vec![ContractAnnotation::default(); 5]);
        let target = |method: &str| {
            machine
                .transitions
                .iter()
                .find(|t| t.method == method)
                .map(|t| t.target.clone())
        };
        let state = |name: &str| Some(TransitionTarget::State(name.to_string()));
        assert_eq!(target("Start"), state("Loading"));
        assert_eq!(target("Finish"), state("Loaded"));
        assert_eq!(target("Fail"), state("Error"));
        assert_eq!(target("Reset"), state("Idle"));
        assert_eq!(target("Wrap"), Some(TransitionTarget::Unchanged));
    }

    #[test]
    fn test_reachable_states() {
        let facts = job_facts(vec![
            method(
                "Run",
                vec![
                    branch(
                        compare("j.phase", CompareOp::Ne, "PhaseQueued"),
                        vec![Statement::Exit { line: 2 }],
                        vec![],
                    ),
                    assign("j.phase", "PhaseRunning"),
                ],
            ),
            method(
                "Complete",
                vec![branch(
                    compare("j.phase", CompareOp::Eq, "PhaseRunning"),
                    vec![assign("j.phase", "PhaseDone")],
                    vec![],
                )],
            ),
        ]);
        let machine = detect_one(
            &facts,
            vec![ContractAnnotation::default(), ContractAnnotation::default()],
        );
        assert_eq!(machine.reachable_states, vec!["Queued", "Running", "Done"]);
        assert_eq!(machine.terminal_states, vec!["Done", "Failed"]);
    }
}
