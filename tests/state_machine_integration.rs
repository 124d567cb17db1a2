//! Integration tests for state-machine reconstruction.
//!
//! Every fixture models the same resource loader: four states, an
//! initializer with a lifecycle marker, a guarded start, documented
//! completion callbacks and a guarded retry.

use std::fs;

use codefacts::{analyze, Guard, GuardSource, StateMachine, TransitionTarget};

fn fixture(path: &str) -> String {
    let full = format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), path);
    fs::read_to_string(&full).unwrap_or_else(|e| panic!("failed to read {}: {}", full, e))
}

fn loader_machine(path: &str, language: &str) -> StateMachine {
    let unit = analyze(&fixture(path), language, path).expect("fixture should analyze");
    assert_eq!(
        unit.state_machines.len(),
        1,
        "expected only the loader machine in {}: {:?}",
        path,
        unit.state_machines
    );
    unit.find_state_machine("ResourceLoader")
        .cloned()
        .expect("ResourceLoader machine")
}

fn state(name: &str) -> TransitionTarget {
    TransitionTarget::State(name.to_string())
}

fn states(names: &[&str]) -> Guard {
    Guard::States(names.iter().map(|s| s.to_string()).collect())
}

/// Assertions shared by every language; `names` lists the display names of
/// idle, loading, loaded and error in that order.
fn check_loader(machine: &StateMachine, names: [&str; 4], methods: [&str; 5]) {
    let [idle, loading, loaded, error] = names;
    let [init, start, on_success, on_error, retry] = methods;

    assert_eq!(machine.state_enum.member_names(), names.to_vec());
    assert_eq!(machine.initial_state, idle);
    assert_eq!(machine.initial_state_source.as_deref(), Some(init));

    let hooks: Vec<(u32, &str)> = machine
        .lifecycle
        .iter()
        .map(|h| (h.order, h.method.as_str()))
        .collect();
    assert_eq!(&hooks[..2], &[(1, init), (2, start)]);

    let starts: Vec<_> = machine.transitions_of(start).collect();
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].guard, states(&[idle]));
    assert_eq!(starts[0].guard_source, GuardSource::Code);
    assert_eq!(starts[0].target, state(loading));

    let success: Vec<_> = machine.transitions_of(on_success).collect();
    assert_eq!(success.len(), 1);
    assert_eq!(success[0].guard, states(&[loading]));
    assert_eq!(success[0].guard_source, GuardSource::Comment);
    assert_eq!(success[0].target, state(loaded));
    assert!(success[0].mutates_aux);

    let failure: Vec<_> = machine.transitions_of(on_error).collect();
    assert_eq!(failure.len(), 1);
    assert_eq!(failure[0].guard, states(&[loading]));
    assert_eq!(failure[0].target, state(error));

    let retries: Vec<_> = machine.transitions_of(retry).collect();
    assert_eq!(retries.len(), 1);
    assert_eq!(retries[0].guard, states(&[error]));
    assert_eq!(retries[0].guard_source, GuardSource::Code);
    assert_eq!(retries[0].target, state(idle));

    let inits: Vec<_> = machine.transitions_of(init).collect();
    assert_eq!(inits.len(), 1);
    assert_eq!(inits[0].guard, Guard::Any);
    assert_eq!(inits[0].target, state(idle));

    assert_eq!(machine.reachable_states, names.to_vec());
    assert!(machine.terminal_states.is_empty());
}

#[test]
fn test_go_resource_loader() {
    let machine = loader_machine("go/state_machine.go", "go");
    assert_eq!(machine.state_field, "context.State");
    assert_eq!(machine.state_enum.name, "State");
    assert_eq!(machine.state_enum.members[0].constant, "StateIdle");
    check_loader(
        &machine,
        ["Idle", "Loading", "Loaded", "Error"],
        ["Init", "Start", "OnSuccess", "OnError", "Retry"],
    );

    let hooks: Vec<&str> = machine.lifecycle.iter().map(|h| h.method.as_str()).collect();
    assert_eq!(hooks, vec!["Init", "Start", "Stop", "Destroy"]);

    let stop: Vec<_> = machine.transitions_of("Stop").collect();
    assert_eq!(stop.len(), 1);
    assert_eq!(stop[0].guard, Guard::Any);
    assert_eq!(stop[0].guard_source, GuardSource::None);
    assert!(stop[0].mutates_aux);

    // Documented as Idle -> Loading, and the body agrees on the target.
    let load: Vec<_> = machine.transitions_of("Load").collect();
    assert_eq!(load[0].guard, states(&["Idle"]));
    assert_eq!(load[0].guard_source, GuardSource::Comment);

    // Delegation is not a state write.
    assert_eq!(machine.transitions_of("Destroy").count(), 0);
}

#[test]
fn test_rust_resource_loader() {
    let machine = loader_machine("rust/state_machine.rs", "rust");
    assert_eq!(machine.state_field, "context.state");
    check_loader(
        &machine,
        ["Idle", "Loading", "Loaded", "Error"],
        ["init", "start", "on_success", "on_error", "retry"],
    );
    assert_eq!(machine.transitions_of("state").count(), 0);
}

#[test]
fn test_python_resource_loader() {
    let machine = loader_machine("python/state_machine.py", "python");
    assert_eq!(machine.state_field, "_context.state");
    check_loader(
        &machine,
        ["IDLE", "LOADING", "LOADED", "ERROR"],
        ["init", "start", "on_success", "on_error", "retry"],
    );
    // Replacing the holder with a fresh instance names no state.
    assert_eq!(machine.transitions_of("__init__").count(), 0);
}

#[test]
fn test_typescript_resource_loader() {
    let machine = loader_machine("typescript/state_machine.ts", "typescript");
    assert_eq!(machine.state_field, "context.state");
    check_loader(
        &machine,
        ["Idle", "Loading", "Loaded", "Error"],
        ["init", "start", "onSuccess", "onError", "retry"],
    );
}

#[test]
fn test_java_resource_loader() {
    let machine = loader_machine("java/StateMachine.java", "java");
    assert_eq!(machine.state_field, "context.state");
    check_loader(
        &machine,
        ["IDLE", "LOADING", "LOADED", "ERROR"],
        ["init", "start", "onSuccess", "onError", "retry"],
    );
    assert_eq!(machine.transitions_of("current").count(), 0);
}

#[test]
fn test_no_enum_no_machine() {
    let unit = analyze(&fixture("go/contracts.go"), "go", "contracts.go").unwrap();
    assert!(unit.state_machines.is_empty());
}

#[test]
fn test_machines_share_the_enum() {
    let source = r#"package jobs

type Phase int

const (
	PhaseQueued Phase = iota
	PhaseRunning
	PhaseDone
)

type Job struct {
	phase Phase
}

func (j *Job) Run() {
	if j.phase == PhaseQueued {
		j.phase = PhaseRunning
	}
}

type Batch struct {
	phase Phase
}

func (b *Batch) Finish() {
	b.phase = PhaseDone
}
"#;
    let unit = analyze(source, "go", "jobs.go").unwrap();
    assert_eq!(unit.state_machines.len(), 2);
    let job = unit.find_state_machine("Job").unwrap();
    let batch = unit.find_state_machine("Batch").unwrap();
    assert_eq!(job.state_enum, batch.state_enum);

    // An unguarded write accepts every state as its source.
    assert!(batch.terminal_states.is_empty());
    assert_eq!(batch.reachable_states, vec!["Queued", "Done"]);
    assert_eq!(job.terminal_states, vec!["Running", "Done"]);
    assert_eq!(job.reachable_states, vec!["Queued", "Running"]);
}

// =============================================================================
// Switch and match guards
// =============================================================================

fn transition_guard(machine: &StateMachine, method: &str, target: &str) -> Guard {
    machine
        .transitions_of(method)
        .find(|t| t.target == state(target))
        .unwrap_or_else(|| panic!("no {} -> {} in {:?}", method, target, machine.transitions))
        .guard
        .clone()
}

#[test]
fn test_go_switch_cases_guard_their_writes() {
    let source = r#"package jobs

type Phase int

const (
	PhaseQueued Phase = iota
	PhaseRunning
	PhaseDone
	PhaseFailed
)

type Job struct {
	phase Phase
}

func (j *Job) Advance() {
	switch j.phase {
	case PhaseQueued:
		j.phase = PhaseRunning
	case PhaseRunning, PhaseFailed:
		j.phase = PhaseDone
	default:
		j.phase = PhaseFailed
	}
}
"#;
    let unit = analyze(source, "go", "jobs.go").unwrap();
    let job = unit.find_state_machine("Job").unwrap();
    assert_eq!(transition_guard(job, "Advance", "Running"), states(&["Queued"]));
    assert_eq!(
        transition_guard(job, "Advance", "Done"),
        states(&["Running", "Failed"])
    );
    // The default case runs for whatever no case named.
    assert_eq!(transition_guard(job, "Advance", "Failed"), states(&["Done"]));
    assert!(job
        .transitions_of("Advance")
        .all(|t| t.guard_source == GuardSource::Code));
}

#[test]
fn test_rust_match_arms_guard_their_writes() {
    let source = r#"
pub enum Phase {
    Queued,
    Running,
    Done,
}

pub struct Job {
    phase: Phase,
}

impl Job {
    pub fn advance(&mut self) {
        match self.phase {
            Phase::Queued => self.phase = Phase::Running,
            Phase::Running | Phase::Done => {}
        }
    }

    pub fn finish(&mut self) {
        match self.phase {
            Phase::Running => {
                self.phase = Phase::Done;
            }
            _ => {}
        }
    }
}
"#;
    let unit = analyze(source, "rust", "job.rs").unwrap();
    let job = unit.find_state_machine("Job").unwrap();
    assert_eq!(transition_guard(job, "advance", "Running"), states(&["Queued"]));
    assert_eq!(transition_guard(job, "finish", "Done"), states(&["Running"]));
}

#[test]
fn test_java_switch_labels_guard_their_writes() {
    let source = r#"package jobs;

public class Job {
    public enum Phase {
        QUEUED,
        RUNNING,
        DONE
    }

    private Phase phase = Phase.QUEUED;

    public void advance() {
        switch (phase) {
            case QUEUED:
                phase = Phase.RUNNING;
                break;
            case RUNNING:
                this.phase = Phase.DONE;
                break;
            default:
                break;
        }
    }
}
"#;
    let unit = analyze(source, "java", "Job.java").unwrap();
    let job = unit.find_state_machine("Job").unwrap();
    assert_eq!(transition_guard(job, "advance", "RUNNING"), states(&["QUEUED"]));
    assert_eq!(transition_guard(job, "advance", "DONE"), states(&["RUNNING"]));
}

#[test]
fn test_typescript_switch_fall_through_shares_the_body() {
    let source = r#"export enum Phase {
  Queued,
  Running,
  Done,
}

export class Job {
  private phase: Phase = Phase.Queued;

  advance(): void {
    switch (this.phase) {
      case Phase.Queued:
        this.phase = Phase.Running;
        break;
      case Phase.Running:
      case Phase.Done:
        this.phase = Phase.Done;
        break;
    }
  }
}
"#;
    let unit = analyze(source, "typescript", "job.ts").unwrap();
    let job = unit.find_state_machine("Job").unwrap();
    assert_eq!(transition_guard(job, "advance", "Running"), states(&["Queued"]));
    assert_eq!(
        transition_guard(job, "advance", "Done"),
        states(&["Running", "Done"])
    );
}

#[test]
fn test_python_match_cases_guard_their_writes() {
    let source = r#"from enum import Enum


class Phase(Enum):
    QUEUED = "queued"
    RUNNING = "running"
    DONE = "done"


class Job:
    def __init__(self):
        self.phase: Phase = Phase.QUEUED

    def advance(self):
        match self.phase:
            case Phase.QUEUED:
                self.phase = Phase.RUNNING
            case Phase.RUNNING | Phase.DONE:
                self.phase = Phase.DONE
            case _:
                pass
"#;
    let unit = analyze(source, "python", "job.py").unwrap();
    let job = unit.find_state_machine("Job").unwrap();
    assert_eq!(transition_guard(job, "advance", "RUNNING"), states(&["QUEUED"]));
    assert_eq!(
        transition_guard(job, "advance", "DONE"),
        states(&["RUNNING", "DONE"])
    );
}

// =============================================================================
// Variant state sets: ADTs, sealed hierarchies and unions
// =============================================================================

/// Analyze a state-set fixture with a holder type appended.
fn holder_machine(path: &str, language: &str, holder: &str) -> StateMachine {
    let source = format!("{}\n{}", fixture(path), holder);
    let unit = analyze(&source, language, path).expect("fixture should analyze");
    unit.find_state_machine("Fetcher")
        .cloned()
        .unwrap_or_else(|| panic!("no Fetcher machine in {}: {:?}", path, unit.state_machines))
}

#[test]
fn test_rust_enum_with_payloads() {
    let machine = holder_machine(
        "rust/adt_state.rs",
        "rust",
        r#"
pub struct Fetcher {
    state: State,
}

impl Fetcher {
    pub fn start(&mut self) {
        match self.state {
            State::Idle => self.state = State::Loading { progress: 0 },
            _ => {}
        }
    }

    pub fn complete(&mut self, data: String) {
        match self.state {
            State::Loading { .. } => self.state = State::Loaded(data),
            _ => {}
        }
    }

    pub fn fail(&mut self, message: String) {
        self.state = State::Error(message);
    }
}
"#,
    );
    assert_eq!(machine.state_enum.name, "State");
    assert_eq!(
        machine.state_enum.member_names(),
        vec!["Idle", "Loading", "Loaded", "Error"]
    );
    assert_eq!(transition_guard(&machine, "start", "Loading"), states(&["Idle"]));
    assert_eq!(transition_guard(&machine, "complete", "Loaded"), states(&["Loading"]));
    assert!(machine.transitions_of("fail").any(|t| t.target == state("Error")));
}

#[test]
fn test_java_sealed_hierarchy() {
    let machine = holder_machine(
        "java/SealedState.java",
        "java",
        r#"
class Fetcher {
    private State state = new Idle();

    public void start() {
        state = new Loading(0);
    }

    public void fail(String message) {
        this.state = new Error(message);
    }
}
"#,
    );
    assert_eq!(
        machine.state_enum.member_names(),
        vec!["Idle", "Loading", "Loaded", "Error"]
    );
    assert!(machine.transitions_of("start").any(|t| t.target == state("Loading")));
    assert!(machine.transitions_of("fail").any(|t| t.target == state("Error")));
}

#[test]
fn test_python_union_alias() {
    let machine = holder_machine(
        "python/union_state.py",
        "python",
        r#"
class Fetcher:
    def __init__(self):
        self.state: State = Idle()

    def start(self):
        match self.state:
            case Idle():
                self.state = Loading(progress=0)

    def fail(self, message):
        self.state = Error(message)
"#,
    );
    assert_eq!(
        machine.state_enum.member_names(),
        vec!["Idle", "Loading", "Loaded", "Error"]
    );
    assert_eq!(machine.initial_state, "Idle");
    assert_eq!(transition_guard(&machine, "start", "Loading"), states(&["Idle"]));
    assert!(machine.transitions_of("fail").any(|t| t.target == state("Error")));
}

#[test]
fn test_typescript_discriminated_union() {
    let machine = holder_machine(
        "typescript/discriminated-union.ts",
        "typescript",
        r#"
export class Fetcher {
  private state: State = { kind: 'idle' };

  start(): void {
    this.state = { kind: 'loading', progress: 0 };
  }

  fail(message: string): void {
    this.state = { kind: 'error', message };
  }
}
"#,
    );
    assert_eq!(machine.state_enum.name, "State");
    assert_eq!(
        machine.state_enum.member_names(),
        vec!["idle", "loading", "loaded", "error"]
    );
    assert!(machine.transitions_of("start").any(|t| t.target == state("loading")));
    assert!(machine.transitions_of("fail").any(|t| t.target == state("error")));
}
