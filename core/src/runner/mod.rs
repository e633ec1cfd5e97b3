//! # Runner
//!
//! Drains a program's operators against the domain state until it has to
//! suspend, and picks up from the retained operator on the next activation.
//!
//! - Owned mode: the runner owns the state. The program's first operator must
//!   be `InitialState`, consumed synchronously when the runner is built.
//! - External mode: the state comes with each activation (`activate_with`);
//!   `SetState` and `InitialState` are rejected.
//!
//! At most one drain runs per runner. An activation that arrives while a
//! drain is in progress is dropped, not queued: every state change posts a
//! retrigger, so the next natural trigger makes the progress instead.

pub mod interpreter;
pub mod store;


use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::errors::RunnerError;
use crate::operator::{Operator, OperatorKind, Pending};
use crate::program::{Program, ProgramFactory, Resume, Yielded};
use crate::types::{Mode, Phase, RunnerId, Snapshot, Value};
use interpreter::{interpret, Context, Step};
pub use store::{StateSetter, StateStore};

/// Why a drain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// A `WaitState` predicate does not hold yet
    WaitingForState,
    /// `SetState` published a new state; the retrigger resumes the program
    StateChanged,
    /// The program is finished
    Done,
}

/// Result of one activation
#[derive(Debug, Clone)]
pub enum Activation {
    /// Another drain was already running; nothing happened
    Skipped,
    Suspended {
        suspension: Suspension,
        state: Snapshot,
    },
}

impl Activation {
    pub fn suspension(&self) -> Option<Suspension> {
        match self {
            Activation::Skipped => None,
            Activation::Suspended { suspension, .. } => Some(*suspension),
        }
    }
}

/// Point-in-time view of a runner, readable without waiting for a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerStatus {
    pub phase: Phase,
    pub pending: Option<OperatorKind>,
    pub faulted: bool,
    pub drains: u64,
}

/// State only the drain that owns the phase may touch
struct Core {
    /// Program stack; the bottom entry is the root program
    programs: Vec<Box<dyn Program>>,
    started: bool,
    pending: Option<Pending>,
    /// Input for the next resumption of the top program
    resume: Resume,
    /// Operator whose interpretation has not returned yet. Still set on the
    /// next activation only if the previous drain was dropped mid-await.
    in_flight: Option<OperatorKind>,
    faulted: bool,
}

struct Inner {
    id: RunnerId,
    name: String,
    mode: Mode,
    factory: Arc<dyn ProgramFactory>,
    phase: Mutex<Phase>,
    status: Mutex<RunnerStatus>,
    core: tokio::sync::Mutex<Core>,
    store: Arc<StateStore>,
}

/// Handle to a runner; clones share the same instance
#[derive(Clone)]
pub struct Runner {
    inner: Arc<Inner>,
}

impl Runner {
    /// Build a runner that owns its state
    ///
    /// The program is created right away and resumed once: its first operator
    /// must be `InitialState`, which seeds the state. Anything else is a
    /// configuration error.
    pub fn owned(
        name: impl Into<String>,
        factory: Arc<dyn ProgramFactory>,
    ) -> Result<Self, RunnerError> {
        let name = name.into();
        let mut program = factory.create();

        let initial = match program.resume(Resume::Start) {
            Ok(Yielded::Operator(Operator::InitialState(state))) => state,
            Ok(Yielded::Operator(op)) => {
                return Err(RunnerError::Configuration {
                    runner: name,
                    message: format!(
                        "first operator must be {}, got {}",
                        OperatorKind::InitialState,
                        op.kind()
                    ),
                });
            }
            Ok(Yielded::Complete(_)) => {
                return Err(RunnerError::Configuration {
                    runner: name,
                    message: format!(
                        "program completed before yielding {}",
                        OperatorKind::InitialState
                    ),
                });
            }
            Err(source) => return Err(RunnerError::Unhandled { runner: name, source }),
        };

        debug!(runner = %name, state = %initial, "{}::{}", program.name(), OperatorKind::InitialState);

        let core = Core {
            programs: vec![program],
            started: true,
            pending: None,
            resume: Resume::null(),
            in_flight: None,
            faulted: false,
        };

        Ok(Self::build(name, Mode::Owned, factory, core, initial))
    }

    /// Build a runner working against externally supplied state
    ///
    /// The program is created lazily on the first activation.
    pub fn external(
        name: impl Into<String>,
        factory: Arc<dyn ProgramFactory>,
        initial: Value,
    ) -> Self {
        let core = Core {
            programs: Vec::new(),
            started: false,
            pending: None,
            resume: Resume::Start,
            in_flight: None,
            faulted: false,
        };

        Self::build(name.into(), Mode::External, factory, core, initial)
    }

    fn build(
        name: String,
        mode: Mode,
        factory: Arc<dyn ProgramFactory>,
        core: Core,
        initial: Value,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: RunnerId::new(),
                name,
                mode,
                factory,
                phase: Mutex::new(Phase::Idle),
                status: Mutex::new(RunnerStatus {
                    phase: Phase::Idle,
                    pending: None,
                    faulted: false,
                    drains: 0,
                }),
                core: tokio::sync::Mutex::new(core),
                store: Arc::new(StateStore::new(initial)),
            }),
        }
    }

    pub fn id(&self) -> RunnerId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn mode(&self) -> Mode {
        self.inner.mode
    }

    /// Current domain state snapshot
    pub fn state(&self) -> Snapshot {
        self.inner.store.current()
    }

    /// Bumped on every state replacement
    pub fn version(&self) -> u64 {
        self.inner.store.version()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.inner.store.subscribe()
    }

    /// Mutation handle for the owned state
    ///
    /// `None` in external mode, where the caller owns the state.
    pub fn setter(&self) -> Option<StateSetter> {
        match self.inner.mode {
            Mode::Owned => Some(StateSetter::new(self.inner.store.clone())),
            Mode::External => None,
        }
    }

    pub fn status(&self) -> RunnerStatus {
        *self.inner.status.lock()
    }

    pub fn is_done(&self) -> bool {
        self.pending_kind() == Some(OperatorKind::Done)
    }

    /// Operator retained across the last suspension
    pub fn pending_kind(&self) -> Option<OperatorKind> {
        self.status().pending
    }

    pub(crate) fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    /// Run one activation against the current state
    pub async fn activate(&self) -> Result<Activation, RunnerError> {
        let Some(_running) = self.try_begin() else {
            debug!(runner = %self.inner.name, "drain already running, activation dropped");
            return Ok(Activation::Skipped);
        };

        let mut core = self.inner.core.lock().await;
        if core.faulted {
            return Err(RunnerError::Faulted {
                runner: self.inner.name.clone(),
            });
        }

        // The resume value of an abandoned operator is gone for good
        if let Some(kind) = core.in_flight.take() {
            let err = RunnerError::Interrupted {
                runner: self.inner.name.clone(),
                kind,
            };
            error!(runner = %self.inner.name, error = %err, "runner failed");
            core.faulted = true;
            self.record(&core);
            return Err(err);
        }

        let result = self.drain(&mut core).await;

        if let Err(err) = &result {
            error!(runner = %self.inner.name, error = %err, "runner failed");
            core.faulted = true;
        }
        self.record(&core);
        drop(core);
        drop(_running);

        let suspension = result?;
        if suspension == Suspension::StateChanged {
            // Posted once the phase is back to Idle so the retrigger is not dropped
            self.inner.store.notify();
        }

        Ok(Activation::Suspended {
            suspension,
            state: self.state(),
        })
    }

    /// Supply a new external snapshot and activate against it
    pub async fn activate_with(&self, external: Snapshot) -> Result<Activation, RunnerError> {
        self.supply(external)?;
        self.activate().await
    }

    /// Store a new external snapshot for the next activation
    ///
    /// A drain already in flight keeps the snapshot it started with. Owned
    /// runners only change through `SetState` and their setter.
    pub fn supply(&self, external: Snapshot) -> Result<(), RunnerError> {
        if self.inner.mode == Mode::Owned {
            return Err(RunnerError::OwnedState {
                runner: self.inner.name.clone(),
            });
        }
        self.inner.store.put(external);
        Ok(())
    }

    fn try_begin(&self) -> Option<RunningGuard<'_>> {
        let mut phase = self.inner.phase.lock();
        if *phase == Phase::Running {
            return None;
        }
        *phase = Phase::Running;
        self.inner.status.lock().phase = Phase::Running;
        Some(RunningGuard { runner: self })
    }

    fn record(&self, core: &Core) {
        let mut status = self.inner.status.lock();
        status.pending = core.pending.as_ref().map(Pending::kind);
        status.faulted = core.faulted;
        status.drains += 1;
    }

    /// Interpret operators until one of them suspends the drain
    async fn drain(&self, core: &mut Core) -> Result<Suspension, RunnerError> {
        if !core.started {
            core.programs.push(self.inner.factory.create());
            core.started = true;
            core.resume = Resume::Start;
            info!(runner = %self.inner.name, "program started");
        }

        // External mode observes the snapshot this activation started with
        let external = self.inner.store.current();

        loop {
            match core.pending.take() {
                Some(Pending::Done) => {
                    core.pending = Some(Pending::Done);
                    return Ok(Suspension::Done);
                }
                Some(Pending::WaitState(predicate)) => {
                    let current = match self.inner.mode {
                        Mode::Owned => self.inner.store.current(),
                        Mode::External => external.clone(),
                    };
                    if !predicate(&current) {
                        core.pending = Some(Pending::WaitState(predicate));
                        return Ok(Suspension::WaitingForState);
                    }
                    core.resume = Resume::null();
                }
                None => {}
            }

            let input = std::mem::replace(&mut core.resume, Resume::null());
            let Some(program) = core.programs.last_mut() else {
                core.pending = Some(Pending::Done);
                return Ok(Suspension::Done);
            };

            let yielded = match program.resume(input) {
                Ok(yielded) => yielded,
                Err(source) => {
                    core.programs.pop();
                    if core.programs.is_empty() {
                        return Err(RunnerError::Unhandled {
                            runner: self.inner.name.clone(),
                            source,
                        });
                    }
                    // Failure of a nested program surfaces in the outer one
                    core.resume = Resume::Throw(source);
                    continue;
                }
            };

            let op = match yielded {
                Yielded::Operator(op) => op,
                Yielded::Complete(val) => {
                    if self.complete(core, val) {
                        return Ok(Suspension::Done);
                    }
                    continue;
                }
            };

            let program_name = core
                .programs
                .last()
                .map(|p| p.name().to_string())
                .unwrap_or_default();
            let ctx = Context {
                runner: &self.inner.name,
                program: &program_name,
                mode: self.inner.mode,
                store: &self.inner.store,
                external: &external,
            };

            core.in_flight = Some(op.kind());
            let step = interpret(op, &ctx).await;
            core.in_flight = None;

            match step? {
                Step::Advance(resume) => core.resume = resume,
                Step::Suspend(pending) => {
                    core.pending = Some(pending);
                    return Ok(Suspension::WaitingForState);
                }
                Step::StateChanged => {
                    core.resume = Resume::null();
                    return Ok(Suspension::StateChanged);
                }
                Step::Delegate(nested) => {
                    core.programs.push(nested);
                    core.resume = Resume::Start;
                }
                Step::Complete(val) => {
                    if self.complete(core, val) {
                        return Ok(Suspension::Done);
                    }
                }
            }
        }
    }

    /// Pop the finished top program; true when it was the root
    fn complete(&self, core: &mut Core, val: Value) -> bool {
        if let Some(program) = core.programs.pop() {
            debug!(runner = %self.inner.name, program = program.name(), result = %val, "program completed");
        }

        if core.programs.is_empty() {
            info!(runner = %self.inner.name, "runner done");
            core.pending = Some(Pending::Done);
            return true;
        }

        core.resume = Resume::Value(val);
        false
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("mode", &self.inner.mode)
            .field("status", &self.status())
            .finish()
    }
}

/// Holds the `Running` phase; returns it to `Idle` when dropped
struct RunningGuard<'a> {
    runner: &'a Runner,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        *self.runner.inner.phase.lock() = Phase::Idle;
        self.runner.inner.status.lock().phase = Phase::Idle;
    }
}
