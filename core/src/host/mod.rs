//! # Host adapter
//!
//! Plays the part of the component lifecycle around a set of runners:
//! mounts them in an arena keyed by `RunnerId`, receives external events on
//! an explicit queue, and activates each runner once per change of its
//! dependencies (the version of the state it runs against).
//!
//! A runner has at most one activation in flight. When it finishes, the
//! dependencies are compared again, so a change that arrived mid-drain is
//! picked up by the next activation rather than lost.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::errors::{HostError, RunnerError};
use crate::program::ProgramFactory;
use crate::runner::{Activation, Runner, RunnerStatus, StateSetter};
use crate::types::{Mode, RunnerId, Snapshot, Value};

/// Messages posted to the host queue
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// A runner's state changed; re-check its dependencies
    Retrigger(RunnerId),
    /// New external snapshot for a runner in external mode
    External(RunnerId, Snapshot),
}

/// Per-runner bookkeeping
struct Mounted {
    runner: Runner,
    /// State version the last completed activation started from
    last: Option<u64>,
    in_flight: bool,
}

type Joined = (RunnerId, u64, Result<Activation, RunnerError>);

/// What the rendering side holds on to for one mounted runner
///
/// The setter is created once at mount time and handed out unchanged, so
/// callers may close over it.
#[derive(Debug, Clone)]
pub struct MountHandle {
    runner: Runner,
    setter: Option<StateSetter>,
}

impl MountHandle {
    pub fn id(&self) -> RunnerId {
        self.runner.id()
    }

    pub fn name(&self) -> &str {
        self.runner.name()
    }

    /// Latest domain state
    pub fn state(&self) -> Snapshot {
        self.runner.state()
    }

    /// Mutation handle, `None` for runners in external mode
    pub fn setter(&self) -> Option<&StateSetter> {
        self.setter.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.runner.subscribe()
    }

    pub fn status(&self) -> RunnerStatus {
        self.runner.status()
    }

    pub fn is_done(&self) -> bool {
        self.runner.is_done()
    }
}

pub struct Host {
    runners: HashMap<RunnerId, Mounted>,
    events_tx: mpsc::UnboundedSender<HostEvent>,
    events_rx: mpsc::UnboundedReceiver<HostEvent>,
    tasks: JoinSet<Joined>,
}

impl Host {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            runners: HashMap::new(),
            events_tx,
            events_rx,
            tasks: JoinSet::new(),
        }
    }

    /// Mount a runner that owns its state
    ///
    /// Fails right away if the program does not start with `InitialState`.
    pub fn mount_owned(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn ProgramFactory>,
    ) -> Result<MountHandle, HostError> {
        let runner = Runner::owned(name, factory)?;
        Ok(self.mount(runner))
    }

    /// Mount a runner that works against externally supplied state
    pub fn mount_external(
        &mut self,
        name: impl Into<String>,
        factory: Arc<dyn ProgramFactory>,
        initial: Value,
    ) -> MountHandle {
        self.mount(Runner::external(name, factory, initial))
    }

    fn mount(&mut self, runner: Runner) -> MountHandle {
        let id = runner.id();
        let events = self.events_tx.clone();
        runner.store().set_notifier(Arc::new(move || {
            // Host dropped means nobody renders anymore
            let _ = events.send(HostEvent::Retrigger(id));
        }));

        info!(runner = %runner.name(), id = %id, mode = ?runner.mode(), "runner mounted");

        let handle = MountHandle {
            setter: runner.setter(),
            runner: runner.clone(),
        };
        self.runners.insert(
            id,
            Mounted {
                runner,
                last: None,
                in_flight: false,
            },
        );
        handle
    }

    pub fn unmount(&mut self, id: RunnerId) -> Result<(), HostError> {
        self.runners
            .remove(&id)
            .map(|_| ())
            .ok_or(HostError::UnknownRunner(id))
    }

    pub fn handle(&self, id: RunnerId) -> Result<MountHandle, HostError> {
        let mounted = self.runners.get(&id).ok_or(HostError::UnknownRunner(id))?;
        Ok(MountHandle {
            runner: mounted.runner.clone(),
            setter: mounted.runner.setter(),
        })
    }

    pub fn state(&self, id: RunnerId) -> Result<Snapshot, HostError> {
        self.runners
            .get(&id)
            .map(|m| m.runner.state())
            .ok_or(HostError::UnknownRunner(id))
    }

    pub fn setter(&self, id: RunnerId) -> Result<Option<StateSetter>, HostError> {
        self.runners
            .get(&id)
            .map(|m| m.runner.setter())
            .ok_or(HostError::UnknownRunner(id))
    }

    pub fn is_done(&self, id: RunnerId) -> Result<bool, HostError> {
        self.runners
            .get(&id)
            .map(|m| m.runner.is_done())
            .ok_or(HostError::UnknownRunner(id))
    }

    /// Post a new external snapshot for a runner in external mode
    pub fn set_external(&self, id: RunnerId, state: Value) -> Result<(), HostError> {
        let mounted = self.runners.get(&id).ok_or(HostError::UnknownRunner(id))?;
        if mounted.runner.mode() == Mode::Owned {
            return Err(RunnerError::OwnedState {
                runner: mounted.runner.name().to_string(),
            }
            .into());
        }
        // The receiver lives as long as self
        let _ = self
            .events_tx
            .send(HostEvent::External(id, Arc::new(state)));
        Ok(())
    }

    /// Process events and activations until nothing is left to do
    ///
    /// Returns the first fatal runner error. Timers and calls inside drains
    /// run on the tokio runtime, so this future completes only once every
    /// runner is suspended on state or done.
    pub async fn run_until_idle(&mut self) -> Result<(), HostError> {
        loop {
            while let Ok(event) = self.events_rx.try_recv() {
                self.absorb(event);
            }

            self.schedule();

            if self.tasks.is_empty() {
                return Ok(());
            }

            tokio::select! {
                Some(event) = self.events_rx.recv() => self.absorb(event),
                Some(joined) = self.tasks.join_next() => self.finish(joined?)?,
            }
        }
    }

    fn absorb(&mut self, event: HostEvent) {
        match event {
            HostEvent::Retrigger(id) => {
                trace!(id = %id, "retrigger");
            }
            HostEvent::External(id, snapshot) => match self.runners.get(&id) {
                Some(mounted) => {
                    if let Err(err) = mounted.runner.supply(snapshot) {
                        warn!(id = %id, error = %err, "external state rejected");
                    }
                }
                None => debug!(id = %id, "external state for unmounted runner ignored"),
            },
        }
    }

    /// Activate every idle runner whose dependencies changed
    fn schedule(&mut self) {
        for (id, mounted) in self.runners.iter_mut() {
            if mounted.in_flight || mounted.runner.status().faulted {
                continue;
            }

            let version = mounted.runner.version();
            if mounted.last == Some(version) {
                continue;
            }

            mounted.in_flight = true;
            let runner = mounted.runner.clone();
            let id = *id;
            self.tasks.spawn(async move {
                let result = runner.activate().await;
                (id, version, result)
            });
        }
    }

    fn finish(&mut self, (id, version, result): Joined) -> Result<(), HostError> {
        let Some(mounted) = self.runners.get_mut(&id) else {
            // unmounted while draining
            return result.map(|_| ()).map_err(HostError::from);
        };
        mounted.in_flight = false;

        match result {
            Ok(Activation::Skipped) => {
                debug!(runner = %mounted.runner.name(), "activation skipped by runner guard");
            }
            Ok(Activation::Suspended { suspension, .. }) => {
                debug!(runner = %mounted.runner.name(), ?suspension, version, "activation finished");
                mounted.last = Some(version);
            }
            Err(err) => {
                mounted.last = Some(version);
                return Err(err.into());
            }
        }
        Ok(())
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}
