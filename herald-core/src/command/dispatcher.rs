//! Dispatcher: executes commands without knowing what they do
//!
//! The dispatcher is polymorphic over [`Command`] only. It reports `Idle` or
//! `Dispatching` from a count of calls in flight; every call executes its
//! command, including nested and concurrent ones. Command failures are
//! returned unchanged: no retries, no rollback.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use enum_map::{Enum, EnumMap, enum_map};
use tracing::{debug, warn};

use crate::command::traits::Command;
use crate::config::DispatchConfig;
use crate::error::CoreResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Dispatching,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
pub enum DispatchOutcome {
    Completed,
    Failed,
}

pub struct Dispatcher {
    /// Number of `dispatch` calls currently executing
    in_flight: AtomicUsize,

    outcomes: EnumMap<DispatchOutcome, AtomicU64>,

    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            outcomes: enum_map! {
                DispatchOutcome::Completed => AtomicU64::new(0),
                DispatchOutcome::Failed    => AtomicU64::new(0),
            },
            config,
        }
    }

    /// Execute `command` exactly once and hand back its result.
    ///
    /// Never refuses: a command may dispatch sub-commands through the same
    /// dispatcher, and several threads may share one.
    pub fn dispatch(&self, command: &dyn Command) -> CoreResult<()> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let _leave = LeaveOnDrop(&self.in_flight);

        let started: Instant = Instant::now();
        let result: CoreResult<()> = command.execute();
        let elapsed: Duration = started.elapsed();

        if self.config.is_slow(elapsed) {
            warn!("Command {} took {:?}", command.name(), elapsed);
        }

        match &result {
            Ok(()) => {
                self.outcomes[DispatchOutcome::Completed].fetch_add(1, Ordering::Relaxed);
                debug!("Dispatched {} in {:?}", command.name(), elapsed);
            }

            Err(e) => {
                self.outcomes[DispatchOutcome::Failed].fetch_add(1, Ordering::Relaxed);
                warn!("Command {} failed: {}", command.name(), e);
            }
        }

        result
    }

    pub fn state(&self) -> DispatchState {
        match self.in_flight.load(Ordering::Acquire) {
            0 => DispatchState::Idle,
            _ => DispatchState::Dispatching,
        }
    }

    /// Get a snapshot of the outcome counters.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            completed: self.outcomes[DispatchOutcome::Completed].load(Ordering::Relaxed),
            failed: self.outcomes[DispatchOutcome::Failed].load(Ordering::Relaxed),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("state", &self.state())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Drops the in-flight count on return, error or unwind.
struct LeaveOnDrop<'a>(&'a AtomicUsize);

impl Drop for LeaveOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub completed: u64,
    pub failed: u64,
}

impl DispatchStats {
    pub fn total(&self) -> u64 {
        self.completed + self.failed
    }
}

/// A dispatcher bound to a single command at construction.
pub struct Invoker {
    command: Arc<dyn Command>,
    dispatcher: Dispatcher,
}

impl Invoker {
    pub fn new(command: Arc<dyn Command>) -> Self {
        Self::with_config(command, DispatchConfig::default())
    }

    pub fn with_config(command: Arc<dyn Command>, config: DispatchConfig) -> Self {
        Self {
            command,
            dispatcher: Dispatcher::with_config(config),
        }
    }

    pub fn dispatch(&self) -> CoreResult<()> {
        self.dispatcher.dispatch(self.command.as_ref())
    }

    pub fn stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }
}

impl fmt::Debug for Invoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invoker")
            .field("command", &self.command.name())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::traits::FnCommand;
    use crate::error::CoreError;
    use parking_lot::Mutex;

    #[test]
    fn test_dispatch_executes_once() {
        let calls: Arc<AtomicU64> = Arc::default();
        let counter = Arc::clone(&calls);
        let command = FnCommand::new("count", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });

        let dispatcher = Dispatcher::new();
        dispatcher.dispatch(&command).unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(dispatcher.stats(), DispatchStats { completed: 1, failed: 0 });
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn test_failure_propagates_unchanged() {
        let command = FnCommand::new("deny", || Err(CoreError::action_failed("deny", "nope")));
        let dispatcher = Dispatcher::new();

        let err = dispatcher.dispatch(&command).unwrap_err();

        assert_eq!(err, CoreError::action_failed("deny", "nope"));
        assert_eq!(dispatcher.stats().failed, 1);
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn test_state_is_dispatching_during_execute() {
        let dispatcher: Arc<Dispatcher> = Arc::new(Dispatcher::new());
        let observed: Arc<Mutex<Option<DispatchState>>> = Arc::default();

        let (d, slot) = (Arc::clone(&dispatcher), Arc::clone(&observed));
        let command = FnCommand::new("peek", move || {
            *slot.lock() = Some(d.state());
            Ok(())
        });

        dispatcher.dispatch(&command).unwrap();

        assert_eq!(*observed.lock(), Some(DispatchState::Dispatching));
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn test_nested_dispatch_runs_inner_command() {
        let dispatcher: Arc<Dispatcher> = Arc::new(Dispatcher::new());
        let inner_calls: Arc<AtomicU64> = Arc::default();
        let nested: Arc<Mutex<Option<CoreResult<()>>>> = Arc::default();

        let (d, slot, counter) = (
            Arc::clone(&dispatcher),
            Arc::clone(&nested),
            Arc::clone(&inner_calls),
        );
        let outer = FnCommand::new("outer", move || {
            let counter = Arc::clone(&counter);
            let inner = FnCommand::new("inner", move || {
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            });
            *slot.lock() = Some(d.dispatch(&inner));
            assert_eq!(d.state(), DispatchState::Dispatching);
            Ok(())
        });

        dispatcher.dispatch(&outer).unwrap();

        assert_eq!(nested.lock().take(), Some(Ok(())));
        assert_eq!(inner_calls.load(Ordering::Relaxed), 1);
        assert_eq!(dispatcher.stats(), DispatchStats { completed: 2, failed: 0 });
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn test_shared_dispatcher_runs_every_concurrent_call() {
        let dispatcher = Dispatcher::new();
        let calls: Arc<AtomicU64> = Arc::default();

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let (dispatcher, calls) = (&dispatcher, Arc::clone(&calls));
                scope.spawn(move || {
                    for _ in 0..200 {
                        let counter = Arc::clone(&calls);
                        let command = FnCommand::new("tick", move || {
                            counter.fetch_add(1, Ordering::Relaxed);
                            Ok(())
                        });
                        dispatcher.dispatch(&command).unwrap_or_else(|e| {
                            panic!("worker {worker} dispatch refused: {e}")
                        });
                    }
                });
            }
        });

        assert_eq!(calls.load(Ordering::Relaxed), 800);
        assert_eq!(dispatcher.stats(), DispatchStats { completed: 800, failed: 0 });
        assert_eq!(dispatcher.state(), DispatchState::Idle);
    }

    #[test]
    fn test_invoker_dispatches_bound_command() {
        let calls: Arc<AtomicU64> = Arc::default();
        let counter = Arc::clone(&calls);
        let invoker = Invoker::new(Arc::new(FnCommand::new("bound", move || {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })));

        invoker.dispatch().unwrap();
        invoker.dispatch().unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(invoker.stats().completed, 2);
    }
}
