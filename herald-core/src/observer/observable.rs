//! Observable: occurrence state and dispatch rounds
//!
//! A round runs `flag high -> deliver to snapshot -> flag low`. While the
//! round is being delivered every handler (and anything a handler calls back
//! into) sees `is_occurred() == true` and the same [`Event`]. The flag is
//! lowered when the round ends, whether it completed or a handler failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::error::{CoreError, CoreResult};
use crate::observer::handler::Handler;
use crate::observer::registry::{Registry, Snapshot};

const DEFAULT_MESSAGE: &str = "Security breach at headquarters";

/// Immutable value shared by every handler of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// 1-based sequence number of the round that produced this event
    pub round: u64,
    pub payload: Option<CompactString>,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    fn new(round: u64, payload: Option<CompactString>) -> Self {
        Self {
            round,
            payload,
            occurred_at: Utc::now(),
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.payload.as_deref()
    }
}

pub struct Observable {
    registry: Registry<dyn Handler>,

    occurred: AtomicBool,

    /// Event of the current (or most recent) round
    current: ArcSwapOption<Event>,

    /// Payload used by [`Observable::trigger`]
    message: CompactString,

    next_round: AtomicU64,
    completed_rounds: AtomicU64,

    /// Held for the duration of a round
    round_lock: Mutex<()>,

    /// Thread delivering the current round
    round_owner: Mutex<Option<ThreadId>>,

    config: DispatchConfig,
}

impl Observable {
    pub fn new(message: impl Into<CompactString>) -> Self {
        Self::with_config(message, DispatchConfig::default())
    }

    pub fn with_config(message: impl Into<CompactString>, config: DispatchConfig) -> Self {
        Self {
            registry: Registry::new(),
            occurred: AtomicBool::new(false),
            current: ArcSwapOption::empty(),
            message: message.into(),
            next_round: AtomicU64::new(1),
            completed_rounds: AtomicU64::new(0),
            round_lock: Mutex::new(()),
            round_owner: Mutex::new(None),
            config,
        }
    }

    pub fn registry(&self) -> &Registry<dyn Handler> {
        &self.registry
    }

    pub fn add_handler(&self, handler: Arc<dyn Handler>) {
        debug!("Registering handler: {}", handler.name());
        self.registry.add(handler);
    }

    /// Returns `false` when `handler` was not registered.
    pub fn remove_handler(&self, handler: &Arc<dyn Handler>) -> bool {
        self.registry.remove(handler)
    }

    /// True only while a round is being delivered.
    pub fn is_occurred(&self) -> bool {
        self.occurred.load(Ordering::Acquire)
    }

    /// Event of the round in flight, or of the last round once it has ended.
    pub fn event(&self) -> Option<Arc<Event>> {
        self.current.load_full()
    }

    /// Payload of the current round's event
    pub fn payload(&self) -> Option<CompactString> {
        self.current
            .load_full()
            .and_then(|event: Arc<Event>| event.payload.clone())
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn completed_rounds(&self) -> u64 {
        self.completed_rounds.load(Ordering::Relaxed)
    }

    /// Run a round carrying the default message.
    pub fn trigger(&self) -> CoreResult<Arc<Event>> {
        self.mark_occurred(Some(self.message.clone()))
    }

    /// Raise the flag, deliver one round to the current snapshot of handlers
    /// in registration order, then lower the flag.
    ///
    /// Delivery stops at the first failing handler and its error is returned.
    /// A trigger from inside the round (a handler, or code it calls) yields
    /// [`CoreError::RoundInProgress`] without touching state. A trigger from
    /// another thread waits for the current round to end and then runs its own.
    pub fn mark_occurred(&self, payload: Option<CompactString>) -> CoreResult<Arc<Event>> {
        let caller: ThreadId = thread::current().id();
        if *self.round_owner.lock() == Some(caller) {
            return Err(CoreError::RoundInProgress);
        }

        let _round = self.round_lock.lock();
        *self.round_owner.lock() = Some(caller);
        let _owner = ReleaseOnDrop(&self.round_owner);

        let round: u64 = self.next_round.fetch_add(1, Ordering::Relaxed);
        let event: Arc<Event> = Arc::new(Event::new(round, payload));
        let snapshot: Snapshot<dyn Handler> = self.registry.snapshot();

        self.current.store(Some(Arc::clone(&event)));
        self.occurred.store(true, Ordering::Release);
        let _lower = LowerOnDrop(&self.occurred);

        let started: Instant = Instant::now();

        for handler in &snapshot {
            self.respond(handler.as_ref(), round)?;
        }

        self.completed_rounds.fetch_add(1, Ordering::Relaxed);

        if self.config.trace_rounds {
            debug!(
                round,
                handlers = snapshot.len(),
                "Round delivered in {:?}",
                started.elapsed()
            );
        }

        Ok(event)
    }

    fn respond(&self, handler: &dyn Handler, round: u64) -> CoreResult<()> {
        let started: Instant = Instant::now();
        let result: CoreResult<()> = handler.respond_to(self);
        let elapsed: Duration = started.elapsed();

        if self.config.is_slow(elapsed) {
            warn!(round, "Handler {} took {:?}", handler.name(), elapsed);
        }

        if let Err(e) = &result {
            warn!(round, "Handler {} failed, round aborted: {}", handler.name(), e);
        }

        result
    }
}

impl Default for Observable {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE)
    }
}

impl std::fmt::Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("handler_count", &self.registry.len())
            .field("occurred", &self.is_occurred())
            .field("completed_rounds", &self.completed_rounds())
            .finish()
    }
}

/// Lowers the occurrence flag when the round scope exits.
struct LowerOnDrop<'a>(&'a AtomicBool);

impl Drop for LowerOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Clears the round owner before the round lock is released.
struct ReleaseOnDrop<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for ReleaseOnDrop<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::handler::FnHandler;
    use std::sync::Barrier;

    #[test]
    fn test_flag_is_low_outside_rounds() {
        let subject = Observable::default();
        assert!(!subject.is_occurred());

        subject.trigger().unwrap();
        assert!(!subject.is_occurred());
        assert_eq!(subject.completed_rounds(), 1);
    }

    #[test]
    fn test_handlers_see_flag_and_payload() {
        let subject = Observable::default();
        let seen: Arc<Mutex<Vec<(bool, Option<CompactString>)>>> = Arc::default();

        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            subject.add_handler(Arc::new(FnHandler::new("probe", move |s: &Observable| {
                seen.lock().push((s.is_occurred(), s.payload()));
                Ok(())
            })));
        }

        subject
            .mark_occurred(Some(CompactString::const_new("door forced")))
            .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(flag, payload)| {
            *flag && payload.as_deref() == Some("door forced")
        }));
    }

    #[test]
    fn test_event_numbers_rounds() {
        let subject = Observable::new("ping");

        let first = subject.trigger().unwrap();
        let second = subject.mark_occurred(None).unwrap();

        assert_eq!(first.round, 1);
        assert_eq!(first.message(), Some("ping"));
        assert_eq!(second.round, 2);
        assert_eq!(second.message(), None);
        assert_eq!(subject.event().map(|e| e.round), Some(2));
    }

    #[test]
    fn test_failing_handler_stops_round_and_lowers_flag() {
        let subject = Observable::default();
        let calls: Arc<AtomicU64> = Arc::default();

        subject.add_handler(Arc::new(FnHandler::new("fails", |_: &Observable| {
            Err(CoreError::action_failed("fails", "boom"))
        })));
        let counter = Arc::clone(&calls);
        subject.add_handler(Arc::new(FnHandler::new("after", move |_: &Observable| {
            counter.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })));

        let err = subject.trigger().unwrap_err();

        assert_eq!(err, CoreError::action_failed("fails", "boom"));
        assert_eq!(calls.load(Ordering::Relaxed), 0);
        assert!(!subject.is_occurred());
        assert_eq!(subject.completed_rounds(), 0);
    }

    #[test]
    fn test_reentrant_trigger_is_rejected() {
        let subject = Observable::default();
        let nested: Arc<Mutex<Option<CoreResult<Arc<Event>>>>> = Arc::default();

        let slot = Arc::clone(&nested);
        subject.add_handler(Arc::new(FnHandler::new("reenter", move |s: &Observable| {
            *slot.lock() = Some(s.trigger());
            Ok(())
        })));

        let event = subject.trigger().unwrap();

        assert_eq!(event.round, 1);
        let nested = nested.lock().take().unwrap();
        assert_eq!(nested.unwrap_err(), CoreError::RoundInProgress);
        // The outer round kept its own event
        assert_eq!(subject.event().map(|e| e.round), Some(1));
    }

    #[test]
    fn test_trigger_from_other_thread_waits_for_round() {
        let subject = Observable::default();
        let entered: Arc<Barrier> = Arc::new(Barrier::new(2));
        let calls: Arc<AtomicU64> = Arc::default();

        let (gate, counter) = (Arc::clone(&entered), Arc::clone(&calls));
        subject.add_handler(Arc::new(FnHandler::new("slow", move |_: &Observable| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                gate.wait();
                thread::sleep(Duration::from_millis(20));
            }
            Ok(())
        })));

        thread::scope(|scope| {
            let first = scope.spawn(|| subject.trigger());
            entered.wait();
            let second = scope.spawn(|| subject.trigger());

            let mut rounds: Vec<u64> = [first, second]
                .into_iter()
                .map(|worker| worker.join().unwrap().unwrap().round)
                .collect();
            rounds.sort_unstable();
            assert_eq!(rounds, vec![1, 2]);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(subject.completed_rounds(), 2);
        assert!(!subject.is_occurred());
    }

    #[test]
    fn test_round_with_no_handlers_completes() {
        let subject = Observable::default();
        let event = subject.trigger().unwrap();

        assert_eq!(event.message(), Some(DEFAULT_MESSAGE));
        assert_eq!(subject.completed_rounds(), 1);
    }
}
