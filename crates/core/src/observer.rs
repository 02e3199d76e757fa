//! Observer Registry
//!
//! Typed listener registry with snapshot dispatch. A [`Subsystem`] supplies
//! the observer type, derives one payload per round from a raw event and
//! knows how to hand that payload to a single observer. The registry takes
//! care of ordering, identity and serialization of rounds.
//!
//! Rounds are serialized with a re-entrant lock held for the whole round, so
//! an observer may register or unregister observers (itself included) from
//! inside its own callback. The live list is never iterated directly: each
//! round walks a snapshot captured when it began, newest registration first,
//! and checks each entry is still registered before delivering to it.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use tracing::{debug, warn};

use crate::error::{DroidKitError, Result};

/// Identifier assigned to each registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// An event category served by one [`ObserverRegistry`]
pub trait Subsystem {
    /// The raw event that triggers a round
    type Raw;
    /// The notification built once per round and shared by all observers
    type Payload;
    /// The listener type, usually a trait object
    type Observer: ?Sized + Send + Sync;

    /// Name used in log output
    fn name(&self) -> &str {
        "observers"
    }

    /// Build the payload for one round. An error aborts the round before
    /// any observer is called.
    fn derive(&self, raw: &Self::Raw) -> Result<Self::Payload>;

    /// Hand the payload to one observer
    fn deliver(&self, observer: &Self::Observer, payload: &Self::Payload) -> Result<()>;
}

/// A notification an observer rejected
#[derive(Debug)]
pub struct DeliveryFailure {
    pub observer: ObserverId,
    pub error: DroidKitError,
}

/// Outcome of one dispatch round
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Observers that accepted the payload
    pub notified: usize,
    /// Snapshot members unregistered before their turn came
    pub skipped: usize,
    /// Observers whose delivery failed
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    /// True when every delivery attempted in the round succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of failed deliveries
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

struct Entry<O: ?Sized> {
    id: ObserverId,
    observer: Arc<O>,
}

struct RegistryState<O: ?Sized> {
    entries: Vec<Entry<O>>,
    next_id: u64,
    dispatching: bool,
}

impl<O: ?Sized> RegistryState<O> {
    fn position(&self, observer: &Arc<O>) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| same_observer(&entry.observer, observer))
    }

    fn contains_id(&self, id: ObserverId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }
}

/// Pointer identity, ignoring trait object metadata
fn same_observer<O: ?Sized>(a: &Arc<O>, b: &Arc<O>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Clears the in-progress flag when a round ends, including by unwinding
struct RoundGuard<'a, O: ?Sized> {
    state: &'a RefCell<RegistryState<O>>,
}

impl<O: ?Sized> Drop for RoundGuard<'_, O> {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.dispatching = false;
        }
    }
}

/// Registry of observers for one [`Subsystem`]
pub struct ObserverRegistry<S: Subsystem> {
    subsystem: S,
    state: ReentrantMutex<RefCell<RegistryState<S::Observer>>>,
}

impl<S: Subsystem> ObserverRegistry<S> {
    /// Create an empty registry
    pub fn new(subsystem: S) -> Self {
        Self {
            subsystem,
            state: ReentrantMutex::new(RefCell::new(RegistryState {
                entries: Vec::new(),
                next_id: 1,
                dispatching: false,
            })),
        }
    }

    /// The subsystem this registry serves
    pub fn subsystem(&self) -> &S {
        &self.subsystem
    }

    /// Register an observer.
    ///
    /// Returns the new registration id, or `None` if the observer is
    /// already registered. A registration made during a round is picked up
    /// by the next round.
    pub fn register(&self, observer: Arc<S::Observer>) -> Option<ObserverId> {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        if let Some(pos) = state.position(&observer) {
            debug!(
                "{}: {} already registered",
                self.subsystem.name(),
                state.entries[pos].id
            );
            return None;
        }

        let id = ObserverId(state.next_id);
        state.next_id += 1;
        state.entries.push(Entry { id, observer });
        debug!("{}: registered {} ({} total)", self.subsystem.name(), id, state.entries.len());
        Some(id)
    }

    /// Unregister an observer. Returns whether it was registered.
    pub fn unregister(&self, observer: &Arc<S::Observer>) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        match state.position(observer) {
            Some(pos) => {
                let entry = state.entries.remove(pos);
                debug!("{}: unregistered {}", self.subsystem.name(), entry.id);
                true
            }
            None => false,
        }
    }

    /// Unregister by registration id. Returns whether it was registered.
    pub fn unregister_id(&self, id: ObserverId) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        let before = state.entries.len();
        state.entries.retain(|entry| entry.id != id);
        before != state.entries.len()
    }

    /// Registration id of an observer, if registered
    pub fn id_of(&self, observer: &Arc<S::Observer>) -> Option<ObserverId> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.position(observer).map(|pos| state.entries[pos].id)
    }

    /// Check whether an observer is registered
    pub fn contains(&self, observer: &Arc<S::Observer>) -> bool {
        self.id_of(observer).is_some()
    }

    /// Number of registered observers
    pub fn count(&self) -> usize {
        self.state.lock().borrow().entries.len()
    }

    /// Check whether no observer is registered
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Remove every observer
    pub fn clear(&self) {
        let guard = self.state.lock();
        guard.borrow_mut().entries.clear();
    }

    /// Run one dispatch round.
    ///
    /// Derives the payload from `raw`, then delivers it to every observer
    /// registered when the round began, newest registration first. An
    /// observer unregistered earlier in the same round is skipped. A failed
    /// delivery is logged and recorded in the report; it does not stop the
    /// round.
    ///
    /// Fails without notifying anyone if derivation fails, or if called
    /// from inside a round of this registry on the same thread.
    pub fn dispatch(&self, raw: &S::Raw) -> Result<DispatchReport> {
        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            if state.dispatching {
                return Err(DroidKitError::DispatchInProgress);
            }
            state.dispatching = true;
        }
        let _round = RoundGuard { state: &*guard };

        let payload = self
            .subsystem
            .derive(raw)
            .inspect_err(|e| debug!("{}: round aborted, {}", self.subsystem.name(), e))?;

        let snapshot: Vec<(ObserverId, Arc<S::Observer>)> = guard
            .borrow()
            .entries
            .iter()
            .rev()
            .map(|entry| (entry.id, Arc::clone(&entry.observer)))
            .collect();

        let mut report = DispatchReport::default();
        for (id, observer) in snapshot {
            if !guard.borrow().contains_id(id) {
                report.skipped += 1;
                continue;
            }

            match self.subsystem.deliver(&observer, &payload) {
                Ok(()) => report.notified += 1,
                Err(error) => {
                    warn!("{}: delivery to {} failed: {}", self.subsystem.name(), id, error);
                    report.failures.push(DeliveryFailure { observer: id, error });
                }
            }
        }

        debug!(
            "{}: round delivered to {} observers ({} skipped, {} failed)",
            self.subsystem.name(),
            report.notified,
            report.skipped,
            report.failed()
        );
        Ok(report)
    }
}

impl<S: Subsystem + Default> Default for ObserverRegistry<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    trait TestListener: Send + Sync {
        fn notify(&self, round: &u32) -> Result<()>;
    }

    struct TestSubsystem;

    impl Subsystem for TestSubsystem {
        type Raw = i32;
        type Payload = u32;
        type Observer = dyn TestListener;

        fn derive(&self, raw: &i32) -> Result<u32> {
            u32::try_from(*raw).map_err(|_| DroidKitError::Derivation(format!("negative round {}", raw)))
        }

        fn deliver(&self, observer: &dyn TestListener, payload: &u32) -> Result<()> {
            observer.notify(payload)
        }
    }

    type TestRegistry = ObserverRegistry<TestSubsystem>;
    type Journal = Arc<Mutex<Vec<(u32, &'static str)>>>;
    type Hook = Box<dyn Fn(u32) + Send + Sync>;

    struct Recorder {
        name: &'static str,
        journal: Journal,
        hook: Option<Hook>,
        fail: bool,
        pause: Option<Duration>,
    }

    impl TestListener for Recorder {
        fn notify(&self, round: &u32) -> Result<()> {
            self.journal.lock().push((*round, self.name));
            if let Some(pause) = self.pause {
                thread::sleep(pause);
            }
            if let Some(hook) = &self.hook {
                hook(*round);
            }
            if self.fail {
                return Err(DroidKitError::Delivery(format!("{} refused", self.name)));
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, journal: &Journal) -> Arc<dyn TestListener> {
        Arc::new(Recorder {
            name,
            journal: Arc::clone(journal),
            hook: None,
            fail: false,
            pause: None,
        })
    }

    fn hooked(name: &'static str, journal: &Journal, hook: Hook) -> Arc<dyn TestListener> {
        Arc::new(Recorder {
            name,
            journal: Arc::clone(journal),
            hook: Some(hook),
            fail: false,
            pause: None,
        })
    }

    fn names(journal: &Journal) -> Vec<&'static str> {
        journal.lock().iter().map(|(_, name)| *name).collect()
    }

    #[test]
    fn test_register_counts_distinct_observers() {
        let registry = TestRegistry::new(TestSubsystem);
        let journal = Journal::default();
        let l1 = recorder("l1", &journal);
        let l2 = recorder("l2", &journal);

        assert!(registry.is_empty());
        assert!(registry.register(Arc::clone(&l1)).is_some());
        assert!(registry.register(Arc::clone(&l2)).is_some());
        assert_eq!(registry.count(), 2);

        assert!(registry.register(Arc::clone(&l1)).is_none());
        assert_eq!(registry.count(), 2);

        assert!(registry.unregister(&l1));
        assert!(!registry.unregister(&l1));
        assert_eq!(registry.count(), 1);
        assert!(!registry.contains(&l1));
        assert!(registry.contains(&l2));

        let id = registry.id_of(&l2).unwrap();
        assert!(registry.unregister_id(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let registry = TestRegistry::new(TestSubsystem);
        let journal = Journal::default();
        let l1 = recorder("l1", &journal);

        let first = registry.register(Arc::clone(&l1)).unwrap();
        registry.unregister(&l1);
        let second = registry.register(Arc::clone(&l1)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_dispatch_runs_newest_first() {
        let registry = TestRegistry::new(TestSubsystem);
        let journal = Journal::default();
        registry.register(recorder("l1", &journal));
        registry.register(recorder("l2", &journal));
        registry.register(recorder("l3", &journal));

        let report = registry.dispatch(&7).unwrap();
        assert_eq!(report.notified, 3);
        assert!(report.is_clean());
        assert_eq!(names(&journal), vec!["l3", "l2", "l1"]);
        assert!(journal.lock().iter().all(|(round, _)| *round == 7));
    }

    #[test]
    fn test_unregister_unvisited_during_round() {
        let registry = Arc::new(TestRegistry::new(TestSubsystem));
        let journal = Journal::default();
        let l1 = recorder("l1", &journal);
        let l3 = recorder("l3", &journal);
        let l2 = {
            let registry = Arc::clone(&registry);
            let l1 = Arc::clone(&l1);
            hooked("l2", &journal, Box::new(move |_: u32| {
                registry.unregister(&l1);
            }))
        };

        registry.register(Arc::clone(&l1));
        registry.register(l2);
        registry.register(l3);

        let report = registry.dispatch(&1).unwrap();
        assert_eq!(names(&journal), vec!["l3", "l2"]);
        assert_eq!(report.notified, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn test_unregister_visited_during_round() {
        let registry = Arc::new(TestRegistry::new(TestSubsystem));
        let journal = Journal::default();
        let l1 = recorder("l1", &journal);
        let l3 = recorder("l3", &journal);
        let l2 = {
            let registry = Arc::clone(&registry);
            let l3 = Arc::clone(&l3);
            hooked("l2", &journal, Box::new(move |_: u32| {
                assert!(registry.unregister(&l3));
            }))
        };

        registry.register(l1);
        registry.register(l2);
        registry.register(Arc::clone(&l3));

        let report = registry.dispatch(&1).unwrap();
        assert_eq!(names(&journal), vec!["l3", "l2", "l1"]);
        assert_eq!(report.notified, 3);
        assert_eq!(report.skipped, 0);
        assert!(!registry.contains(&l3));
    }

    #[test]
    fn test_unregister_self_during_round() {
        let registry = Arc::new(TestRegistry::new(TestSubsystem));
        let journal = Journal::default();
        let slot: Arc<Mutex<Option<Arc<dyn TestListener>>>> = Arc::default();
        let l1 = recorder("l1", &journal);
        let me = {
            let registry = Arc::clone(&registry);
            let slot = Arc::clone(&slot);
            hooked("me", &journal, Box::new(move |_: u32| {
                if let Some(me) = slot.lock().take() {
                    registry.unregister(&me);
                }
            }))
        };
        *slot.lock() = Some(Arc::clone(&me));

        registry.register(l1);
        registry.register(me);

        registry.dispatch(&1).unwrap();
        registry.dispatch(&2).unwrap();
        assert_eq!(names(&journal), vec!["me", "l1", "l1"]);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn test_register_during_round_waits_for_next_round() {
        let registry = Arc::new(TestRegistry::new(TestSubsystem));
        let journal = Journal::default();
        let l4 = recorder("l4", &journal);
        let l2 = {
            let registry = Arc::clone(&registry);
            let l4 = Arc::clone(&l4);
            hooked("l2", &journal, Box::new(move |_: u32| {
                registry.register(Arc::clone(&l4));
            }))
        };

        registry.register(recorder("l1", &journal));
        registry.register(l2);
        registry.register(recorder("l3", &journal));

        registry.dispatch(&1).unwrap();
        assert_eq!(names(&journal), vec!["l3", "l2", "l1"]);
        assert_eq!(registry.count(), 4);

        journal.lock().clear();
        registry.dispatch(&2).unwrap();
        assert_eq!(names(&journal), vec!["l4", "l3", "l2", "l1"]);
    }

    #[test]
    fn test_failed_delivery_does_not_stop_round() {
        let registry = TestRegistry::new(TestSubsystem);
        let journal = Journal::default();
        registry.register(recorder("l1", &journal));
        let failing = registry
            .register(Arc::new(Recorder {
                name: "l2",
                journal: Arc::clone(&journal),
                hook: None,
                fail: true,
                pause: None,
            }))
            .unwrap();
        registry.register(recorder("l3", &journal));

        let report = registry.dispatch(&3).unwrap();
        assert_eq!(names(&journal), vec!["l3", "l2", "l1"]);
        assert_eq!(report.notified, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].observer, failing);
        assert!(matches!(report.failures[0].error, DroidKitError::Delivery(_)));
    }

    #[test]
    fn test_derivation_failure_notifies_nobody() {
        let registry = TestRegistry::new(TestSubsystem);
        let journal = Journal::default();
        registry.register(recorder("l1", &journal));

        let result = registry.dispatch(&-1);
        assert!(matches!(result, Err(DroidKitError::Derivation(_))));
        assert!(journal.lock().is_empty());

        // The registry is usable after an aborted round
        assert_eq!(registry.dispatch(&1).unwrap().notified, 1);
    }

    #[test]
    fn test_nested_dispatch_is_refused() {
        let registry = Arc::new(TestRegistry::new(TestSubsystem));
        let journal = Journal::default();
        let refused = Arc::new(Mutex::new(None));
        let nested = {
            let registry = Arc::clone(&registry);
            let refused = Arc::clone(&refused);
            hooked("nested", &journal, Box::new(move |_: u32| {
                let result = registry.dispatch(&99);
                *refused.lock() = Some(matches!(result, Err(DroidKitError::DispatchInProgress)));
            }))
        };

        registry.register(recorder("l1", &journal));
        registry.register(nested);

        let report = registry.dispatch(&1).unwrap();
        assert_eq!(report.notified, 2);
        assert_eq!(*refused.lock(), Some(true));
        assert_eq!(names(&journal), vec!["nested", "l1"]);
    }

    #[test]
    fn test_registry_recovers_after_panicking_observer() {
        let registry = TestRegistry::new(TestSubsystem);
        let journal = Journal::default();
        let panicky = hooked("panicky", &journal, Box::new(|_: u32| panic!("observer blew up")));
        registry.register(Arc::clone(&panicky));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| registry.dispatch(&1)));
        assert!(outcome.is_err());

        registry.unregister(&panicky);
        registry.register(recorder("l1", &journal));
        assert_eq!(registry.dispatch(&2).unwrap().notified, 1);
    }

    #[test]
    fn test_concurrent_rounds_do_not_interleave() {
        let registry = Arc::new(TestRegistry::new(TestSubsystem));
        let journal = Journal::default();
        for name in ["l1", "l2", "l3"] {
            registry.register(Arc::new(Recorder {
                name,
                journal: Arc::clone(&journal),
                hook: None,
                fail: false,
                pause: Some(Duration::from_millis(2)),
            }));
        }

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = [10, 20]
            .into_iter()
            .map(|round| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.dispatch(&round).unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap().notified, 3);
        }

        let entries = journal.lock().clone();
        assert_eq!(entries.len(), 6);
        for round in entries.chunks(3) {
            assert!(round.iter().all(|(r, _)| *r == round[0].0));
            let order: Vec<_> = round.iter().map(|(_, name)| *name).collect();
            assert_eq!(order, vec!["l3", "l2", "l1"]);
        }
        assert_ne!(entries[0].0, entries[3].0);
    }
}
