//! Deterministic timer scheduling for the player.
//!
//! The engine never sleeps: every suspension point (post-shift delay,
//! readiness re-poll, state debounce, watchdog deadline) is a callback
//! deferred onto a single [`TimerQueue`], which fires timers by deadline
//! and breaks ties by admission order. The host drives the queue by
//! calling [`Timers::run_due`] whenever time may have advanced.
//!
//! # Invariants
//!
//! - **Stable firing:** timers with equal deadlines fire in the order they
//!   were deferred.
//! - **No reentrancy:** callbacks run with no queue borrow held, so a firing
//!   timer may freely defer or cancel other timers.
//! - **Cancellation is cheap:** a cancelled id is skipped when popped, never
//!   removed from the heap eagerly.

use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// A monotonic clock source.
pub trait Clock {
    /// Current time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Milliseconds elapsed since the clock was created.
///
/// Backed by [`Instant`], so host wall-clock adjustments cannot move the
/// scheduler backwards mid-run.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    started: Instant,
}

impl WallClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// A manually advanced clock for deterministic tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    current_ms: Cell<u64>,
}

impl ManualClock {
    /// Create a clock starting at the given time.
    #[must_use]
    pub const fn new(start_ms: u64) -> Self {
        Self {
            current_ms: Cell::new(start_ms),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, ms: u64) {
        self.current_ms.set(self.current_ms.get().saturating_add(ms));
    }

    /// Set the clock to a specific time. Never moves backwards.
    pub fn set(&self, ms: u64) {
        if ms > self.current_ms.get() {
            self.current_ms.set(ms);
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.current_ms.get()
    }
}

/// Handle returned by [`Timers::defer`], usable for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

struct TimerEntry {
    id: u64,
    deadline_ms: u64,
    /// Admission counter value, so equal deadlines keep defer order.
    admitted: u64,
    callback: Box<dyn FnOnce()>,
}

impl TimerEntry {
    /// Position of this entry in the firing order.
    const fn order(&self) -> (u64, u64) {
        (self.deadline_ms, self.admitted)
    }
}

impl fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEntry")
            .field("id", &self.id)
            .field("deadline_ms", &self.deadline_ms)
            .field("admitted", &self.admitted)
            .finish_non_exhaustive()
    }
}

// Entries sort ascending on (deadline, admission). The queue stores them
// wrapped in `Reverse` so the entry that must fire next is the one on top
// of the max-heap.
impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.order() == other.order()
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order().cmp(&other.order())
    }
}

#[derive(Default)]
struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    cancelled: HashSet<u64>,
    next_id: u64,
    /// Counts admissions; copied onto each entry for tie-breaking.
    admitted: u64,
}

/// Shared handle to the timer queue.
///
/// Cheap to clone; all holders observe the same queue. Single-threaded by
/// contract: everything runs on the host's scheduling thread.
#[derive(Clone)]
pub struct Timers {
    queue: Rc<RefCell<TimerQueue>>,
    clock: Rc<dyn Clock>,
}

impl Timers {
    /// Create a timer queue over the given clock.
    #[must_use]
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            queue: Rc::new(RefCell::new(TimerQueue::default())),
            clock,
        }
    }

    /// Current time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Schedule `callback` to run once `delay_ms` has elapsed.
    pub fn defer(&self, delay_ms: u64, callback: impl FnOnce() + 'static) -> TimerId {
        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        queue.admitted += 1;
        let id = queue.next_id;
        let admitted = queue.admitted;
        let deadline_ms = self.clock.now_ms().saturating_add(delay_ms);

        queue.heap.push(Reverse(TimerEntry {
            id,
            deadline_ms,
            admitted,
            callback: Box::new(callback),
        }));

        tracing::trace!(
            event = "timers.defer",
            timer_id = id,
            delay_ms,
            deadline_ms,
            admitted,
            "Timer scheduled"
        );

        TimerId(id)
    }

    /// Cancel a scheduled timer.
    ///
    /// Returns true if the timer had not yet fired or been cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        let inserted = self.queue.borrow_mut().cancelled.insert(id.0);
        tracing::trace!(
            event = "timers.cancel",
            timer_id = id.0,
            cancelled = inserted,
            "Timer cancelled"
        );
        inserted
    }

    /// Run every timer due at the time of the call.
    ///
    /// Callbacks run outside the queue borrow and may defer further timers;
    /// a zero-delay timer deferred from a callback runs within the same
    /// call. Returns the number of callbacks that ran.
    pub fn run_due(&self) -> usize {
        let now = self.clock.now_ms();
        let mut ran = 0;

        loop {
            let entry = {
                let mut queue = self.queue.borrow_mut();
                let due = queue
                    .heap
                    .peek()
                    .is_some_and(|Reverse(entry)| entry.deadline_ms <= now);
                if !due {
                    break;
                }
                let Some(Reverse(entry)) = queue.heap.pop() else {
                    break;
                };
                if queue.cancelled.remove(&entry.id) {
                    continue;
                }
                entry
            };

            tracing::trace!(
                event = "timers.fire",
                timer_id = entry.id,
                deadline_ms = entry.deadline_ms,
                now_ms = now,
                "Timer fired"
            );
            (entry.callback)();
            ran += 1;
        }

        ran
    }

    /// Deadline of the earliest live timer, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        let queue = self.queue.borrow();
        queue
            .heap
            .iter()
            .filter(|Reverse(entry)| !queue.cancelled.contains(&entry.id))
            .map(|Reverse(entry)| entry.deadline_ms)
            .min()
    }

    /// True when no live timers remain.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.next_deadline().is_none()
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.queue.borrow();
        f.debug_struct("Timers")
            .field("pending", &queue.heap.len())
            .field("cancelled", &queue.cancelled.len())
            .field("admitted", &queue.admitted)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> (Rc<ManualClock>, Timers) {
        let clock = Rc::new(ManualClock::new(0));
        let timers = Timers::new(clock.clone());
        (clock, timers)
    }

    #[test]
    fn wall_clock_never_moves_backwards() {
        let clock = WallClock::new();
        let first = clock.now_ms();
        let second = clock.now_ms();
        assert!(second >= first);
    }

    #[test]
    fn entry_order_prefers_earlier_deadline_then_admission() {
        let entry = |deadline_ms, admitted| TimerEntry {
            id: 0,
            deadline_ms,
            admitted,
            callback: Box::new(|| {}),
        };

        assert!(entry(100, 5) < entry(200, 1));
        assert!(entry(100, 1) < entry(100, 2));
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let (clock, timers) = manual();
        let fired = Rc::new(RefCell::new(Vec::new()));

        for (label, delay) in [("c", 300u64), ("a", 100), ("b", 200)] {
            let fired = fired.clone();
            timers.defer(delay, move || fired.borrow_mut().push(label));
        }

        clock.advance(400);
        assert_eq!(timers.run_due(), 3);
        assert_eq!(*fired.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn equal_deadlines_fire_in_defer_order() {
        let (clock, timers) = manual();
        let fired = Rc::new(RefCell::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let fired = fired.clone();
            timers.defer(50, move || fired.borrow_mut().push(label));
        }

        clock.advance(50);
        timers.run_due();
        assert_eq!(*fired.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let (clock, timers) = manual();
        let fired = Rc::new(Cell::new(false));

        let fired2 = fired.clone();
        let id = timers.defer(10, move || fired2.set(true));
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));

        clock.advance(20);
        assert_eq!(timers.run_due(), 0);
        assert!(!fired.get());
        assert!(timers.is_idle());
    }

    #[test]
    fn not_due_timer_does_not_fire_early() {
        let (clock, timers) = manual();
        let fired = Rc::new(Cell::new(false));

        let fired2 = fired.clone();
        timers.defer(100, move || fired2.set(true));

        clock.advance(99);
        assert_eq!(timers.run_due(), 0);
        assert!(!fired.get());
        assert_eq!(timers.next_deadline(), Some(100));
    }

    #[test]
    fn zero_delay_timer_deferred_from_callback_runs_same_pass() {
        let (_clock, timers) = manual();
        let fired = Rc::new(RefCell::new(Vec::new()));

        let inner_fired = fired.clone();
        let inner_timers = timers.clone();
        timers.defer(0, move || {
            inner_fired.borrow_mut().push("outer");
            let fired = inner_fired.clone();
            inner_timers.defer(0, move || fired.borrow_mut().push("nested"));
        });

        assert_eq!(timers.run_due(), 2);
        assert_eq!(*fired.borrow(), vec!["outer", "nested"]);
    }
}
