//! Test-block adaptor: wraps one user test body, owns its deadline, and
//! decides when the test has fully resolved.
//!
//! A block is finished only when **both** hold: the completion callback has
//! reported (or was never armed, for synchronous bodies) and the player has
//! drained (or was never engaged). The enclosing framework's `done` is
//! called exactly once, with the accumulated failures or success.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::catch_panic;
use crate::player::Player;
use crate::timer::{TimerId, Timers};

/// Default deadline for an asynchronous test body, in milliseconds.
pub const DEFAULT_BLOCK_TIMEOUT_MS: u64 = 10_000;

/// Continuation handed to asynchronous callbacks and test bodies.
///
/// Mimics the test framework's completion callback, including the `fail`
/// sibling. Single-shot: the second invocation is ignored with a warning.
#[derive(Clone)]
pub struct Done {
    inner: Rc<DoneInner>,
}

struct DoneInner {
    finished: Cell<bool>,
    on_finish: RefCell<Option<Box<dyn FnOnce(Result<(), String>)>>>,
    watchdog: RefCell<Option<WatchDog>>,
}

impl Done {
    /// Create a continuation invoking `on_finish` once.
    pub fn new(on_finish: impl FnOnce(Result<(), String>) + 'static) -> Self {
        Self {
            inner: Rc::new(DoneInner {
                finished: Cell::new(false),
                on_finish: RefCell::new(Some(Box::new(on_finish))),
                watchdog: RefCell::new(None),
            }),
        }
    }

    /// Report successful completion.
    pub fn ok(&self) {
        self.finish(Ok(()));
    }

    /// Report failure with a message.
    pub fn fail(&self, message: impl Into<String>) {
        self.finish(Err(message.into()));
    }

    /// Whether either side has already fired.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.finished.get()
    }

    pub(crate) fn attach_watchdog(&self, watchdog: WatchDog) {
        *self.inner.watchdog.borrow_mut() = Some(watchdog);
    }

    fn finish(&self, result: Result<(), String>) {
        if self.inner.finished.replace(true) {
            tracing::warn!(
                event = "done.duplicate",
                ok = result.is_ok(),
                "Completion callback invoked more than once; ignoring"
            );
            return;
        }
        if let Some(watchdog) = self.inner.watchdog.borrow_mut().take() {
            watchdog.cancel();
        }
        if let Some(on_finish) = self.inner.on_finish.borrow_mut().take() {
            on_finish(result);
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("finished", &self.inner.finished.get())
            .finish_non_exhaustive()
    }
}

/// Deadline attached to a single [`Done`].
pub struct WatchDog {
    timers: Timers,
    timer: Cell<Option<TimerId>>,
}

impl WatchDog {
    /// Arm a deadline: when it expires before the continuation fires, the
    /// continuation fails with a timeout message. A zero timeout arms
    /// nothing.
    ///
    /// `explicit` distinguishes a caller-chosen timeout from the default in
    /// the expiry message, because the default usually means the completion
    /// call was simply forgotten.
    pub fn arm(timers: &Timers, timeout_ms: u64, explicit: bool, done: &Done) {
        if timeout_ms == 0 {
            return;
        }
        let message = if explicit {
            format!("Timed out after {timeout_ms}ms")
        } else {
            format!(
                "Timed out after {timeout_ms}ms (default) - did you forget to call done()?"
            )
        };
        let expired = done.clone();
        let timer = timers.defer(timeout_ms, move || {
            tracing::debug!(event = "watchdog.expire", timeout_ms, "WatchDog expired");
            expired.fail(message);
        });
        done.attach_watchdog(Self {
            timers: timers.clone(),
            timer: Cell::new(Some(timer)),
        });
    }

    pub(crate) fn cancel(&self) {
        if let Some(timer) = self.timer.take() {
            self.timers.cancel(timer);
        }
    }
}

impl fmt::Debug for WatchDog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchDog")
            .field("armed", &self.timer.get().is_some())
            .finish_non_exhaustive()
    }
}

/// A user test body.
///
/// `Sync` bodies complete on return; `Async` bodies declare a completion
/// parameter and complete when it fires.
pub enum TestBody {
    Sync(Box<dyn FnOnce() -> Result<(), String>>),
    Async(Box<dyn FnOnce(Done) -> Result<(), String>>),
}

impl TestBody {
    /// A body completing on return.
    pub fn sync(f: impl FnOnce() -> Result<(), String> + 'static) -> Self {
        Self::Sync(Box::new(f))
    }

    /// A body completing when the supplied [`Done`] fires.
    pub fn with_done(f: impl FnOnce(Done) -> Result<(), String> + 'static) -> Self {
        Self::Async(Box::new(f))
    }
}

impl fmt::Debug for TestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("TestBody::Sync"),
            Self::Async(_) => f.write_str("TestBody::Async"),
        }
    }
}

/// How a block resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(Vec<String>),
}

impl Outcome {
    #[must_use]
    pub const fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

struct BlockInner {
    player: Player,
    timers: Timers,
    timeout_ms: u64,
    explicit_timeout: bool,
    failures: Vec<String>,
    watch_done: bool,
    player_done: bool,
    running: bool,
    finished: bool,
    on_done: Option<Box<dyn FnOnce(Outcome)>>,
}

/// Wraps one user test function for the span of its execution.
#[derive(Clone)]
pub struct Block {
    inner: Rc<RefCell<BlockInner>>,
}

impl Block {
    /// Create a block over the given player. `timeout_ms: None` applies the
    /// default deadline and marks it implicit for the expiry message.
    #[must_use]
    pub fn new(player: Player, timers: Timers, timeout_ms: Option<u64>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BlockInner {
                player,
                timers,
                timeout_ms: timeout_ms.unwrap_or(DEFAULT_BLOCK_TIMEOUT_MS),
                explicit_timeout: timeout_ms.is_some(),
                failures: Vec::new(),
                watch_done: false,
                player_done: false,
                running: false,
                finished: false,
                on_done: None,
            })),
        }
    }

    /// Whether the wrapped body has started and not yet resolved.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.borrow().running
    }

    /// Record a failure against the block (player errors, uncaught host
    /// errors). Ignored once the block has resolved.
    pub fn note_failure(&self, message: impl Into<String>) {
        let mut inner = self.inner.borrow_mut();
        if inner.finished {
            return;
        }
        inner.failures.push(message.into());
    }

    /// Run the body. `on_done` fires exactly once when the block fully
    /// resolves; failures never propagate past it.
    pub fn run(&self, body: TestBody, on_done: impl FnOnce(Outcome) + 'static) {
        let (player, timers, timeout_ms, explicit) = {
            let mut inner = self.inner.borrow_mut();
            inner.running = true;
            inner.on_done = Some(Box::new(on_done));
            (
                inner.player.clone(),
                inner.timers.clone(),
                inner.timeout_ms,
                inner.explicit_timeout,
            )
        };

        // Player failures during the block count as spec failures.
        let errors = self.clone();
        player.on_error(move |message| errors.note_failure(message));

        tracing::debug!(event = "block.start", timeout_ms, body = ?body, "Block started");

        match body {
            TestBody::Sync(f) => {
                let result = catch_panic(f).and_then(|r| r);
                let mut inner = self.inner.borrow_mut();
                inner.watch_done = true;
                if let Err(message) = result {
                    inner.failures.push(message);
                }
            }
            TestBody::Async(f) => {
                let watched = self.clone();
                let done = Done::new(move |result| watched.watch_finished(result));
                WatchDog::arm(&timers, timeout_ms, explicit, &done);

                let result = catch_panic(move || f(done)).and_then(|r| r);
                if let Err(message) = result {
                    // The body failed before its continuation could fire:
                    // resolve the watch side immediately.
                    let mut inner = self.inner.borrow_mut();
                    inner.failures.push(message);
                    inner.watch_done = true;
                }
            }
        }

        if player.has_pending() {
            let drained = self.clone();
            player.on_end_once(move || drained.player_finished());
        } else {
            self.inner.borrow_mut().player_done = true;
        }

        self.maybe_finish();
    }

    fn watch_finished(&self, result: Result<(), String>) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.finished || inner.watch_done {
                return;
            }
            inner.watch_done = true;
            if let Err(message) = result {
                inner.failures.push(message);
            }
        }
        self.maybe_finish();
    }

    fn player_finished(&self) {
        self.inner.borrow_mut().player_done = true;
        self.maybe_finish();
    }

    fn maybe_finish(&self) {
        let (on_done, outcome) = {
            let mut inner = self.inner.borrow_mut();
            if inner.finished || !inner.watch_done || !inner.player_done {
                return;
            }
            inner.finished = true;
            inner.running = false;
            let outcome = if inner.failures.is_empty() {
                Outcome::Passed
            } else {
                Outcome::Failed(std::mem::take(&mut inner.failures))
            };
            (inner.on_done.take(), outcome)
        };

        tracing::debug!(
            event = "block.finish",
            passed = outcome.passed(),
            "Block resolved"
        );
        if let Some(on_done) = on_done {
            on_done(outcome);
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Block")
            .field("running", &inner.running)
            .field("finished", &inner.finished)
            .field("failures", &inner.failures.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn done_is_single_shot() {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let done = Done::new(move |_| seen.set(seen.get() + 1));

        done.ok();
        done.fail("late");
        assert_eq!(count.get(), 1);
        assert!(done.is_finished());
    }

    #[test]
    fn watchdog_expiry_mentions_forgotten_done_for_default_timeout() {
        let clock = Rc::new(crate::timer::ManualClock::new(0));
        let timers = Timers::new(clock.clone());
        let failure = Rc::new(RefCell::new(None));

        let seen = failure.clone();
        let done = Done::new(move |result| *seen.borrow_mut() = Some(result));
        WatchDog::arm(&timers, 500, false, &done);

        clock.advance(500);
        timers.run_due();

        let result = failure.borrow_mut().take().unwrap();
        let message = result.unwrap_err();
        assert!(message.contains("forget to call done()"), "{message}");
    }

    #[test]
    fn watchdog_cancelled_by_completion() {
        let clock = Rc::new(crate::timer::ManualClock::new(0));
        let timers = Timers::new(clock.clone());
        let outcome = Rc::new(RefCell::new(None));

        let seen = outcome.clone();
        let done = Done::new(move |result| *seen.borrow_mut() = Some(result));
        WatchDog::arm(&timers, 500, true, &done);

        done.ok();
        clock.advance(500);
        timers.run_due();

        assert!(outcome.borrow().as_ref().unwrap().is_ok());
    }
}
