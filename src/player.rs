//! The cooperative scheduler.
//!
//! Single-threaded, single-track: exactly one playable is pending at any
//! instant, the player owns at most one drain timer, and it never re-enters
//! itself synchronously. All forward progress happens on timer callbacks.
//!
//! # Invariants
//!
//! - **I1 (single track):** while a playable is pending or playing, no other
//!   playable leaves the queue.
//! - **I2 (source order):** top-level playables fire in enqueue order;
//!   playables enqueued from inside a running callback fire immediately
//!   after that callback, before anything queued behind it.
//! - **I3 (stable expansion):** composite events splice their sub-events at
//!   the queue head, preserving order relative to the tail.
//! - **I4 (one terminal state):** every admitted playable ends exactly once
//!   in done, timed-out, or errored.

use std::collections::VecDeque;
use std::cell::RefCell;
use std::fmt;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use crate::block::{Done, WatchDog};
use crate::config::DriverConfig;
use crate::dom::{Dom, Element};
use crate::error::{catch_panic, Error, Result};
use crate::host::{AnimationProbe, GestureProbe, Injector, PointerFeedback};
use crate::locator::TargetSpec;
use crate::playable::{
    Availability, Callback, EventPayload, EventType, PlayKind, PlayState, Playable,
    PlayableHandle, PlayableId, ReadyCx, VisibilityPolicy,
};
use crate::timer::{TimerId, Timers};
use crate::toolkit::Toolkit;

/// Collaborators and configuration shared by everything the player does.
pub(crate) struct PlayerCtx {
    pub(crate) timers: Timers,
    pub(crate) dom: Rc<dyn Dom>,
    pub(crate) toolkit: Rc<dyn Toolkit>,
    pub(crate) injector: Rc<dyn Injector>,
    pub(crate) animations: Rc<dyn AnimationProbe>,
    pub(crate) pointer: Rc<dyn PointerFeedback>,
    pub(crate) gesture: Option<Rc<dyn GestureProbe>>,
    pub(crate) config: DriverConfig,
}

struct PlayerInner {
    queue: VecDeque<PlayableHandle>,
    pending: Option<PlayableHandle>,
    /// Insertion position for enqueues made while a callback plays; nested
    /// fluent chains splice here so source order is preserved.
    insert_cursor: Option<usize>,
    in_callback: bool,
    paused: u32,
    /// True between the first enqueue of a run and the drain that ends it.
    engaged: bool,
    /// The single pending drain timer.
    timer: Option<TimerId>,
    next_id: u64,
    touch_count: u32,
    last_gesture_end_ms: u64,
    error_listeners: Vec<Rc<dyn Fn(&str)>>,
    end_once: Vec<Box<dyn FnOnce()>>,
}

enum Shift {
    Idle,
    Drained,
    Head(PlayableHandle),
}

/// Shared handle to the scheduler. Cheap to clone.
#[derive(Clone)]
pub struct Player {
    inner: Rc<RefCell<PlayerInner>>,
    ctx: Rc<PlayerCtx>,
}

/// Non-owning player reference for timer and subscription callbacks.
#[derive(Clone)]
pub struct WeakPlayer {
    inner: Weak<RefCell<PlayerInner>>,
    ctx: Weak<PlayerCtx>,
}

impl WeakPlayer {
    /// Upgrade back to a live player, if it still exists.
    #[must_use]
    pub fn upgrade(&self) -> Option<Player> {
        Some(Player {
            inner: self.inner.upgrade()?,
            ctx: self.ctx.upgrade()?,
        })
    }
}

impl Player {
    pub(crate) fn new(ctx: PlayerCtx) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PlayerInner {
                queue: VecDeque::new(),
                pending: None,
                insert_cursor: None,
                in_callback: false,
                paused: 0,
                engaged: false,
                timer: None,
                next_id: 0,
                touch_count: 0,
                last_gesture_end_ms: 0,
                error_listeners: Vec::new(),
                end_once: Vec::new(),
            })),
            ctx: Rc::new(ctx),
        }
    }

    /// Downgrade for capture in timer callbacks.
    #[must_use]
    pub fn downgrade(&self) -> WeakPlayer {
        WeakPlayer {
            inner: Rc::downgrade(&self.inner),
            ctx: Rc::downgrade(&self.ctx),
        }
    }

    // ---- enqueue -------------------------------------------------------

    /// Admit one playable to the queue.
    ///
    /// Applies delay defaults, rewrites back-references against the insert
    /// position, and kicks the drain when the player is idle. While a
    /// callback playable runs, the item is spliced at the insertion cursor
    /// instead of appended.
    pub fn enqueue(&self, playable: Playable) -> Result<PlayableHandle> {
        let handle = {
            let mut inner = self.inner.borrow_mut();
            let position = inner.insert_cursor.unwrap_or(inner.queue.len());
            let handle = Self::admit(&mut inner, &self.ctx, playable, position)?;
            if let Some(cursor) = inner.insert_cursor.as_mut() {
                *cursor += 1;
            }
            inner.engaged = true;
            handle
        };
        self.poke_drain();
        Ok(handle)
    }

    /// Enqueue several playables in order.
    pub fn play(&self, playables: Vec<Playable>) -> Result<Vec<PlayableHandle>> {
        playables.into_iter().map(|p| self.enqueue(p)).collect()
    }

    /// Enqueue a playable known to carry no integer back-references. The
    /// fluent layer builds shared references directly, so admission cannot
    /// fail there.
    pub(crate) fn enqueue_known(&self, playable: Playable) -> PlayableHandle {
        match self.enqueue(playable) {
            Ok(handle) => handle,
            Err(err) => unreachable!("fluent playables carry no back-references: {err}"),
        }
    }

    fn admit(
        inner: &mut PlayerInner,
        ctx: &PlayerCtx,
        mut playable: Playable,
        position: usize,
    ) -> Result<PlayableHandle> {
        inner.next_id += 1;
        playable.id = PlayableId(inner.next_id);

        if playable.delay.is_none() {
            playable.delay = Some(match playable.kind {
                PlayKind::Event(_) => ctx.config.event_delay_ms,
                _ => 0,
            });
        }

        Self::bind_back_refs(&inner.queue, &mut playable, position)?;

        tracing::debug!(
            event = "player.enqueue",
            id = %playable.id,
            position,
            kind = ?playable.kind,
            delay = playable.delay,
            "Playable enqueued"
        );

        let handle = Rc::new(RefCell::new(playable));
        inner.queue.insert(position, handle.clone());
        Ok(handle)
    }

    /// Rewrite integer back-references into direct shared references so
    /// they survive later queue head removals.
    fn bind_back_refs(
        queue: &VecDeque<PlayableHandle>,
        playable: &mut Playable,
        position: usize,
    ) -> Result<()> {
        for slot in [&mut playable.target, &mut playable.related_target] {
            let Some(TargetSpec::BackRef(offset)) = slot else {
                continue;
            };
            let offset = *offset;
            if offset == 0 || offset > position {
                return Err(Error::InvalidBackRef { offset });
            }
            *slot = Some(TargetSpec::Shared(queue[position - offset].clone()));
        }
        Ok(())
    }

    // ---- drain ---------------------------------------------------------

    fn poke_drain(&self) {
        let idle = {
            let inner = self.inner.borrow();
            inner.pending.is_none() && inner.paused == 0 && !inner.queue.is_empty()
        };
        if idle {
            self.play_next_soon();
        }
    }

    fn play_next_soon(&self) {
        self.schedule(0, |player| player.play_next());
    }

    /// Schedule the one drain timer, replacing any previous one.
    fn schedule(&self, delay_ms: u64, step: fn(Player)) {
        let weak = self.downgrade();
        let timer = self.ctx.timers.defer(delay_ms, move || {
            if let Some(player) = weak.upgrade() {
                step(player);
            }
        });
        let old = self.inner.borrow_mut().timer.replace(timer);
        if let Some(old) = old {
            self.ctx.timers.cancel(old);
        }
    }

    /// Shift the head playable into pending and schedule its first
    /// readiness check after its delay. Composites expand here, at shift
    /// time, so their first sub-event genuinely carries the original delay.
    fn play_next(&self) {
        loop {
            let shifted = {
                let mut inner = self.inner.borrow_mut();
                if inner.paused > 0 || inner.pending.is_some() {
                    Shift::Idle
                } else {
                    match inner.queue.pop_front() {
                        Some(head) => {
                            inner.pending = Some(head.clone());
                            Shift::Head(head)
                        }
                        None => {
                            if inner.engaged {
                                inner.engaged = false;
                                Shift::Drained
                            } else {
                                Shift::Idle
                            }
                        }
                    }
                }
            };

            let head = match shifted {
                Shift::Idle => return,
                Shift::Drained => {
                    tracing::debug!(event = "player.end", "Queue drained");
                    self.emit_end();
                    self.hide_indicators_soon();
                    return;
                }
                Shift::Head(head) => head,
            };

            let composite = {
                let p = head.borrow();
                match p.kind {
                    PlayKind::Event(event) if event.is_composite() => Some(event),
                    _ => None,
                }
            };
            if let Some(event) = composite {
                self.expand(&head, event);
                continue;
            }

            let delay = {
                let mut p = head.borrow_mut();
                p.transition(PlayState::Pending);
                p.delay.unwrap_or(0)
            };
            self.schedule(delay, |player| player.play_event());
            return;
        }
    }

    /// One readiness tick of the pending playable: either play it, re-arm
    /// the poll, or time out.
    pub(crate) fn play_event(&self) {
        let Some(head) = self.inner.borrow().pending.clone() else {
            return;
        };

        let now_ms = self.ctx.timers.now_ms();
        let cx = ReadyCx {
            dom: &*self.ctx.dom,
            toolkit: &*self.ctx.toolkit,
            animations: &*self.ctx.animations,
            now_ms,
        };
        let ready = head.borrow_mut().is_ready(&cx);

        if !ready {
            let verdict = {
                let mut p = head.borrow_mut();
                let started = *p.wait_started_ms.get_or_insert(now_ms);
                let timeout = p.timeout.unwrap_or(self.ctx.config.default_timeout_ms);
                let elapsed = now_ms.saturating_sub(started);
                if timeout != 0 && elapsed >= timeout {
                    p.transition(PlayState::TimedOut);
                    Err(self.timeout_message(&p))
                } else {
                    tracing::trace!(
                        event = "player.wait",
                        id = %p.id,
                        waiting = ?p.waiting,
                        "Playable not ready, re-polling"
                    );
                    // Never poll past the deadline, however coarse the
                    // configured interval.
                    let mut poll = self.ctx.config.poll_interval_ms.max(1);
                    if timeout != 0 {
                        poll = poll.min(timeout - elapsed);
                    }
                    Ok(poll)
                }
            };

            match verdict {
                Err(message) => {
                    tracing::warn!(event = "player.timeout", %message, "Playable timed out");
                    self.run_cleanup(&head);
                    self.inner.borrow_mut().pending = None;
                    self.abort(message);
                }
                Ok(poll) => self.schedule(poll, |player| {
                    player.play_event();
                }),
            }
            return;
        }

        head.borrow_mut().transition(PlayState::Playing);
        let kind = head.borrow().kind.clone();
        match kind {
            PlayKind::Event(event) => self.dispatch_event(&head, event),
            PlayKind::Callback(callback) => self.dispatch_callback(&head, callback),
            PlayKind::Delay | PlayKind::Predicate => self.complete(&head),
        }
    }

    /// Request an immediate readiness re-check of the pending playable.
    /// Used by event-subscription waits to skip the rest of a poll period.
    pub(crate) fn poke(&self) {
        let has_pending = self.inner.borrow().pending.is_some();
        if has_pending {
            self.schedule(0, |player| player.play_event());
        }
    }

    // ---- dispatch ------------------------------------------------------

    fn dispatch_event(&self, head: &PlayableHandle, event: EventType) {
        let (id, target, related, payload) = {
            let p = head.borrow();
            (
                p.id,
                p.resolved_target.clone(),
                p.resolved_related_target.clone(),
                p.payload.clone(),
            )
        };

        let Some(target) = target else {
            head.borrow_mut().transition(PlayState::Errored);
            self.run_cleanup(head);
            self.inner.borrow_mut().pending = None;
            self.abort(Error::MissingTarget { id }.to_string());
            return;
        };

        let node = target.node();
        if let (Some(x), Some(y)) = (payload.x, payload.y) {
            self.ctx.pointer.show_pointer(x, y);
        }
        if event.is_gesture_start() {
            self.ctx.pointer.show_gesture();
        }

        tracing::debug!(
            event = "player.dispatch",
            id = %id,
            dom_event = event.name(),
            target = %node,
            "Dispatching event"
        );
        self.ctx
            .injector
            .inject(event, &payload, node, related.map(|e| e.node()));

        {
            let mut inner = self.inner.borrow_mut();
            if event.is_gesture_start() {
                inner.touch_count += 1;
            }
            if event.is_gesture_end() {
                inner.touch_count = inner.touch_count.saturating_sub(1);
                inner.last_gesture_end_ms = self.ctx.timers.now_ms();
            }
        }
        if event.is_gesture_end() {
            self.ctx.pointer.hide_gesture();
        }

        self.complete(head);
    }

    fn dispatch_callback(&self, head: &PlayableHandle, callback: Callback) {
        let id = head.borrow().id;
        {
            let mut inner = self.inner.borrow_mut();
            inner.insert_cursor = Some(0);
            inner.in_callback = true;
        }

        let outcome = match callback {
            Callback::Sync(f) => Some(self.run_user(|| f())),
            Callback::Async(f) => {
                let weak = self.downgrade();
                let done = Done::new(move |result| {
                    if let Some(player) = weak.upgrade() {
                        player.callback_finished(id, result);
                    }
                });
                let (timeout, explicit) = {
                    let p = head.borrow();
                    (
                        p.timeout.unwrap_or(self.ctx.config.default_timeout_ms),
                        p.timeout.is_some(),
                    )
                };
                WatchDog::arm(&self.ctx.timers, timeout, explicit, &done);

                match self.run_user(|| f(done)) {
                    Ok(()) => None, // completion arrives through the Done
                    Err(message) => Some(Err(message)),
                }
            }
        };

        {
            let mut inner = self.inner.borrow_mut();
            inner.insert_cursor = None;
            inner.in_callback = false;
        }

        match outcome {
            None => {}
            Some(Ok(())) => self.complete(head),
            Some(Err(message)) => self.playable_failed(head, message),
        }
    }

    /// Run a user callback under the configured error policy: captured
    /// panics become error messages, otherwise they unwind to the host.
    fn run_user(&self, f: impl FnOnce() -> Result<()>) -> Result<(), String> {
        if self.ctx.config.catch_errors {
            catch_panic(f)
                .and_then(|result| result.map_err(|err| err.to_string()))
        } else {
            f().map_err(|err| err.to_string())
        }
    }

    fn callback_finished(&self, id: PlayableId, result: Result<(), String>) {
        let head = self.inner.borrow().pending.clone();
        let Some(head) = head else {
            return; // stale completion after a queue reset
        };
        if head.borrow().id != id {
            return;
        }
        match result {
            Ok(()) => self.complete(&head),
            Err(message) => self.playable_failed(&head, message),
        }
    }

    fn complete(&self, head: &PlayableHandle) {
        head.borrow_mut().transition(PlayState::Done);
        self.run_cleanup(head);
        {
            let mut inner = self.inner.borrow_mut();
            if inner
                .pending
                .as_ref()
                .is_some_and(|pending| Rc::ptr_eq(pending, head))
            {
                inner.pending = None;
            }
        }
        self.play_next_soon();
    }

    fn playable_failed(&self, head: &PlayableHandle, message: String) {
        head.borrow_mut().transition(PlayState::Errored);
        self.run_cleanup(head);
        self.inner.borrow_mut().pending = None;
        self.abort(message);
    }

    fn run_cleanup(&self, head: &PlayableHandle) {
        let teardowns = head.borrow_mut().take_cleanup();
        for teardown in teardowns {
            teardown();
        }
    }

    // ---- composite expansion -------------------------------------------

    fn expand(&self, original: &PlayableHandle, event: EventType) {
        match event {
            EventType::Tap => self.expand_tap(original),
            EventType::Type => self.expand_type(original),
            _ => {}
        }
        original.borrow_mut().transition(PlayState::Done);
        self.run_cleanup(original);
        self.inner.borrow_mut().pending = None;
    }

    /// Splice pre-built sub-events at the queue head, binding their
    /// back-references against the splice positions.
    fn splice_head(&self, subs: Vec<Playable>) {
        let mut inner = self.inner.borrow_mut();
        for (position, sub) in subs.into_iter().enumerate() {
            if let Err(err) = Self::admit(&mut inner, &self.ctx, sub, position) {
                tracing::error!(
                    event = "player.expand.invalid",
                    %err,
                    "Dropped malformed sub-event during expansion"
                );
            }
        }
    }

    /// tap → pointerdown, pointerup, click, gesture-completion wait.
    ///
    /// The pointerdown carries the original target, delay and coordinates;
    /// the rest back-reference it so all four share one resolved element.
    fn expand_tap(&self, original: &PlayableHandle) {
        let (target, related, payload, delay, timeout) = {
            let p = original.borrow();
            (
                p.target.clone(),
                p.related_target.clone(),
                p.payload.clone(),
                p.delay,
                p.timeout,
            )
        };
        tracing::debug!(event = "player.expand", composite = "tap", "Expanding tap");

        if let Some(probe) = &self.ctx.gesture {
            probe.activate();
        }

        let mut down = Playable::event(EventType::PointerDown).with_payload(EventPayload {
            x: payload.x,
            y: payload.y,
            ..EventPayload::default()
        });
        down.payload.inherit(&payload);
        down.target = target;
        down.related_target = related;
        down.delay = delay;
        down.timeout = timeout;

        let mut up = Playable::event(EventType::PointerUp)
            .with_back_ref(1)
            .with_delay(0);
        up.payload.inherit(&payload);
        up.timeout = timeout;

        let mut click = Playable::event(EventType::Click)
            .with_back_ref(2)
            .with_delay(0);
        click.payload.inherit(&payload);
        click.timeout = timeout;

        let gesture = self.ctx.gesture.clone();
        let mut wait = Playable::predicate(move |cx, p| {
            if !p.composite_ready(cx) {
                return false;
            }
            let Some(probe) = &gesture else {
                p.clear_waiting();
                return true;
            };
            let Some(node) = p.resolved_target.as_ref().map(Element::node) else {
                p.set_waiting("gesture", "complete");
                return false;
            };
            if probe.complete(node, "tap") {
                p.clear_waiting();
                true
            } else {
                p.set_waiting_on("gesture", "complete", cx.dom.describe(node));
                false
            }
        })
        .with_back_ref(2)
        .with_delay(0);
        wait.availability = Availability::Ignore;
        wait.visibility = VisibilityPolicy::Ignore;
        wait.timeout = timeout;
        if let Some(probe) = self.ctx.gesture.clone() {
            wait.add_cleanup(move || probe.deactivate());
        }

        self.splice_head(vec![down, up, click, wait]);
    }

    /// type → keydown/keyup per character of `text`, or one pair for a bare
    /// `key`. With neither, the playable is skipped.
    fn expand_type(&self, original: &PlayableHandle) {
        let (target, payload, delay, timeout) = {
            let p = original.borrow();
            (p.target.clone(), p.payload.clone(), p.delay, p.timeout)
        };

        let keys: Vec<String> = if let Some(text) = &payload.text {
            text.chars().map(|c| c.to_string()).collect()
        } else if let Some(key) = &payload.key {
            vec![key.clone()]
        } else {
            tracing::debug!(
                event = "player.expand.skip",
                composite = "type",
                "Type playable has neither text nor key"
            );
            return;
        };
        tracing::debug!(
            event = "player.expand",
            composite = "type",
            keys = keys.len(),
            "Expanding type"
        );

        let mut subs = Vec::with_capacity(keys.len() * 2);
        for (i, key) in keys.iter().enumerate() {
            let mut down = Playable::event(EventType::KeyDown).with_key(key.clone());
            down.payload.inherit(&payload);
            if i == 0 {
                down.target = target.clone();
                down.delay = delay;
                down.payload.caret = payload.caret;
            } else {
                down = down.with_back_ref(2 * i);
            }
            down.timeout = timeout;

            let mut up = Playable::event(EventType::KeyUp)
                .with_key(key.clone())
                .with_back_ref(1)
                .with_delay(0);
            up.payload.inherit(&payload);
            up.timeout = timeout;

            subs.push(down);
            subs.push(up);
        }

        self.splice_head(subs);
    }

    // ---- termination ---------------------------------------------------

    /// Empty the queue, report an error, and end the run.
    pub fn fail(&self, message: impl Into<String>) {
        self.abort(message.into());
    }

    /// Empty the queue and end the run without an error.
    pub fn stop(&self) {
        self.clear_queue();
        self.emit_end();
        self.hide_indicators_soon();
    }

    fn abort(&self, message: String) {
        self.clear_queue();
        self.emit_error(&message);
        self.emit_end();
        self.hide_indicators_soon();
    }

    fn clear_queue(&self) {
        let (dropped, pending, timer) = {
            let mut inner = self.inner.borrow_mut();
            let dropped: Vec<_> = inner.queue.drain(..).collect();
            let pending = inner.pending.take();
            inner.engaged = false;
            (dropped, pending, inner.timer.take())
        };
        if let Some(timer) = timer {
            self.ctx.timers.cancel(timer);
        }
        for playable in dropped.into_iter().chain(pending) {
            self.run_cleanup(&playable);
        }
    }

    fn hide_indicators_soon(&self) {
        let pointer = self.ctx.pointer.clone();
        self.ctx.timers.defer(self.ctx.config.pointer_grace_ms, move || {
            pointer.hide_pointer();
            pointer.hide_gesture();
        });
    }

    /// Compose the human-readable timeout message from the waiting tags,
    /// following shared target references back to the originating locator.
    fn timeout_message(&self, playable: &Playable) -> String {
        let dom = &*self.ctx.dom;
        let (subject, state, selector) = match &playable.waiting {
            Some(waiting) => (
                waiting.subject.clone(),
                waiting.state.clone(),
                waiting.selector.clone(),
            ),
            None => (
                "target".to_owned(),
                "ready".to_owned(),
                playable.target.as_ref().map(|spec| spec.describe(dom)),
            ),
        };

        let mut message = format!("Timeout waiting for {subject}");
        if let Some(selector) = selector {
            let _ = write!(message, " ({selector})");
        }
        let _ = write!(message, " to be {state}");
        if let PlayKind::Event(event) = &playable.kind {
            let _ = write!(message, " for {event}");
        }
        message
    }

    // ---- pause / resume ------------------------------------------------

    /// Suspend the drain. A pending playable is un-shifted back to the
    /// queue head unless the pause comes from inside its own callback.
    pub fn pause(&self) {
        let timer = {
            let mut inner = self.inner.borrow_mut();
            inner.paused += 1;
            if inner.in_callback {
                None
            } else {
                if let Some(pending) = inner.pending.take() {
                    {
                        let mut p = pending.borrow_mut();
                        p.transition(PlayState::Queued);
                        p.wait_started_ms = None;
                    }
                    inner.queue.push_front(pending);
                }
                inner.timer.take()
            }
        };
        if let Some(timer) = timer {
            self.ctx.timers.cancel(timer);
        }
        tracing::debug!(event = "player.pause", "Player paused");
    }

    /// Drop one pause level; at zero the drain re-enters.
    pub fn resume(&self) {
        let resumed = {
            let mut inner = self.inner.borrow_mut();
            inner.paused = inner.paused.saturating_sub(1);
            inner.paused == 0
        };
        if resumed {
            tracing::debug!(event = "player.resume", "Player resumed");
            self.poke_drain();
        }
    }

    // ---- events --------------------------------------------------------

    /// Subscribe to error reports. Listeners persist for the player's life.
    pub fn on_error(&self, callback: impl Fn(&str) + 'static) {
        self.inner
            .borrow_mut()
            .error_listeners
            .push(Rc::new(callback));
    }

    /// Subscribe once to the end of the current run.
    pub fn on_end_once(&self, callback: impl FnOnce() + 'static) {
        self.inner.borrow_mut().end_once.push(Box::new(callback));
    }

    fn emit_error(&self, message: &str) {
        tracing::warn!(event = "player.error", message, "Player error");
        let listeners = self.inner.borrow().error_listeners.clone();
        for listener in listeners {
            listener(message);
        }
    }

    fn emit_end(&self) {
        let listeners: Vec<_> = self.inner.borrow_mut().end_once.drain(..).collect();
        for listener in listeners {
            listener();
        }
    }

    // ---- introspection -------------------------------------------------

    /// Whether any playable is queued or in flight.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        let inner = self.inner.borrow();
        inner.pending.is_some() || !inner.queue.is_empty()
    }

    /// Number of queued (not yet shifted) playables.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// Gestures currently held down.
    #[must_use]
    pub fn touch_count(&self) -> u32 {
        self.inner.borrow().touch_count
    }

    /// When the last gesture ended, for click-vs-gesture disambiguation.
    #[must_use]
    pub fn last_gesture_end_ms(&self) -> u64 {
        self.inner.borrow().last_gesture_end_ms
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inner.borrow().paused > 0
    }
}

impl fmt::Debug for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Player")
            .field("queued", &inner.queue.len())
            .field("pending", &inner.pending.as_ref().map(|p| p.borrow().id))
            .field("paused", &inner.paused)
            .field("touch_count", &inner.touch_count)
            .finish_non_exhaustive()
    }
}
