use crate::{
    foundation::core::Millis,
    schedule::{Scheduler, TimerToken},
    theme::{mode::ThemeMode, store::ThemePreferenceStore},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionState {
    #[default]
    Idle,
    Committing,
    Settling,
}

/// Scheduled continuation of an in-flight toggle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionStep {
    Commit,
    Settle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransitionTiming {
    /// Toggle request to theme commit (D1).
    pub commit_delay: Millis,
    /// Theme commit to idle (D2).
    pub settle_delay: Millis,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            commit_delay: Millis(500),
            settle_delay: Millis(3000),
        }
    }
}

impl TransitionTiming {
    pub fn total(self) -> Millis {
        self.commit_delay.saturating_add(self.settle_delay)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ThemeSnapshot {
    pub theme: ThemeMode,
    pub state: TransitionState,
    /// Committed flips since construction.
    pub flips: u64,
}

impl ThemeSnapshot {
    pub fn is_busy(&self) -> bool {
        self.state != TransitionState::Idle
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&ThemeSnapshot)>;

/// Owns the theme cell and sequences toggles through `Idle -> Committing -> Settling -> Idle`.
///
/// This is the only writer of the current theme. At most one transition is in flight; a toggle
/// while busy is ignored.
pub struct ThemeTransitionController {
    store: ThemePreferenceStore,
    timing: TransitionTiming,
    theme: ThemeMode,
    state: TransitionState,
    flips: u64,
    pending: Option<TimerToken>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl ThemeTransitionController {
    pub fn new(store: ThemePreferenceStore, timing: TransitionTiming) -> Self {
        let theme = store.resolve_initial();
        tracing::debug!(%theme, "theme resolved at startup");
        Self {
            store,
            timing,
            theme,
            state: TransitionState::Idle,
            flips: 0,
            pending: None,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn current_theme(&self) -> ThemeMode {
        self.theme
    }

    pub fn is_busy(&self) -> bool {
        self.state != TransitionState::Idle
    }

    pub fn state(&self) -> TransitionState {
        self.state
    }

    pub fn timing(&self) -> TransitionTiming {
        self.timing
    }

    pub fn store(&self) -> &ThemePreferenceStore {
        &self.store
    }

    pub fn snapshot(&self) -> ThemeSnapshot {
        ThemeSnapshot {
            theme: self.theme,
            state: self.state,
            flips: self.flips,
        }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ThemeSnapshot) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    fn notify(&mut self) {
        let snap = self.snapshot();
        for (_, observer) in &mut self.observers {
            observer(&snap);
        }
    }

    /// Starts a transition. Returns `false` (and does nothing) while one is in flight.
    #[tracing::instrument(skip_all, fields(theme = %self.theme))]
    pub fn toggle<E>(&mut self, sched: &mut Scheduler<E>) -> bool
    where
        E: From<TransitionStep>,
    {
        if self.is_busy() {
            tracing::trace!(state = ?self.state, "toggle ignored while busy");
            return false;
        }
        self.state = TransitionState::Committing;
        self.pending = Some(sched.schedule_after(
            self.timing.commit_delay,
            E::from(TransitionStep::Commit),
        ));
        tracing::debug!(at = sched.now().0, "transition started");
        self.notify();
        true
    }

    /// Handles a fired continuation. Steps that do not match the current state are stale and
    /// dropped.
    pub fn on_step<E>(&mut self, step: TransitionStep, sched: &mut Scheduler<E>)
    where
        E: From<TransitionStep>,
    {
        match (step, self.state) {
            (TransitionStep::Commit, TransitionState::Committing) => {
                let next = self.theme.toggled();
                self.theme = next;
                self.flips += 1;
                self.store.save(next);
                self.state = TransitionState::Settling;
                self.pending = Some(sched.schedule_after(
                    self.timing.settle_delay,
                    E::from(TransitionStep::Settle),
                ));
                tracing::info!(theme = %next, at = sched.now().0, "theme committed");
                self.notify();
            }
            (TransitionStep::Settle, TransitionState::Settling) => {
                self.state = TransitionState::Idle;
                self.pending = None;
                tracing::debug!(at = sched.now().0, "transition settled");
                self.notify();
            }
            (step, state) => {
                tracing::trace!(?step, ?state, "dropping stale transition step");
            }
        }
    }

    /// Cancels any outstanding continuation and returns to idle without flipping.
    pub fn cancel_pending<E>(&mut self, sched: &mut Scheduler<E>) {
        if let Some(token) = self.pending.take() {
            sched.cancel(token);
        }
        if self.state != TransitionState::Idle {
            tracing::debug!(state = ?self.state, "transition cancelled");
            self.state = TransitionState::Idle;
            self.notify();
        }
    }
}

impl std::fmt::Debug for ThemeTransitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeTransitionController")
            .field("theme", &self.theme)
            .field("state", &self.state)
            .field("flips", &self.flips)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use super::*;
    use crate::theme::store::{FixedColorScheme, MemoryBackend, THEME_KEY};

    #[derive(Debug, PartialEq)]
    struct Step(TransitionStep);

    impl From<TransitionStep> for Step {
        fn from(s: TransitionStep) -> Self {
            Self(s)
        }
    }

    fn controller(initial: ThemeMode) -> ThemeTransitionController {
        let store = ThemePreferenceStore::new(
            MemoryBackend::with_entry(THEME_KEY, initial.as_str()),
            FixedColorScheme(false),
        );
        ThemeTransitionController::new(store, TransitionTiming::default())
    }

    fn run(c: &mut ThemeTransitionController, s: &mut Scheduler<Step>, until: u64) {
        while let Some(f) = s.pop_due(Millis(until)) {
            c.on_step(f.event.0, s);
        }
        s.advance_to(Millis(until));
    }

    #[test]
    fn concrete_timeline() {
        let mut c = controller(ThemeMode::Light);
        let mut s = Scheduler::new(Millis(16));

        assert!(c.toggle(&mut s));
        assert_eq!(c.state(), TransitionState::Committing);
        assert!(c.is_busy());

        run(&mut c, &mut s, 499);
        assert_eq!(c.current_theme(), ThemeMode::Light);
        run(&mut c, &mut s, 500);
        assert_eq!(c.current_theme(), ThemeMode::Dark);
        assert_eq!(c.state(), TransitionState::Settling);

        run(&mut c, &mut s, 1000);
        assert!(!c.toggle(&mut s));
        assert_eq!(c.state(), TransitionState::Settling);

        run(&mut c, &mut s, 3499);
        assert!(c.is_busy());
        run(&mut c, &mut s, 3500);
        assert_eq!(c.state(), TransitionState::Idle);
        assert_eq!(c.current_theme(), ThemeMode::Dark);
        assert_eq!(c.snapshot().flips, 1);
        assert_eq!(c.store().load(), Some(ThemeMode::Dark));
    }

    #[test]
    fn double_toggle_flips_once() {
        let mut c = controller(ThemeMode::Dark);
        let mut s = Scheduler::new(Millis(16));
        assert!(c.toggle(&mut s));
        assert!(!c.toggle(&mut s));
        assert_eq!(s.pending_timers(), 1);
        run(&mut c, &mut s, 10_000);
        assert_eq!(c.current_theme(), ThemeMode::Light);
        assert_eq!(c.snapshot().flips, 1);
        assert!(!c.is_busy());
    }

    #[test]
    fn stale_steps_are_ignored() {
        let mut c = controller(ThemeMode::Light);
        let mut s: Scheduler<Step> = Scheduler::new(Millis(16));
        c.on_step(TransitionStep::Commit, &mut s);
        c.on_step(TransitionStep::Settle, &mut s);
        assert_eq!(c.current_theme(), ThemeMode::Light);
        assert_eq!(c.state(), TransitionState::Idle);
        assert_eq!(s.pending_timers(), 0);
    }

    #[test]
    fn cancel_pending_stops_commit() {
        let mut c = controller(ThemeMode::Light);
        let mut s = Scheduler::new(Millis(16));
        c.toggle(&mut s);
        c.cancel_pending(&mut s);
        run(&mut c, &mut s, 5000);
        assert_eq!(c.current_theme(), ThemeMode::Light);
        assert!(!c.is_busy());
        assert_eq!(c.store().load(), Some(ThemeMode::Light));
    }

    #[test]
    fn observers_see_every_transition() {
        let mut c = controller(ThemeMode::Light);
        let mut s = Scheduler::new(Millis(16));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = c.subscribe(move |snap| sink.borrow_mut().push((snap.state, snap.theme)));

        c.toggle(&mut s);
        run(&mut c, &mut s, 4000);
        assert_eq!(
            *seen.borrow(),
            vec![
                (TransitionState::Committing, ThemeMode::Light),
                (TransitionState::Settling, ThemeMode::Dark),
                (TransitionState::Idle, ThemeMode::Dark),
            ]
        );

        assert!(c.unsubscribe(id));
        c.toggle(&mut s);
        assert_eq!(seen.borrow().len(), 3);
    }
}
