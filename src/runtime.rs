//! The event loop that drives the theme toggle end to end.
//!
//! [`ThemeRuntime`] owns the scheduler, the transition controller, the actor animator and the
//! mounted room. Every timer and frame callback is dispatched here; nothing runs on its own.

use std::{cell::Cell, rc::Rc};

use crate::{
    animator::{AnimatorState, FrameInput, SceneActorAnimator},
    config::RoomConfig,
    foundation::{
        core::{Millis, Viewport},
        error::{RoomError, RoomResult},
    },
    room::RoomScene,
    schedule::Scheduler,
    scene::{
        camera::PerspectiveCamera,
        lifecycle::{Container, FrameRequest, SceneHandle, SceneLifecycleManager},
        resources::ResourceStats,
        target::{CpuContextFactory, FrameRgba, RenderContextFactory},
    },
    theme::{
        controller::{ThemeSnapshot, ThemeTransitionController, TransitionState, TransitionStep},
        mode::ThemeMode,
        store::ThemePreferenceStore,
    },
    toggle::ToggleView,
};

/// Everything the runtime's scheduler can fire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopEvent {
    Transition(TransitionStep),
    Frame(FrameRequest),
}

impl From<TransitionStep> for LoopEvent {
    fn from(step: TransitionStep) -> Self {
        Self::Transition(step)
    }
}

impl From<FrameRequest> for LoopEvent {
    fn from(req: FrameRequest) -> Self {
        Self::Frame(req)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Mounted,
    Unmounted,
    Resized,
    Toggle,
    ToggleIgnored,
    Commit,
    Settle,
    Endpoint,
    ExcursionCompleted,
    Rebuilt,
    Shutdown,
}

/// One journal line: what happened, when, and the controller state right after.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    pub kind: TimelineKind,
    pub theme: ThemeMode,
    pub state: TransitionState,
}

fn record(journal: &mut Vec<TimelineEntry>, at: Millis, kind: TimelineKind, snap: ThemeSnapshot) {
    tracing::trace!(at = at.0, ?kind, theme = %snap.theme, "timeline");
    journal.push(TimelineEntry {
        at_ms: at.0,
        kind,
        theme: snap.theme,
        state: snap.state,
    });
}

pub struct ThemeRuntime {
    sched: Scheduler<LoopEvent>,
    controller: ThemeTransitionController,
    animator: SceneActorAnimator,
    actor: AnimatorState,
    scenes: SceneLifecycleManager<RoomScene>,
    room: Option<(SceneHandle, Container)>,
    display: Rc<Cell<ThemeMode>>,
    journal: Vec<TimelineEntry>,
    frames: u64,
    // The room was mutated since the last render.
    dirty: bool,
}

impl ThemeRuntime {
    pub fn new(config: &RoomConfig, store: ThemePreferenceStore) -> RoomResult<Self> {
        Self::with_context_factory(config, store, CpuContextFactory)
    }

    pub fn with_context_factory(
        config: &RoomConfig,
        store: ThemePreferenceStore,
        factory: impl RenderContextFactory + 'static,
    ) -> RoomResult<Self> {
        config.validate()?;
        let mut controller = ThemeTransitionController::new(store, config.timing);
        let display = Rc::new(Cell::new(controller.current_theme()));
        let cell = Rc::clone(&display);
        controller.subscribe(move |snap| cell.set(snap.theme));
        Ok(Self {
            sched: Scheduler::new(config.frame_interval()),
            controller,
            animator: SceneActorAnimator::new(config.walk),
            actor: AnimatorState::default(),
            scenes: SceneLifecycleManager::new(factory),
            room: None,
            display,
            journal: Vec::new(),
            frames: 0,
            dirty: false,
        })
    }

    pub fn now(&self) -> Millis {
        self.sched.now()
    }

    pub fn controller(&self) -> &ThemeTransitionController {
        &self.controller
    }

    pub fn snapshot(&self) -> ThemeSnapshot {
        self.controller.snapshot()
    }

    /// Theme as last published to subscribers.
    pub fn display_theme(&self) -> ThemeMode {
        self.display.get()
    }

    pub fn actor(&self) -> &AnimatorState {
        &self.actor
    }

    pub fn room(&self) -> Option<&RoomScene> {
        let (handle, _) = self.room.as_ref()?;
        self.scenes.scene(handle)
    }

    pub fn room_camera(&self) -> Option<&PerspectiveCamera> {
        let (handle, _) = self.room.as_ref()?;
        self.scenes.camera(handle)
    }

    pub fn journal(&self) -> &[TimelineEntry] {
        &self.journal
    }

    pub fn frames_served(&self) -> u64 {
        self.frames
    }

    pub fn resource_stats(&self) -> ResourceStats {
        self.scenes.stats()
    }

    pub fn scheduler(&self) -> &Scheduler<LoopEvent> {
        &self.sched
    }

    pub fn toggle_view(&self) -> ToggleView {
        ToggleView::from_snapshot(&self.controller.snapshot())
    }

    fn log(&mut self, kind: TimelineKind) {
        record(&mut self.journal, self.sched.now(), kind, self.controller.snapshot());
    }

    #[tracing::instrument(skip(self, container), fields(container = %container.name))]
    pub fn mount_room(&mut self, container: Container) -> RoomResult<()> {
        if self.room.is_some() {
            return Err(RoomError::validation("room is already mounted"));
        }
        let content = RoomScene::new(self.animator.idle_pose());
        let theme = self.controller.current_theme();
        let handle = self.scenes.mount(&container, content, theme, &mut self.sched)?;
        self.room = Some((handle, container));
        self.actor = AnimatorState::default();
        self.dirty = true;
        self.log(TimelineKind::Mounted);
        Ok(())
    }

    /// Returns `false` when nothing was mounted.
    pub fn unmount_room(&mut self) -> bool {
        let Some((handle, _)) = self.room.take() else {
            return false;
        };
        self.scenes.unmount(handle, &mut self.sched);
        self.log(TimelineKind::Unmounted);
        true
    }

    pub fn resize(&mut self, width: u32, height: u32) -> RoomResult<()> {
        let Some((_, container)) = self.room.as_mut() else {
            return Err(RoomError::validation("resize without a mounted room"));
        };
        let bounds = Viewport::new(width, height)?;
        self.scenes.on_resize(&container.name, width, height)?;
        container.bounds = bounds;
        self.dirty = true;
        self.log(TimelineKind::Resized);
        Ok(())
    }

    /// A press of the toggle button. Ignored while the button is disabled.
    pub fn press_toggle(&mut self) -> bool {
        if self.toggle_view().disabled {
            self.log(TimelineKind::ToggleIgnored);
            return false;
        }
        let started = self.controller.toggle(&mut self.sched);
        if started {
            // A press on the settle tick arrives before any idle frame could unpark the actor.
            self.actor = AnimatorState {
                completed_excursions: self.actor.completed_excursions,
                ..AnimatorState::default()
            };
        }
        self.log(if started {
            TimelineKind::Toggle
        } else {
            TimelineKind::ToggleIgnored
        });
        started
    }

    /// Dispatches everything due up to `until` and leaves the clock there.
    pub fn run_until(&mut self, until: Millis) -> RoomResult<()> {
        while let Some(fired) = self.sched.pop_due(until) {
            match fired.event {
                LoopEvent::Transition(step) => self.on_transition(step)?,
                LoopEvent::Frame(FrameRequest(id)) => self.on_frame(id)?,
            }
        }
        self.sched.advance_to(until);
        Ok(())
    }

    pub fn advance(&mut self, by: Millis) -> RoomResult<()> {
        self.run_until(self.sched.now().saturating_add(by))
    }

    fn on_transition(&mut self, step: TransitionStep) -> RoomResult<()> {
        let before = self.controller.state();
        self.controller.on_step(step, &mut self.sched);
        let after = self.controller.state();
        if before == after {
            return Ok(());
        }
        match after {
            TransitionState::Settling => {
                self.log(TimelineKind::Commit);
                // A fast walk may have flipped the switch before the commit.
                if self.actor.passed_endpoint() {
                    self.reconcile_room()?;
                }
            }
            TransitionState::Idle => {
                self.log(TimelineKind::Settle);
                self.reconcile_room()?;
            }
            TransitionState::Committing => {}
        }
        Ok(())
    }

    /// Rebuilds the room when its palette does not match the committed theme, which happens
    /// when the walk reached the switch before the commit or was interrupted.
    fn reconcile_room(&mut self) -> RoomResult<()> {
        let theme = self.controller.current_theme();
        let Some((handle, _)) = self.room.as_ref() else {
            return Ok(());
        };
        let shown = self.scenes.scene(handle).map(RoomScene::shown_theme);
        if shown.is_none_or(|s| s == theme) {
            return Ok(());
        }
        tracing::debug!(?shown, %theme, "room palette out of date; rebuilding");
        self.scenes.rebuild(handle, theme)?;
        self.dirty = true;
        self.log(TimelineKind::Rebuilt);
        Ok(())
    }

    fn on_frame(&mut self, id: crate::scene::lifecycle::SceneId) -> RoomResult<()> {
        let now = self.sched.now();
        let snap = self.controller.snapshot();
        let Some(parts) = self.scenes.frame_fired(id, &mut self.sched) else {
            return Ok(());
        };
        let input = FrameInput {
            busy: snap.is_busy(),
            theme: snap.theme,
            now,
        };
        let (next, out) = self.animator.step(self.actor, input);
        self.actor = next;
        parts.content.apply_pose(&out.pose);
        if let Some(fx) = out.endpoint {
            parts.content.apply_endpoint(parts.resources, &fx)?;
            record(&mut self.journal, now, TimelineKind::Endpoint, snap);
        }
        if out.excursion_completed {
            record(&mut self.journal, now, TimelineKind::ExcursionCompleted, snap);
        }
        parts.content.sway(now);
        self.frames += 1;
        self.dirty = true;
        Ok(())
    }

    /// The room as it currently looks, rendering first if anything changed.
    pub fn frame_pixels(&mut self) -> RoomResult<FrameRgba> {
        let Some((handle, _)) = self.room.as_ref() else {
            return Err(RoomError::validation("no room mounted"));
        };
        if self.dirty {
            let stats = self.scenes.render(handle)?;
            tracing::trace!(drawn = stats.faces_drawn, culled = stats.faces_culled, "room rendered");
            self.dirty = false;
        }
        self.scenes
            .target(handle)
            .map(|t| t.to_frame())
            .ok_or_else(|| RoomError::validation("room target missing"))
    }

    /// Unmounts the room and abandons any in-flight transition.
    pub fn shutdown(&mut self) {
        self.unmount_room();
        self.controller.cancel_pending(&mut self.sched);
        self.sched.clear();
        self.log(TimelineKind::Shutdown);
    }
}

impl std::fmt::Debug for ThemeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeRuntime")
            .field("now", &self.sched.now())
            .field("controller", &self.controller)
            .field("mounted", &self.room.is_some())
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::store::{FixedColorScheme, MemoryBackend};

    fn runtime() -> ThemeRuntime {
        let store = ThemePreferenceStore::new(MemoryBackend::new(), FixedColorScheme(false));
        ThemeRuntime::new(&RoomConfig::default(), store).unwrap()
    }

    fn container() -> Container {
        Container::new("toggle-room", Viewport::new(48, 48).unwrap())
    }

    #[test]
    fn endpoint_lands_once_and_room_matches_theme() {
        let mut rt = runtime();
        rt.mount_room(container()).unwrap();
        assert!(rt.press_toggle());
        rt.run_until(Millis(4000)).unwrap();

        let kinds: Vec<_> = rt.journal().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds.iter().filter(|k| **k == TimelineKind::Endpoint).count(),
            1
        );
        assert_eq!(
            kinds
                .iter()
                .filter(|k| **k == TimelineKind::ExcursionCompleted)
                .count(),
            1
        );
        assert!(!kinds.contains(&TimelineKind::Rebuilt));
        assert_eq!(rt.snapshot().theme, ThemeMode::Dark);
        assert_eq!(rt.room().unwrap().shown_theme(), ThemeMode::Dark);
        assert_eq!(rt.display_theme(), ThemeMode::Dark);
        assert_eq!(rt.room().unwrap().pose(), &SceneActorAnimator::default().idle_pose());
    }

    #[test]
    fn presses_while_busy_are_ignored() {
        let mut rt = runtime();
        assert!(rt.press_toggle());
        rt.advance(Millis(100)).unwrap();
        assert!(!rt.press_toggle());
        rt.run_until(Millis(3500)).unwrap();
        assert!(!rt.toggle_view().disabled);
        assert_eq!(rt.snapshot().flips, 1);
    }

    #[test]
    fn shutdown_mid_transition_drops_everything() {
        let mut rt = runtime();
        rt.mount_room(container()).unwrap();
        rt.press_toggle();
        rt.advance(Millis(200)).unwrap();
        rt.shutdown();
        assert_eq!(rt.scheduler().pending_timers(), 0);
        assert_eq!(rt.scheduler().pending_frames(), 0);
        assert!(rt.resource_stats().is_balanced());
        rt.run_until(Millis(5000)).unwrap();
        assert_eq!(rt.snapshot().flips, 0);
        assert_eq!(rt.snapshot().state, TransitionState::Idle);
    }

    #[test]
    fn press_on_the_settle_tick_starts_a_fresh_walk() {
        let mut rt = runtime();
        rt.mount_room(container()).unwrap();
        assert!(rt.press_toggle());
        rt.run_until(Millis(3500)).unwrap();
        assert!(rt.actor().parked);
        assert!(rt.press_toggle());
        assert!(!rt.actor().parked);
        rt.run_until(Millis(7000)).unwrap();
        let endpoints = rt
            .journal()
            .iter()
            .filter(|e| e.kind == TimelineKind::Endpoint)
            .count();
        assert_eq!(endpoints, 2);
        assert_eq!(rt.actor().completed_excursions, 2);
        assert!(!rt.journal().iter().any(|e| e.kind == TimelineKind::Rebuilt));
        assert_eq!(rt.room().unwrap().shown_theme(), ThemeMode::Light);
    }

    #[test]
    fn frame_pixels_needs_a_room() {
        let mut rt = runtime();
        assert!(rt.frame_pixels().is_err());
        rt.mount_room(container()).unwrap();
        let f = rt.frame_pixels().unwrap();
        assert_eq!((f.width, f.height), (48, 48));
        assert!(rt.mount_room(container()).is_err());
    }
}
