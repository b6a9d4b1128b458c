//! Roomlight keeps a light/dark theme and a small animated room in step.
//!
//! A toggle starts a timed transition; a person in the room walks to the light switch, flips it
//! as the theme commits, and walks back. Everything runs on a virtual clock so a given sequence
//! of inputs always produces the same timeline and the same frames:
//!
//! - Resolve the starting theme with a [`ThemePreferenceStore`]
//! - Build a [`ThemeRuntime`] from a [`RoomConfig`] and mount the room
//! - Press the toggle, advance time, read the journal or the rendered frame
#![forbid(unsafe_code)]

mod foundation;

pub mod ambient;
pub mod animator;
pub mod config;
pub mod contact;
pub mod room;
pub mod runtime;
pub mod scene;
pub mod schedule;
pub mod theme;
pub mod toggle;

pub use crate::foundation::core::{Affine3, Millis, Rgb, Vec3, Viewport};
pub use crate::foundation::error::{RoomError, RoomResult};

pub use crate::animator::{
    ActorPose, AnimatorState, Direction, EndpointEffects, FrameInput, FrameOutput,
    SceneActorAnimator, WalkPath,
};
pub use crate::config::RoomConfig;
pub use crate::room::RoomScene;
pub use crate::runtime::{LoopEvent, ThemeRuntime, TimelineEntry, TimelineKind};
pub use crate::scene::lifecycle::{
    Container, FrameRequest, SceneContent, SceneHandle, SceneLifecycleManager,
};
pub use crate::scene::resources::ResourceStats;
pub use crate::scene::target::FrameRgba;
pub use crate::schedule::Scheduler;
pub use crate::theme::controller::{
    ThemeSnapshot, ThemeTransitionController, TransitionState, TransitionStep, TransitionTiming,
};
pub use crate::theme::mode::ThemeMode;
pub use crate::theme::store::{
    FileBackend, FixedColorScheme, MemoryBackend, OsColorScheme, ThemePreferenceStore,
};
pub use crate::toggle::{ToggleIcon, ToggleView};
