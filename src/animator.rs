//! Per-frame walk of the room actor between the desk and the light switch.
//!
//! The simulation is a pure function over [`AnimatorState`]: the caller feeds the controller's
//! busy flag and committed theme every frame and applies the returned pose and, at most once
//! per excursion, the [`EndpointEffects`].

use std::f64::consts::{FRAC_PI_2, PI};

use crate::{
    foundation::{
        core::{Millis, Rgb, Vec3},
        error::{RoomError, RoomResult},
    },
    theme::mode::ThemeMode,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    /// Towards the target anchor.
    #[default]
    Forward,
    /// Back towards the idle anchor.
    Back,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Self::Forward => 1.0,
            Self::Back => -1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct ActorProgress {
    /// Fraction of the way from the idle anchor to the target anchor, in `[0, 1]`.
    pub progress: f64,
    pub direction: Direction,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct AnimatorState {
    pub progress: ActorProgress,
    /// The current excursion already returned; hold the idle pose until the transition ends.
    pub parked: bool,
    pub completed_excursions: u64,
}

impl AnimatorState {
    pub fn is_walking(&self) -> bool {
        !self.parked && (self.progress.progress > 0.0 || self.progress.direction == Direction::Back)
    }

    /// The current excursion already reached the target anchor.
    pub fn passed_endpoint(&self) -> bool {
        self.parked || self.progress.direction == Direction::Back
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize)]
pub struct LimbPose {
    pub right_leg: f64,
    pub left_leg: f64,
    pub right_arm: f64,
    pub left_arm: f64,
}

impl LimbPose {
    pub const NEUTRAL: Self = Self {
        right_leg: 0.0,
        left_leg: 0.0,
        right_arm: 0.0,
        left_arm: 0.0,
    };

    fn swing(phase: f64) -> Self {
        Self {
            right_leg: phase,
            left_leg: -phase,
            right_arm: -phase,
            left_arm: phase,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ActorPose {
    pub position: Vec3,
    /// Rotation about the vertical axis.
    pub yaw: f64,
    pub limbs: LimbPose,
}

/// Yaw of an actor facing the desk.
pub const FACING_DESK: f64 = PI;
/// Yaw while walking towards the switch.
pub const FACING_SWITCH: f64 = -FRAC_PI_2;
/// Yaw while walking back to the desk.
pub const FACING_RETURN: f64 = FRAC_PI_2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct RoomPalette {
    pub floor: Rgb,
    pub wall: Rgb,
    pub body: Rgb,
}

/// Cosmetic scene values matching a committed theme.
///
/// Dark rooms have the desk lamp on, a dim window and the switch pressed down; light rooms have
/// the lamp off, full window light and the switch up.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct EndpointEffects {
    pub theme: ThemeMode,
    pub switch_on: bool,
    /// Vertical offset of the switch button from the plate center.
    pub switch_offset: f64,
    pub lamp_intensity: f64,
    pub sun_intensity: f64,
    pub ambient: Rgb,
    pub palette: RoomPalette,
}

impl EndpointEffects {
    pub fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::Dark => Self {
                theme,
                switch_on: true,
                switch_offset: -0.05,
                lamp_intensity: 1.0,
                sun_intensity: 0.1,
                ambient: Rgb::hex(0x333333),
                palette: RoomPalette {
                    floor: Rgb::hex(0x333333),
                    wall: Rgb::hex(0x222222),
                    body: Rgb::hex(0x2244AA),
                },
            },
            ThemeMode::Light => Self {
                theme,
                switch_on: false,
                switch_offset: 0.05,
                lamp_intensity: 0.0,
                sun_intensity: 1.0,
                ambient: Rgb::hex(0xCCCCCC),
                palette: RoomPalette {
                    floor: Rgb::hex(0xEEEEEE),
                    wall: Rgb::hex(0xFFFFFF),
                    body: Rgb::hex(0x44AAFF),
                },
            },
        }
    }
}

/// Smallest accepted per-frame progress; one leg then takes at most 10 000 frames.
pub const MIN_WALK_STEP: f64 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WalkPath {
    /// Anchor A: standing at the desk.
    pub idle_anchor: Vec3,
    /// Anchor B: standing at the switch.
    pub target_anchor: Vec3,
    /// Progress added per frame.
    pub step: f64,
    /// Peak limb rotation in radians.
    pub swing_amplitude: f64,
    /// Limb oscillation rate in radians per millisecond.
    pub swing_rate: f64,
}

impl Default for WalkPath {
    fn default() -> Self {
        Self {
            idle_anchor: Vec3::new(-0.5, -0.5, -1.0),
            target_anchor: Vec3::new(-2.0, -0.5, -1.0),
            step: 0.02,
            swing_amplitude: 0.2,
            swing_rate: 0.01,
        }
    }
}

impl WalkPath {
    pub fn validate(&self) -> RoomResult<()> {
        if !self.step.is_finite() || self.step < MIN_WALK_STEP || self.step > 1.0 {
            return Err(RoomError::validation(format!(
                "walk step must be in [{MIN_WALK_STEP}, 1]"
            )));
        }
        if !self.idle_anchor.is_finite() || !self.target_anchor.is_finite() {
            return Err(RoomError::validation("walk anchors must be finite"));
        }
        if !self.swing_amplitude.is_finite() || !self.swing_rate.is_finite() {
            return Err(RoomError::validation("limb swing parameters must be finite"));
        }
        Ok(())
    }

    /// Frames needed for a full excursion, out and back.
    pub fn excursion_frames(&self) -> u64 {
        ((1.0 / self.step).ceil() as u64).saturating_mul(2)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameInput {
    pub busy: bool,
    pub theme: ThemeMode,
    pub now: Millis,
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct FrameOutput {
    pub pose: ActorPose,
    /// Set on the single frame an excursion reaches the target anchor.
    pub endpoint: Option<EndpointEffects>,
    /// Set on the single frame an excursion returns to the idle anchor.
    pub excursion_completed: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SceneActorAnimator {
    path: WalkPath,
}

impl SceneActorAnimator {
    pub fn new(path: WalkPath) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &WalkPath {
        &self.path
    }

    pub fn idle_pose(&self) -> ActorPose {
        ActorPose {
            position: self.path.idle_anchor,
            yaw: FACING_DESK,
            limbs: LimbPose::NEUTRAL,
        }
    }

    pub fn step(&self, state: AnimatorState, input: FrameInput) -> (AnimatorState, FrameOutput) {
        let idle = FrameOutput {
            pose: self.idle_pose(),
            endpoint: None,
            excursion_completed: false,
        };

        if !input.busy {
            let rested = AnimatorState {
                progress: ActorProgress::default(),
                parked: false,
                completed_excursions: state.completed_excursions,
            };
            return (rested, idle);
        }
        if state.parked {
            return (state, idle);
        }

        let mut next = state;
        let mut endpoint = None;
        let mut excursion_completed = false;

        let p = &mut next.progress;
        p.progress += self.path.step * p.direction.sign();

        if p.progress >= 1.0 && p.direction == Direction::Forward {
            p.progress = 1.0;
            p.direction = Direction::Back;
            endpoint = Some(EndpointEffects::for_theme(input.theme));
        } else if p.progress <= 0.0 && p.direction == Direction::Back {
            p.progress = 0.0;
            p.direction = Direction::Forward;
            next.parked = true;
            next.completed_excursions += 1;
            excursion_completed = true;
        }
        p.progress = p.progress.clamp(0.0, 1.0);

        if next.parked {
            return (
                next,
                FrameOutput {
                    excursion_completed,
                    ..idle
                },
            );
        }

        let position = self.path.idle_anchor.lerp(self.path.target_anchor, p.progress);
        let yaw = match p.direction {
            Direction::Forward => FACING_SWITCH,
            Direction::Back => FACING_RETURN,
        };
        let phase = (input.now.as_f64() * self.path.swing_rate).sin() * self.path.swing_amplitude;

        (
            next,
            FrameOutput {
                pose: ActorPose {
                    position,
                    yaw,
                    limbs: LimbPose::swing(phase),
                },
                endpoint,
                excursion_completed,
            },
        )
    }
}
