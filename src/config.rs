use std::{fs::File, io::BufReader, path::Path};

use crate::{
    animator::WalkPath,
    foundation::{
        core::{Millis, Viewport},
        error::{RoomError, RoomResult},
    },
    theme::controller::TransitionTiming,
};

/// Runtime settings. Every field has a default, so `{}` is a valid config file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RoomConfig {
    pub timing: TransitionTiming,
    pub walk: WalkPath,
    /// Virtual frame period in milliseconds.
    pub frame_interval_ms: u64,
    /// Size of the room container (the toggle widget is 240x240).
    pub viewport: Viewport,
    /// Preference file; `None` keeps the choice in memory only.
    pub preference_path: Option<std::path::PathBuf>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            timing: TransitionTiming::default(),
            walk: WalkPath::default(),
            frame_interval_ms: 16,
            viewport: Viewport {
                width: 240,
                height: 240,
            },
            preference_path: None,
        }
    }
}

impl RoomConfig {
    pub fn from_json_path(path: &Path) -> RoomResult<Self> {
        let f = File::open(path)?;
        let cfg: Self = serde_json::from_reader(BufReader::new(f))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn frame_interval(&self) -> Millis {
        Millis(self.frame_interval_ms)
    }

    pub fn validate(&self) -> RoomResult<()> {
        self.walk.validate()?;
        if self.frame_interval_ms == 0 {
            return Err(RoomError::validation("frame_interval_ms must be > 0"));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(RoomError::validation("viewport must be non-empty"));
        }
        if self.timing.commit_delay == Millis::ZERO {
            return Err(RoomError::validation("timing.commit_delay must be > 0"));
        }

        // The first frame runs one interval after the toggle; the walk must park before idle.
        let walk_ms = self
            .walk
            .excursion_frames()
            .saturating_add(1)
            .saturating_mul(self.frame_interval_ms);
        let busy_ms = self.timing.total().0;
        if walk_ms > busy_ms {
            return Err(RoomError::validation(format!(
                "walk takes {walk_ms} ms but a transition is busy for only {busy_ms} ms"
            )));
        }
        Ok(())
    }
}
