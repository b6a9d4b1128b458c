use crate::theme::controller::ThemeSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleIcon {
    Sun,
    Moon,
}

/// What the theme toggle button shows: the icon of the theme a press would switch to.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ToggleView {
    pub icon: ToggleIcon,
    pub disabled: bool,
    pub label: &'static str,
}

impl ToggleView {
    pub fn from_snapshot(snapshot: &ThemeSnapshot) -> Self {
        let icon = if snapshot.theme.is_dark() {
            ToggleIcon::Sun
        } else {
            ToggleIcon::Moon
        };
        Self {
            icon,
            disabled: snapshot.is_busy(),
            label: "Toggle theme",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::{controller::TransitionState, mode::ThemeMode};

    fn snap(theme: ThemeMode, state: TransitionState) -> ThemeSnapshot {
        ThemeSnapshot {
            theme,
            state,
            flips: 0,
        }
    }

    #[test]
    fn icon_shows_the_other_theme() {
        let dark = ToggleView::from_snapshot(&snap(ThemeMode::Dark, TransitionState::Idle));
        assert_eq!(dark.icon, ToggleIcon::Sun);
        assert!(!dark.disabled);
        let light = ToggleView::from_snapshot(&snap(ThemeMode::Light, TransitionState::Idle));
        assert_eq!(light.icon, ToggleIcon::Moon);
    }

    #[test]
    fn disabled_while_transitioning() {
        for state in [TransitionState::Committing, TransitionState::Settling] {
            assert!(ToggleView::from_snapshot(&snap(ThemeMode::Light, state)).disabled);
        }
    }
}
