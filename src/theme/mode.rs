use std::{fmt, str::FromStr};

use crate::foundation::error::RoomError;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, Self::Dark)
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeMode {
    type Err = RoomError;

    /// Accepts exactly `light` or `dark`, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            other => Err(RoomError::validation(format!(
                "unknown theme mode '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stored_strings() {
        assert_eq!("dark".parse::<ThemeMode>().unwrap(), ThemeMode::Dark);
        assert_eq!(" light\n".parse::<ThemeMode>().unwrap(), ThemeMode::Light);
        assert!("Dark".parse::<ThemeMode>().is_err());
        assert!("".parse::<ThemeMode>().is_err());
    }

    #[test]
    fn toggled_is_an_involution() {
        for m in [ThemeMode::Light, ThemeMode::Dark] {
            assert_ne!(m.toggled(), m);
            assert_eq!(m.toggled().toggled(), m);
        }
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&ThemeMode::Dark).unwrap(), "\"dark\"");
        let m: ThemeMode = serde_json::from_str("\"light\"").unwrap();
        assert_eq!(m, ThemeMode::Light);
    }
}
