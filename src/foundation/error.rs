pub type RoomResult<T> = Result<T, RoomError>;

#[derive(thiserror::Error, Debug)]
pub enum RoomError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("scene init error: {0}")]
    SceneInit(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RoomError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn scene_init(msg: impl Into<String>) -> Self {
        Self::SceneInit(msg.into())
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            RoomError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(RoomError::storage("x").to_string().contains("storage error:"));
        assert!(
            RoomError::scene_init("x")
                .to_string()
                .contains("scene init error:")
        );
        assert!(
            RoomError::Serde("x".into())
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = RoomError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn json_errors_map_to_serde() {
        let err: RoomError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, RoomError::Serde(_)));
    }
}
