use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use crate::{
    foundation::error::{RoomError, RoomResult},
    theme::mode::ThemeMode,
};

/// Key under which the theme choice is persisted.
pub const THEME_KEY: &str = "theme";

/// Durable string key-value storage.
pub trait PreferenceBackend {
    fn read(&self, key: &str) -> RoomResult<Option<String>>;
    fn write(&mut self, key: &str, value: &str) -> RoomResult<()>;
    fn remove(&mut self, key: &str) -> RoomResult<()>;
}

/// In-process storage. `unavailable()` builds one whose every access fails.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
    unavailable: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut b = Self::new();
        b.entries.insert(key.to_string(), value.to_string());
        b
    }

    pub fn unavailable() -> Self {
        Self {
            entries: HashMap::new(),
            unavailable: true,
        }
    }

    fn check(&self) -> RoomResult<()> {
        if self.unavailable {
            return Err(RoomError::storage("memory backend is unavailable"));
        }
        Ok(())
    }
}

impl PreferenceBackend for MemoryBackend {
    fn read(&self, key: &str) -> RoomResult<Option<String>> {
        self.check()?;
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> RoomResult<()> {
        self.check()?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> RoomResult<()> {
        self.check()?;
        self.entries.remove(key);
        Ok(())
    }
}

/// A JSON object of strings on disk, e.g. `{"theme":"dark"}`. A missing file reads as empty.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> RoomResult<BTreeMap<String, String>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(RoomError::storage(format!(
                    "read '{}': {e}",
                    self.path.display()
                )));
            }
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn store_map(&self, map: &BTreeMap<String, String>) -> RoomResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                RoomError::storage(format!("create dir '{}': {e}", parent.display()))
            })?;
        }
        let text = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, text)
            .map_err(|e| RoomError::storage(format!("write '{}': {e}", self.path.display())))
    }
}

impl PreferenceBackend for FileBackend {
    fn read(&self, key: &str) -> RoomResult<Option<String>> {
        Ok(self.load_map()?.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> RoomResult<()> {
        // A corrupt file is replaced rather than blocking the write.
        let mut map = self.load_map().unwrap_or_default();
        map.insert(key.to_string(), value.to_string());
        self.store_map(&map)
    }

    fn remove(&mut self, key: &str) -> RoomResult<()> {
        let mut map = self.load_map().unwrap_or_default();
        if map.remove(key).is_some() {
            self.store_map(&map)?;
        }
        Ok(())
    }
}

/// Ambient "prefers dark color scheme" signal.
pub trait ColorSchemeProbe {
    fn prefers_dark(&self) -> bool;
}

/// Asks the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsColorScheme;

impl ColorSchemeProbe for OsColorScheme {
    fn prefers_dark(&self) -> bool {
        matches!(dark_light::detect(), dark_light::Mode::Dark)
    }
}

/// A fixed answer, for tests and headless runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedColorScheme(pub bool);

impl ColorSchemeProbe for FixedColorScheme {
    fn prefers_dark(&self) -> bool {
        self.0
    }
}

/// Persisted theme choice with system-preference fallback.
///
/// Every operation is infallible from the caller's point of view: storage failures are
/// logged and treated as "nothing stored" (reads) or dropped (writes).
pub struct ThemePreferenceStore {
    backend: Box<dyn PreferenceBackend>,
    probe: Box<dyn ColorSchemeProbe>,
}

impl ThemePreferenceStore {
    pub fn new(
        backend: impl PreferenceBackend + 'static,
        probe: impl ColorSchemeProbe + 'static,
    ) -> Self {
        Self {
            backend: Box::new(backend),
            probe: Box::new(probe),
        }
    }

    pub fn in_memory(prefers_dark: bool) -> Self {
        Self::new(MemoryBackend::new(), FixedColorScheme(prefers_dark))
    }

    pub fn backend(&self) -> &dyn PreferenceBackend {
        self.backend.as_ref()
    }

    pub fn load(&self) -> Option<ThemeMode> {
        let raw = match self.backend.read(THEME_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(%err, "theme preference unreadable; treating as absent");
                return None;
            }
        };
        match raw.parse::<ThemeMode>() {
            Ok(mode) => Some(mode),
            Err(err) => {
                tracing::debug!(%err, "ignoring malformed stored theme");
                None
            }
        }
    }

    pub fn resolve_initial(&self) -> ThemeMode {
        if let Some(mode) = self.load() {
            return mode;
        }
        if self.probe.prefers_dark() {
            ThemeMode::Dark
        } else {
            ThemeMode::Light
        }
    }

    pub fn save(&mut self, mode: ThemeMode) {
        if let Err(err) = self.backend.write(THEME_KEY, mode.as_str()) {
            tracing::warn!(%err, theme = %mode, "dropping theme preference write");
        }
    }

    pub fn clear(&mut self) {
        if let Err(err) = self.backend.remove(THEME_KEY) {
            tracing::warn!(%err, "could not clear theme preference");
        }
    }
}

impl std::fmt::Debug for ThemePreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemePreferenceStore").finish_non_exhaustive()
    }
}
