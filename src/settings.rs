use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

pub const DEFAULT_VIBRATE_DURATION_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// How long a single Vibrate effect asks the device to buzz.
    pub vibrate_duration_ms: u64,
    /// Log a per-second countdown while a Pause effect is waiting.
    pub pause_countdown_logs: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            vibrate_duration_ms: DEFAULT_VIBRATE_DURATION_MS,
            pause_countdown_logs: true,
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    /// Opens the store at `path`. A missing file means defaults; a file that
    /// is present but not valid settings JSON is logged and ignored.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = match read_settings(&path) {
            Ok(Some(data)) => data,
            Ok(None) => EngineSettings::default(),
            Err(err) if err.is::<serde_json::Error>() => {
                log::warn!("{err:#}, using default engine settings");
                EngineSettings::default()
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn engine(&self) -> EngineSettings {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Writes `settings` to disk first; the cached copy only changes when the
    /// write succeeded.
    pub fn update_engine(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    /// Re-reads the file. Unlike [`new`](SettingsStore::new), a missing or
    /// malformed file is an error here and the cached settings stay as they are.
    pub fn reload(&self) -> Result<()> {
        let data = read_settings(&self.path)?
            .with_context(|| format!("no engine settings at {}", self.path.display()))?;
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = data;
        Ok(())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("cannot create settings dir {}", dir.display()))?;
        }
        let bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&self.path, bytes)
            .with_context(|| format!("cannot save engine settings to {}", self.path.display()))
    }
}

/// `Ok(None)` when there is no file at `path`.
fn read_settings(path: &Path) -> Result<Option<EngineSettings>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("cannot open engine settings {}", path.display()));
        }
    };
    let data = serde_json::from_str(&contents)
        .with_context(|| format!("malformed engine settings in {}", path.display()))?;
    Ok(Some(data))
}
