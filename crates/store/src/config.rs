//! Persisted settings with change notification.
//!
//! Reads are fail-soft: a missing, unreadable, or corrupt settings file
//! degrades to defaults with a logged warning. Explicit saves propagate
//! their failure to the caller so the UI can surface a notice. Every
//! successful save notifies watch subscribers before it returns, so a
//! subscriber never observes the notification after a stale read.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tokio::sync::watch;

use shared::settings::{Settings, SettingsPatch};

fn config_path() -> Option<PathBuf> {
    let proj = directories::ProjectDirs::from("com.local", "TextLens", "TextLens")?;
    let _ = fs::create_dir_all(proj.config_dir());
    Some(proj.config_dir().join("settings.json"))
}

fn load_or_default(path: Option<&PathBuf>) -> Settings {
    let Some(path) = path else {
        return Settings::default();
    };
    if !path.exists() {
        return Settings::default();
    }
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "settings file unreadable, using defaults");
                Settings::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "settings file unreadable, using defaults");
            Settings::default()
        }
    }
}

/// Owner of the persisted [`Settings`] singleton.
pub struct ConfigStore {
    path: Option<PathBuf>,
    cache: RwLock<Settings>,
    notify: watch::Sender<Settings>,
}

impl ConfigStore {
    /// Open the store at the platform config location.
    pub fn open() -> Self {
        Self::with_path(config_path())
    }

    /// Open the store against an explicit file (tests, portable installs).
    pub fn at_path(path: PathBuf) -> Self {
        Self::with_path(Some(path))
    }

    /// A store with no backing file; saves update memory only.
    pub fn in_memory() -> Self {
        Self::with_path(None)
    }

    fn with_path(path: Option<PathBuf>) -> Self {
        let settings = load_or_default(path.as_ref());
        let (notify, _) = watch::channel(settings.clone());
        Self {
            path,
            cache: RwLock::new(settings),
            notify,
        }
    }

    /// Latest settings visible in this process.
    pub fn current(&self) -> Settings {
        self.cache.read().clone()
    }

    /// Merge a partial update, commit it, then notify subscribers.
    pub fn save(&self, patch: SettingsPatch) -> Result<Settings> {
        let mut merged = self.cache.read().clone();
        patch.apply(&mut merged);
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&merged)?;
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        }
        *self.cache.write() = merged.clone();
        self.notify.send_replace(merged.clone());
        Ok(merged)
    }

    /// Re-read the backing file, replacing the in-memory state.
    pub fn reload(&self) -> Settings {
        let settings = load_or_default(self.path.as_ref());
        *self.cache.write() = settings.clone();
        self.notify.send_replace(settings.clone());
        settings
    }

    /// Change feed. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.notify.subscribe()
    }
}
