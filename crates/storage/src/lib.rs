//! JSON-file settings persistence.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use overtype_core::Settings;
use tracing::{debug, warn};

pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `settings.json` inside `dir`, creating the directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("create config dir {}", dir.display()))?;
        Ok(Self::open(dir.join(SETTINGS_FILE_NAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable JSON yields defaults; I/O failures other than
    /// a missing file are errors.
    pub fn load(&self) -> anyhow::Result<Settings> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("read settings {}", self.path.display()));
            }
        };

        let mut settings = serde_json::from_str::<Settings>(&raw).unwrap_or_else(|err| {
            warn!(path = %self.path.display(), error = %err, "corrupt settings file, using defaults");
            Settings::default()
        });
        settings.normalize();
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let json = serde_json::to_string_pretty(&settings).context("encode settings")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        fs::write(&self.path, json)
            .with_context(|| format!("write settings {}", self.path.display()))?;
        Ok(())
    }
}
