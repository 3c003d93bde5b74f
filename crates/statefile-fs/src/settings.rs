//! Format-aware, lock-protected settings files

use std::io::Write;
use std::path::Path;

use serde::{Serialize, de::DeserializeOwned};

use crate::lock::{self, LockConfig, OpenMode};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Toml,
    Json,
    Yaml,
}

impl Format {
    /// Detect the format from the file extension.
    fn of(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Toml => "TOML",
            Self::Json => "JSON",
            Self::Yaml => "YAML",
        }
    }

    fn parse<T: DeserializeOwned>(self, path: &Path, content: &str) -> Result<T> {
        let parsed = match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| Error::SettingsParse {
            path: path.to_path_buf(),
            format: self.name().into(),
            message,
        })
    }

    fn render<T: Serialize>(self, path: &Path, value: &T) -> Result<String> {
        let rendered = match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
        };
        rendered.map_err(|message| Error::SettingsSerialize {
            path: path.to_path_buf(),
            format: self.name().into(),
            message,
        })
    }
}

/// Settings files shared between processes.
///
/// Every access goes through [`lock::exclusive_open_with`], so a reader never
/// sees a half-written file and concurrent [`SettingsStore::update`] calls
/// never lose each other's changes. The format follows the extension:
/// `.toml`, `.json`, `.yaml` or `.yml`.
#[derive(Debug, Default, Clone)]
pub struct SettingsStore {
    lock: LockConfig,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `lock` for timeout, permissions and syncing. Its mode is ignored;
    /// each operation picks the mode it needs.
    pub fn with_config(lock: LockConfig) -> Self {
        Self { lock }
    }

    pub fn load<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> Result<T> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let config = self.lock.with_mode(OpenMode::ReadExisting);
        let content = lock::exclusive_open_with(path, &config, |fh| fh.read_to_string())?;
        format.parse(path, &content)
    }

    /// Replace the file with `value`, creating it and its parents if needed.
    pub fn save<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> Result<()> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let content = format.render(path, value)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let config = self.lock.with_mode(OpenMode::TruncateCreate);
        lock::exclusive_open_with(path, &config, |fh| {
            fh.write_all(content.as_bytes())
                .map_err(|e| Error::io(path, e))
        })
    }

    /// Read, modify and write back the settings under one lock.
    ///
    /// A missing or blank file starts from `T::default()` and is always
    /// written. An existing file is only rewritten if `modify` changed the
    /// value, so untouched files keep their formatting.
    pub fn update<T, F>(&self, path: impl AsRef<Path>, modify: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T),
    {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let config = self.lock.with_mode(OpenMode::ReadWriteCreate);

        lock::exclusive_open_with(path, &config, |fh| {
            let content = fh.read_to_string()?;
            let (mut value, before) = if content.trim().is_empty() {
                (T::default(), None)
            } else {
                let value: T = format.parse(path, &content)?;
                let before = format.render(path, &value)?;
                (value, Some(before))
            };

            modify(&mut value);

            let rendered = format.render(path, &value)?;
            if before.as_deref() != Some(rendered.as_str()) {
                tracing::debug!(path = %path.display(), "settings changed, writing back");
                fh.replace_contents(rendered.as_bytes())?;
            }
            Ok(value)
        })
    }
}
