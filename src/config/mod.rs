use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::mask::PenWidth;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathError {
    MissingHomeDirectory,
}

const APP_DIR: &str = "storyedit";
const APP_CONFIG_FILE: &str = "config.json";

/// Editor settings from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EditorConfig {
    /// TTF/OTF file used for bubble text.
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    /// Directory the file sink writes flattened images into.
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    #[serde(default)]
    pub default_pen_width: Option<PenWidth>,
}

impl EditorConfig {
    pub fn pen_width(&self) -> PenWidth {
        self.default_pen_width.unwrap_or_default()
    }
}

pub fn load_editor_config() -> EditorConfig {
    let xdg_config_home = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
    let home = std::env::var_os("HOME").map(PathBuf::from);
    load_editor_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_editor_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> EditorConfig {
    match editor_config_path(xdg_config_home, home) {
        Ok(path) => load_editor_config_from(&path),
        Err(err) => {
            tracing::debug!(?err, "no config directory; using defaults");
            EditorConfig::default()
        }
    }
}

/// Reads `path`, falling back to defaults when it is absent or unreadable.
pub fn load_editor_config_from(path: &Path) -> EditorConfig {
    if !path.exists() {
        return EditorConfig::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            EditorConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            EditorConfig::default()
        }
    }
}

/// `$XDG_CONFIG_HOME/storyedit/config.json`, or `~/.config/storyedit/config.json`
/// when the XDG variable is unset or empty.
pub(crate) fn editor_config_path(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let root = match xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        Some(xdg) => xdg.to_path_buf(),
        None => home
            .ok_or(ConfigPathError::MissingHomeDirectory)?
            .join(".config"),
    };
    Ok(root.join(APP_DIR).join(APP_CONFIG_FILE))
}
