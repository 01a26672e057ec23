use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The only preference key this crate reads or writes.
pub const THEME_KEY: &str = "theme";

/// Class set on the root element while the dark theme is active.
pub const DARK_MODE_CLASS: &str = "dark-mode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    pub fn from_system(prefers_dark: bool) -> Self {
        if prefers_dark { Theme::Dark } else { Theme::Light }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "dark" => Some(Theme::Dark),
            "light" => Some(Theme::Light),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    pub fn root_class(self) -> Option<&'static str> {
        match self {
            Theme::Dark => Some(DARK_MODE_CLASS),
            Theme::Light => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Flat JSON key/value file standing in for browser local storage.
#[derive(Debug)]
pub struct Preferences {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Preferences {
    pub fn load(path: &Path) -> Result<Self, PrefsError> {
        let values = match std::fs::read(path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Map::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| PrefsError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => {
                return Err(PrefsError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            values: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values
            .insert(key.to_string(), Value::String(value.to_string()));
        self.save()
    }

    fn save(&self) -> Result<(), PrefsError> {
        let write_err = |source| PrefsError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.values).map_err(|source| PrefsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, text).map_err(write_err)
    }
}

pub struct ThemeStore {
    prefs: Preferences,
    current: Theme,
}

impl ThemeStore {
    /// Saved preference if valid, otherwise the system preference.
    pub fn open(path: &Path, prefers_dark: bool) -> Self {
        let prefs = Preferences::load(path).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "preferences unreadable; using defaults");
            Preferences::empty(path)
        });

        let saved = prefs.get(THEME_KEY);
        let current = match saved.and_then(Theme::parse) {
            Some(theme) => theme,
            None => {
                if let Some(value) = saved {
                    tracing::warn!(value, "ignoring unrecognised theme preference");
                }
                Theme::from_system(prefers_dark)
            }
        };
        tracing::debug!(theme = current.as_str(), "theme applied");

        Self { prefs, current }
    }

    pub fn current(&self) -> Theme {
        self.current
    }

    pub fn set(&mut self, theme: Theme) -> Result<(), PrefsError> {
        self.current = theme;
        self.prefs.set(THEME_KEY, theme.as_str())
    }

    /// Flips the theme. A failed write is logged; the new theme still applies.
    pub fn toggle(&mut self) -> Theme {
        let next = self.current.toggled();
        if let Err(err) = self.set(next) {
            tracing::warn!(error = %err, "could not persist theme preference");
        }
        next
    }
}
