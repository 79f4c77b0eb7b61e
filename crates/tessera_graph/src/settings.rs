// SPDX-License-Identifier: MIT OR Apache-2.0
//! Settings file for tools built on the graph.
//!
//! Settings are stored as RON. Every field has a default, so a partial file
//! (or none at all) is valid.

use crate::persistence::LoadOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Conventional settings file name
pub const SETTINGS_FILE_NAME: &str = "tessera.ron";

/// Error reading or writing a settings file
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid RON for [`GraphSettings`]
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be encoded
    #[error("Failed to serialize settings: {0}")]
    Encode(#[from] ron::Error),

    /// File was written by a newer version
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Highest version understood
        supported: u32,
    },
}

/// Persistence defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceSettings {
    /// Abort loads on unresolved references instead of dropping edges
    pub strict_references: bool,
    /// Fire connection events while wiring a loaded graph
    pub emit_events: bool,
    /// Prefix the root object is saved under
    pub root_prefix: String,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            strict_references: false,
            emit_events: true,
            root_prefix: String::new(),
        }
    }
}

impl PersistenceSettings {
    /// Options to pass to a load
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            strict_references: self.strict_references,
            emit_events: self.emit_events,
        }
    }
}

/// Top-level settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Format version
    pub version: u32,
    /// Default `tracing` filter directive
    pub log_filter: String,
    /// Persistence defaults
    pub persistence: PersistenceSettings,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            log_filter: "info".to_string(),
            persistence: PersistenceSettings::default(),
        }
    }
}

impl GraphSettings {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: GraphSettings = ron::from_str(&content)?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Load settings from `path` if given, otherwise the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
