//! Transfer settings.
//!
//! Settings are stored as TOML:
//! - Linux: `~/.config/stowage/transfer.toml`
//! - Windows: `%APPDATA%/stowage/transfer.toml`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stowage_file_ops::{AssetPatterns, DEFAULT_THUMBNAIL_MARKER};
use stowage_protocol::{Charset, RemoteSession, Session};
use stowage_transfer::{DEFAULT_BLOCK_SIZE, MergeStrategy};

use crate::ConfigError;

/// Tunables for uploads, merges and relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Streaming block size in bytes.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Prefix that marks an asset's thumbnail image.
    #[serde(default = "default_thumbnail_marker")]
    pub thumbnail_marker: String,

    /// Name charset used when the server refuses UTF-8.
    #[serde(default)]
    pub fallback_charset: Charset,

    /// Log the session out once an upload has been decided.
    #[serde(default = "default_true")]
    pub close_session_after_upload: bool,

    #[serde(default)]
    pub merge_strategy: MergeStrategy,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_thumbnail_marker() -> String {
    DEFAULT_THUMBNAIL_MARKER.into()
}

fn default_true() -> bool {
    true
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            thumbnail_marker: default_thumbnail_marker(),
            fallback_charset: Charset::default(),
            close_session_after_upload: default_true(),
            merge_strategy: MergeStrategy::default(),
        }
    }
}

impl TransferSettings {
    /// Loads settings from `path`, writing the defaults there if it is missing.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let settings = Self::default();
            settings.save(path)?;
            Ok(settings)
        }
    }

    /// Writes the settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Wraps a raw session with the configured fallback charset.
    pub fn session<S: RemoteSession>(&self, remote: S) -> Session<S> {
        Session::with_fallback_charset(remote, self.fallback_charset)
    }

    /// Companion-file patterns using the configured thumbnail marker.
    pub fn asset_patterns(&self) -> AssetPatterns {
        AssetPatterns {
            thumbnail_marker: self.thumbnail_marker.clone(),
            ..AssetPatterns::default()
        }
    }
}

/// Returns the platform-specific settings file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("stowage")
            .join("transfer.toml")
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("stowage").join("transfer.toml")
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        PathBuf::from("/tmp/stowage/transfer.toml")
    }
}
