//! User settings for Shoebox
//!
//! Manages user preferences (theme, grid layout, safety flags), the PIN
//! credential, backup retention and export defaults.
//!
//! Only the preference subset is ever carried into a backup document; see
//! [`Settings::preferences`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::paths::ShoeboxPaths;
use super::pin;
use crate::error::ShoeboxError;

/// Non-secret preference fields, keyed by their backup document name
pub type Preferences = BTreeMap<String, serde_json::Value>;

/// Keys that name credential material and are refused wherever preferences
/// are imported
pub const CREDENTIAL_KEYS: &[&str] = &["pin", "pinHash", "pin_hash", "passcode", "password"];

const KEY_THEME: &str = "theme";
const KEY_GRID_COLUMNS: &str = "gridColumns";
const KEY_SHOW_CAPTIONS: &str = "showCaptions";
const KEY_LOCK_SETTINGS: &str = "lockSettingsWithPin";
const KEY_HIDE_DELETE: &str = "hideDeleteActions";
const KEY_CONFIRM_RESTORE: &str = "confirmBeforeRestore";

/// UI theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Follow the system appearance
    #[default]
    System,
    Light,
    Dark,
}

/// Parental/safety flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetySettings {
    /// Require the PIN before the settings screen opens
    #[serde(default)]
    pub lock_settings_with_pin: bool,

    /// Hide destructive actions (delete photo/category) from the UI
    #[serde(default)]
    pub hide_delete_actions: bool,

    /// Ask for confirmation before restoring a backup
    #[serde(default = "default_true")]
    pub confirm_before_restore: bool,
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            lock_settings_with_pin: false,
            hide_delete_actions: false,
            confirm_before_restore: true,
        }
    }
}

/// Backup retention settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRetention {
    /// Number of daily backups to keep
    pub daily_count: u32,
    /// Number of monthly backups to keep
    pub monthly_count: u32,
}

impl Default for BackupRetention {
    fn default() -> Self {
        Self {
            daily_count: 14,
            monthly_count: 6,
        }
    }
}

/// Defaults applied to `backup export` when the caller does not override them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDefaults {
    /// JPEG re-encode quality (1-100); `None` copies payloads verbatim
    #[serde(default)]
    pub jpeg_quality: Option<u8>,

    /// Whether to write a `thumbnails/` directory
    #[serde(default)]
    pub include_thumbnails: bool,

    /// Thumbnail edge length in pixels
    #[serde(default = "default_thumbnail_size")]
    pub thumbnail_size: u32,

    /// Deflate level for the metadata document (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: i64,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            jpeg_quality: None,
            include_thumbnails: false,
            thumbnail_size: default_thumbnail_size(),
            compression_level: default_compression_level(),
        }
    }
}

/// User settings for Shoebox
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// UI theme
    #[serde(default)]
    pub theme: Theme,

    /// Number of columns in the photo grid
    #[serde(default = "default_grid_columns")]
    pub grid_columns: u8,

    /// Whether photo captions are shown under thumbnails
    #[serde(default = "default_true")]
    pub show_captions: bool,

    /// Parental/safety flags
    #[serde(default)]
    pub safety: SafetySettings,

    /// Argon2id PHC string of the settings PIN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin_hash: Option<String>,

    /// Backup retention policy
    #[serde(default)]
    pub backup_retention: BackupRetention,

    /// Export defaults
    #[serde(default)]
    pub export: ExportDefaults,

    /// Whether initial setup has been completed
    #[serde(default)]
    pub setup_completed: bool,
}

fn default_schema_version() -> u32 {
    1
}

fn default_grid_columns() -> u8 {
    3
}

fn default_thumbnail_size() -> u32 {
    256
}

fn default_compression_level() -> i64 {
    6
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            theme: Theme::default(),
            grid_columns: default_grid_columns(),
            show_captions: true,
            safety: SafetySettings::default(),
            pin_hash: None,
            backup_retention: BackupRetention::default(),
            export: ExportDefaults::default(),
            setup_completed: false,
        }
    }
}

impl Settings {
    /// Load settings from disk, or create default settings if file doesn't exist
    pub fn load_or_create(paths: &ShoeboxPaths) -> Result<Self, ShoeboxError> {
        let settings_path = paths.settings_file();

        if settings_path.exists() {
            let contents = std::fs::read_to_string(&settings_path).map_err(|e| {
                ShoeboxError::Io(format!("Failed to read settings file: {}", e))
            })?;

            let settings: Settings = serde_json::from_str(&contents).map_err(|e| {
                ShoeboxError::Config(format!("Failed to parse settings file: {}", e))
            })?;

            Ok(settings)
        } else {
            // Don't save yet - let caller decide when to persist
            Ok(Settings::default())
        }
    }

    /// Save settings to disk
    pub fn save(&self, paths: &ShoeboxPaths) -> Result<(), ShoeboxError> {
        paths.ensure_directories()?;

        crate::storage::file_io::write_json_atomic(paths.settings_file(), self)
    }

    /// Whether a PIN has been configured
    pub fn has_pin(&self) -> bool {
        self.pin_hash.is_some()
    }

    /// Hash and store a new PIN
    pub fn set_pin(&mut self, pin: &str) -> Result<(), ShoeboxError> {
        self.pin_hash = Some(pin::hash_pin(pin)?);
        Ok(())
    }

    /// Remove the PIN and the lock that depends on it
    pub fn clear_pin(&mut self) {
        self.pin_hash = None;
        self.safety.lock_settings_with_pin = false;
    }

    /// Check a PIN against the stored hash. Without a PIN everything verifies.
    pub fn verify_pin(&self, pin: &str) -> Result<bool, ShoeboxError> {
        match &self.pin_hash {
            Some(hash) => pin::verify_pin(pin, hash),
            None => Ok(true),
        }
    }

    /// The non-secret preference subset carried in backups
    pub fn preferences(&self) -> Preferences {
        let mut prefs = Preferences::new();
        prefs.insert(KEY_THEME.into(), serde_json::json!(self.theme));
        prefs.insert(KEY_GRID_COLUMNS.into(), serde_json::json!(self.grid_columns));
        prefs.insert(KEY_SHOW_CAPTIONS.into(), serde_json::json!(self.show_captions));
        prefs.insert(
            KEY_LOCK_SETTINGS.into(),
            serde_json::json!(self.safety.lock_settings_with_pin),
        );
        prefs.insert(
            KEY_HIDE_DELETE.into(),
            serde_json::json!(self.safety.hide_delete_actions),
        );
        prefs.insert(
            KEY_CONFIRM_RESTORE.into(),
            serde_json::json!(self.safety.confirm_before_restore),
        );
        prefs
    }

    /// Apply a preference map, returning the keys that were not applied
    ///
    /// Credential keys, unknown keys and values of the wrong type are ignored.
    /// The stored PIN is never touched.
    pub fn apply_preferences(&mut self, prefs: &Preferences) -> Vec<String> {
        let mut ignored = Vec::new();

        for (key, value) in prefs {
            if CREDENTIAL_KEYS.contains(&key.as_str()) {
                ignored.push(key.clone());
                continue;
            }

            let applied = match key.as_str() {
                KEY_THEME => serde_json::from_value::<Theme>(value.clone())
                    .map(|theme| self.theme = theme)
                    .is_ok(),
                KEY_GRID_COLUMNS => value
                    .as_u64()
                    .and_then(|n| u8::try_from(n).ok())
                    .filter(|n| *n > 0)
                    .map(|n| self.grid_columns = n)
                    .is_some(),
                KEY_SHOW_CAPTIONS => value.as_bool().map(|b| self.show_captions = b).is_some(),
                KEY_LOCK_SETTINGS => value
                    .as_bool()
                    .map(|b| self.safety.lock_settings_with_pin = b)
                    .is_some(),
                KEY_HIDE_DELETE => value
                    .as_bool()
                    .map(|b| self.safety.hide_delete_actions = b)
                    .is_some(),
                KEY_CONFIRM_RESTORE => value
                    .as_bool()
                    .map(|b| self.safety.confirm_before_restore = b)
                    .is_some(),
                _ => false,
            };

            if !applied {
                ignored.push(key.clone());
            }
        }

        ignored
    }
}
