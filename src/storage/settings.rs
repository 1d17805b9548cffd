//! Settings persistence behind the `SettingsStore` interface

use crate::config::paths::ShoeboxPaths;
use crate::config::settings::{Preferences, Settings};
use crate::error::ShoeboxResult;

use super::traits::SettingsStore;

/// `SettingsStore` backed by `settings.json`
///
/// Every call re-reads the file so a restore always works on current state.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    paths: ShoeboxPaths,
}

impl SettingsFile {
    pub fn new(paths: ShoeboxPaths) -> Self {
        Self { paths }
    }

    /// Load the full settings document
    pub fn load(&self) -> ShoeboxResult<Settings> {
        Settings::load_or_create(&self.paths)
    }
}

impl SettingsStore for SettingsFile {
    fn preferences(&self) -> ShoeboxResult<Preferences> {
        Ok(self.load()?.preferences())
    }

    fn apply_preferences(&self, preferences: &Preferences) -> ShoeboxResult<Vec<String>> {
        let mut settings = self.load()?;
        let ignored = settings.apply_preferences(preferences);
        settings.save(&self.paths)?;
        Ok(ignored)
    }
}
