//! Category model
//!
//! Categories group photos ("family", "pets", ...). The `name` is the stable
//! key used to match categories across restores; ids are store-local.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::CategoryId;

/// Maximum category name length
pub const MAX_CATEGORY_NAME_LEN: usize = 64;

/// A photo category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier
    pub id: CategoryId,

    /// Unique, case-sensitive key
    pub name: String,

    /// Label shown in the UI
    pub display_name: String,

    /// Ordering position in the category picker
    #[serde(default)]
    pub position: i32,

    /// Icon resource reference
    #[serde(default)]
    pub icon_ref: Option<String>,

    /// Accent color as `#RRGGBB`
    #[serde(default)]
    pub color_hex: Option<String>,

    /// Seeded by the app on first run; survives a replace-restore
    #[serde(default)]
    pub is_default: bool,

    /// When the category was created
    pub created_at: DateTime<Utc>,

    /// When the category was last modified
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Create a new category whose display name equals its name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: CategoryId::new(),
            display_name: name.clone(),
            name,
            position: 0,
            icon_ref: None,
            color_hex: None,
            is_default: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a new category at a given position
    pub fn with_position(name: impl Into<String>, position: i32) -> Self {
        let mut category = Self::new(name);
        category.position = position;
        category
    }

    /// Mark as an app-seeded default
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Validate the category
    pub fn validate(&self) -> Result<(), CategoryValidationError> {
        if self.name.trim().is_empty() {
            return Err(CategoryValidationError::EmptyName);
        }

        if self.name.len() > MAX_CATEGORY_NAME_LEN {
            return Err(CategoryValidationError::NameTooLong(self.name.len()));
        }

        if let Some(color) = &self.color_hex {
            if !is_hex_color(color) {
                return Err(CategoryValidationError::InvalidColor(color.clone()));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

fn is_hex_color(s: &str) -> bool {
    s.strip_prefix('#')
        .map(|hex| (hex.len() == 6 || hex.len() == 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Validation errors for categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryValidationError {
    EmptyName,
    NameTooLong(usize),
    InvalidColor(String),
}

impl fmt::Display for CategoryValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(f, "Category name cannot be empty"),
            Self::NameTooLong(len) => write!(
                f,
                "Category name too long ({} chars, max {})",
                len, MAX_CATEGORY_NAME_LEN
            ),
            Self::InvalidColor(c) => write!(f, "Invalid color '{}', expected #RRGGBB", c),
        }
    }
}

impl std::error::Error for CategoryValidationError {}
