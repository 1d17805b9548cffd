//! Configuration module for Shoebox
//!
//! This module provides configuration management including:
//! - Platform-aware path resolution
//! - User settings persistence
//! - PIN credential hashing

pub mod paths;
pub mod pin;
pub mod settings;

pub use paths::ShoeboxPaths;
pub use settings::{Preferences, Settings};
