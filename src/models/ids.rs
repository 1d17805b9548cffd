//! Typed ids for categories and photos
//!
//! Live ids are UUIDs. Backup documents carry them as plain strings, which
//! may come from older releases, so parsing is lenient and never panics.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! define_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Parse a backup key, hyphenated or not, ignoring surrounding whitespace
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s.trim()).map(Self)
            }

            /// The string stored in backup documents
            pub fn key(&self) -> String {
                self.0.hyphenated().to_string()
            }

            /// First eight hex digits, used for file name disambiguation
            pub fn short(&self) -> String {
                self.0.simple().to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.short())
            }
        }
    };
}

define_id!(CategoryId, "cat-");
define_id!(PhotoId, "pho-");

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn test_backup_key_forms() {
        let id = PhotoId::parse(KEY).unwrap();
        assert_eq!(id.key(), KEY);
        assert_eq!(PhotoId::parse(" 550e8400e29b41d4a716446655440000\n").unwrap(), id);
        assert!(PhotoId::parse("pho-550e8400").is_err());
        assert!(CategoryId::parse("").is_err());
    }

    #[test]
    fn test_short_and_display() {
        let id = CategoryId::parse(KEY).unwrap();
        assert_eq!(id.short(), "550e8400");
        assert_eq!(id.to_string(), "cat-550e8400");
    }

    #[test]
    fn test_serializes_as_bare_key() {
        let id = PhotoId::parse(KEY).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), format!("\"{}\"", KEY));
    }
}
