//! Core data models for Shoebox
//!
//! The live library consists of categories and the photos filed under them.

pub mod category;
pub mod ids;
pub mod photo;

pub use category::{Category, CategoryValidationError};
pub use ids::{CategoryId, PhotoId};
pub use photo::Photo;
