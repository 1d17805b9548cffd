//! Storage initialization
//!
//! Handles first-run setup and default category creation

use crate::config::paths::ShoeboxPaths;
use crate::error::ShoeboxError;
use crate::models::Category;

use super::categories::CategoryData;
use super::file_io::write_json_atomic;

/// Categories seeded on first run, with their accent colors
pub const DEFAULT_CATEGORIES: &[(&str, &str, &str)] = &[
    ("family", "Family", "#E57373"),
    ("friends", "Friends", "#64B5F6"),
    ("pets", "Pets", "#81C784"),
    ("places", "Places", "#FFB74D"),
];

/// Initialize storage for a fresh installation
pub fn initialize_storage(paths: &ShoeboxPaths) -> Result<(), ShoeboxError> {
    paths.ensure_directories()?;

    if !paths.categories_file().exists() {
        create_default_categories(paths)?;
    }

    Ok(())
}

fn create_default_categories(paths: &ShoeboxPaths) -> Result<(), ShoeboxError> {
    let categories = DEFAULT_CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, (name, display_name, color))| {
            let mut category = Category::with_position(*name, i as i32).as_default();
            category.display_name = display_name.to_string();
            category.color_hex = Some(color.to_string());
            category.icon_ref = Some(format!("icon/{}", name));
            category
        })
        .collect();

    write_json_atomic(paths.categories_file(), &CategoryData { categories })
}

/// Check if storage needs initialization
pub fn needs_initialization(paths: &ShoeboxPaths) -> bool {
    !paths.categories_file().exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LibraryStore, Storage};
    use tempfile::TempDir;

    #[test]
    fn test_initialize_creates_default_categories() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ShoeboxPaths::with_base_dir(temp_dir.path().to_path_buf());

        assert!(needs_initialization(&paths));
        initialize_storage(&paths).unwrap();
        assert!(!needs_initialization(&paths));

        let storage = Storage::open(paths).unwrap();
        let categories = storage.list_categories().unwrap();
        assert_eq!(categories.len(), DEFAULT_CATEGORIES.len());
        assert!(categories.iter().all(|c| c.is_default));
        assert_eq!(categories[0].name, "family");
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let paths = ShoeboxPaths::with_base_dir(temp_dir.path().to_path_buf());

        initialize_storage(&paths).unwrap();
        let storage = Storage::open(paths.clone()).unwrap();
        storage.insert_category(Category::new("trips")).unwrap();

        initialize_storage(&paths).unwrap();
        let reopened = Storage::open(paths).unwrap();
        assert_eq!(
            reopened.list_categories().unwrap().len(),
            DEFAULT_CATEGORIES.len() + 1
        );
    }
}
