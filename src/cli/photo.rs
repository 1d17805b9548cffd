//! Photo CLI commands

use std::path::PathBuf;

use clap::Subcommand;
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;

use crate::error::{ShoeboxError, ShoeboxResult};
use crate::models::{Category, Photo};
use crate::storage::{LibraryStore, PhotoFileStore, Storage};

use super::format_size;

/// Photo subcommands
#[derive(Subcommand)]
pub enum PhotoCommands {
    /// Copy a photo into the library
    Add {
        /// Image file to add
        file: PathBuf,
        /// Category name
        #[arg(short, long)]
        category: String,
        /// Caption (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List photos
    List {
        /// Only photos in this category
        #[arg(short, long)]
        category: Option<String>,
    },
}

#[derive(Tabled)]
struct PhotoRow {
    id: String,
    name: String,
    category: String,
    path: String,
    size: String,
    added: String,
}

/// Handle a photo command
pub fn handle_photo_command(storage: &Storage, cmd: PhotoCommands) -> ShoeboxResult<()> {
    match cmd {
        PhotoCommands::Add {
            file,
            category,
            name,
        } => {
            let category = require_category(storage, &category)?;
            if !file.is_file() {
                return Err(ShoeboxError::FileNotFound(file));
            }
            let file_name = file
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .ok_or_else(|| ShoeboxError::Validation(format!("Not a file: {}", file.display())))?;

            let files = storage.files();
            let mut photo = Photo::new(file_name.clone(), category.id);
            if files.exists(&file_name) || storage.find_photo_by_path(&file_name)?.is_some() {
                photo.source_path = format!("{}_{}", photo.id.short(), file_name);
            }
            if let Some(name) = name {
                photo.display_name = name;
            }

            photo.file_size_bytes = files.copy_in(&file, &photo.source_path)?;
            match image::image_dimensions(&file) {
                Ok((width, height)) => {
                    photo.width = width;
                    photo.height = height;
                }
                Err(e) => debug!(error = %e, "could not read image dimensions"),
            }

            let photo = storage.insert_photo(photo)?;
            println!("Added {} to {} ({})", photo.source_path, category.name, photo.id);
        }

        PhotoCommands::List { category } => {
            let categories = storage.list_categories()?;
            let filter = match category {
                Some(name) => Some(require_category(storage, &name)?.id),
                None => None,
            };

            let photos: Vec<Photo> = storage
                .list_photos()?
                .into_iter()
                .filter(|p| filter.map_or(true, |id| p.category_id == id))
                .collect();
            if photos.is_empty() {
                println!("No photos.");
                return Ok(());
            }

            let rows = photos.iter().map(|p| PhotoRow {
                id: p.id.short(),
                name: p.to_string(),
                category: categories
                    .iter()
                    .find(|c| c.id == p.category_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| "?".into()),
                path: p.source_path.clone(),
                size: format_size(p.file_size_bytes),
                added: p.created_at.format("%Y-%m-%d").to_string(),
            });
            println!("{}", Table::new(rows).with(Style::rounded()));
            println!("Total: {} photo(s)", photos.len());
        }
    }

    Ok(())
}

fn require_category(storage: &Storage, name: &str) -> ShoeboxResult<Category> {
    storage
        .find_category_by_name(name)?
        .ok_or_else(|| ShoeboxError::category_not_found(name))
}
