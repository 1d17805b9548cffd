//! Category CLI commands

use clap::Subcommand;
use tabled::{settings::Style, Table, Tabled};

use crate::error::{ShoeboxError, ShoeboxResult};
use crate::models::Category;
use crate::storage::{LibraryStore, Storage};

/// Category subcommands
#[derive(Subcommand)]
pub enum CategoryCommands {
    /// List all categories
    List,

    /// Create a new category
    Add {
        /// Category name (unique key)
        name: String,
        /// Label shown in the UI
        #[arg(short, long)]
        display_name: Option<String>,
        /// Accent color as #RRGGBB
        #[arg(short, long)]
        color: Option<String>,
    },
}

#[derive(Tabled)]
struct CategoryRow {
    name: String,
    #[tabled(rename = "display name")]
    display_name: String,
    photos: usize,
    default: String,
    id: String,
}

/// Handle a category command
pub fn handle_category_command(storage: &Storage, cmd: CategoryCommands) -> ShoeboxResult<()> {
    match cmd {
        CategoryCommands::List => {
            let categories = storage.list_categories()?;
            if categories.is_empty() {
                println!("No categories. Run 'shoebox init' first.");
                return Ok(());
            }

            let photos = storage.list_photos()?;
            let rows = categories.iter().map(|c| CategoryRow {
                name: c.name.clone(),
                display_name: c.display_name.clone(),
                photos: photos.iter().filter(|p| p.category_id == c.id).count(),
                default: if c.is_default { "yes".into() } else { String::new() },
                id: c.id.to_string(),
            });
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        CategoryCommands::Add {
            name,
            display_name,
            color,
        } => {
            let position = storage.list_categories()?.len() as i32;
            let mut category = Category::with_position(name, position);
            if let Some(display_name) = display_name {
                category.display_name = display_name;
            }
            category.color_hex = color;

            let category = storage.insert_category(category).map_err(|e| match e {
                ShoeboxError::Duplicate { identifier, .. } => {
                    ShoeboxError::Validation(format!("Category '{}' already exists", identifier))
                }
                other => other,
            })?;
            println!("Created category: {} ({})", category.name, category.id);
        }
    }

    Ok(())
}
