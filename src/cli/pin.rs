//! Settings PIN commands
//!
//! The plaintext PIN only ever lives in a `Zeroizing` buffer.

use clap::Subcommand;
use zeroize::Zeroizing;

use crate::config::paths::ShoeboxPaths;
use crate::config::settings::Settings;
use crate::error::{ShoeboxError, ShoeboxResult};

/// PIN subcommands
#[derive(Subcommand)]
pub enum PinCommands {
    /// Set or change the settings PIN
    Set,
    /// Remove the settings PIN
    Clear,
}

/// Handle a PIN command
pub fn handle_pin_command(paths: &ShoeboxPaths, cmd: PinCommands) -> ShoeboxResult<()> {
    let mut settings = Settings::load_or_create(paths)?;

    match cmd {
        PinCommands::Set => {
            if settings.has_pin() {
                require_current_pin(&settings)?;
            }

            let pin = prompt_pin("New PIN: ")?;
            let confirm = prompt_pin("Confirm PIN: ")?;
            if *pin != *confirm {
                return Err(ShoeboxError::Settings("PINs do not match".into()));
            }

            settings.set_pin(&pin)?;
            settings.save(paths)?;
            println!("PIN set.");
        }

        PinCommands::Clear => {
            if !settings.has_pin() {
                println!("No PIN is set.");
                return Ok(());
            }

            require_current_pin(&settings)?;
            settings.clear_pin();
            settings.save(paths)?;
            println!("PIN removed.");
        }
    }

    Ok(())
}

fn require_current_pin(settings: &Settings) -> ShoeboxResult<()> {
    let current = prompt_pin("Current PIN: ")?;
    if settings.verify_pin(&current)? {
        Ok(())
    } else {
        Err(ShoeboxError::Settings("Incorrect PIN".into()))
    }
}

fn prompt_pin(prompt: &str) -> ShoeboxResult<Zeroizing<String>> {
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .map_err(|e| ShoeboxError::Settings(format!("Failed to read PIN: {}", e)))
}
