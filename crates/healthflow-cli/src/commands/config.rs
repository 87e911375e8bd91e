use std::path::Path;

use anyhow::Result;

use crate::cli::ConfigCommands;
use crate::output::{OutputFormat, json::print_json};
use crate::settings;

pub fn run(command: ConfigCommands, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            let path = settings::config_path(config)?;
            if format.is_json() {
                print_json(&serde_json::json!({ "path": path }))
            } else {
                println!("{}", path.display());
                Ok(())
            }
        }
        ConfigCommands::Show => {
            let shown = settings::masked(settings::load_settings(config)?);
            if format.is_json() {
                print_json(&shown)
            } else {
                print!("{}", toml::to_string_pretty(&shown)?);
                Ok(())
            }
        }
    }
}
