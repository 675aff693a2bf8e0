//! Config command

use anyhow::Result;
use fsguard_core::{ConfigLoader, EngineConfig};

use crate::cli::ConfigCommands;
use crate::output;

pub fn run(cmd: ConfigCommands, loader: &ConfigLoader, config: &EngineConfig) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config),
        ConfigCommands::Path => path(loader),
    }
}

fn show(config: &EngineConfig) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn path(loader: &ConfigLoader) -> Result<()> {
    match loader.config_path() {
        Some(path) if path.exists() => println!("{}", path),
        Some(path) => {
            println!("{}", path);
            output::info("File does not exist; built-in defaults apply");
        }
        None => output::info("No config directory could be determined"),
    }
    Ok(())
}
