//! `parley init` — create the config directory and a starter config.

use parley_config::AppConfig;
use std::path::Path;

use super::CommandResult;

pub fn run(config_path: &Path, force: bool) -> CommandResult {
    if let Some(dir) = config_path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }

    if config_path.exists() && !force {
        println!("Config already exists at: {}", config_path.display());
        println!("Edit it manually or re-run with --force to overwrite.");
        return Ok(());
    }

    std::fs::write(config_path, AppConfig::default_toml())?;
    println!("Created {}", config_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Review the sample \"weather-bot\" agent in the config");
    println!("  2. Write a replay script for the model, then run:");
    println!("     parley chat --agent weather-bot --script <script.json> \"Weather in Paris?\"");
    Ok(())
}
