//! Configuration management CLI commands.
//!
//! Provides `config path`, `config show` and `config init`.

use std::path::Path;

use clap::Subcommand;
use geoframe::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Show the effective configuration
    Show,

    /// Write a default configuration file if none exists
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands, path: Option<&Path>) -> Result<(), CliError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(config_file_path);

    match command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = ConfigFile::load_from(&path)?;
            println!("[terrain]");
            println!("  viewport_group     = {}", config.terrain.viewport_group);
            println!("  source_group       = {}", config.terrain.source_group);
            println!("  operation_name     = {}", config.terrain.operation_name);
            println!("[tolerance]");
            println!("  length             = {}", config.tolerance.length);
            println!("[geo]");
            println!("  north_compensation = {}", config.geo.north_compensation);
            println!("[tracking]");
            println!("  namespace          = {}", config.tracking.namespace);
            println!("  key                = {}", config.tracking.key);
            println!("[logging]");
            println!("  level              = {}", config.logging.level);
            println!("  directory          = {}", config.logging.directory.display());
            println!("  file               = {}", config.logging.file);
            Ok(())
        }
        ConfigCommands::Init => {
            if path.exists() {
                println!("Config file already exists: {}", path.display());
            } else {
                ConfigFile::default().save_to(&path)?;
                println!("Created config file: {}", path.display());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_writes_defaults_once() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");

        run(ConfigCommands::Init, Some(path.as_path())).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap(), ConfigFile::default());

        std::fs::write(&path, "[tolerance]\nlength = 0.5\n").unwrap();
        run(ConfigCommands::Init, Some(path.as_path())).unwrap();
        assert_eq!(ConfigFile::load_from(&path).unwrap().tolerance.length, 0.5);
    }

    #[test]
    fn test_show_reports_invalid_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.ini");
        std::fs::write(&path, "[geo]\nnorth_compensation = maybe\n").unwrap();

        assert!(matches!(
            run(ConfigCommands::Show, Some(path.as_path())),
            Err(CliError::Config(_))
        ));
    }
}
