//! Configuration view and validation commands: `clipflow config`.

use anyhow::{Context, Result, bail};

use clipflow::config::{ClipflowToml, Config};

use super::super::{Cli, ConfigCommands};

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = Config::load(
                cli.config.clone(),
                cli.backend_url.clone(),
                cli.verbose,
                cli.yes,
            )?;
            println!();
            match &config.source {
                Some(path) => println!("Config file: {}", path.display()),
                None => println!("No clipflow.toml found, using defaults"),
            }
            println!();
            println!("[backend]");
            println!("  url = \"{}\"", config.backend().url);
            println!(
                "  request_timeout_secs = {}",
                config.backend().request_timeout_secs
            );
            println!(
                "  connect_timeout_secs = {}",
                config.backend().connect_timeout_secs
            );
            println!();
            let bounds = config.clip_bounds();
            println!("[clips]");
            println!("  min_duration_secs = {}", bounds.min);
            println!("  max_duration_secs = {}", bounds.max);
            println!();
        }
        Some(ConfigCommands::Validate) => {
            let config = Config::load(
                cli.config.clone(),
                cli.backend_url.clone(),
                cli.verbose,
                cli.yes,
            )?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                for warning in &warnings {
                    println!("warning: {}", warning);
                }
                bail!("{} configuration problem(s) found", warnings.len());
            }
        }
        Some(ConfigCommands::Init) => {
            let path = match cli.config.clone().or_else(Config::default_path) {
                Some(path) => path,
                None => bail!("No config directory available; pass --config <path>"),
            };
            if path.exists() && !cli.yes {
                bail!(
                    "{} already exists (use --yes to overwrite)",
                    path.display()
                );
            }
            ClipflowToml::default()
                .save(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
