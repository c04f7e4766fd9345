//! Config command: inspect and edit the settings file

use clap::{Args, Subcommand};

use crate::config::{config_file_path, unknown_key, Config};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print one setting
    Get { key: String },
    /// Change one setting; the resulting query settings must be valid
    Set {
        key: String,
        /// New value (empty clears optional paths)
        value: String,
    },
    /// Put one setting back to its default
    Unset { key: String },
    /// Show the file's settings and the query settings they produce
    #[command(visible_alias = "show")]
    List,
    /// Print the settings file location
    Path,
    /// Write a settings file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(args: &ConfigArgs) -> anyhow::Result<()> {
    let path = config_file_path();
    match &args.command {
        ConfigCommands::Get { key } => {
            let value = Config::load().get(key).ok_or_else(|| unknown_key(key))?;
            println!("{}", value);
        }
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load();
            config.set(key, value)?;
            config.save()?;
            tracing::info!("Updated {} in {}", key, path.display());
            println!("{} = {}", key, config.get(key).unwrap_or_default());
        }
        ConfigCommands::Unset { key } => {
            let mut config = Config::load();
            config.reset(key)?;
            config.save()?;
            println!("{} = {}", key, config.get(key).unwrap_or_default());
        }
        ConfigCommands::List => {
            let config = Config::load();
            let status = if path.exists() { "" } else { " (not created, using defaults)" };
            println!("# {}{}", path.display(), status);
            for key in Config::keys() {
                if let Some(value) = config.get(key) {
                    println!("{} = {}", key, value);
                }
            }
            println!();
            print_effective(&config);
        }
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists; pass --force to overwrite it",
                    path.display()
                );
            }
            Config::default().save()?;
            println!("Wrote defaults to {}", path.display());
        }
    }
    Ok(())
}

/// What a `search` run would use, before command-line overrides.
fn print_effective(config: &Config) {
    let query = config.query_config();
    println!("# effective query settings");
    println!("attribute: {}", query.attribute);
    println!("poll interval: {:?}", query.poll.interval());
    match query.poll.run_timeout() {
        t if t.is_zero() => println!("run-loop wait: none"),
        t => println!("run-loop wait: {:?}", t),
    }
    println!("search timeout: {}s", config.timeout_secs);
    match config.validate() {
        Ok(()) => println!("valid: yes"),
        Err(e) => println!("valid: no ({:#})", e),
    }
}
