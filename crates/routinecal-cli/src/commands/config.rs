use clap::Subcommand;
use routinecal_core::{Config, ConfigError};

use super::{CliResult, Context};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "calendar.calendar_id", "retry.max_attempts")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// List all config values
    List,
    /// Reset config to defaults
    Reset,
}

pub fn run(ctx: &Context, action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let config = ctx.config()?;
            match config.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(ConfigError::UnknownKey(key).into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut config = ctx.config()?;
            config.set(&key, &value)?;
            config.save_to(&ctx.data_dir)?;
            println!("ok");
        }
        ConfigAction::List => {
            let config = ctx.config()?;
            for (key, value) in config.entries() {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            Config::default().save_to(&ctx.data_dir)?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
