use clap::Subcommand;
use quotablock_core::Settings;

use super::CliResult;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a config value
    Get {
        /// Config key (e.g. "driver.tick_interval_ms", "clock.time_zone")
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

pub fn run(action: ConfigAction) -> CliResult {
    match action {
        ConfigAction::Get { key } => {
            let settings = Settings::load()?;
            match settings.get(&key) {
                Some(value) => println!("{value}"),
                None => return Err(format!("unknown key: {key}").into()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut settings = Settings::load()?;
            settings.set(&key, &value)?;
            settings.save()?;
            println!("ok");
        }
        ConfigAction::List => {
            let settings = Settings::load()?;
            for (key, value) in settings.entries() {
                println!("{key} = {value}");
            }
        }
        ConfigAction::Reset => {
            let settings = Settings::default();
            settings.save()?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
