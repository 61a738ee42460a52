use std::sync::OnceLock;

use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct SchedulingSettings {
    pub timezone: String,
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    pub scheduling: SchedulingSettings,
}

impl AppSettings {
    fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("scheduling.timezone", "Europe/Warsaw")?
            .add_source(File::with_name("appsettings").required(false))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("HOMAR").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.scheduling.timezone.parse::<Tz>().map_err(|err| {
            anyhow::anyhow!("Invalid timezone '{}': {err}", self.scheduling.timezone)
        })
    }
}

pub fn get() -> &'static AppSettings {
    static APPSETTINGS: OnceLock<AppSettings> = OnceLock::new();
    APPSETTINGS.get_or_init(|| AppSettings::new().unwrap())
}
