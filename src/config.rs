use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::application::DEFAULT_HORIZON_MONTHS;

/// Runtime settings. Sources, lowest precedence first: built-in defaults,
/// the optional `ecompta.toml` file, `ECOMPTA__*` environment variables.
/// Command line flags are applied on top by the CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: String,
    pub server: ServerSettings,
    pub log: LogSettings,
    pub forecast: ForecastSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastSettings {
    pub default_horizon_months: u32,
}

impl Settings {
    /// Load settings. With `path` the file must exist, otherwise
    /// `ecompta.toml` in the working directory is read when present.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let file = match path {
            Some(path) => File::with_name(path).required(true),
            None => File::with_name("ecompta").required(false),
        };

        let settings: Settings = Config::builder()
            .set_default("database", "ecompta.db")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("log.level", "info")?
            .set_default("log.json", false)?
            .set_default("forecast.default_horizon_months", DEFAULT_HORIZON_MONTHS as i64)?
            .add_source(file)
            .add_source(
                Environment::with_prefix("ECOMPTA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if settings.forecast.default_horizon_months == 0 {
            return Err(ConfigError::Message(
                "forecast.default_horizon_months must be at least 1".to_string(),
            ));
        }
        Ok(settings)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
