//! Server configuration
//!
//! Layered with the `config` crate: struct defaults, then an optional TOML
//! file, then `HOLDLINE__*` environment variables
//! (e.g. `HOLDLINE__TWILIO__AUTH_TOKEN`, `HOLDLINE__ENGINE__MAX_ATTEMPTS`).

use std::path::Path;

use anyhow::{Context, Result};
use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use ::config::builder::DefaultState;
use holdline_transfer_engine::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

pub const ENV_PREFIX: &str = "HOLDLINE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the HTTP server listens on
    pub bind_address: String,

    /// Externally reachable base URL of this server, used to build provider callbacks
    pub public_base_url: String,

    pub logging: LoggingConfig,

    pub engine: EngineConfig,

    /// Twilio credentials. Without them transfers are only logged.
    pub twilio: Option<TwilioConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    #[serde(default = "default_twilio_api_base")]
    pub api_base: String,
}

fn default_twilio_api_base() -> String {
    "https://api.twilio.com".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            public_base_url: "http://localhost:3000".to_string(),
            logging: LoggingConfig::default(),
            engine: EngineConfig::default(),
            twilio: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, Self::environment())
    }

    /// `HOLDLINE__*` variables, kept as strings so `+1555...` caller IDs and
    /// zero-led tokens survive. Numeric fields are converted on deserialize.
    pub fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX).separator("__")
    }

    pub fn load_from(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let builder = builder.add_source(env);

        Self::from_builder(builder)
            .with_context(|| match path {
                Some(path) => format!("Failed to load configuration from {}", path.display()),
                None => "Failed to load configuration from environment".to_string(),
            })
    }

    /// Parse configuration from TOML text, without consulting the environment.
    pub fn from_toml(text: &str) -> Result<Self> {
        Self::from_builder(Config::builder().add_source(File::from_str(text, FileFormat::Toml)))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let mut config: ServerConfig = builder.build()?.try_deserialize()?;
        config.finalize()?;
        Ok(config)
    }

    /// Fill derived settings and validate.
    fn finalize(&mut self) -> Result<()> {
        self.public_base_url = self.public_base_url.trim_end_matches('/').to_string();
        if self.engine.status_callback_url.is_empty() {
            self.engine.status_callback_url = format!("{}/voice/transfer", self.public_base_url);
        }

        self.validate().map_err(anyhow::Error::msg)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind_address: {}", self.bind_address));
        }

        if !self.public_base_url.starts_with("http://") && !self.public_base_url.starts_with("https://") {
            return Err(format!("public_base_url must be an http(s) URL: {}", self.public_base_url));
        }

        if let Some(twilio) = &self.twilio {
            if twilio.account_sid.is_empty() || twilio.auth_token.is_empty() {
                return Err("twilio.account_sid and twilio.auth_token are required".to_string());
            }
        }

        self.engine.validate()
    }
}
