//! Layered configuration, loaded once at startup.
//!
//! Priority, highest first: CLI flag or its environment variable, `RELAY_`
//! prefixed environment (`RELAY_SERVER__PORT=9000`), config file, defaults.

use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "Sorry, I couldn't process your message right now. Please try again in a moment.";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Interface to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// WhatsApp Cloud API access token
    #[arg(long, env = "ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// WhatsApp business phone number id
    #[arg(long, env = "PHONE_NUMBER_ID")]
    pub phone_number_id: Option<String>,

    /// Token expected in the webhook subscription handshake
    #[arg(long, env = "VERIFY_TOKEN", hide_env_values = true)]
    pub verify_token: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Assistant to run; one is created at startup when absent
    #[arg(long, env = "OPENAI_ASSISTANT_ID")]
    pub assistant_id: Option<String>,

    /// Name given to an assistant created at startup
    #[arg(long, env = "ASSISTANT_NAME")]
    pub assistant_name: Option<String>,

    /// Instructions given to an assistant created at startup
    #[arg(long, env = "ASSISTANT_INSTRUCTIONS")]
    pub assistant_instructions: Option<String>,

    /// Model used for an assistant created at startup
    #[arg(long, env = "ASSISTANT_MODEL")]
    pub assistant_model: Option<String>,

    /// Delay between run status checks, in milliseconds
    #[arg(long, env = "RUN_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Maximum time to wait for an assistant run, in seconds
    #[arg(long, env = "RUN_TIMEOUT_SECS")]
    pub run_timeout_secs: Option<u64>,

    /// Reply sent when the assistant cannot answer
    #[arg(long, env = "FALLBACK_MESSAGE")]
    pub fallback_message: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub whatsapp: WhatsAppConfig,
    pub assistant: AssistantConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub verify_token: String,
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    #[serde(default)]
    pub assistant_id: Option<String>,
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub run_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub fallback_message: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli = Cli::try_parse_from(args).map_err(|e| ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("whatsapp.access_token", "")?
            .set_default("whatsapp.phone_number_id", "")?
            .set_default("whatsapp.verify_token", "12345")?
            .set_default("whatsapp.api_base_url", "https://graph.facebook.com/v22.0")?
            .set_default("assistant.api_key", "")?
            .set_default("assistant.name", "WhatsApp Assistant")?
            .set_default("assistant.instructions", "You are a helpful assistant.")?
            .set_default("assistant.model", "gpt-4o-mini")?
            .set_default("assistant.base_url", "https://api.openai.com/v1")?
            .set_default("assistant.poll_interval_ms", 1000)?
            .set_default("assistant.run_timeout_secs", 30)?
            .set_default("relay.fallback_message", DEFAULT_FALLBACK_MESSAGE)?;

        // Explicit file must exist; ./config.{yaml,toml,json} is optional.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let overrides = [
            ("server.host", cli.host),
            ("whatsapp.access_token", cli.access_token),
            ("whatsapp.phone_number_id", cli.phone_number_id),
            ("whatsapp.verify_token", cli.verify_token),
            ("assistant.api_key", cli.openai_api_key),
            ("assistant.assistant_id", cli.assistant_id),
            ("assistant.name", cli.assistant_name),
            ("assistant.instructions", cli.assistant_instructions),
            ("assistant.model", cli.assistant_model),
            ("relay.fallback_message", cli.fallback_message),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                builder = builder.set_override(key, value)?;
            }
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(ms) = cli.poll_interval_ms {
            builder = builder.set_override("assistant.poll_interval_ms", ms)?;
        }
        if let Some(secs) = cli.run_timeout_secs {
            builder = builder.set_override("assistant.run_timeout_secs", secs)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot run with.
    ///
    /// All missing credentials are reported at once, by environment name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("ACCESS_TOKEN", &self.whatsapp.access_token),
            ("PHONE_NUMBER_ID", &self.whatsapp.phone_number_id),
            ("OPENAI_API_KEY", &self.assistant.api_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Message(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            )));
        }

        if self.assistant.poll_interval_ms == 0 {
            return Err(ConfigError::Message(
                "RUN_POLL_INTERVAL_MS must be greater than zero".to_string(),
            ));
        }
        if self.assistant.run_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "RUN_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
