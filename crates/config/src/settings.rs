//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// API version for the session negotiation endpoint
pub const API_VERSION: &str = "2025-04-01-preview";

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`
    #[serde(default)]
    pub endpoint: String,

    /// Realtime deployment (model) name
    #[serde(default)]
    pub deployment: String,

    /// API key; omitted when using Entra ID auth on the session endpoint
    #[serde(default)]
    pub api_key: Option<String>,

    /// Azure region, used to construct the realtime handshake hostname
    #[serde(default)]
    pub region: String,

    /// Assistant voice requested at session creation
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Override for the regional realtime host (private endpoints, tests).
    /// When unset the host is derived from `region`.
    #[serde(default)]
    pub realtime_host: Option<String>,

    /// STUN/TURN server URLs; empty means host candidates only
    #[serde(default)]
    pub ice_servers: Vec<String>,

    /// Capture/playback audio parameters
    #[serde(default)]
    pub audio: AudioSettings,
}

fn default_voice() -> String {
    "alloy".to_string()
}

/// Audio pipeline parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Capture sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Capture channel count
    #[serde(default = "default_channels")]
    pub channels: u16,

    /// Samples per capture block (480 = 20ms at 24kHz)
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Capture hand-off queue capacity in blocks; the hardware callback
    /// drops blocks instead of blocking when the queue is full
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_channels() -> u16 {
    1
}

fn default_block_size() -> usize {
    480
}

fn default_queue_capacity() -> usize {
    8
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            block_size: default_block_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Settings {
    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::MissingField("endpoint".to_string()));
        }
        if self.deployment.trim().is_empty() {
            return Err(ConfigError::MissingField("deployment".to_string()));
        }
        if self.region.trim().is_empty() && self.realtime_host.is_none() {
            return Err(ConfigError::MissingField("region".to_string()));
        }
        self.validate_audio()
    }

    fn validate_audio(&self) -> Result<(), ConfigError> {
        if self.audio.sample_rate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.block_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audio.block_size".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "audio.queue_capacity".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Session negotiation endpoint URL
    pub fn sessions_url(&self) -> String {
        format!(
            "{}/openai/realtimeapi/sessions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            API_VERSION
        )
    }

    /// Realtime SDP handshake endpoint URL
    pub fn handshake_url(&self) -> String {
        let host = match &self.realtime_host {
            Some(host) => host.trim_end_matches('/').to_string(),
            None => format!("https://{}.realtimeapi-preview.ai.azure.com", self.region),
        };
        format!("{}/v1/realtimertc?model={}", host, self.deployment)
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`AZURE_OPENAI_` prefix, `__` separator for
///    nested fields, e.g. `AZURE_OPENAI_AUDIO__SAMPLE_RATE`)
/// 2. config/default.{yaml,toml,json} (if present)
pub fn load_settings() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("AZURE_OPENAI")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            endpoint: "https://example.openai.azure.com".to_string(),
            deployment: "gpt-4o-mini-realtime-preview".to_string(),
            api_key: Some("key".to_string()),
            region: "swedencentral".to_string(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_audio_defaults() {
        let audio = AudioSettings::default();
        assert_eq!(audio.sample_rate, 24_000);
        assert_eq!(audio.channels, 1);
        assert_eq!(audio.block_size, 480);
        assert_eq!(audio.queue_capacity, 8);
    }

    #[test]
    fn test_missing_required_fields() {
        let settings = Settings::default();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingField(_))
        ));

        let mut settings = valid_settings();
        settings.region = String::new();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingField(field)) if field == "region"
        ));
    }

    #[test]
    fn test_realtime_host_override_relaxes_region() {
        let mut settings = valid_settings();
        settings.region = String::new();
        settings.realtime_host = Some("https://rt.internal.example".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_audio_values() {
        let mut settings = valid_settings();
        settings.audio.queue_capacity = 0;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_sessions_url() {
        let settings = valid_settings();
        assert_eq!(
            settings.sessions_url(),
            "https://example.openai.azure.com/openai/realtimeapi/sessions?api-version=2025-04-01-preview"
        );
    }

    #[test]
    fn test_handshake_url_from_region() {
        let settings = valid_settings();
        assert_eq!(
            settings.handshake_url(),
            "https://swedencentral.realtimeapi-preview.ai.azure.com/v1/realtimertc?model=gpt-4o-mini-realtime-preview"
        );
    }

    #[test]
    fn test_handshake_url_override() {
        let mut settings = valid_settings();
        settings.realtime_host = Some("http://127.0.0.1:9000/".to_string());
        assert_eq!(
            settings.handshake_url(),
            "http://127.0.0.1:9000/v1/realtimertc?model=gpt-4o-mini-realtime-preview"
        );
    }
}
