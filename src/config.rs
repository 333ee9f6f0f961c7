//! Configuration management for the forecast aggregator
//!
//! Handles loading configuration from files, environment variables,
//! and provides validation for all configuration settings.

use crate::error::MeteoError;
use crate::models::ProviderId;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeteoConfig {
    /// Outbound HTTP settings shared by every adapter
    pub http: HttpConfig,
    /// Geocoding service settings
    pub geocoding: GeocodingConfig,
    /// Provider base URLs and registry
    pub providers: ProvidersConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// IANA name of the reference timezone "today" is computed in
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-call timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// User-Agent header sent to every source
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Geocoding service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    #[serde(default = "default_geocoding_url")]
    pub base_url: String,
    /// Language of returned place names
    #[serde(default = "default_language")]
    pub language: String,
    /// ISO country filter
    #[serde(default = "default_country_code")]
    pub country_code: String,
    /// Candidates requested from the service; only the top one is used
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u32,
}

/// Provider endpoints and which providers are registered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_open_meteo_url")]
    pub open_meteo_url: String,
    #[serde(default = "default_ilmeteo_url")]
    pub ilmeteo_url: String,
    #[serde(default = "default_three_b_meteo_url")]
    pub three_b_meteo_url: String,
    #[serde(default = "default_meteo_it_url")]
    pub meteo_it_url: String,
    /// Registered providers, in reporting order
    #[serde(default = "default_enabled")]
    pub enabled: Vec<String>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty or json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_timeout() -> u32 {
    10
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; meteo-aggregator/{})",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1".to_string()
}

fn default_language() -> String {
    "it".to_string()
}

fn default_country_code() -> String {
    "IT".to_string()
}

fn default_max_candidates() -> u32 {
    5
}

fn default_open_meteo_url() -> String {
    "https://api.open-meteo.com/v1".to_string()
}

fn default_ilmeteo_url() -> String {
    "https://www.ilmeteo.it/meteo".to_string()
}

fn default_three_b_meteo_url() -> String {
    "https://www.3bmeteo.com/meteo".to_string()
}

fn default_meteo_it_url() -> String {
    "https://www.meteo.it/meteo".to_string()
}

fn default_enabled() -> Vec<String> {
    ProviderId::ALL.iter().map(|id| id.as_str().to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_timezone() -> String {
    "Europe/Rome".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoding_url(),
            language: default_language(),
            country_code: default_country_code(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            open_meteo_url: default_open_meteo_url(),
            ilmeteo_url: default_ilmeteo_url(),
            three_b_meteo_url: default_three_b_meteo_url(),
            meteo_it_url: default_meteo_it_url(),
            enabled: default_enabled(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MeteoConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            geocoding: GeocodingConfig::default(),
            providers: ProvidersConfig::default(),
            logging: LoggingConfig::default(),
            timezone: default_timezone(),
        }
    }
}

impl MeteoConfig {
    /// Load configuration from `config_path` (or the default location)
    /// layered under `METEO__*` environment variables
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // METEO__HTTP__TIMEOUT_SECONDS=5 overrides http.timeout_seconds
        builder = builder.add_source(
            Environment::with_prefix("METEO")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("providers.enabled"),
        );

        let settings = builder
            .build()
            .with_context(|| "Failed to build configuration")?;

        let mut config: MeteoConfig = settings
            .try_deserialize()
            .with_context(|| format!("Failed to deserialize configuration from {}", config_file.display()))?;

        config.apply_defaults();
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meteo-aggregator").join("config.toml"))
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self.http.timeout_seconds == 0 {
            self.http.timeout_seconds = default_timeout();
        }
        if self.http.user_agent.is_empty() {
            self.http.user_agent = default_user_agent();
        }
        if self.geocoding.base_url.is_empty() {
            self.geocoding.base_url = default_geocoding_url();
        }
        if self.geocoding.language.is_empty() {
            self.geocoding.language = default_language();
        }
        if self.geocoding.max_candidates == 0 {
            self.geocoding.max_candidates = default_max_candidates();
        }
        if self.providers.enabled.is_empty() {
            self.providers.enabled = default_enabled();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
        if self.timezone.is_empty() {
            self.timezone = default_timezone();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_urls()?;
        self.validate_providers()?;
        Ok(())
    }

    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.http.timeout_seconds > 120 {
            return Err(MeteoError::config("HTTP timeout cannot exceed 120 seconds").into());
        }

        if self.geocoding.max_candidates > 100 {
            return Err(MeteoError::config("Geocoding max candidates cannot exceed 100").into());
        }

        Ok(())
    }

    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(MeteoError::config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(MeteoError::config(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        self.reference_timezone()?;
        Ok(())
    }

    fn validate_urls(&self) -> Result<()> {
        let urls = [
            ("geocoding.base_url", &self.geocoding.base_url),
            ("providers.open_meteo_url", &self.providers.open_meteo_url),
            ("providers.ilmeteo_url", &self.providers.ilmeteo_url),
            ("providers.three_b_meteo_url", &self.providers.three_b_meteo_url),
            ("providers.meteo_it_url", &self.providers.meteo_it_url),
        ];
        for (key, url) in urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(MeteoError::config(format!(
                    "{key} must be a valid HTTP or HTTPS URL, got '{url}'"
                ))
                .into());
            }
        }
        Ok(())
    }

    fn validate_providers(&self) -> Result<()> {
        self.enabled_providers()?;
        Ok(())
    }

    /// Registered providers in configured order, duplicates removed
    pub fn enabled_providers(&self) -> Result<Vec<ProviderId>> {
        let mut ids = Vec::new();
        for name in &self.providers.enabled {
            let id: ProviderId = name.parse()?;
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Parsed reference timezone
    pub fn reference_timezone(&self) -> Result<chrono_tz::Tz> {
        self.timezone.parse::<chrono_tz::Tz>().map_err(|_| {
            MeteoError::config(format!("Unknown timezone '{}'", self.timezone)).into()
        })
    }
}
