//! Connector configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FAKTURPRO_SHOP_TOKEN` - API token issued for this shop
//! - `FAKTURPRO_SHOP_URL` - Public URL of the shop, sent for identification
//!
//! ## Optional
//! - `FAKTURPRO_SERVER_URI` - API base URI (default: <https://www.faktur.pro>)
//! - `FAKTURPRO_LOCALE` - Locale for API messages (default: de)
//! - `FAKTURPRO_HTTP_TIMEOUT_SECS` - Request timeout (default: 90)
//! - `FAKTURPRO_TEMP_DIR` - Root for invoice/export files (default: temp)

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Default API base URI.
const DEFAULT_SERVER_URI: &str = "https://www.faktur.pro";

/// Default request timeout; invoice rendering on the far side can be slow.
const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Default locale for the `Accept-Language` header.
const DEFAULT_LOCALE: &str = "de";

/// User agent product token sent with every request.
const USER_AGENT_PRODUCT: &str = "FakturPro-Connect";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Connector configuration.
#[derive(Clone)]
pub struct ConnectorConfig {
    /// API base URI.
    pub server_uri: Url,
    /// Shop API token (bearer credential).
    pub shop_token: SecretString,
    /// Public shop URL, sent as `X-Shop-URL`.
    pub shop_url: Url,
    /// Two-letter locale for `Accept-Language`.
    pub locale: String,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    /// Root directory for temporary invoice and export files.
    pub temp_dir: std::path::PathBuf,
}

impl std::fmt::Debug for ConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorConfig")
            .field("server_uri", &self.server_uri.as_str())
            .field("shop_token", &"[REDACTED]")
            .field("shop_url", &self.shop_url.as_str())
            .field("locale", &self.locale)
            .field("timeout_secs", &self.timeout_secs)
            .field("temp_dir", &self.temp_dir)
            .finish()
    }
}

impl ConnectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let server_uri = parse_url(
            "FAKTURPRO_SERVER_URI",
            &get_env_or_default("FAKTURPRO_SERVER_URI", DEFAULT_SERVER_URI),
        )?;
        let shop_token = SecretString::from(get_required_env("FAKTURPRO_SHOP_TOKEN")?);
        let shop_url = parse_url("FAKTURPRO_SHOP_URL", &get_required_env("FAKTURPRO_SHOP_URL")?)?;
        let locale = normalize_locale(&get_env_or_default("FAKTURPRO_LOCALE", DEFAULT_LOCALE));
        let timeout_secs = get_env_or_default(
            "FAKTURPRO_HTTP_TIMEOUT_SECS",
            &DEFAULT_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("FAKTURPRO_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
        })?;
        let temp_dir = std::env::var("FAKTURPRO_TEMP_DIR")
            .map_or_else(|_| std::env::temp_dir().join("fakturpro"), Into::into);

        Ok(Self {
            server_uri,
            shop_token,
            shop_url,
            locale,
            timeout_secs,
            temp_dir,
        })
    }

    /// The user agent string sent with every request.
    #[must_use]
    pub fn user_agent(&self) -> String {
        format!("{USER_AGENT_PRODUCT}/{}", env!("CARGO_PKG_VERSION"))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Reduce a locale like `de_DE` or `en-US` to its two-letter language code.
fn normalize_locale(locale: &str) -> String {
    locale
        .split(['_', '-'])
        .next()
        .unwrap_or(locale)
        .to_lowercase()
        .chars()
        .take(2)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("de_DE"), "de");
        assert_eq!(normalize_locale("en-US"), "en");
        assert_eq!(normalize_locale("fr"), "fr");
        assert_eq!(normalize_locale("DE"), "de");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ConnectorConfig {
            server_uri: Url::parse(DEFAULT_SERVER_URI).expect("valid url"),
            shop_token: SecretString::from("super-secret-token"),
            shop_url: Url::parse("https://shop.example.com").expect("valid url"),
            locale: "de".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temp_dir: std::env::temp_dir(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super-secret-token"));
        assert!(debug_output.contains("shop.example.com"));
    }

    #[test]
    fn test_user_agent_carries_version() {
        let config = ConnectorConfig {
            server_uri: Url::parse(DEFAULT_SERVER_URI).expect("valid url"),
            shop_token: SecretString::from("t"),
            shop_url: Url::parse("https://shop.example.com").expect("valid url"),
            locale: "de".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temp_dir: std::env::temp_dir(),
        };
        assert!(config.user_agent().starts_with("FakturPro-Connect/"));
    }
}
