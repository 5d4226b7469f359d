use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub openrouter: OpenRouterConfig,
    pub google: GoogleConfig,
    pub processing: ProcessingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Upper bound for a whole HTTP call, batch extraction included.
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    pub api_url: String,
    pub api_key: String,
    pub default_model: String,
    /// Comma-separated list of model identifiers a request may select.
    pub model_allowlist: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub app_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// Service-account key, either inline JSON or a path to the key file.
    pub service_account_json: Option<String>,
    pub default_sheet_id: Option<String>,
    pub default_sheet_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    pub max_files_default: u32,
    pub concurrency_default: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_path: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let defaults = Config::try_from(&AppConfig::default())?;

        let config = Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                File::with_name(&format!(
                    "config/{}",
                    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into())
                ))
                .required(false),
            )
            // Add local config (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // CARDEX__OPENROUTER__API_KEY=... style overrides
            .add_source(Environment::with_prefix("CARDEX").separator("__"));

        config.build()?.try_deserialize()
    }
}

impl OpenRouterConfig {
    /// Parse the comma-separated model allow-list.
    pub fn allowed_models(&self) -> Vec<String> {
        self.model_allowlist
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl GoogleConfig {
    pub fn has_credentials(&self) -> bool {
        self.service_account_json
            .as_deref()
            .is_some_and(|raw| !raw.trim().is_empty())
    }

    pub fn sheet_name_or_default(&self, requested: Option<&str>) -> String {
        requested
            .filter(|name| !name.trim().is_empty())
            .or(self.default_sheet_name.as_deref())
            .unwrap_or("Sheet1")
            .to_string()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                request_timeout_seconds: 600,
            },
            openrouter: OpenRouterConfig {
                api_url: "https://openrouter.ai/api/v1".to_string(),
                api_key: String::new(),
                default_model: "anthropic/claude-3.5-sonnet".to_string(),
                model_allowlist:
                    "anthropic/claude-3.5-sonnet,openai/gpt-4o,google/gemini-2.0-flash-001"
                        .to_string(),
                timeout_seconds: 120,
                max_retries: 3,
                max_tokens: Some(4096),
                temperature: Some(0.1),
                app_title: "Business Card Extractor".to_string(),
            },
            google: GoogleConfig {
                service_account_json: None,
                default_sheet_id: None,
                default_sheet_name: None,
            },
            processing: ProcessingConfig {
                max_files_default: 200,
                concurrency_default: 3,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
                file_path: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_models_parsing() {
        let mut config = AppConfig::default().openrouter;
        config.model_allowlist = " openai/gpt-4o, ,google/gemini-2.0-flash-001 ,".to_string();

        assert_eq!(
            config.allowed_models(),
            vec!["openai/gpt-4o", "google/gemini-2.0-flash-001"]
        );
    }

    #[test]
    fn test_sheet_name_fallbacks() {
        let mut google = AppConfig::default().google;
        assert_eq!(google.sheet_name_or_default(None), "Sheet1");
        assert_eq!(google.sheet_name_or_default(Some("  ")), "Sheet1");

        google.default_sheet_name = Some("Leads".to_string());
        assert_eq!(google.sheet_name_or_default(None), "Leads");
        assert_eq!(google.sheet_name_or_default(Some("Cards")), "Cards");
    }

    #[test]
    fn test_blank_service_account_means_no_credentials() {
        let mut google = AppConfig::default().google;
        assert!(!google.has_credentials());
        google.service_account_json = Some("  ".to_string());
        assert!(!google.has_credentials());
        google.service_account_json = Some("/etc/cardex/sa.json".to_string());
        assert!(google.has_credentials());
    }
}
