use serde::Deserialize;

pub const DEFAULT_COMPANIES_HOUSE_BASE_URL: &str = "https://api.company-information.service.gov.uk";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub companies_house_api_key: String,
    pub companies_house_base_url: String,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub openai_model: String,
    /// Applied to every outbound request made by the registry and analysis clients.
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            companies_house_api_key: required_secret("COMPANIES_HOUSE_API_KEY")?,
            companies_house_base_url: base_url_or_default(
                "COMPANIES_HOUSE_BASE_URL",
                DEFAULT_COMPANIES_HOUSE_BASE_URL,
            )?,
            openai_api_key: required_secret("OPENAI_API_KEY")?,
            openai_base_url: base_url_or_default("OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL)?,
            openai_model: std::env::var("OPENAI_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            http_timeout_secs: timeout_secs_from_env("HTTP_TIMEOUT_SECS")?,
        };

        // Never log the API keys themselves
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Companies House Base URL: {}", config.companies_house_base_url);
        tracing::debug!("OpenAI Base URL: {}", config.openai_base_url);
        tracing::debug!("OpenAI Model: {}", config.openai_model);
        tracing::debug!("Outbound timeout: {}s", config.http_timeout_secs);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn required_secret(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable is required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value.trim().to_string())
}

fn timeout_secs_from_env(name: &str) -> anyhow::Result<u64> {
    std::env::var(name)
        .unwrap_or_else(|_| "30".to_string())
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a positive integer", name))
        .and_then(|secs: u64| {
            if secs == 0 {
                anyhow::bail!("{} must be at least 1", name);
            }
            Ok(secs)
        })
}

fn base_url_or_default(name: &str, default: &str) -> anyhow::Result<String> {
    let raw = std::env::var(name)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    validate_base_url(name, &raw)
}

/// Accepts absolute http(s) URLs and strips any trailing slash so endpoint
/// paths can be appended directly.
pub fn validate_base_url(name: &str, raw: &str) -> anyhow::Result<String> {
    let parsed = url::Url::parse(raw.trim())
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(raw.trim().trim_end_matches('/').to_string())
}
