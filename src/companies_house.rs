use crate::config::Config;
use crate::errors::AppError;
use crate::models::{CompanyProfile, CompanySearchResult, OfficerList, PscList};
use regex::Regex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::OnceLock;
use std::time::Duration;

/// Client for the Companies House public data API.
///
/// Every request carries HTTP Basic auth with the API key as username and an
/// empty password. Failures surface immediately; there is no retry.
#[derive(Clone)]
pub struct CompaniesHouseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CompaniesHouseClient {
    /// Creates a new `CompaniesHouseClient` from the application config.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Companies House client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.companies_house_base_url.clone(),
            api_key: config.companies_house_api_key.clone(),
        })
    }

    /// Search companies by name or number.
    ///
    /// # Arguments
    ///
    /// * `query` - Free-text search; must not be blank.
    /// * `limit` - Passed to the registry as `items_per_page`.
    pub async fn search(&self, query: &str, limit: u32) -> Result<CompanySearchResult, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::BadRequest("Search query cannot be empty".to_string()));
        }

        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(
            &format!("{}/search/companies", self.base_url),
            &[("q", query), ("items_per_page", &limit.to_string())],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))?;

        tracing::info!("Companies House: searching for '{}' (limit {})", query, limit);

        let result: CompanySearchResult = self.get_json(url).await?;

        tracing::info!(
            "Companies House: {} results for '{}' ({} returned)",
            result.total_results,
            query,
            result.items.len()
        );
        Ok(result)
    }

    /// Get the full profile for a company number.
    pub async fn get_profile(&self, number: &str) -> Result<CompanyProfile, AppError> {
        let number = normalize_company_number(number)?;
        let url = self.company_url(&number, "")?;

        tracing::info!("Companies House: fetching profile {}", number);
        let profile: CompanyProfile = self.get_json(url).await?;

        tracing::info!(
            "Companies House: retrieved {} ({})",
            profile.company_name,
            profile.company_status
        );
        Ok(profile)
    }

    /// List current and resigned officers for a company.
    pub async fn get_officers(&self, number: &str) -> Result<OfficerList, AppError> {
        let number = normalize_company_number(number)?;
        let url = self.company_url(&number, "/officers")?;

        tracing::info!("Companies House: fetching officers for {}", number);
        self.get_json(url).await
    }

    /// List persons with significant control for a company.
    pub async fn get_pscs(&self, number: &str) -> Result<PscList, AppError> {
        let number = normalize_company_number(number)?;
        let url = self.company_url(&number, "/persons-with-significant-control")?;

        tracing::info!("Companies House: fetching PSCs for {}", number);
        self.get_json(url).await
    }

    fn company_url(&self, number: &str, suffix: &str) -> Result<reqwest::Url, AppError> {
        reqwest::Url::parse(&format!("{}/company/{}{}", self.base_url, number, suffix))
            .map_err(|e| AppError::InternalError(format!("Failed to build URL: {}", e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: reqwest::Url) -> Result<T, AppError> {
        let path = url.path().to_string();

        let response = self
            .client
            .get(url)
            .basic_auth(&self.api_key, None::<&str>)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("Companies House {} returned {}: {}", path, status, error_text);
            return Err(AppError::from_upstream_status(
                status.as_u16(),
                status_message(status.as_u16()),
            ));
        }

        response.json().await.map_err(|e| AppError::UpstreamError {
            status: None,
            message: format!("Failed to parse Companies House response: {}", e),
        })
    }
}

fn status_message(status: u16) -> String {
    match status {
        404 => "Company not found".to_string(),
        401 => "Invalid API key".to_string(),
        429 => "Rate limit exceeded".to_string(),
        other => format!("API error: {}", other),
    }
}

fn company_number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{1,8}$").expect("valid company number regex"))
}

/// Normalizes a company number for use in a registry URL path.
///
/// Trims and upper-cases the input, rejects anything that is not 1-8 ASCII
/// alphanumerics, and zero-pads purely numeric numbers to 8 digits.
pub fn normalize_company_number(raw: &str) -> Result<String, AppError> {
    let candidate = raw.trim().to_ascii_uppercase();
    if candidate.is_empty() {
        return Err(AppError::BadRequest("Company number is required".to_string()));
    }
    if !company_number_pattern().is_match(&candidate) {
        return Err(AppError::BadRequest(format!(
            "Invalid company number: {}",
            raw.trim()
        )));
    }

    if candidate.chars().all(|c| c.is_ascii_digit()) {
        Ok(format!("{:0>8}", candidate))
    } else {
        Ok(candidate)
    }
}
