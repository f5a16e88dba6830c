//! AI risk analysis for company profiles.
//!
//! The model is asked for a JSON object describing the company's risk. Any
//! failure along the way (transport, non-success status, empty reply, no
//! parseable object) is absorbed and replaced by [`fallback_analysis`]; the
//! returned [`AnalysisOutcome`] records which path was taken.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{whole_years_between, AnalysisOutcome, CompanyAnalysis, CompanyProfile};
use chrono::{Datelike, NaiveDate, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const SYSTEM_PROMPT: &str = "You are a financial analyst specializing in UK company risk assessment. Analyze company data and provide structured insights in JSON format.";
pub const TEMPERATURE: f64 = 0.3;
pub const MAX_TOKENS: u32 = 1500;

const DEFAULT_RISK_SCORE: u8 = 50;
const DEFAULT_SUMMARY: &str = "Analysis not available";
const ANALYSIS_KEYS: [&str; 5] = [
    "riskScore",
    "riskFactors",
    "businessSummary",
    "keyInsights",
    "recommendations",
];

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Shape the model is asked to return. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    risk_score: Option<Value>,
    risk_factors: Option<Vec<String>>,
    business_summary: Option<String>,
    key_insights: Option<Vec<String>>,
    recommendations: Option<Vec<String>>,
}

/// Client for an OpenAI-compatible chat-completion endpoint.
#[derive(Clone)]
pub struct AnalysisService {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnalysisService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create analysis client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        })
    }

    /// Analyze a company. Never fails: errors produce a tagged fallback.
    pub async fn analyze_company(&self, company: &CompanyProfile) -> AnalysisOutcome {
        match self.request_analysis(company).await {
            Ok(analysis) => {
                tracing::info!(
                    "AI analysis for {}: risk score {}",
                    company.company_number,
                    analysis.risk_score
                );
                AnalysisOutcome::ModelSucceeded { analysis }
            }
            Err(e) => {
                let today = Utc::now().date_naive();
                tracing::warn!(
                    "AI analysis unavailable for {}, using fallback: {}",
                    company.company_number,
                    e
                );
                AnalysisOutcome::FallbackUsed {
                    analysis: fallback_analysis(company, today),
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn request_analysis(
        &self,
        company: &CompanyProfile,
    ) -> Result<CompanyAnalysis, AppError> {
        let prompt = build_analysis_prompt(company);
        let reply = self.complete(&prompt).await?;
        parse_analysis(&reply)
    }

    /// Sends one chat-completion request and returns the first choice's text.
    async fn complete(&self, prompt: &str) -> Result<String, AppError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        tracing::debug!("Requesting analysis from {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::AnalysisUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::AnalysisUnavailable(format!(
                "OpenAI API error: {}",
                response.status().as_u16()
            )));
        }

        let data: ChatCompletionResponse = response.json().await.map_err(|e| {
            AppError::AnalysisUnavailable(format!("invalid completion response: {}", e))
        })?;

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| AppError::AnalysisUnavailable("No analysis generated".to_string()))
    }
}

/// Renders the user prompt sent to the model.
pub fn build_analysis_prompt(company: &CompanyProfile) -> String {
    let sic_codes = company
        .sic_codes
        .as_ref()
        .filter(|codes| !codes.is_empty())
        .map(|codes| codes.join(", "))
        .unwrap_or_else(|| "Not specified".to_string());

    format!(
        r#"
Analyze this UK company and provide a risk assessment:

Company: {name}
Number: {number}
Status: {status}
Type: {company_type}
Incorporated: {created}
SIC Codes: {sic_codes}

Please provide analysis in this JSON format:
{{
  "riskScore": number (0-100, where 0 is lowest risk),
  "riskFactors": ["factor1", "factor2"],
  "businessSummary": "brief summary",
  "keyInsights": ["insight1", "insight2"],
  "recommendations": ["rec1", "rec2"]
}}

Consider factors like:
- Company status and type
- Age of company
- Industry sector (SIC codes)
- Any red flags in the data
"#,
        name = company.company_name,
        number = company.company_number,
        status = company.company_status,
        company_type = company.company_type,
        created = company.date_of_creation.as_deref().unwrap_or("Unknown"),
        sic_codes = sic_codes,
    )
}

/// Finds the first complete JSON object in `text` that looks like an analysis.
///
/// Each `{` is tried in order as the start of a JSON value; the first one that
/// parses to an object carrying at least one analysis key wins. Leading prose,
/// stray braces, and trailing commentary are skipped.
pub fn extract_analysis_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            if ANALYSIS_KEYS.iter().any(|key| map.contains_key(*key)) {
                return Some(map);
            }
        }
    }
    None
}

/// Parses a model reply into an analysis, filling defaults for missing fields.
pub fn parse_analysis(text: &str) -> Result<CompanyAnalysis, AppError> {
    let object = extract_analysis_object(text).ok_or_else(|| {
        AppError::AnalysisUnavailable("no analysis JSON object in reply".to_string())
    })?;

    let raw: RawAnalysis = serde_json::from_value(Value::Object(object)).map_err(|e| {
        AppError::AnalysisUnavailable(format!("Failed to parse AI analysis: {}", e))
    })?;

    Ok(CompanyAnalysis {
        risk_score: raw
            .risk_score
            .as_ref()
            .and_then(coerce_score)
            .unwrap_or(DEFAULT_RISK_SCORE),
        risk_factors: raw.risk_factors.unwrap_or_default(),
        business_summary: raw
            .business_summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SUMMARY.to_string()),
        key_insights: raw.key_insights.unwrap_or_default(),
        recommendations: raw.recommendations.unwrap_or_default(),
    })
}

/// Accepts numbers or numeric strings, rounds, and clamps into 0..=100.
fn coerce_score(value: &Value) -> Option<u8> {
    let score = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !score.is_finite() {
        return None;
    }
    Some(score.round().clamp(0.0, 100.0) as u8)
}

/// Deterministic heuristic used when the model cannot be consulted.
///
/// A missing or unparseable creation date counts as age 0.
pub fn fallback_analysis(company: &CompanyProfile, today: NaiveDate) -> CompanyAnalysis {
    let created = company.created_on();
    let age = created
        .map(|date| whole_years_between(date, today))
        .unwrap_or(0);
    let is_active = company.is_active();

    let risk_score = match (is_active, age > 2) {
        (true, true) => 25,
        (true, false) => 45,
        (false, _) => 75,
    };

    let established = created
        .map(|date| date.year().to_string())
        .unwrap_or_else(|| "an unknown year".to_string());

    CompanyAnalysis {
        risk_score,
        risk_factors: if is_active {
            vec![]
        } else {
            vec!["Company not active".to_string()]
        },
        business_summary: format!("UK {} established in {}", company.company_type, established),
        key_insights: vec![
            format!("Company age: {} years", age),
            format!("Status: {}", company.company_status),
            format!("Type: {}", company.company_type),
        ],
        recommendations: if is_active {
            vec![
                "Review recent filings".to_string(),
                "Monitor compliance status".to_string(),
            ]
        } else {
            vec![
                "Investigate company status".to_string(),
                "Verify current operations".to_string(),
            ]
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegisteredAddress;

    fn profile(status: &str, created: Option<&str>) -> CompanyProfile {
        CompanyProfile {
            company_number: "12345678".into(),
            company_name: "ACME WIDGETS LTD".into(),
            company_status: status.into(),
            company_type: "ltd".into(),
            date_of_creation: created.map(String::from),
            registered_office_address: RegisteredAddress::default(),
            sic_codes: Some(vec!["62012".into(), "62020".into()]),
            accounts: None,
            jurisdiction: None,
            has_charges: None,
            has_insolvency_history: None,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn test_fallback_active_three_years() {
        let analysis = fallback_analysis(&profile("active", Some("2022-06-15")), today());
        assert_eq!(analysis.risk_score, 25);
        assert!(analysis.risk_factors.is_empty());
        assert_eq!(analysis.business_summary, "UK ltd established in 2022");
        assert_eq!(analysis.key_insights[0], "Company age: 3 years");
    }

    #[test]
    fn test_fallback_active_one_year() {
        let analysis = fallback_analysis(&profile("active", Some("2024-06-15")), today());
        assert_eq!(analysis.risk_score, 45);
        assert_eq!(
            analysis.recommendations,
            vec!["Review recent filings", "Monitor compliance status"]
        );
    }

    #[test]
    fn test_fallback_active_exactly_two_years_is_young() {
        let analysis = fallback_analysis(&profile("Active", Some("2023-06-15")), today());
        assert_eq!(analysis.risk_score, 45);
    }

    #[test]
    fn test_fallback_dissolved() {
        let analysis = fallback_analysis(&profile("dissolved", Some("1990-01-01")), today());
        assert_eq!(analysis.risk_score, 75);
        assert_eq!(analysis.risk_factors, vec!["Company not active"]);
        assert_eq!(
            analysis.recommendations,
            vec!["Investigate company status", "Verify current operations"]
        );
    }

    #[test]
    fn test_fallback_missing_date() {
        let analysis = fallback_analysis(&profile("active", None), today());
        assert_eq!(analysis.risk_score, 45);
        assert_eq!(analysis.business_summary, "UK ltd established in an unknown year");
    }

    #[test]
    fn test_parse_with_leading_prose() {
        let reply = r#"Here is the result: {"riskScore": 10, "riskFactors": [], "businessSummary": "ok", "keyInsights": [], "recommendations": []}"#;
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.risk_score, 10);
        assert_eq!(analysis.business_summary, "ok");
    }

    #[test]
    fn test_parse_fills_defaults() {
        let analysis = parse_analysis(r#"{"riskFactors": ["late filings"]}"#).unwrap();
        assert_eq!(analysis.risk_score, 50);
        assert_eq!(analysis.risk_factors, vec!["late filings"]);
        assert_eq!(analysis.business_summary, "Analysis not available");
        assert!(analysis.key_insights.is_empty());
        assert!(analysis.recommendations.is_empty());
    }

    #[test]
    fn test_parse_skips_stray_braces() {
        let reply = r#"Using {company} data: {"riskScore": 30} Let me know {if} needed."#;
        assert_eq!(parse_analysis(reply).unwrap().risk_score, 30);
    }

    #[test]
    fn test_parse_markdown_fence() {
        let reply = "```json\n{\"riskScore\": 62, \"businessSummary\": \"Software consultancy\"}\n```";
        let analysis = parse_analysis(reply).unwrap();
        assert_eq!(analysis.risk_score, 62);
        assert_eq!(analysis.business_summary, "Software consultancy");
    }

    #[test]
    fn test_parse_coerces_score() {
        assert_eq!(parse_analysis(r#"{"riskScore": 150}"#).unwrap().risk_score, 100);
        assert_eq!(parse_analysis(r#"{"riskScore": -4}"#).unwrap().risk_score, 0);
        assert_eq!(parse_analysis(r#"{"riskScore": "35"}"#).unwrap().risk_score, 35);
        assert_eq!(parse_analysis(r#"{"riskScore": 0}"#).unwrap().risk_score, 0);
        assert_eq!(parse_analysis(r#"{"riskScore": null}"#).unwrap().risk_score, 50);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_analysis("I cannot assess this company."),
            Err(AppError::AnalysisUnavailable(_))
        ));
        assert!(parse_analysis(r#"{"riskScore": 10, "riskFactors": "#).is_err());
        assert!(parse_analysis(r#"{"unrelated": true}"#).is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_field_types() {
        assert!(parse_analysis(r#"{"riskScore": 10, "riskFactors": [1, 2]}"#).is_err());
    }

    #[test]
    fn test_prompt_contains_profile_fields() {
        let prompt = build_analysis_prompt(&profile("active", Some("2020-01-01")));
        assert!(prompt.contains("Company: ACME WIDGETS LTD"));
        assert!(prompt.contains("Number: 12345678"));
        assert!(prompt.contains("Incorporated: 2020-01-01"));
        assert!(prompt.contains("SIC Codes: 62012, 62020"));
        assert!(prompt.contains("\"riskScore\": number"));
    }

    #[test]
    fn test_prompt_without_sic_codes() {
        let mut p = profile("active", None);
        p.sic_codes = None;
        let prompt = build_analysis_prompt(&p);
        assert!(prompt.contains("SIC Codes: Not specified"));
        assert!(prompt.contains("Incorporated: Unknown"));
    }
}
