use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============ Registry Models ============

/// Registered office address as reported by Companies House.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RegisteredAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line_1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LastAccounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub made_up_to: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub accounts_type: Option<String>,
}

/// Accounts-filing metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct Accounts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accounts: Option<LastAccounts>,
}

/// A company profile from `GET /company/{number}`.
///
/// `company_status` is passed through verbatim; the registry is the only
/// authority on its vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyProfile {
    pub company_number: String,
    pub company_name: String,
    pub company_status: String,
    /// Companies House names this field `type`.
    #[serde(rename = "type", alias = "company_type", default)]
    pub company_type: String,
    /// ISO date, `YYYY-MM-DD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_creation: Option<String>,
    #[serde(default)]
    pub registered_office_address: RegisteredAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sic_codes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts: Option<Accounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_charges: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_insolvency_history: Option<bool>,
}

impl CompanyProfile {
    /// Whether the registry reports the company as active (case-insensitive).
    pub fn is_active(&self) -> bool {
        self.company_status.eq_ignore_ascii_case("active")
    }

    /// Parsed incorporation date, if present and well-formed.
    pub fn created_on(&self) -> Option<NaiveDate> {
        self.date_of_creation.as_deref().and_then(parse_registry_date)
    }
}

/// Parses the registry's `YYYY-MM-DD` dates.
pub fn parse_registry_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Whole calendar years elapsed between `from` and `today`. Future dates yield 0.
pub fn whole_years_between(from: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - from.year();
    if (today.month(), today.day()) < (from.month(), from.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// One entry of `GET /search/companies`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanySearchItem {
    pub company_number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company_status: String,
    #[serde(default)]
    pub company_type: String,
    #[serde(default)]
    pub address_snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_creation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanySearchResult {
    #[serde(default)]
    pub items: Vec<CompanySearchItem>,
    #[serde(default)]
    pub total_results: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Officer {
    pub name: String,
    #[serde(default)]
    pub officer_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointed_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resigned_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_of_residence: Option<String>,
}

/// Response of `GET /company/{number}/officers`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OfficerList {
    #[serde(default)]
    pub items: Vec<Officer>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub active_count: u64,
    #[serde(default)]
    pub resigned_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonWithSignificantControl {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notified_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceased_on: Option<String>,
    #[serde(default)]
    pub natures_of_control: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_of_residence: Option<String>,
}

/// Response of `GET /company/{number}/persons-with-significant-control`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PscList {
    #[serde(default)]
    pub items: Vec<PersonWithSignificantControl>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default)]
    pub active_count: u64,
    #[serde(default)]
    pub ceased_count: u64,
}

// ============ Analysis Models ============

/// Risk analysis for a single company. Field names keep the camelCase
/// contract consumed by existing clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyAnalysis {
    /// 0 is the lowest risk, 100 the highest.
    pub risk_score: u8,
    pub risk_factors: Vec<String>,
    pub business_summary: String,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Which path produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Model,
    Fallback,
}

/// Tagged result of the analysis service so degraded responses are visible.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    ModelSucceeded {
        analysis: CompanyAnalysis,
    },
    FallbackUsed {
        analysis: CompanyAnalysis,
        reason: String,
    },
}

impl AnalysisOutcome {
    pub fn analysis(&self) -> &CompanyAnalysis {
        match self {
            AnalysisOutcome::ModelSucceeded { analysis }
            | AnalysisOutcome::FallbackUsed { analysis, .. } => analysis,
        }
    }

    pub fn into_analysis(self) -> CompanyAnalysis {
        match self {
            AnalysisOutcome::ModelSucceeded { analysis }
            | AnalysisOutcome::FallbackUsed { analysis, .. } => analysis,
        }
    }

    pub fn source(&self) -> AnalysisSource {
        match self {
            AnalysisOutcome::ModelSucceeded { .. } => AnalysisSource::Model,
            AnalysisOutcome::FallbackUsed { .. } => AnalysisSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AnalysisOutcome::FallbackUsed { .. })
    }
}

// ============ API Models ============

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQueryParams {
    /// Search text, at least 2 characters.
    pub q: Option<String>,
    /// Maximum number of items, 1-100 (default 10).
    pub limit: Option<String>,
}

/// Search hit with display helpers for the frontend.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchItemView {
    pub company_number: String,
    pub title: String,
    pub company_status: String,
    pub company_type: String,
    pub address_snippet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_creation: Option<String>,
    pub display_title: String,
    pub display_status: String,
    pub display_age: String,
}

impl SearchItemView {
    pub fn from_item(item: CompanySearchItem, today: NaiveDate) -> Self {
        let display_age = item
            .date_of_creation
            .as_deref()
            .and_then(parse_registry_date)
            .map(|created| format!("{} years", whole_years_between(created, today)))
            .unwrap_or_else(|| "Unknown".to_string());

        Self {
            display_title: format!("{} ({})", item.title, item.company_number),
            display_status: capitalize_first(&item.company_status),
            display_age,
            company_number: item.company_number,
            title: item.title,
            company_status: item.company_status,
            company_type: item.company_type,
            address_snippet: item.address_snippet,
            date_of_creation: item.date_of_creation,
        }
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResponse {
    pub query: String,
    pub total_results: u64,
    pub items: Vec<SearchItemView>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompanyResponse {
    pub company: CompanyProfile,
    pub analysis: CompanyAnalysis,
    pub analysis_source: AnalysisSource,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OfficersResponse {
    pub company_number: String,
    pub officers: OfficerList,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PscResponse {
    pub company_number: String,
    pub pscs: PscList,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    /// Chat-completion model used for risk analysis.
    pub analysis_model: String,
}
