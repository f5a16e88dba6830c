use crate::analysis::AnalysisService;
use crate::companies_house::{normalize_company_number, CompaniesHouseClient};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

const DEFAULT_SEARCH_LIMIT: u32 = 10;
const MAX_SEARCH_LIMIT: u32 = 100;
const MIN_QUERY_CHARS: usize = 2;

/// Shared application state injected into handlers.
///
/// Both clients are stateless apart from their connection pools.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Companies House registry client.
    pub registry: CompaniesHouseClient,
    /// Chat-completion analysis client.
    pub analysis: AnalysisService,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        Ok(Self {
            registry: CompaniesHouseClient::new(&config)?,
            analysis: AnalysisService::new(&config)?,
            config,
        })
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(OpenApi)]
#[openapi(
    paths(health, get_company, search_companies, get_company_officers, get_company_pscs),
    components(schemas(
        HealthResponse,
        ErrorResponse,
        CompanyResponse,
        CompanyProfile,
        RegisteredAddress,
        Accounts,
        LastAccounts,
        CompanyAnalysis,
        AnalysisSource,
        SearchResponse,
        SearchItemView,
        OfficersResponse,
        OfficerList,
        Officer,
        PscResponse,
        PscList,
        PersonWithSignificantControl,
    ))
)]
pub struct ApiDoc;

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            analysis_model: state.config.openai_model.clone(),
        }),
    )
}

/// GET /api/company/:number
///
/// Fetches the registry profile and attaches a risk analysis. The analysis
/// never fails the request; `analysis_source` reports whether the model or the
/// fallback heuristic produced it.
#[utoipa::path(
    get,
    path = "/api/company/{number}",
    params(("number" = String, Path, description = "Companies House company number")),
    responses(
        (status = 200, description = "Profile with analysis", body = CompanyResponse),
        (status = 400, description = "Invalid company number", body = ErrorResponse),
        (status = 404, description = "Company not found", body = ErrorResponse),
        (status = 429, description = "Registry rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Upstream or internal failure", body = ErrorResponse)
    )
)]
pub async fn get_company(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<CompanyResponse>, AppError> {
    tracing::info!("GET /api/company/{}", number);

    let number = normalize_company_number(&number)?;
    let company = state
        .registry
        .get_profile(&number)
        .await
        .with_context(|| format!("Fetching company {}", number))?;

    let outcome = state.analysis.analyze_company(&company).await;
    let analysis_source = outcome.source();
    if outcome.is_fallback() {
        tracing::info!("Serving fallback analysis for {}", number);
    }

    Ok(Json(CompanyResponse {
        company,
        analysis: outcome.into_analysis(),
        analysis_source,
        timestamp: timestamp(),
    }))
}

/// GET /api/search?q=&limit=
#[utoipa::path(
    get,
    path = "/api/search",
    params(SearchQueryParams),
    responses(
        (status = 200, description = "Matching companies", body = SearchResponse),
        (status = 400, description = "Query too short or bad limit", body = ErrorResponse),
        (status = 429, description = "Registry rate limit exceeded", body = ErrorResponse),
        (status = 500, description = "Upstream or internal failure", body = ErrorResponse)
    )
)]
pub async fn search_companies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQueryParams>,
) -> Result<Json<SearchResponse>, AppError> {
    tracing::info!("GET /api/search - params: {:?}", params);

    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Err(AppError::BadRequest(
            "Search query must be at least 2 characters".to_string(),
        ));
    }
    let limit = parse_limit(params.limit.as_deref())?;

    let results = state.registry.search(query, limit).await?;
    let today = Utc::now().date_naive();

    Ok(Json(SearchResponse {
        // Echo the caller's input; only the upstream query is trimmed
        query: params.q.clone().unwrap_or_default(),
        total_results: results.total_results,
        items: results
            .items
            .into_iter()
            .map(|item| SearchItemView::from_item(item, today))
            .collect(),
        timestamp: timestamp(),
    }))
}

/// Missing means the default; anything else must be a positive integer and is
/// capped at the registry's page size ceiling.
fn parse_limit(raw: Option<&str>) -> Result<u32, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_SEARCH_LIMIT),
        Some(s) => s
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n.min(MAX_SEARCH_LIMIT))
            .ok_or_else(|| AppError::BadRequest("limit must be a positive integer".to_string())),
    }
}

/// GET /api/company/:number/officers
#[utoipa::path(
    get,
    path = "/api/company/{number}/officers",
    params(("number" = String, Path, description = "Companies House company number")),
    responses(
        (status = 200, description = "Company officers", body = OfficersResponse),
        (status = 404, description = "Company not found", body = ErrorResponse),
        (status = 500, description = "Upstream or internal failure", body = ErrorResponse)
    )
)]
pub async fn get_company_officers(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<OfficersResponse>, AppError> {
    tracing::info!("GET /api/company/{}/officers", number);

    let number = normalize_company_number(&number)?;
    let officers = state.registry.get_officers(&number).await?;

    Ok(Json(OfficersResponse {
        company_number: number,
        officers,
        timestamp: timestamp(),
    }))
}

/// GET /api/company/:number/psc
#[utoipa::path(
    get,
    path = "/api/company/{number}/psc",
    params(("number" = String, Path, description = "Companies House company number")),
    responses(
        (status = 200, description = "Persons with significant control", body = PscResponse),
        (status = 404, description = "Company not found", body = ErrorResponse),
        (status = 500, description = "Upstream or internal failure", body = ErrorResponse)
    )
)]
pub async fn get_company_pscs(
    State(state): State<Arc<AppState>>,
    Path(number): Path<String>,
) -> Result<Json<PscResponse>, AppError> {
    tracing::info!("GET /api/company/{}/psc", number);

    let number = normalize_company_number(&number)?;
    let pscs = state.registry.get_pscs(&number).await?;

    Ok(Json(PscResponse {
        company_number: number,
        pscs,
        timestamp: timestamp(),
    }))
}

/// Routes under `/api`, without middleware so the caller can wrap them.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/search", get(search_companies))
        .route("/api/company/:number", get(get_company))
        .route("/api/company/:number/officers", get(get_company_officers))
        .route("/api/company/:number/psc", get(get_company_pscs))
}

/// Assembles the full application: health check, API docs, the given API
/// routes, tracing and CORS.
pub fn build_router(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_limit_defaults_and_caps() {
        assert_eq!(parse_limit(None).unwrap(), 10);
        assert_eq!(parse_limit(Some("")).unwrap(), 10);
        assert_eq!(parse_limit(Some("25")).unwrap(), 25);
        assert_eq!(parse_limit(Some("500")).unwrap(), 100);
    }

    #[test]
    fn test_parse_limit_rejects_garbage() {
        assert!(matches!(parse_limit(Some("0")), Err(AppError::BadRequest(_))));
        assert!(parse_limit(Some("-3")).is_err());
        assert!(parse_limit(Some("ten")).is_err());
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/api/company/{number}"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/search"));
    }

    #[tokio::test]
    async fn test_health_reports_model() {
        let config = Config {
            port: 0,
            companies_house_api_key: "key".to_string(),
            companies_house_base_url: "http://127.0.0.1:9".to_string(),
            openai_api_key: "sk".to_string(),
            openai_base_url: "http://127.0.0.1:9".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            http_timeout_secs: 5,
        };
        let state = Arc::new(AppState::new(config).unwrap());

        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "healthy");
        assert_eq!(body.analysis_model, "gpt-4o-mini");
    }
}
