use std::ffi::OsString;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{
        Json, Query,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    FeasibleCombination, MAX_ACCELERATOR_COHORTS, MAX_INCUBATOR_COHORTS, ModelError, ModelVersion,
    Parameters, Scenario, SearchResult, Timeline, TimelineAssessment, assess_timeline,
    run_feasibility_search, simulate,
};

const THOUSANDS_PER_MILLION: f64 = 1000.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliModelVersion {
    V1,
    V2,
}

impl From<CliModelVersion> for ModelVersion {
    fn from(value: CliModelVersion) -> Self {
        match value {
            CliModelVersion::V1 => ModelVersion::V1,
            CliModelVersion::V2 => ModelVersion::V2,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiModelVersion {
    #[serde(alias = "1", alias = "version-1", alias = "version1")]
    V1,
    #[serde(alias = "2", alias = "version-2", alias = "version2")]
    V2,
}

impl From<ApiModelVersion> for CliModelVersion {
    fn from(value: ApiModelVersion) -> Self {
        match value {
            ApiModelVersion::V1 => CliModelVersion::V1,
            ApiModelVersion::V2 => CliModelVersion::V2,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ModelPayload {
    model_version: Option<ApiModelVersion>,
    accelerators: Option<u32>,
    incubators: Option<u32>,
    capital: Option<f64>,
    ug_research: Option<f64>,
    search: Option<bool>,
}

#[derive(Parser, Debug)]
#[command(
    name = "funding-model",
    about = "Rolling research funding model (overlapping accelerator and incubator cohorts)"
)]
struct Cli {
    #[arg(long, value_enum, default_value_t = CliModelVersion::V2)]
    model_version: CliModelVersion,
    #[arg(
        long,
        help = "Accelerator cohorts issued per year; defaults to the model version's baseline"
    )]
    accelerators: Option<u32>,
    #[arg(
        long,
        help = "Incubator cohorts issued per year; defaults to the model version's baseline"
    )]
    incubators: Option<u32>,
    #[arg(long, help = "Capital/infrastructure spend in thousands per year")]
    capital: Option<f64>,
    #[arg(
        long,
        help = "Undergraduate research spend in thousands per year (version 2 only)"
    )]
    ug_research: Option<f64>,
    #[arg(
        long,
        default_value_t = false,
        help = "Also search every accelerator/incubator combination for feasibility"
    )]
    search: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    base_parameters: Parameters,
    accelerator_range: [u32; 2],
    incubator_range: [u32; 2],
    feasible: Vec<FeasibleCombination>,
    pareto: Vec<FeasibleCombination>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModelResponse {
    parameters: Parameters,
    scenario: Scenario,
    timeline: Timeline,
    assessment: TimelineAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    search: Option<SearchResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug)]
struct ApiRequest {
    parameters: Parameters,
    search: bool,
}

fn build_parameters(cli: &Cli) -> Result<Parameters, ModelError> {
    let version = ModelVersion::from(cli.model_version);
    let defaults = Parameters::defaults(version);
    Parameters::configure(
        version,
        cli.accelerators.unwrap_or(defaults.accelerator_cohorts),
        cli.incubators.unwrap_or(defaults.incubator_cohorts),
        cli.capital.map(|k| k / THOUSANDS_PER_MILLION),
        cli.ug_research.map(|k| k / THOUSANDS_PER_MILLION),
    )
}

/// Runs the command-line entry point and returns the JSON report (or help text).
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => return Ok(e.to_string()),
        Err(e) => return Err(e.to_string()),
    };
    let parameters = build_parameters(&cli).map_err(|e| e.to_string())?;
    info!(
        version = %parameters.version,
        accelerators = parameters.accelerator_cohorts,
        incubators = parameters.incubator_cohorts,
        search = cli.search,
        "running funding model"
    );

    let response = build_model_response(&parameters, cli.search);
    serde_json::to_string_pretty(&response).map_err(|e| format!("Failed to serialize report: {e}"))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("funding model HTTP API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/api/timeline");

    axum::serve(listener, router()).await
}

fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/timeline",
            get(timeline_get_handler).post(timeline_post_handler),
        )
        .route("/api/search", get(search_handler))
        .fallback(not_found_handler)
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn timeline_get_handler(payload: Result<Query<ModelPayload>, QueryRejection>) -> Response {
    match payload {
        Ok(Query(payload)) => timeline_handler_impl(payload).await,
        Err(rejection) => error_response(rejection.status(), &rejection.body_text()),
    }
}

async fn timeline_post_handler(payload: Result<Json<ModelPayload>, JsonRejection>) -> Response {
    match payload {
        Ok(Json(payload)) => timeline_handler_impl(payload).await,
        Err(rejection) => error_response(rejection.status(), &rejection.body_text()),
    }
}

async fn timeline_handler_impl(payload: ModelPayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected timeline request");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    let response = build_model_response(&request.parameters, request.search);
    json_response(StatusCode::OK, response)
}

/// Cohort counts in the query are ignored; the search always spans the full grid.
async fn search_handler(payload: Result<Query<ModelPayload>, QueryRejection>) -> Response {
    let payload = match payload {
        Ok(Query(payload)) => ModelPayload {
            accelerators: None,
            incubators: None,
            ..payload
        },
        Err(rejection) => return error_response(rejection.status(), &rejection.body_text()),
    };
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "rejected search request");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
    };

    json_response(StatusCode::OK, build_search_response(&request.parameters))
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<ModelPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload).map_err(|e| e.to_string())
}

fn api_request_from_payload(payload: ModelPayload) -> Result<ApiRequest, ModelError> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.model_version {
        cli.model_version = v.into();
    }
    if let Some(v) = payload.accelerators {
        cli.accelerators = Some(v);
    }
    if let Some(v) = payload.incubators {
        cli.incubators = Some(v);
    }
    if let Some(v) = payload.capital {
        cli.capital = Some(v);
    }
    if let Some(v) = payload.ug_research {
        cli.ug_research = Some(v);
    }
    if let Some(v) = payload.search {
        cli.search = v;
    }

    let parameters = build_parameters(&cli)?;
    Ok(ApiRequest {
        parameters,
        search: cli.search,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        model_version: CliModelVersion::V2,
        accelerators: None,
        incubators: None,
        capital: None,
        ug_research: None,
        search: false,
    }
}

fn build_search_response(parameters: &Parameters) -> SearchResponse {
    let SearchResult { feasible, pareto } = run_feasibility_search(parameters);
    SearchResponse {
        base_parameters: *parameters,
        accelerator_range: [0, MAX_ACCELERATOR_COHORTS],
        incubator_range: [0, MAX_INCUBATOR_COHORTS],
        feasible,
        pareto,
    }
}

fn build_model_response(parameters: &Parameters, include_search: bool) -> ModelResponse {
    let scenario = Scenario::for_version(parameters.version);
    let timeline = simulate(parameters, &scenario);
    let assessment = assess_timeline(parameters, &scenario, &timeline);
    ModelResponse {
        parameters: *parameters,
        search: include_search.then(|| build_search_response(parameters)),
        scenario,
        timeline,
        assessment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Status;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn build_parameters_uses_version_defaults() {
        let params = build_parameters(&sample_cli()).expect("valid defaults");
        assert_eq!(params.version, ModelVersion::V2);
        assert_eq!(params.accelerator_cohorts, 4);
        assert_eq!(params.incubator_cohorts, 12);
        assert_approx(params.capital, 0.35);
        assert_approx(params.ug_research, 0.1);

        let mut cli = sample_cli();
        cli.model_version = CliModelVersion::V1;
        let params = build_parameters(&cli).expect("valid defaults");
        assert_eq!(
            (params.accelerator_cohorts, params.incubator_cohorts),
            (5, 5)
        );
        assert_approx(params.capital, 0.5);
    }

    #[test]
    fn build_parameters_converts_thousands_to_millions() {
        let mut cli = sample_cli();
        cli.capital = Some(1250.0);
        cli.ug_research = Some(75.0);
        let params = build_parameters(&cli).expect("valid inputs");
        assert_approx(params.capital, 1.25);
        assert_approx(params.ug_research, 0.075);
    }

    #[test]
    fn build_parameters_rejects_out_of_range_inputs() {
        let mut cli = sample_cli();
        cli.accelerators = Some(MAX_ACCELERATOR_COHORTS + 1);
        let err = build_parameters(&cli).expect_err("must reject accelerator count");
        assert!(err.to_string().contains("accelerator"));

        let mut cli = sample_cli();
        cli.capital = Some(2500.0);
        assert!(build_parameters(&cli).is_err());

        let mut cli = sample_cli();
        cli.model_version = CliModelVersion::V1;
        cli.ug_research = Some(100.0);
        let err = build_parameters(&cli).expect_err("v1 has no ug research");
        assert!(matches!(err, ModelError::UnsupportedProgram { .. }));
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let request = api_request_from_json(
            r#"{"modelVersion":"v1","accelerators":3,"incubators":21,"capital":500,"search":true}"#,
        )
        .expect("valid payload");
        assert_eq!(request.parameters.version, ModelVersion::V1);
        assert_eq!(request.parameters.accelerator_cohorts, 3);
        assert_eq!(request.parameters.incubator_cohorts, 21);
        assert_approx(request.parameters.capital, 0.5);
        assert!(request.search);
    }

    #[test]
    fn api_request_from_json_accepts_version_aliases() {
        for raw in ["\"2\"", "\"version-2\"", "\"v2\""] {
            let json = format!(r#"{{"modelVersion":{raw},"ugResearch":250}}"#);
            let request = api_request_from_json(&json).expect("valid payload");
            assert_eq!(request.parameters.version, ModelVersion::V2);
            assert_approx(request.parameters.ug_research, 0.25);
        }
    }

    #[test]
    fn api_request_from_json_reports_invalid_payloads() {
        let err = api_request_from_json(r#"{"accelerators":"many"}"#)
            .expect_err("must reject non-numeric count");
        assert!(err.contains("Invalid API JSON payload"));

        let err = api_request_from_json(r#"{"incubators":40}"#)
            .expect_err("must reject incubator count");
        assert!(err.contains("incubator"));
    }

    #[test]
    fn model_response_serialization_contains_expected_fields() {
        let params = Parameters::defaults(ModelVersion::V1);
        let response = build_model_response(&params, false);
        assert_eq!(response.timeline.years.len(), 7);
        assert_eq!(response.assessment.status, Status::Sustainable);

        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"parameters\""));
        assert!(json.contains("\"timeline\""));
        assert!(json.contains("\"assessment\""));
        assert!(json.contains("\"steadyStateSpend\""));
        assert!(json.contains("\"accrualPolicy\":\"allow-negative\""));
        assert!(json.contains("\"status\":{\"kind\":\"sustainable\"}"));
        assert!(!json.contains("\"search\""));
    }

    #[test]
    fn model_response_includes_search_when_requested() {
        let params = Parameters::defaults(ModelVersion::V1);
        let response = build_model_response(&params, true);
        let search = response.search.expect("search requested");
        assert_eq!(search.accelerator_range, [0, 12]);
        assert_eq!(search.incubator_range, [0, 30]);
        assert!(!search.pareto.is_empty());

        let json = serde_json::to_string(&build_search_response(&params))
            .expect("search should serialize");
        assert!(json.contains("\"pareto\""));
        assert!(json.contains("\"acceleratorCohorts\""));
        assert!(json.contains("\"baseParameters\""));
    }

    #[test]
    fn run_cli_prints_timeline_report() {
        let output = run_cli(["funding-model", "--model-version", "v1", "--accelerators", "0"])
            .expect("cli should succeed");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["parameters"]["acceleratorCohorts"], 0);
        assert_eq!(value["timeline"].as_array().map(|a| a.len()), Some(7));
        assert_eq!(value["assessment"]["status"]["kind"], "clawback-risk");
        assert!(value.get("search").is_none());
    }

    #[test]
    fn run_cli_search_flag_adds_frontier() {
        let output = run_cli(["funding-model", "--model-version", "v1", "--search"])
            .expect("cli should succeed");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["search"]["pareto"][0]["acceleratorCohorts"], 0);
        assert_eq!(value["search"]["pareto"][0]["incubatorCohorts"], 30);
    }

    #[test]
    fn run_cli_rejects_invalid_arguments() {
        let err = run_cli(["funding-model", "--incubators", "99"]).expect_err("must reject");
        assert!(err.contains("incubator"));
        assert!(run_cli(["funding-model", "--model-version", "v3"]).is_err());
        let help = run_cli(["funding-model", "--help"]).expect("help is not an error");
        assert!(help.contains("--accelerators"));
    }

    #[tokio::test]
    async fn timeline_handler_returns_bad_request_for_invalid_payload() {
        let payload = ModelPayload {
            accelerators: Some(50),
            ..ModelPayload::default()
        };
        let response = timeline_handler_impl(payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL),
            Some(&header::HeaderValue::from_static("no-store"))
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("valid json");
        assert!(value["error"].as_str().is_some_and(|e| e.contains("accelerator")));
    }

    async fn send_raw_request(request: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("ephemeral port should bind");
        let addr = listener.local_addr().expect("listener has an address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router()).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr)
            .await
            .expect("server should accept");
        stream
            .write_all(request.as_bytes())
            .await
            .expect("request should send");
        let mut raw = String::new();
        stream
            .read_to_string(&mut raw)
            .await
            .expect("response should read");
        raw
    }

    #[tokio::test]
    async fn malformed_json_body_gets_json_error_with_no_store() {
        let body = r#"{"accel":"#;
        let request = format!(
            "POST /api/timeline HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let raw = send_raw_request(&request).await;
        assert!(raw.starts_with("HTTP/1.1 400"), "{raw}");
        assert!(raw.to_ascii_lowercase().contains("cache-control: no-store"), "{raw}");
        assert!(raw.contains("{\"error\":"), "{raw}");
    }

    #[tokio::test]
    async fn malformed_query_gets_json_error_with_no_store() {
        let raw = send_raw_request(
            "GET /api/timeline?accelerators=many HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(raw.starts_with("HTTP/1.1 400"), "{raw}");
        assert!(raw.to_ascii_lowercase().contains("cache-control: no-store"), "{raw}");
        assert!(raw.contains("{\"error\":"), "{raw}");

        let raw = send_raw_request(
            "GET /api/missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(raw.starts_with("HTTP/1.1 404"), "{raw}");
        assert!(raw.contains("{\"error\":\"Not found\"}"), "{raw}");
    }

    #[tokio::test]
    async fn search_handler_ignores_cohort_counts() {
        let payload = ModelPayload {
            model_version: Some(ApiModelVersion::V1),
            accelerators: Some(50),
            incubators: Some(99),
            ..ModelPayload::default()
        };
        let response = search_handler(Ok(Query(payload))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("valid json");
        assert_eq!(value["baseParameters"]["version"], "v1");
        assert_eq!(value["pareto"][0]["incubatorCohorts"], 30);
    }

    #[tokio::test]
    async fn timeline_handler_returns_report() {
        let response = timeline_handler_impl(ModelPayload::default()).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let value: serde_json::Value = serde_json::from_slice(&body).expect("valid json");
        assert_eq!(value["parameters"]["version"], "v2");
        assert_eq!(value["timeline"][0]["year"], 2026);
    }
}
