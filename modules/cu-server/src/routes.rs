use std::path::{Component, Path};
use std::sync::Arc;

use axum::{
    extract::{Path as UrlPath, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use cu_client::{BatchResults, CuError};
use cu_schema::{generate_field_schema, FieldMap, RequestedField};
use serde::{Deserialize, Serialize};
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use url::Url;

use crate::presets::load_template_file;
use crate::AppState;

const DYNAMIC_ANALYZER_PREFIX: &str = "dynamic-analyzer";

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    file_urls: Option<Value>,
    analyzer_id: Option<String>,
    analyzer_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ExtractRequest {
    file_url: Option<String>,
    analyzer_id: Option<String>,
    schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PresetRequest {
    file_urls: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct DynamicRequest {
    file_urls: Option<Value>,
    fields: Option<FieldMap<RequestedField>>,
}

#[derive(Debug, Serialize)]
pub struct PresetSummary {
    name: &'static str,
    analyzer_id: &'static str,
    description: &'static str,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn client_error(err: &CuError) -> Response {
    let status = match err {
        CuError::Validation(_) => StatusCode::BAD_REQUEST,
        CuError::Config(_) | CuError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        CuError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    error_response(status, err.to_string())
}

/// Only remote http(s) documents may be analyzed through the API. Anything
/// else could name a file on this host.
pub fn is_remote_url(location: &str) -> bool {
    Url::parse(location)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Accepts a single URL, a list of URLs, or an object whose values are URLs.
/// Empty input, non-string entries and non-http(s) locations are rejected.
pub fn parse_file_urls(value: &Value) -> Option<Vec<String>> {
    let urls: Vec<String> = match value {
        Value::String(url) => vec![url.clone()],
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<_>>()?,
        Value::Object(map) => map
            .values()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<_>>()?,
        _ => return None,
    };
    if urls.is_empty() || !urls.iter().all(|u| is_remote_url(u)) {
        return None;
    }
    Some(urls)
}

/// Inline templates are used as-is; a string names a file in the template
/// directory.
async fn resolve_schema(state: &AppState, schema: Value) -> Result<Value, Response> {
    let Value::String(name) = schema else {
        return Ok(schema);
    };
    let relative = Path::new(&name);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "analyzer template must be a file name inside the template directory",
        ));
    }
    load_template_file(&state.presets.template_dir().join(relative))
        .await
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("{e:#}")))
}

fn batch_response(results: BatchResults) -> Response {
    let body: Map<String, Value> = results
        .entries
        .into_iter()
        .map(|(file, outcome)| {
            let value = match outcome {
                Ok(outcome) => outcome.payload,
                Err(e) => json!({ "error": e.to_string() }),
            };
            (file, value)
        })
        .collect();
    Json(Value::Object(body)).into_response()
}

/// Run a batch while holding the analyzer id's lock.
async fn run_batch(state: &AppState, files: &[String], analyzer_id: &str, template: &Value) -> Response {
    let _guard = state.analyzer_locks.lock(analyzer_id).await;
    run_batch_unlocked(state, files, analyzer_id, template).await
}

/// Only for analyzer ids no other request can name.
async fn run_batch_unlocked(
    state: &AppState,
    files: &[String],
    analyzer_id: &str,
    template: &Value,
) -> Response {
    match state.client.run_once(files, analyzer_id, template).await {
        Ok(results) => {
            if let Some(e) = &results.cleanup_error {
                warn!(analyzer_id, error = %e, "Analyzer left behind after batch");
            }
            batch_response(results)
        }
        Err(e) => {
            warn!(analyzer_id, error = %e, "Batch failed");
            client_error(&e)
        }
    }
}

pub async fn api_run(State(state): State<Arc<AppState>>, Json(body): Json<RunRequest>) -> Response {
    let (Some(file_urls), Some(analyzer_id), Some(schema)) =
        (body.file_urls, body.analyzer_id, body.analyzer_schema)
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request body. 'file_urls', 'analyzer_id' and 'analyzer_schema' are required.",
        );
    };
    let Some(files) = parse_file_urls(&file_urls) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "file_urls should be an http(s) URL, a list of them or an object of them.",
        );
    };
    let template = match resolve_schema(&state, schema).await {
        Ok(template) => template,
        Err(resp) => return resp,
    };

    info!(analyzer_id = analyzer_id.as_str(), files = files.len(), "Run request");
    run_batch(&state, &files, &analyzer_id, &template).await
}

pub async fn api_extract(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExtractRequest>,
) -> Response {
    let (Some(file_url), Some(analyzer_id), Some(schema)) = (body.file_url, body.analyzer_id, body.schema)
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request body. 'file_url', 'analyzer_id' and 'schema' are required.",
        );
    };
    if !is_remote_url(&file_url) {
        return error_response(StatusCode::BAD_REQUEST, "file_url should be an http(s) URL.");
    }
    let template = match resolve_schema(&state, schema).await {
        Ok(template) => template,
        Err(resp) => return resp,
    };

    let files = [file_url.clone()];
    let mut results = {
        let _guard = state.analyzer_locks.lock(&analyzer_id).await;
        match state.client.run_once(&files, &analyzer_id, &template).await {
            Ok(results) => results,
            Err(e) => return client_error(&e),
        }
    };
    if let Some(e) = &results.cleanup_error {
        warn!(analyzer_id = analyzer_id.as_str(), error = %e, "Analyzer left behind after extract");
    }
    let outcome = match results.entries.remove(&file_url) {
        Some(Ok(outcome)) => outcome,
        Some(Err(e)) => return client_error(&e),
        None => return error_response(StatusCode::INTERNAL_SERVER_ERROR, "no result for file"),
    };

    let result = outcome.analyze_result().ok();
    match result.as_ref().and_then(|r| r.first_content()) {
        Some(content) => Json(json!({
            "markdown": content.markdown,
            "fields": content.fields,
        }))
        .into_response(),
        None => {
            warn!(analyzer_id = analyzer_id.as_str(), response = %outcome.payload, "Unexpected API response");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({
                    "error": "Unexpected API response format",
                    "response": outcome.payload,
                })),
            )
                .into_response()
        }
    }
}

pub async fn api_presets(State(state): State<Arc<AppState>>) -> Json<Vec<PresetSummary>> {
    Json(
        state
            .presets
            .all()
            .iter()
            .map(|p| PresetSummary {
                name: p.name,
                analyzer_id: p.analyzer_id,
                description: p.description,
            })
            .collect(),
    )
}

pub async fn api_run_preset(
    State(state): State<Arc<AppState>>,
    UrlPath(name): UrlPath<String>,
    Json(body): Json<PresetRequest>,
) -> Response {
    let Some(preset) = state.presets.get(&name) else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown preset '{name}'"));
    };
    let Some(files) = body.file_urls.as_ref().and_then(parse_file_urls) else {
        return error_response(StatusCode::BAD_REQUEST, "'file_urls' with http(s) URLs is required.");
    };
    let template = match state.presets.load_template(preset).await {
        Ok(template) => template,
        Err(e) => {
            warn!(preset = preset.name, error = %e, "Preset template unavailable");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"));
        }
    };

    info!(preset = preset.name, files = files.len(), "Preset run request");
    run_batch(&state, &files, preset.analyzer_id, &template).await
}

/// Analyze with a schema generated from the requested fields.
pub async fn api_dynamic(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DynamicRequest>,
) -> Response {
    let (Some(file_urls), Some(fields)) = (body.file_urls, body.fields) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request body. 'file_urls' and 'fields' are required.",
        );
    };
    let Some(files) = parse_file_urls(&file_urls) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "file_urls should be an http(s) URL, a list of them or an object of them.",
        );
    };
    if fields.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "at least one field is required.");
    }

    let template = json!({
        "description": "Dynamically generated analyzer",
        "scenario": "custom",
        "config": { "returnDetails": true, "locales": ["en-US"] },
        "fieldSchema": generate_field_schema(&fields),
    });
    // Each request gets its own analyzer; the schema is per request.
    let analyzer_id = format!(
        "{DYNAMIC_ANALYZER_PREFIX}-{}",
        rand::rng().random_range(0..1_000_000_000u32)
    );
    info!(analyzer_id = analyzer_id.as_str(), files = files.len(), fields = fields.len(), "Dynamic run request");
    run_batch_unlocked(&state, &files, &analyzer_id, &template).await
}
