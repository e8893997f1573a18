use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_API_KEY: &str = "test-key";
pub const DEFAULT_TABLES: &[&str] = &["items", "vr_sessions", "vr_movement_data"];

pub type Db = Arc<RwLock<HashMap<String, Vec<Value>>>>;

type GatewayError = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    api_key: Arc<str>,
    db: Db,
}

pub fn app() -> Router {
    app_with_key(DEFAULT_API_KEY)
}

pub fn app_with_key(api_key: &str) -> Router {
    let tables = DEFAULT_TABLES
        .iter()
        .map(|t| (t.to_string(), Vec::new()))
        .collect();
    let state = AppState {
        api_key: Arc::from(api_key),
        db: Arc::new(RwLock::new(tables)),
    };
    Router::new()
        .route(
            "/rest/v1/{table}",
            get(list_rows)
                .post(insert_rows)
                .patch(update_rows)
                .delete(delete_rows),
        )
        .route("/status/{code}", any(reply_with_status))
        .route("/echo", any(echo))
        .route("/hang", any(hang))
        .route("/latin1", any(latin1))
        .route("/large/{len}", any(large))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with_key(listener: TcpListener, api_key: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_key(api_key)).await
}

// --- gateway auth ---

fn gateway_error(status: StatusCode, body: Value) -> GatewayError {
    (status, Json(body))
}

/// Only the `apikey` header is checked, the way the hosted gateway does; a
/// bearer token alone is not enough.
fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), GatewayError> {
    match headers.get("apikey").and_then(|v| v.to_str().ok()) {
        None => Err(gateway_error(
            StatusCode::UNAUTHORIZED,
            json!({
                "message": "No API key found in request",
                "hint": "No `apikey` request header or url param was found."
            }),
        )),
        Some(key) if key != &*state.api_key => Err(gateway_error(
            StatusCode::UNAUTHORIZED,
            json!({
                "message": "Invalid API key",
                "hint": "Double check your Supabase `anon` or `service_role` API key."
            }),
        )),
        Some(_) => Ok(()),
    }
}

fn missing_table(table: &str) -> GatewayError {
    gateway_error(
        StatusCode::NOT_FOUND,
        json!({
            "code": "42P01",
            "message": format!("relation \"public.{table}\" does not exist")
        }),
    )
}

fn bad_request(message: &str) -> GatewayError {
    gateway_error(
        StatusCode::BAD_REQUEST,
        json!({ "code": "PGRST102", "message": message }),
    )
}

fn wants_representation(headers: &HeaderMap) -> bool {
    headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("return=representation"))
}

// --- row helpers ---

/// Accepts one object or an array of objects; assigns an `id` where missing.
fn rows_from_body(body: &str) -> Result<Vec<Map<String, Value>>, GatewayError> {
    let value: Value =
        serde_json::from_str(body).map_err(|_| bad_request("Empty or invalid json"))?;
    let rows = match value {
        Value::Object(row) => vec![row],
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                _ => Err(bad_request("All array elements must be objects")),
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(bad_request("Body must be a JSON object or array")),
    };
    Ok(rows
        .into_iter()
        .map(|mut row| {
            row.entry("id")
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            row
        })
        .collect())
}

/// PostgREST-style `column=eq.value` filters; other operators and params are ignored.
fn row_matches(row: &Value, filters: &HashMap<String, String>) -> bool {
    filters.iter().all(|(column, expr)| match expr.strip_prefix("eq.") {
        Some(expected) => match row.get(column) {
            Some(Value::String(actual)) => actual == expected,
            Some(other) => other.to_string() == expected,
            None => false,
        },
        None => true,
    })
}

fn rows_response(status: StatusCode, rows: Vec<Value>, headers: &HeaderMap) -> Response {
    if wants_representation(headers) {
        (status, Json(Value::Array(rows))).into_response()
    } else if status == StatusCode::CREATED {
        status.into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

// --- table routes ---

async fn list_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Value>>, GatewayError> {
    authorize(&state, &headers)?;
    let db = state.db.read().await;
    let rows = db.get(&table).ok_or_else(|| missing_table(&table))?;
    Ok(Json(
        rows.iter()
            .filter(|row| row_matches(row, &filters))
            .cloned()
            .collect(),
    ))
}

async fn insert_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, GatewayError> {
    authorize(&state, &headers)?;
    let mut db = state.db.write().await;
    let rows = db.get_mut(&table).ok_or_else(|| missing_table(&table))?;
    let inserted: Vec<Value> = rows_from_body(&body)?
        .into_iter()
        .map(Value::Object)
        .collect();
    rows.extend(inserted.iter().cloned());
    debug!(%table, count = inserted.len(), "inserted rows");
    Ok(rows_response(StatusCode::CREATED, inserted, &headers))
}

async fn update_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, GatewayError> {
    authorize(&state, &headers)?;
    let patch = match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(patch)) => patch,
        _ => return Err(bad_request("PATCH body must be a JSON object")),
    };
    let mut db = state.db.write().await;
    let rows = db.get_mut(&table).ok_or_else(|| missing_table(&table))?;
    let mut updated = Vec::new();
    for row in rows.iter_mut().filter(|row| row_matches(row, &filters)) {
        if let Value::Object(fields) = row {
            for (key, value) in &patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        updated.push(row.clone());
    }
    debug!(%table, count = updated.len(), "updated rows");
    Ok(rows_response(StatusCode::OK, updated, &headers))
}

async fn delete_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Query(filters): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    authorize(&state, &headers)?;
    let mut db = state.db.write().await;
    let rows = db.get_mut(&table).ok_or_else(|| missing_table(&table))?;
    let (deleted, kept): (Vec<Value>, Vec<Value>) = rows
        .drain(..)
        .partition(|row| row_matches(row, &filters));
    *rows = kept;
    debug!(%table, count = deleted.len(), "deleted rows");
    Ok(rows_response(StatusCode::OK, deleted, &headers))
}

// --- test helpers ---

/// Replies with any final status. 204 and 304 carry no body.
async fn reply_with_status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) if code >= 200 => {
            if matches!(code, 204 | 304) {
                status.into_response()
            } else {
                (status, Json(json!({ "status": code }))).into_response()
            }
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": format!("cannot reply with status {code}") })),
        )
            .into_response(),
    }
}

/// Reflects the request back: method, lower-cased headers, raw body.
async fn echo(method: Method, headers: HeaderMap, body: String) -> Json<Value> {
    let headers: Map<String, Value> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    Json(json!({
        "method": method.as_str(),
        "headers": headers,
        "body": body,
    }))
}

/// 200 with `café` encoded as Latin-1, which is not valid UTF-8.
async fn latin1() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=iso-8859-1")],
        vec![0x63u8, 0x61, 0x66, 0xE9],
    )
}

/// 200 with a body of exactly `len` bytes.
async fn large(Path(len): Path<usize>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], vec![b'x'; len])
}

/// Never answers within any sane client timeout.
async fn hang() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(3600)).await;
    StatusCode::OK
}
