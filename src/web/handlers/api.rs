use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::executor::{self, QueryRows};
use crate::db::registry::UploadedDatabase;
use crate::db::schema::{self, ColumnInfo, SchemaDescriptor};
use crate::db::{DbError, DbHandle};
use crate::sql::{Dialect, QueryInput};
use crate::web::error::ApiError;
use crate::web::state::AppState;

// Generation types

#[derive(Debug, Deserialize)]
pub struct GenerateSqlRequest {
    pub query: String,
    #[serde(default)]
    pub table_schema: Option<String>,
    #[serde(default)]
    pub sql_dialect: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateSqlResponse {
    pub sql: String,
    pub dialect: Dialect,
}

// Database types

#[derive(Debug, Deserialize)]
pub struct DatabaseQueryRequest {
    pub query: String,
    pub table_name: String,
    #[serde(default = "default_execute")]
    pub execute: bool,
}

fn default_execute() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct QueryAnswer {
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<QueryRows>,
}

type SchemaMap = BTreeMap<String, Vec<ColumnInfo>>;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub database_id: String,
    pub tables: Vec<String>,
    pub schema: SchemaMap,
}

#[derive(Debug, Serialize)]
pub struct DatabaseSummary {
    pub database_id: String,
    pub tables: Vec<String>,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub model: String,
    pub uploaded_databases: usize,
    pub default_database: bool,
}

fn schema_map(tables: &[SchemaDescriptor]) -> SchemaMap {
    tables
        .iter()
        .map(|table| (table.table_name.clone(), table.columns.clone()))
        .collect()
}

// API Implementations

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateSqlRequest>, JsonRejection>,
) -> Result<Json<GenerateSqlResponse>, ApiError> {
    let Json(payload) = payload?;
    let dialect = payload.sql_dialect.as_deref().unwrap_or("generic");
    let input = QueryInput::parse(
        payload.query,
        payload.table_schema.unwrap_or_default(),
        dialect,
    )?;

    let output = state.contract.generate(&input).await?;

    Ok(Json(GenerateSqlResponse {
        sql: output.into_sql(),
        dialect: input.dialect(),
    }))
}

pub async fn upload_database(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {}", e)))?
    {
        if field.name() != Some("file") {
            debug!("Skipping multipart field {:?}", field.name());
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::BadRequest("Uploaded file has no name".to_string()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        info!("Received upload '{}' ({} bytes)", file_name, bytes.len());
        let database = state.databases.register(&file_name, bytes.to_vec()).await?;

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                database_id: database.id.clone(),
                tables: database.table_names(),
                schema: schema_map(&database.schema),
            }),
        ));
    }

    Err(ApiError::BadRequest(
        "Multipart field 'file' is required".to_string(),
    ))
}

pub async fn list_databases(State(state): State<Arc<AppState>>) -> Json<Vec<DatabaseSummary>> {
    let databases = state
        .databases
        .list()
        .await
        .iter()
        .map(|database| DatabaseSummary {
            database_id: database.id.clone(),
            tables: database.table_names(),
            uploaded_at: database.uploaded_at,
        })
        .collect();

    Json(databases)
}

pub async fn database_schema(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SchemaMap>, ApiError> {
    let database = state.databases.get(&id).await?;
    Ok(Json(schema_map(&database.schema)))
}

pub async fn query_database(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<DatabaseQueryRequest>, JsonRejection>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let Json(payload) = payload?;
    let database: Arc<UploadedDatabase> = state.databases.get(&id).await?;
    let table = database
        .table(&payload.table_name)
        .cloned()
        .ok_or_else(|| DbError::TableNotFound(payload.table_name.clone()))?;

    answer_question(&state, database.handle(), table, payload).await
}

pub async fn default_schema(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SchemaMap>, ApiError> {
    let handle = default_database(&state)?;
    let tables = handle.run(|conn| schema::discover(conn)).await?;
    Ok(Json(schema_map(&tables)))
}

pub async fn query_default(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DatabaseQueryRequest>, JsonRejection>,
) -> Result<Json<QueryAnswer>, ApiError> {
    let Json(payload) = payload?;
    let handle = default_database(&state)?;
    let table_name = payload.table_name.clone();
    let table = handle
        .run(move |conn| schema::describe_table(conn, &table_name))
        .await?;

    answer_question(&state, handle, table, payload).await
}

fn default_database(state: &AppState) -> Result<DbHandle, ApiError> {
    state.default_db.clone().ok_or_else(|| {
        ApiError::Unavailable(format!(
            "No default database found at '{}'",
            state.config.database.path
        ))
    })
}

// Generates SQLite SQL for one table and optionally runs it.
async fn answer_question(
    state: &AppState,
    handle: DbHandle,
    table: SchemaDescriptor,
    request: DatabaseQueryRequest,
) -> Result<Json<QueryAnswer>, ApiError> {
    let input = QueryInput::for_table(
        request.query,
        &table.table_name,
        &table.columns_info(),
        Dialect::Sqlite,
    );
    let sql = state.contract.generate(&input).await?.into_sql();

    let results = if request.execute {
        let statement = sql.clone();
        let limit = state.config.database.preview_rows;
        let rows = handle
            .run(move |conn| executor::execute(conn, &statement, limit))
            .await?;
        info!("Executed generated SQL, {} row(s) returned", rows.rows.len());
        Some(rows)
    } else {
        None
    };

    Ok(Json(QueryAnswer { sql, results }))
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        model: state.contract.model_name().to_string(),
        uploaded_databases: state.databases.len().await,
        default_database: state.default_db.is_some(),
    })
}
