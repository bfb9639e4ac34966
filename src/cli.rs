use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};

use crate::config::{AppConfig, GenerateArgs};
use crate::db::{DbError, DbHandle, executor, schema};
use crate::llm::build_model;
use crate::sql::{ContractConfig, GenerationError, QueryInput, SqlContract};

const EXIT_CONFIG: u8 = 1;
const EXIT_INVALID_INPUT: u8 = 2;
const EXIT_GENERATION_FAILURE: u8 = 3;
const EXIT_UPSTREAM: u8 = 4;
const EXIT_EXECUTION: u8 = 5;

/// `generate` subcommand: prints the SQL on stdout, and the rows as JSON
/// when `--execute` is set.
pub async fn run_generate(config: AppConfig, args: GenerateArgs) -> ExitCode {
    match generate(&config, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

async fn generate(config: &AppConfig, args: GenerateArgs) -> Result<(), u8> {
    let needs_database = args.table.is_some() || args.execute;
    let database = if needs_database {
        Some(open_default_database(&config.database.path)?)
    } else {
        None
    };

    let table_schema = match (&args.schema, &args.schema_file, &args.table, &database) {
        (Some(schema), _, _, _) => schema.clone(),
        (None, Some(file), _, _) => std::fs::read_to_string(file).map_err(|e| {
            error!("Cannot read schema file {}: {}", file.display(), e);
            EXIT_INVALID_INPUT
        })?,
        (None, None, Some(table), Some(db)) => {
            let table = table.clone();
            db.run(move |conn| schema::describe_table(conn, &table))
                .await
                .map_err(db_exit_code)?
                .to_prompt_text()
        }
        _ => String::new(),
    };

    let input = QueryInput::parse(args.query, table_schema, &args.dialect).map_err(generation_exit_code)?;

    let model = build_model(&config.llm).map_err(|e| {
        error!("Failed to initialize LLM backend: {}", e);
        EXIT_CONFIG
    })?;
    let contract = SqlContract::new(model, ContractConfig::from_llm_config(&config.llm));

    let sql = contract
        .generate(&input)
        .await
        .map_err(generation_exit_code)?
        .into_sql();
    println!("{}", sql);

    if let Some(db) = database.filter(|_| args.execute) {
        let limit = config.database.preview_rows;
        let rows = db
            .run(move |conn| executor::execute(conn, &sql, limit))
            .await
            .map_err(db_exit_code)?;
        info!("{} row(s) returned", rows.rows.len());

        let json = serde_json::to_string_pretty(&rows).map_err(|e| {
            error!("Failed to render results: {}", e);
            EXIT_CONFIG
        })?;
        println!("{}", json);
    }

    Ok(())
}

fn open_default_database(path: &str) -> Result<DbHandle, u8> {
    if !Path::new(path).exists() {
        error!("Database file '{}' does not exist", path);
        return Err(EXIT_CONFIG);
    }
    Ok(DbHandle::File(path.into()))
}

fn generation_exit_code(err: GenerationError) -> u8 {
    error!("{}", err);
    match err {
        GenerationError::InvalidInput(_) => EXIT_INVALID_INPUT,
        GenerationError::GenerationFailure { last_response, .. } => {
            error!("Last model response: {}", last_response);
            EXIT_GENERATION_FAILURE
        }
        GenerationError::Upstream(_) => EXIT_UPSTREAM,
    }
}

fn db_exit_code(err: DbError) -> u8 {
    error!("{}", err);
    match err {
        DbError::Execution(_) => EXIT_EXECUTION,
        DbError::TableNotFound(_) | DbError::InvalidIdentifier(_) => EXIT_INVALID_INPUT,
        _ => EXIT_CONFIG,
    }
}
