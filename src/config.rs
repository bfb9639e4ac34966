use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Default SQLite file queried by `/api/query` and `generate --table`.
    pub path: String,
    pub pool_size: u32,
    /// Maximum rows returned when executing generated SQL.
    pub preview_rows: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub data_dir: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Directory for uploaded databases
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP demo server (default)
    Serve,
    /// Generate a single SQL statement and print it
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Natural-language request
    pub query: String,

    /// Target dialect: mysql, postgresql, sqlite or generic
    #[arg(short, long, default_value = "generic")]
    pub dialect: String,

    /// Schema description passed verbatim to the model
    #[arg(long, conflicts_with_all = ["schema_file", "table"])]
    pub schema: Option<String>,

    /// Read the schema description from a file
    #[arg(long, value_name = "FILE", conflicts_with = "table")]
    pub schema_file: Option<PathBuf>,

    /// Discover the schema of this table in the default database
    #[arg(long)]
    pub table: Option<String>,

    /// Execute the generated SQL against the default database
    #[arg(long)]
    pub execute: bool,
}

const DEFAULT_LOCATIONS: [&str; 3] = ["config.toml", "config/config.toml", "/etc/nl-sql/config.toml"];

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        Self::build(args, |key| std::env::var(key).ok())
    }

    /// Layers defaults, the config file, `NLSQL__*` variables, the named
    /// engine variables looked up through `env`, and finally CLI flags.
    pub fn build<F>(args: &CliArgs, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();
        let mut config_builder = Config::builder()
            .set_default("database.path", defaults.database.path)?
            .set_default("database.pool_size", defaults.database.pool_size as i64)?
            .set_default("database.preview_rows", defaults.database.preview_rows as i64)?
            .set_default("web.host", defaults.web.host)?
            .set_default("web.port", defaults.web.port as i64)?
            .set_default("web.max_upload_bytes", defaults.web.max_upload_bytes as i64)?
            .set_default("llm.backend", defaults.llm.backend)?
            .set_default("llm.model", defaults.llm.model)?
            .set_default("llm.max_retries", defaults.llm.max_retries as i64)?
            .set_default("llm.timeout_secs", defaults.llm.timeout_secs as i64)?
            .set_default("data_dir", defaults.data_dir)?;

        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            for location in DEFAULT_LOCATIONS {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        config_builder = config_builder
            .add_source(Environment::with_prefix("NLSQL").separator("__"))
            .set_override_option("llm.api_key", env("ENGINE_API_KEY"))?
            .set_override_option("llm.model", env("ENGINE_MODEL"))?
            .set_override_option("database.path", env("DATABASE_PATH"))?;

        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "database.db".to_string(),
                pool_size: 4,
                preview_rows: 10,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
                max_upload_bytes: 64 * 1024 * 1024,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "gpt-4o-mini".to_string(),
                api_key: None,
                api_url: None,
                max_retries: 1,
                timeout_secs: 60,
            },
            data_dir: "data".to_string(),
        }
    }
}
