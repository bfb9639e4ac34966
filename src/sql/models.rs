use serde::Serialize;
use std::fmt;

use crate::sql::GenerationError;
use crate::sql::dialect::Dialect;

/// A single natural-language generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInput {
    natural_language_query: String,
    table_schema: String,
    sql_dialect: Dialect,
}

impl QueryInput {
    pub fn new(
        natural_language_query: impl Into<String>,
        table_schema: impl Into<String>,
        sql_dialect: Dialect,
    ) -> Self {
        Self {
            natural_language_query: natural_language_query.into(),
            table_schema: table_schema.into(),
            sql_dialect,
        }
    }

    /// Builds an input from a textual dialect identifier, rejecting unknown dialects.
    pub fn parse(
        natural_language_query: impl Into<String>,
        table_schema: impl Into<String>,
        sql_dialect: &str,
    ) -> Result<Self, GenerationError> {
        let dialect = sql_dialect.parse::<Dialect>()?;
        Ok(Self::new(natural_language_query, table_schema, dialect))
    }

    /// Convenience for a single table whose columns are already rendered,
    /// e.g. `id (INTEGER, PRIMARY KEY), name (TEXT)`.
    pub fn for_table(
        natural_language_query: impl Into<String>,
        table_name: &str,
        columns_info: &str,
        sql_dialect: Dialect,
    ) -> Self {
        let schema = format!("Table: {}\n   Columns: {}", table_name, columns_info);
        Self::new(natural_language_query, schema, sql_dialect)
    }

    pub fn query(&self) -> &str {
        &self.natural_language_query
    }

    pub fn table_schema(&self) -> &str {
        &self.table_schema
    }

    pub fn dialect(&self) -> Dialect {
        self.sql_dialect
    }
}

/// Validated SQL produced by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlOutput {
    sql: String,
}

impl SqlOutput {
    // Only the contract constructs outputs, after the post-conditions hold.
    pub(crate) fn new(sql: String) -> Self {
        Self { sql }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn into_sql(self) -> String {
        self.sql
    }
}

/// Post-condition the model's response failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    Empty,
    EchoedRequest,
    NotSql,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Empty => write!(f, "model returned no SQL"),
            Violation::EchoedRequest => write!(f, "model echoed the request instead of answering it"),
            Violation::NotSql => write!(f, "response does not start with a recognized SQL verb"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_dialect() {
        let err = QueryInput::parse("list users", "", "db2").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn for_table_formats_schema_like_discovery() {
        let input = QueryInput::for_table(
            "find users",
            "users",
            "id (INT), name (VARCHAR)",
            Dialect::Generic,
        );
        assert_eq!(input.table_schema(), "Table: users\n   Columns: id (INT), name (VARCHAR)");
        assert_eq!(input.dialect(), Dialect::Generic);
    }
}
