use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::{DbError, quote_identifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

impl ColumnInfo {
    /// Renders `name (TYPE, PRIMARY KEY)` / `name (TYPE, NOT NULL)`.
    pub fn describe(&self) -> String {
        let mut traits: Vec<&str> = Vec::new();
        if !self.data_type.is_empty() {
            traits.push(&self.data_type);
        }
        if self.primary_key {
            traits.push("PRIMARY KEY");
        } else if self.not_null {
            traits.push("NOT NULL");
        }

        if traits.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, traits.join(", "))
        }
    }
}

/// Columns of one table, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

impl SchemaDescriptor {
    pub fn columns_info(&self) -> String {
        self.columns
            .iter()
            .map(ColumnInfo::describe)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Text form fed to the prompt as the table schema.
    pub fn to_prompt_text(&self) -> String {
        format!("Table: {}\n   Columns: {}", self.table_name, self.columns_info())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub row_count: i64,
    pub column_count: usize,
    pub columns: Vec<String>,
}

/// User tables, sorted by name.
pub fn list_tables(conn: &Connection) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let tables = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tables)
}

pub fn describe_table(conn: &Connection, table_name: &str) -> Result<SchemaDescriptor, DbError> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let columns = stmt
        .query_map([table_name], |row| {
            Ok(ColumnInfo {
                name: row.get(0)?,
                data_type: row.get(1)?,
                not_null: row.get::<_, i64>(2)? != 0,
                primary_key: row.get::<_, i64>(3)? > 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if columns.is_empty() {
        return Err(DbError::TableNotFound(table_name.to_string()));
    }

    Ok(SchemaDescriptor {
        table_name: table_name.to_string(),
        columns,
    })
}

/// Describes every user table.
pub fn discover(conn: &Connection) -> Result<Vec<SchemaDescriptor>, DbError> {
    list_tables(conn)?
        .iter()
        .map(|table| describe_table(conn, table))
        .collect()
}

pub fn list_tables_with_info(conn: &Connection) -> Result<Vec<TableInfo>, DbError> {
    let mut tables = Vec::new();
    for schema in discover(conn)? {
        let row_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_identifier(&schema.table_name)),
            [],
            |row| row.get(0),
        )?;

        tables.push(TableInfo {
            column_count: schema.columns.len(),
            columns: schema.columns.into_iter().map(|c| c.name).collect(),
            name: schema.table_name,
            row_count,
        });
    }
    Ok(tables)
}
