use rusqlite::Connection;
use rusqlite::types::ValueRef;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

use crate::db::DbError;

/// Result rows of one statement.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRows {
    /// Result column names in statement order. Repeated names get a numeric
    /// suffix (`id`, `id_2`) so every value has its own key in `rows`.
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    /// True when more rows were available than `max_rows`.
    pub truncated: bool,
}

/// Runs `sql` and collects at most `max_rows` rows.
///
/// Errors from SQLite are returned untouched; the statement is never rewritten.
pub fn execute(conn: &Connection, sql: &str, max_rows: usize) -> Result<QueryRows, DbError> {
    let mut stmt = conn.prepare(sql)?;
    let columns = unique_column_names(stmt.column_names());

    let mut rows = stmt.query([])?;
    let mut collected = Vec::new();
    let mut truncated = false;

    while let Some(row) = rows.next()? {
        if collected.len() == max_rows {
            truncated = true;
            break;
        }

        let mut record = Map::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            record.insert(column.clone(), to_json(row.get_ref(i)?));
        }
        collected.push(record);
    }

    debug!("Statement returned {} row(s), truncated: {}", collected.len(), truncated);

    Ok(QueryRows {
        columns,
        rows: collected,
        truncated,
    })
}

fn unique_column_names(names: Vec<&str>) -> Vec<String> {
    let mut used = HashSet::new();
    names
        .into_iter()
        .map(|name| {
            let mut candidate = name.to_string();
            let mut n = 1;
            while !used.insert(candidate.clone()) {
                n += 1;
                candidate = format!("{}_{}", name, n);
            }
            candidate
        })
        .collect()
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<{} bytes>", bytes.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn products() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT, price REAL, image BLOB);
             INSERT INTO products VALUES (1, 'Chai', 18.0, x'00ff'), (2, 'Chang', 19.5, NULL), (3, 'Tofu', 23.25, NULL);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn maps_values_to_json() {
        let result = execute(&products(), "SELECT * FROM products ORDER BY id", 10).unwrap();

        assert_eq!(result.columns, vec!["id", "name", "price", "image"]);
        assert_eq!(result.rows.len(), 3);
        assert!(!result.truncated);
        assert_eq!(result.rows[0]["id"], json!(1));
        assert_eq!(result.rows[0]["name"], json!("Chai"));
        assert_eq!(result.rows[0]["price"], json!(18.0));
        assert_eq!(result.rows[0]["image"], json!("<2 bytes>"));
        assert_eq!(result.rows[1]["image"], Value::Null);
    }

    #[test]
    fn stops_at_row_limit() {
        let result = execute(&products(), "SELECT name FROM products ORDER BY id", 2).unwrap();

        assert_eq!(result.rows.len(), 2);
        assert!(result.truncated);
        assert_eq!(result.rows[1]["name"], json!("Chang"));
    }

    #[test]
    fn malformed_sql_surfaces_as_execution_error() {
        let err = execute(&products(), "SELEC name FROM products", 10).unwrap_err();
        assert_eq!(err.kind(), "execution_error");
    }

    #[test]
    fn statements_without_rows_succeed() {
        let conn = products();
        let result = execute(&conn, "UPDATE products SET price = price * 2 WHERE id = 1", 10).unwrap();
        assert!(result.rows.is_empty());

        let price: f64 = conn
            .query_row("SELECT price FROM products WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(price, 36.0);
    }

    #[test]
    fn duplicate_column_names_keep_every_value() {
        let conn = products();
        conn.execute_batch(
            "CREATE TABLE stock (id INTEGER, product_id INTEGER, qty INTEGER);
             INSERT INTO stock VALUES (10, 1, 5);",
        )
        .unwrap();

        let result = execute(
            &conn,
            "SELECT p.id, s.id, p.name AS id_2 FROM products p JOIN stock s ON s.product_id = p.id",
            10,
        )
        .unwrap();

        assert_eq!(result.columns, vec!["id", "id_2", "id_2_2"]);
        assert_eq!(result.rows[0]["id"], json!(1));
        assert_eq!(result.rows[0]["id_2"], json!(10));
        assert_eq!(result.rows[0]["id_2_2"], json!("Chai"));
    }

    #[test]
    fn row_keys_follow_statement_order() {
        let result = execute(&products(), "SELECT name, id FROM products WHERE id = 1", 10).unwrap();

        let keys: Vec<&String> = result.rows[0].keys().collect();
        assert_eq!(keys, vec!["name", "id"]);
    }
}
