use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::sql::GenerationError;

/// Target SQL dialect for generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    PostgreSql,
    Sqlite,
    Generic,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::MySql,
        Dialect::PostgreSql,
        Dialect::Sqlite,
        Dialect::Generic,
    ];

    /// Identifier used on the wire and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::PostgreSql => "postgresql",
            Dialect::Sqlite => "sqlite",
            Dialect::Generic => "generic",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "postgresql" => Ok(Dialect::PostgreSql),
            "sqlite" => Ok(Dialect::Sqlite),
            "generic" => Ok(Dialect::Generic),
            other => Err(GenerationError::InvalidInput(format!(
                "unsupported SQL dialect '{}' (expected one of {})",
                other,
                Dialect::ALL.map(|d| d.as_str()).join(", ")
            ))),
        }
    }
}

/// Syntax conventions the prompt uses to steer the model toward one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectRule {
    pub name: &'static str,
    pub date_function_style: &'static str,
    pub autoincrement_keyword: &'static str,
    pub string_match_operator: &'static str,
    pub quoting_style: &'static str,
    pub example_snippets: &'static [&'static str],
    /// Leading keywords accepted in addition to the common verb list.
    pub extra_verbs: &'static [&'static str],
}

/// Leading keywords every dialect accepts as the start of a statement.
pub const COMMON_VERBS: &[&str] = &[
    "SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP",
];

impl DialectRule {
    /// Iterates over every verb a statement in this dialect may start with.
    pub fn accepted_verbs(&self) -> impl Iterator<Item = &'static str> + '_ {
        COMMON_VERBS.iter().chain(self.extra_verbs.iter()).copied()
    }

    /// Returns true when `sql` starts with one of the accepted verbs as a whole
    /// word, followed by something shaped like that statement.
    ///
    /// Verbs that double as English imperatives (`SHOW`, `DESCRIBE`, `REPLACE`,
    /// `WITH`) must be followed by their SQL form, so "Show me the orders" is
    /// not taken for a statement.
    pub fn starts_with_verb(&self, sql: &str) -> bool {
        let sql = sql.trim_start();
        let head: String = sql
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_uppercase();

        !head.is_empty()
            && self.accepted_verbs().any(|verb| verb == head)
            && has_statement_shape(&head, sql)
    }
}

const IDENT: &str = r#"[`"]?[A-Za-z_][\w$]*[`"]?"#;

static SHOW_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^SHOW\s+(?:(?:FULL|GLOBAL|SESSION)\s+)?(?:TABLES|TABLE\s+STATUS|COLUMNS|FIELDS|DATABASES|SCHEMAS|INDEX|INDEXES|KEYS|CREATE|STATUS|VARIABLES|PROCESSLIST|GRANTS|WARNINGS|ERRORS|TRIGGERS|ENGINES|EVENTS|PLUGINS|PRIVILEGES|CHARACTER\s+SET|COLLATION|FUNCTION\s+STATUS|PROCEDURE\s+STATUS)\b",
    )
    .expect("SHOW pattern is valid")
});

static DESCRIBE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^DESCRIBE\s+(?:(?:SELECT|FORMAT|ANALYZE)\b|(?P<target>{IDENT}(?:\.{IDENT})?)(?:\s+{IDENT})?\s*;?\s*$)"
    ))
    .expect("DESCRIBE pattern is valid")
});

static REPLACE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^REPLACE\s+(?:(?:LOW_PRIORITY|DELAYED)\s+)?(?:INTO\s+\S|(?P<target>{IDENT})\s*(?:\(|VALUES?\b|SET\b|SELECT\b))"
    ))
    .expect("REPLACE pattern is valid")
});

static WITH_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)^WITH\s+(?:RECURSIVE\s+)?(?P<target>{IDENT})\s*(?:\([^)]*\)\s*)?(?:AS\b|$)"
    ))
    .expect("WITH pattern is valid")
});

// Words that put an English sentence, not an identifier, after the verb.
const PROSE_WORDS: &[&str] = &[
    "a", "all", "an", "any", "each", "every", "how", "i", "it", "its", "me", "my", "our",
    "pleasure", "some", "that", "the", "their", "them", "these", "this", "those", "us",
    "what", "which", "who", "why", "you", "your",
];

fn is_prose_word(word: &str) -> bool {
    let word = word.trim_matches(|c| c == '`' || c == '"').to_ascii_lowercase();
    PROSE_WORDS.contains(&word.as_str())
}

fn has_statement_shape(verb: &str, sql: &str) -> bool {
    let shape = match verb {
        "SHOW" => return SHOW_SHAPE.is_match(sql),
        "DESCRIBE" => &DESCRIBE_SHAPE,
        "REPLACE" => &REPLACE_SHAPE,
        "WITH" => &WITH_SHAPE,
        _ => return true,
    };

    shape.captures(sql).is_some_and(|caps| {
        caps.name("target")
            .is_none_or(|target| !is_prose_word(target.as_str()))
    })
}

/// One rule per dialect. Lookup is a `match`, so it is total over [`Dialect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialectRegistry {
    pub mysql: DialectRule,
    pub postgresql: DialectRule,
    pub sqlite: DialectRule,
    pub generic: DialectRule,
}

impl DialectRegistry {
    /// The built-in registry shared by the whole process.
    pub fn standard() -> &'static DialectRegistry {
        &STANDARD_REGISTRY
    }

    pub fn rule(&self, dialect: Dialect) -> &DialectRule {
        match dialect {
            Dialect::MySql => &self.mysql,
            Dialect::PostgreSql => &self.postgresql,
            Dialect::Sqlite => &self.sqlite,
            Dialect::Generic => &self.generic,
        }
    }
}

static STANDARD_REGISTRY: DialectRegistry = DialectRegistry {
    mysql: DialectRule {
        name: "MySQL",
        date_function_style: "DATE_FORMAT(), NOW(), CURDATE() and DATE_SUB(NOW(), INTERVAL n UNIT)",
        autoincrement_keyword: "AUTO_INCREMENT",
        string_match_operator: "LIKE (case-insensitive under the default collation)",
        quoting_style: "backticks around identifiers, e.g. `order`",
        example_snippets: &[
            "SELECT * FROM orders WHERE created_at >= NOW() - INTERVAL 30 DAY;",
            "SELECT DATE_FORMAT(created_at, '%Y-%m') AS month, COUNT(*) FROM orders GROUP BY month;",
            "SELECT * FROM users WHERE name LIKE '%john%' LIMIT 10;",
            "CREATE TABLE users (id INT AUTO_INCREMENT PRIMARY KEY, name VARCHAR(255));",
        ],
        extra_verbs: &["REPLACE", "SHOW", "DESCRIBE"],
    },
    postgresql: DialectRule {
        name: "PostgreSQL",
        date_function_style: "to_char(), NOW(), CURRENT_DATE and NOW() - INTERVAL 'n units'",
        autoincrement_keyword: "SERIAL",
        string_match_operator: "ILIKE for case-insensitive matching, LIKE for case-sensitive",
        quoting_style: "double quotes around identifiers, e.g. \"order\"",
        example_snippets: &[
            "SELECT * FROM orders WHERE created_at >= NOW() - INTERVAL '30 days';",
            "SELECT to_char(created_at, 'YYYY-MM') AS month, COUNT(*) FROM orders GROUP BY month;",
            "SELECT * FROM users WHERE name ILIKE '%john%' LIMIT 10;",
            "CREATE TABLE users (id SERIAL PRIMARY KEY, name TEXT);",
        ],
        extra_verbs: &["TRUNCATE"],
    },
    sqlite: DialectRule {
        name: "SQLite",
        date_function_style: "strftime(), date() and datetime('now', '-n days')",
        autoincrement_keyword: "AUTOINCREMENT",
        string_match_operator: "LIKE (case-insensitive for ASCII characters)",
        quoting_style: "double quotes around identifiers, e.g. \"order\"",
        example_snippets: &[
            "SELECT * FROM orders WHERE created_at >= datetime('now', '-30 days');",
            "SELECT strftime('%Y-%m', created_at) AS month, COUNT(*) FROM orders GROUP BY month;",
            "SELECT * FROM users WHERE name LIKE '%john%' LIMIT 10;",
            "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT);",
        ],
        extra_verbs: &["REPLACE", "PRAGMA"],
    },
    generic: DialectRule {
        name: "ANSI SQL",
        date_function_style: "CURRENT_DATE, CURRENT_TIMESTAMP and EXTRACT(field FROM value)",
        autoincrement_keyword: "GENERATED ALWAYS AS IDENTITY",
        string_match_operator: "LIKE combined with UPPER() or LOWER() for case-insensitive matching",
        quoting_style: "double quotes around identifiers, e.g. \"order\"",
        example_snippets: &[
            "SELECT * FROM orders WHERE EXTRACT(YEAR FROM created_at) = 2024;",
            "SELECT * FROM users WHERE LOWER(name) LIKE '%john%';",
            "CREATE TABLE users (id INTEGER GENERATED ALWAYS AS IDENTITY PRIMARY KEY, name VARCHAR(255));",
        ],
        extra_verbs: &[],
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_dialects_case_insensitively() {
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!(" postgresql ".parse::<Dialect>().unwrap(), Dialect::PostgreSql);
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite);
        assert_eq!("GENERIC".parse::<Dialect>().unwrap(), Dialect::Generic);
    }

    #[test]
    fn rejects_unknown_dialect_as_invalid_input() {
        let err = "oracle".parse::<Dialect>().unwrap_err();
        assert!(matches!(err, GenerationError::InvalidInput(_)));
        assert!(err.to_string().contains("oracle"));
    }

    #[test]
    fn every_dialect_has_a_distinct_rule() {
        let registry = DialectRegistry::standard();
        let names: Vec<&str> = Dialect::ALL.iter().map(|d| registry.rule(*d).name).collect();
        assert_eq!(names, vec!["MySQL", "PostgreSQL", "SQLite", "ANSI SQL"]);

        for dialect in Dialect::ALL {
            assert!(!registry.rule(dialect).example_snippets.is_empty());
        }
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.to_string().parse::<Dialect>().unwrap(), dialect);
        }
    }

    #[test]
    fn verb_check_matches_whole_words_only() {
        let sqlite = DialectRegistry::standard().rule(Dialect::Sqlite);
        assert!(sqlite.starts_with_verb("  select * from t;"));
        assert!(sqlite.starts_with_verb("WITH x AS (SELECT 1) SELECT * FROM x;"));
        assert!(sqlite.starts_with_verb("PRAGMA table_info(t);"));
        assert!(!sqlite.starts_with_verb("SELECTION of rows"));
        assert!(!sqlite.starts_with_verb("SHOW TABLES;"));
        assert!(!sqlite.starts_with_verb(""));

        let mysql = DialectRegistry::standard().rule(Dialect::MySql);
        assert!(mysql.starts_with_verb("SHOW TABLES;"));
    }

    #[test]
    fn english_imperatives_are_not_statements() {
        let mysql = DialectRegistry::standard().rule(Dialect::MySql);

        assert!(!mysql.starts_with_verb("Show me which table holds orders first, I need more context."));
        assert!(!mysql.starts_with_verb("Describe the orders table in more detail, please."));
        assert!(!mysql.starts_with_verb("Replace the old values with new ones."));
        assert!(!mysql.starts_with_verb("With pleasure! Here is the query."));
        assert!(!mysql.starts_with_verb("With the schema given, I cannot answer."));
    }

    #[test]
    fn sql_forms_of_ambiguous_verbs_are_accepted() {
        let mysql = DialectRegistry::standard().rule(Dialect::MySql);

        assert!(mysql.starts_with_verb("show full columns from orders;"));
        assert!(mysql.starts_with_verb("SHOW CREATE TABLE `orders`;"));
        assert!(mysql.starts_with_verb("DESCRIBE orders;"));
        assert!(mysql.starts_with_verb("DESCRIBE shop.orders created_at"));
        assert!(mysql.starts_with_verb("DESCRIBE SELECT * FROM orders;"));
        assert!(mysql.starts_with_verb("REPLACE INTO orders (id, total) VALUES (1, 9.5);"));
        assert!(mysql.starts_with_verb("REPLACE orders SET total = 0;"));
        assert!(mysql.starts_with_verb("WITH RECURSIVE tree (id) AS (SELECT 1) SELECT * FROM tree;"));
        assert!(mysql.starts_with_verb("WITH recent\nAS (SELECT 1) SELECT * FROM recent;"));
    }
}
