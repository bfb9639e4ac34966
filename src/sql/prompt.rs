use crate::sql::dialect::DialectRule;

const MISSING_SCHEMA_NOTE: &str =
    "No table schema was provided. Use generic, descriptive table and column names.";

/// Builds the instruction sent to the model.
///
/// The output depends only on the three arguments, so identical requests
/// always produce identical prompts. An empty `table_schema` still yields a
/// usable prompt; the model is told to invent generic names.
pub fn build_prompt(question: &str, table_schema: &str, rule: &DialectRule) -> String {
    let mut prompt = format!(
        r#"### Instructions:
Your task is to convert a question into a single {name} SQL statement, given a table schema.
Adhere to these rules:
- **Use only {name} syntax**; follow the dialect guidance below for dates, text matching and identifiers
- **Use the exact table and column names from the schema**
- Return exactly one SQL statement and end it with a semicolon
- Do not explain the statement and do not wrap it in markdown code fences

### Dialect guidance ({name}):
- Date and time: {dates}
- Auto-increment columns: {autoincrement}
- Text matching: {matching}
- Identifier quoting: {quoting}
"#,
        name = rule.name,
        dates = rule.date_function_style,
        autoincrement = rule.autoincrement_keyword,
        matching = rule.string_match_operator,
        quoting = rule.quoting_style,
    );

    prompt.push_str("\n### Examples:\n");
    for snippet in rule.example_snippets {
        prompt.push_str(snippet);
        prompt.push('\n');
    }

    prompt.push_str("\n### Schema:\n");
    if table_schema.trim().is_empty() {
        prompt.push_str(MISSING_SCHEMA_NOTE);
    } else {
        prompt.push_str(table_schema);
    }

    prompt.push_str("\n\n### Question:\n");
    prompt.push_str(question);
    prompt.push_str("\n\n### SQL:\n");

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::{Dialect, DialectRegistry};

    const SCHEMA: &str = "Table: users\n   Columns: id (INT), name (VARCHAR), created_at (TIMESTAMP), age (INT)";

    fn marker(dialect: Dialect) -> &'static str {
        match dialect {
            Dialect::MySql => "DATE_FORMAT",
            Dialect::PostgreSql => "ILIKE",
            Dialect::Sqlite => "strftime",
            Dialect::Generic => "GENERATED ALWAYS AS IDENTITY",
        }
    }

    fn prompt_for(question: &str, dialect: Dialect) -> String {
        build_prompt(question, SCHEMA, DialectRegistry::standard().rule(dialect))
    }

    #[test]
    fn each_dialect_prompt_carries_only_its_own_marker() {
        for dialect in Dialect::ALL {
            let prompt = prompt_for("find all users older than 25", dialect);
            assert!(
                prompt.contains(marker(dialect)),
                "{} prompt is missing {}",
                dialect,
                marker(dialect)
            );

            for other in Dialect::ALL.into_iter().filter(|d| *d != dialect) {
                assert!(
                    !prompt.contains(marker(other)),
                    "{} prompt leaks {} marker {}",
                    dialect,
                    other,
                    marker(other)
                );
            }
        }
    }

    #[test]
    fn identical_inputs_give_identical_prompts() {
        for dialect in Dialect::ALL {
            let first = prompt_for("count users per age", dialect);
            let second = prompt_for("count users per age", dialect);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn interval_guidance_diverges_between_mysql_and_postgres() {
        let question = "show orders from the last 30 days";

        let mysql = prompt_for(question, Dialect::MySql);
        assert!(mysql.contains("INTERVAL 30 DAY"));
        assert!(!mysql.contains("INTERVAL '"));

        let postgres = prompt_for(question, Dialect::PostgreSql);
        assert!(postgres.contains("INTERVAL '30 days'"));
        assert!(!postgres.contains("INTERVAL 30 DAY"));
    }

    #[test]
    fn schema_and_question_are_embedded_verbatim() {
        let prompt = prompt_for("who joined last week?", Dialect::Sqlite);
        assert!(prompt.contains(SCHEMA));
        assert!(prompt.contains("### Question:\nwho joined last week?\n"));
        assert!(prompt.contains("do not wrap it in markdown code fences"));
        assert!(prompt.ends_with("### SQL:\n"));
    }

    #[test]
    fn empty_schema_still_produces_a_prompt() {
        let rule = DialectRegistry::standard().rule(Dialect::Generic);
        let prompt = build_prompt("list every product", "   ", rule);
        assert!(prompt.contains(MISSING_SCHEMA_NOTE));
        assert!(prompt.contains("list every product"));
    }
}
