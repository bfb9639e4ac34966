use tracing::debug;

use crate::sql::dialect::DialectRule;

/// Pulls the candidate SQL statement out of a raw model response.
///
/// Tries, in order: the body of the first fenced code block, the run of
/// lines starting at the first line that opens with an accepted verb, and
/// finally the trimmed response itself.
pub fn extract_sql(content: &str, rule: &DialectRule) -> String {
    if let Some(body) = fenced_block(content) {
        debug!("Extracted SQL from fenced code block");
        return skip_to_statement(&body, rule);
    }

    if let Some(sql) = scan_statement_lines(content, rule) {
        debug!("Extracted SQL using line scanning");
        return sql;
    }

    content.trim().to_string()
}

// Body of the first ``` block; the info string on the opening fence line is dropped.
fn fenced_block(content: &str) -> Option<String> {
    let start = content.find("```")?;
    let after_fence = &content[start + 3..];
    let body = match after_fence.find('\n') {
        Some(newline) if !after_fence[..newline].contains("```") => &after_fence[newline + 1..],
        // Inline fence such as ```SELECT 1;```
        _ => after_fence,
    };

    let sql = match body.find("```") {
        Some(end) => &body[..end],
        // Unterminated fence: the model stopped early, keep what it wrote.
        None => body,
    };

    let sql = sql.trim();
    if sql.is_empty() {
        None
    } else {
        Some(sql.to_string())
    }
}

// Drops comment or explanation lines that precede the statement inside a fence.
fn skip_to_statement(body: &str, rule: &DialectRule) -> String {
    let lines: Vec<&str> = body.lines().collect();
    match lines.iter().position(|line| rule.starts_with_verb(line)) {
        Some(first) => lines[first..].join("\n").trim().to_string(),
        None => body.to_string(),
    }
}

fn scan_statement_lines(content: &str, rule: &DialectRule) -> Option<String> {
    let lines: Vec<&str> = content.lines().collect();
    let first = lines.iter().position(|line| rule.starts_with_verb(line))?;

    let mut statement: Vec<&str> = Vec::new();
    for line in &lines[first..] {
        let trimmed = line.trim();
        if trimmed.is_empty() && !statement.is_empty() {
            break;
        }

        statement.push(trimmed);
        if trimmed.ends_with(';') {
            break;
        }
    }

    Some(statement.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::dialect::{Dialect, DialectRegistry};

    fn rule() -> &'static DialectRule {
        DialectRegistry::standard().rule(Dialect::Sqlite)
    }

    #[test]
    fn strips_sql_fence() {
        let raw = "```sql\nSELECT * FROM customers;\n```";
        assert_eq!(extract_sql(raw, rule()), "SELECT * FROM customers;");
    }

    #[test]
    fn strips_bare_fence_and_surrounding_prose() {
        let raw = "Here you go:\n```\nSELECT name\nFROM users;\n```\nThis lists every user.";
        assert_eq!(extract_sql(raw, rule()), "SELECT name\nFROM users;");
    }

    #[test]
    fn strips_inline_fence() {
        assert_eq!(extract_sql("```SELECT 1;```", rule()), "SELECT 1;");
    }

    #[test]
    fn keeps_body_of_unterminated_fence() {
        let raw = "```sql\nSELECT 1;";
        assert_eq!(extract_sql(raw, rule()), "SELECT 1;");
    }

    #[test]
    fn scans_for_statement_after_explanation() {
        let raw = "Sure! The query is:\n\nselect id, name\n  from users\n  where age > 25;\nIt filters by age.";
        assert_eq!(
            extract_sql(raw, rule()),
            "select id, name\nfrom users\nwhere age > 25;"
        );
    }

    #[test]
    fn statement_without_semicolon_ends_at_blank_line() {
        let raw = "SELECT * FROM t\n\nThat returns all rows.";
        assert_eq!(extract_sql(raw, rule()), "SELECT * FROM t");
    }

    #[test]
    fn drops_comment_lines_inside_fence() {
        let raw = "```sql\n-- customers in the USA\nSELECT *\nFROM customers\n\nWHERE country = 'USA';\n```";
        assert_eq!(
            extract_sql(raw, rule()),
            "SELECT *\nFROM customers\n\nWHERE country = 'USA';"
        );
    }

    #[test]
    fn fence_without_statement_is_returned_whole() {
        let raw = "```\nno idea, sorry\n```";
        assert_eq!(extract_sql(raw, rule()), "no idea, sorry");
    }

    #[test]
    fn falls_back_to_trimmed_response() {
        assert_eq!(extract_sql("  I cannot answer that.  ", rule()), "I cannot answer that.");
    }
}
