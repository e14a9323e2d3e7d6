//! Sequential statement dispatch helpers.
//!
//! Splitting is a literal split on `;`. Statements that carry a semicolon inside
//! a string literal or a comment are not supported.

/// Non-empty, trimmed statements in script order.
#[must_use]
pub fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|statement| !strip_leading_comments(statement).is_empty())
        .collect()
}

fn strip_leading_comments(statement: &str) -> &str {
    let mut rest = statement.trim_start();
    loop {
        if let Some(line_comment) = rest.strip_prefix("--") {
            rest = line_comment
                .split_once('\n')
                .map_or("", |(_, tail)| tail)
                .trim_start();
        } else if let Some(block_comment) = rest.strip_prefix("/*") {
            rest = block_comment
                .split_once("*/")
                .map_or("", |(_, tail)| tail)
                .trim_start();
        } else {
            return rest;
        }
    }
}
