use std::fmt;

/// One emitted DDL statement, without its terminating semicolon. Statement
/// order is part of the output contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Render the statement stream as executable script text: each statement
/// semicolon-terminated and followed by a blank line.
#[must_use]
pub fn render_script(statements: &[Statement]) -> String {
    let mut rendered = String::new();
    for statement in statements {
        rendered.push_str(statement.sql());
        rendered.push_str(";\n\n");
    }
    rendered
}
