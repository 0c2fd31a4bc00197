//! Raw SQL escape hatch
//!
//! Statement text must be a `'static` literal and every value must be bound
//! through a placeholder. [`RawSql::validate`] rejects anything that looks
//! like text assembled from input: several statements, comments, quoted
//! literals, or a placeholder count that differs from the bound values.

use crate::entity::Value;
use crate::error::DataError;

/// A parameterised, single-statement query
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    sql: &'static str,
    values: Vec<Value>,
}

impl RawSql {
    /// Starts a query from literal statement text
    pub fn new(sql: &'static str) -> Self {
        Self {
            sql,
            values: Vec::new(),
        }
    }

    /// Binds the next placeholder
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.values.push(value.into());
        self
    }

    pub fn sql(&self) -> &'static str {
        self.sql
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Checks the statement before it reaches the store
    ///
    /// # Errors
    ///
    /// `DataError::InvalidSql` describing the first problem found
    pub fn validate(&self) -> Result<(), DataError> {
        let text = self.sql.trim();
        if text.is_empty() {
            return Err(DataError::invalid_sql("statement is empty"));
        }

        let body = text.strip_suffix(';').unwrap_or(text);
        if body.contains(';') {
            return Err(DataError::invalid_sql("only a single statement is allowed"));
        }
        if body.contains("--") || body.contains("/*") {
            return Err(DataError::invalid_sql("comments are not allowed"));
        }
        if body.contains('\'') {
            return Err(DataError::invalid_sql(
                "quoted literals are not allowed, bind the value instead",
            ));
        }

        let expected = placeholder_count(body)?;
        if expected != self.values.len() {
            return Err(DataError::invalid_sql(format!(
                "statement has {expected} placeholder(s) but {} value(s) were bound",
                self.values.len()
            )));
        }
        Ok(())
    }
}

/// Counts `?` placeholders, or the highest `?NNN` index when numbered
fn placeholder_count(body: &str) -> Result<usize, DataError> {
    let mut anonymous = 0usize;
    let mut highest = 0usize;
    let mut numbered = false;

    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '?' {
            continue;
        }
        let mut digits = String::new();
        while let Some(d) = chars.peek().filter(|d| d.is_ascii_digit()) {
            digits.push(*d);
            chars.next();
        }
        if digits.is_empty() {
            anonymous += 1;
        } else {
            numbered = true;
            let index: usize = digits
                .parse()
                .map_err(|_| DataError::invalid_sql(format!("bad placeholder ?{digits}")))?;
            if index == 0 {
                return Err(DataError::invalid_sql("placeholder ?0 is not valid"));
            }
            highest = highest.max(index);
        }
    }

    match (anonymous, numbered) {
        (0, true) => Ok(highest),
        (_, false) => Ok(anonymous),
        _ => Err(DataError::invalid_sql(
            "cannot mix ? and ?NNN placeholders in one statement",
        )),
    }
}
