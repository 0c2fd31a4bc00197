//! Statement text for single-table reads and writes
//!
//! Only identifiers declared as `&'static str` constants on an entity end up
//! in statement text; every value is bound.

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn select_all(table: &str) -> String {
    format!("SELECT * FROM {}", quote(table))
}

pub(crate) fn select_by_key(table: &str, key_column: &str) -> String {
    format!("SELECT * FROM {} WHERE {} = ?", quote(table), quote(key_column))
}

pub(crate) fn select_where_in(table: &str, column: &str, count: usize) -> String {
    format!(
        "SELECT * FROM {} WHERE {} IN ({})",
        quote(table),
        quote(column),
        placeholders(count)
    )
}

pub(crate) fn insert(table: &str, columns: &[&str], returning: Option<&str>) -> String {
    let names = columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ");
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(table),
        names,
        placeholders(columns.len())
    );
    if let Some(key) = returning {
        sql.push_str(" RETURNING ");
        sql.push_str(&quote(key));
    }
    sql
}

pub(crate) fn update(table: &str, columns: &[&str], key_column: &str) -> String {
    let assignments = columns
        .iter()
        .map(|c| format!("{} = ?", quote(c)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote(table),
        assignments,
        quote(key_column)
    )
}

pub(crate) fn delete(table: &str, key_column: &str) -> String {
    format!("DELETE FROM {} WHERE {} = ?", quote(table), quote(key_column))
}
