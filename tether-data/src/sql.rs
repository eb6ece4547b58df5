//! Dialect translation and the condition-to-SQL compiler.
//!
//! Statements are compiled against PostgreSQL-style `$1, $2, …` numbering
//! and rewritten into the target driver's placeholder syntax as the last
//! step. Identifiers are validated before they are interpolated; values
//! always travel as bound parameters.

use serde_json::Value;

use crate::condition::{Operator, OrderBy, QueryOptions, WhereCondition};
use crate::pool::Row;

/// The column every `*_by_id` operation keys on.
pub const ID_COLUMN: &str = "id";

/// SQL syntax variant and driver behavior of one database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
    /// MySQL-style `?` placeholders.
    MySql,
}

impl Dialect {
    /// Whether `INSERT`/`UPDATE` can fetch the written row in the same
    /// round trip via `RETURNING`.
    pub fn supports_returning(self) -> bool {
        match self {
            Dialect::Sqlite | Dialect::Postgres => true,
            Dialect::MySql => false,
        }
    }

    /// Rewrite `$1, $2, …` placeholders into this dialect's syntax.
    ///
    /// For PostgreSQL this is the identity. For SQLite/MySQL every `$<digits>`
    /// token becomes a plain `?`, left to right; multi-digit indices are
    /// consumed whole, and a `$` not followed by a digit is left untouched.
    /// The function is pure and idempotent on inputs without `$`-placeholders.
    ///
    /// Token boundaries are purely the `\$\d+` scan: a `$<digits>` sequence
    /// inside a quoted literal is rewritten too. SQL generated by this module
    /// never embeds such text (values are always bound parameters), so the
    /// caveat only applies to hand-written SQL.
    pub fn convert_placeholders(self, sql: &str) -> String {
        match self {
            Dialect::Postgres => sql.to_string(),
            Dialect::Sqlite | Dialect::MySql => rewrite_numbered(sql),
        }
    }
}

fn rewrite_numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' && chars.peek().is_some_and(|next| next.is_ascii_digit()) {
            while chars.peek().is_some_and(|next| next.is_ascii_digit()) {
                chars.next();
            }
            out.push('?');
        } else {
            out.push(c);
        }
    }
    out
}

/// Errors raised while compiling the condition model into SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A table or column name failed identifier validation.
    InvalidIdentifier { kind: &'static str, ident: String },
    /// An `IN` condition carried something other than a non-empty array.
    EmptyInList { field: String },
    /// An insert or update carried an empty change set.
    EmptyValues { table: String },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            QueryError::EmptyInList { field } => {
                write!(f, "IN condition on '{field}' requires a non-empty array")
            }
            QueryError::EmptyValues { table } => {
                write!(f, "Empty change set for table '{table}'")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// Build `SELECT * FROM <table> …` for the given options.
pub fn build_select(
    table: &str,
    options: &QueryOptions,
    dialect: Dialect,
) -> Result<(String, Vec<Value>), QueryError> {
    let table = checked_identifier(table, "table")?;
    let mut sql = format!("SELECT * FROM {table}");
    let mut params = Vec::new();
    let mut placeholder_idx = 1usize;
    append_where(&mut sql, &mut params, &mut placeholder_idx, &options.conditions)?;
    append_order(&mut sql, &options.order)?;
    append_limit_offset(&mut sql, options.limit, options.offset);
    Ok((dialect.convert_placeholders(&sql), params))
}

/// Build `SELECT COUNT(*) AS count FROM <table> …` for the given conditions.
pub fn build_count(
    table: &str,
    conditions: &[WhereCondition],
    dialect: Dialect,
) -> Result<(String, Vec<Value>), QueryError> {
    let table = checked_identifier(table, "table")?;
    let mut sql = format!("SELECT COUNT(*) AS count FROM {table}");
    let mut params = Vec::new();
    let mut placeholder_idx = 1usize;
    append_where(&mut sql, &mut params, &mut placeholder_idx, conditions)?;
    Ok((dialect.convert_placeholders(&sql), params))
}

/// Build `INSERT INTO <table> (…) VALUES (…)`, with `RETURNING *` where the
/// dialect supports it.
pub fn build_insert(
    table: &str,
    data: &Row,
    dialect: Dialect,
) -> Result<(String, Vec<Value>), QueryError> {
    let table_ident = checked_identifier(table, "table")?;
    if data.is_empty() {
        return Err(QueryError::EmptyValues {
            table: table.to_string(),
        });
    }

    let mut columns = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len());
    for (idx, (column, value)) in data.iter().enumerate() {
        columns.push(checked_identifier(column, "column")?);
        placeholders.push(format!("${}", idx + 1));
        params.push(value.clone());
    }

    let mut sql = format!(
        "INSERT INTO {table_ident} ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );
    if dialect.supports_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok((dialect.convert_placeholders(&sql), params))
}

/// Build `UPDATE <table> SET … WHERE id = $n`, with `RETURNING *` where the
/// dialect supports it. The id parameter comes last.
pub fn build_update_by_id(
    table: &str,
    id: &Value,
    data: &Row,
    dialect: Dialect,
) -> Result<(String, Vec<Value>), QueryError> {
    let table_ident = checked_identifier(table, "table")?;
    if data.is_empty() {
        return Err(QueryError::EmptyValues {
            table: table.to_string(),
        });
    }

    let mut assignments = Vec::with_capacity(data.len());
    let mut params = Vec::with_capacity(data.len() + 1);
    for (idx, (column, value)) in data.iter().enumerate() {
        let column = checked_identifier(column, "column")?;
        assignments.push(format!("{column} = ${}", idx + 1));
        params.push(value.clone());
    }

    let mut sql = format!(
        "UPDATE {table_ident} SET {} WHERE {ID_COLUMN} = ${}",
        assignments.join(", "),
        data.len() + 1
    );
    params.push(id.clone());
    if dialect.supports_returning() {
        sql.push_str(" RETURNING *");
    }
    Ok((dialect.convert_placeholders(&sql), params))
}

/// Build `DELETE FROM <table> WHERE id = $1`.
pub fn build_delete_by_id(
    table: &str,
    id: &Value,
    dialect: Dialect,
) -> Result<(String, Vec<Value>), QueryError> {
    let table_ident = checked_identifier(table, "table")?;
    let sql = format!("DELETE FROM {table_ident} WHERE {ID_COLUMN} = $1");
    Ok((dialect.convert_placeholders(&sql), vec![id.clone()]))
}

fn append_where(
    sql: &mut String,
    params: &mut Vec<Value>,
    placeholder_idx: &mut usize,
    conditions: &[WhereCondition],
) -> Result<(), QueryError> {
    if conditions.is_empty() {
        // No conditions means "match all rows" - no WHERE clause at all.
        return Ok(());
    }
    sql.push_str(" WHERE ");
    let mut first = true;
    for cond in conditions {
        if !first {
            sql.push_str(" AND ");
        }
        first = false;
        let field = checked_identifier(&cond.field, "column")?;
        match cond.operator {
            Operator::In => {
                let values = match &cond.value {
                    Value::Array(values) if !values.is_empty() => values,
                    _ => {
                        return Err(QueryError::EmptyInList {
                            field: cond.field.clone(),
                        })
                    }
                };
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|_| {
                        let placeholder = format!("${placeholder_idx}");
                        *placeholder_idx += 1;
                        placeholder
                    })
                    .collect();
                sql.push_str(&format!("{field} IN ({})", placeholders.join(", ")));
                params.extend(values.iter().cloned());
            }
            op => {
                sql.push_str(&format!("{field} {} ${placeholder_idx}", op.as_sql()));
                *placeholder_idx += 1;
                params.push(cond.value.clone());
            }
        }
    }
    Ok(())
}

fn append_order(sql: &mut String, order: &[OrderBy]) -> Result<(), QueryError> {
    if order.is_empty() {
        return Ok(());
    }
    let mut clauses = Vec::with_capacity(order.len());
    for entry in order {
        let field = checked_identifier(&entry.field, "column")?;
        clauses.push(format!("{field} {}", entry.direction.as_sql()));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&clauses.join(", "));
    Ok(())
}

fn append_limit_offset(sql: &mut String, limit: Option<u64>, offset: Option<u64>) {
    // LIMIT/OFFSET is syntactically identical across all three dialects.
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
}

fn checked_identifier<'a>(ident: &'a str, kind: &'static str) -> Result<&'a str, QueryError> {
    if is_valid_identifier(ident) {
        Ok(ident)
    } else {
        Err(QueryError::InvalidIdentifier {
            kind,
            ident: ident.to_string(),
        })
    }
}

fn is_valid_identifier(ident: &str) -> bool {
    if ident.is_empty() {
        return false;
    }
    ident.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::SortDirection;
    use serde_json::json;

    #[test]
    fn convert_is_identity_for_postgres() {
        let sql = "SELECT * FROM t WHERE a = $1 AND b = $2";
        assert_eq!(Dialect::Postgres.convert_placeholders(sql), sql);
    }

    #[test]
    fn convert_is_idempotent_without_placeholders() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = ?";
        assert_eq!(Dialect::Sqlite.convert_placeholders(sql), sql);
        assert_eq!(Dialect::MySql.convert_placeholders(sql), sql);
    }

    #[test]
    fn convert_preserves_cardinality_and_order() {
        let out = Dialect::MySql
            .convert_placeholders("INSERT INTO t (a, b, c) VALUES ($1, $2, $3)");
        assert_eq!(out, "INSERT INTO t (a, b, c) VALUES (?, ?, ?)");
        assert_eq!(out.matches('?').count(), 3);
    }

    #[test]
    fn convert_handles_multi_digit_indices() {
        let out = Dialect::Sqlite.convert_placeholders("SELECT * FROM t WHERE a = $10 AND b = $11");
        assert_eq!(out, "SELECT * FROM t WHERE a = ? AND b = ?");
    }

    #[test]
    fn convert_leaves_bare_dollar_alone() {
        let out = Dialect::Sqlite
            .convert_placeholders("SELECT \"column$name\" FROM users WHERE id = $1");
        assert_eq!(out, "SELECT \"column$name\" FROM users WHERE id = ?");
    }

    #[test]
    fn select_without_conditions_has_no_where() {
        let (sql, params) =
            build_select("users", &QueryOptions::new(), Dialect::Sqlite).unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn select_renders_conditions_order_and_paging() {
        let options = QueryOptions::new()
            .and_where(WhereCondition::eq("status", "active"))
            .and_where(WhereCondition::like("name", "%alice%"))
            .order_by("id", SortDirection::Asc)
            .order_by("name", SortDirection::Desc)
            .limit(10)
            .offset(20);
        let (sql, params) = build_select("users", &options, Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE status = $1 AND name LIKE $2 \
             ORDER BY id ASC, name DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(params, vec![json!("active"), json!("%alice%")]);
    }

    #[test]
    fn select_converts_placeholders_for_question_dialects() {
        let options = QueryOptions::new()
            .and_where(WhereCondition::eq("status", "active"))
            .and_where(WhereCondition::gt("age", 18));
        let (sql, _) = build_select("users", &options, Dialect::MySql).unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE status = ? AND age > ?");
    }

    #[test]
    fn in_condition_expands_one_placeholder_per_element() {
        let options = QueryOptions::new()
            .and_where(WhereCondition::eq("status", "active"))
            .and_where(WhereCondition::is_in("role", ["admin", "user", "guest"]));
        let (sql, params) = build_select("users", &options, Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE status = $1 AND role IN ($2, $3, $4)"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn in_condition_rejects_empty_and_non_array_values() {
        let empty = QueryOptions::new().and_where(WhereCondition::is_in("role", Vec::<String>::new()));
        let err = build_select("users", &empty, Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, QueryError::EmptyInList { .. }));

        let scalar = QueryOptions::new().and_where(WhereCondition::new(
            "role",
            Operator::In,
            json!("admin"),
        ));
        let err = build_select("users", &scalar, Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, QueryError::EmptyInList { .. }));
    }

    #[test]
    fn identifiers_are_validated() {
        let err = build_select("users;drop", &QueryOptions::new(), Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "table", .. }));

        let options = QueryOptions::new().and_where(WhereCondition::eq("na me", 1));
        let err = build_select("users", &options, Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "column", .. }));
    }

    #[test]
    fn count_renders_where_only() {
        let conditions = vec![WhereCondition::eq("active", true)];
        let (sql, params) = build_count("users", &conditions, Dialect::Postgres).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) AS count FROM users WHERE active = $1");
        assert_eq!(params, vec![json!(true)]);
    }

    fn sample_row() -> Row {
        let mut row = Row::new();
        row.insert("email".to_string(), json!("a@b.com"));
        row.insert("name".to_string(), json!("alice"));
        row
    }

    #[test]
    fn insert_with_returning_for_postgres_and_sqlite() {
        let (sql, params) = build_insert("users", &sample_row(), Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO users (email, name) VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(params, vec![json!("a@b.com"), json!("alice")]);

        let (sql, _) = build_insert("users", &sample_row(), Dialect::Sqlite).unwrap();
        assert_eq!(sql, "INSERT INTO users (email, name) VALUES (?, ?) RETURNING *");
    }

    #[test]
    fn insert_without_returning_for_mysql() {
        let (sql, _) = build_insert("users", &sample_row(), Dialect::MySql).unwrap();
        assert_eq!(sql, "INSERT INTO users (email, name) VALUES (?, ?)");
    }

    #[test]
    fn insert_rejects_empty_change_set() {
        let err = build_insert("users", &Row::new(), Dialect::Sqlite).unwrap_err();
        assert!(matches!(err, QueryError::EmptyValues { .. }));
    }

    #[test]
    fn update_by_id_binds_id_last() {
        let (sql, params) =
            build_update_by_id("users", &json!(7), &sample_row(), Dialect::Postgres).unwrap();
        assert_eq!(
            sql,
            "UPDATE users SET email = $1, name = $2 WHERE id = $3 RETURNING *"
        );
        assert_eq!(params, vec![json!("a@b.com"), json!("alice"), json!(7)]);

        let (sql, _) =
            build_update_by_id("users", &json!(7), &sample_row(), Dialect::MySql).unwrap();
        assert_eq!(sql, "UPDATE users SET email = ?, name = ? WHERE id = ?");
    }

    #[test]
    fn delete_by_id_shape() {
        let (sql, params) = build_delete_by_id("users", &json!(7), Dialect::Sqlite).unwrap();
        assert_eq!(sql, "DELETE FROM users WHERE id = ?");
        assert_eq!(params, vec![json!(7)]);
    }

    #[test]
    fn dotted_identifiers_are_accepted() {
        let options = QueryOptions::new().and_where(WhereCondition::eq("users.email", "a@b.com"));
        let (sql, _) = build_select("users", &options, Dialect::Postgres).unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE users.email = $1");
    }
}
