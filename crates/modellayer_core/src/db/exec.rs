//! Runs compiled statements on a SQLite connection.

use super::DbResult;
use crate::model::{Row, Value};
use crate::sql::CompiledStatement;
use rusqlite::Connection;

/// Outcome of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rows_affected: usize,
    pub last_insert_id: i64,
}

/// Executes a statement that returns no rows.
pub fn execute(conn: &Connection, statement: &CompiledStatement) -> DbResult<WriteOutcome> {
    let mut prepared = conn.prepare(&statement.sql)?;
    let rows_affected = prepared.execute(statement.params.as_named().as_slice())?;
    Ok(WriteOutcome {
        rows_affected,
        last_insert_id: conn.last_insert_rowid(),
    })
}

/// Runs a query and collects every row.
pub fn fetch_all(conn: &Connection, statement: &CompiledStatement) -> DbResult<Vec<Row>> {
    collect_rows(conn, statement, None)
}

/// Runs a query and returns its first row, if any.
pub fn fetch_one(conn: &Connection, statement: &CompiledStatement) -> DbResult<Option<Row>> {
    Ok(collect_rows(conn, statement, Some(1))?.into_iter().next())
}

fn collect_rows(
    conn: &Connection,
    statement: &CompiledStatement,
    max_rows: Option<usize>,
) -> DbResult<Vec<Row>> {
    let mut prepared = conn.prepare(&statement.sql)?;
    let names: Vec<String> = prepared
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let named = statement.params.as_named();
    let mut rows = prepared.query(named.as_slice())?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::new();
        for (index, name) in names.iter().enumerate() {
            record.insert(name.clone(), Value::from(row.get_ref(index)?));
        }
        collected.push(record);
        if max_rows.is_some_and(|max| collected.len() >= max) {
            break;
        }
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::{execute, fetch_all, fetch_one};
    use crate::model::Value;
    use crate::sql::{CompiledStatement, Params};
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        conn
    }

    #[test]
    fn execute_binds_named_params_and_reports_rowid() {
        let conn = conn();
        let outcome = execute(
            &conn,
            &CompiledStatement::new(
                "INSERT INTO t (name) VALUES (:col_name)",
                Params::new().bind("col_name", "Ana"),
            ),
        )
        .unwrap();
        assert_eq!(outcome.rows_affected, 1);
        assert_eq!(outcome.last_insert_id, 1);
    }

    #[test]
    fn fetch_helpers_map_columns_to_values() {
        let conn = conn();
        conn.execute_batch("INSERT INTO t (name) VALUES ('a'), ('b');")
            .unwrap();
        let all = fetch_all(
            &conn,
            &CompiledStatement::new("SELECT * FROM t ORDER BY id", Params::new()),
        )
        .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1]["name"], Value::from("b"));

        let one = fetch_one(
            &conn,
            &CompiledStatement::new(
                "SELECT * FROM t WHERE id = :id",
                Params::new().bind("id", 9),
            ),
        )
        .unwrap();
        assert!(one.is_none());
    }

    #[test]
    fn unknown_parameter_name_is_an_error() {
        let conn = conn();
        let result = fetch_all(
            &conn,
            &CompiledStatement::new("SELECT * FROM t", Params::new().bind("ghost", 1)),
        );
        assert!(result.is_err());
    }
}
