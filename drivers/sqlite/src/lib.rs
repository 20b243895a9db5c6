//! SQLite parameter bindings for condql where clauses.

pub mod error;
mod value;

pub use error::SqliteBindError;
pub use value::SqliteValue;

use condql::{mk_where, CompileOptions, Dialect, Where, WhereAndValues};
use tracing::warn;

/// A compiled where clause with `?` placeholders and its positional parameters.
///
/// ```
/// use condql::Where;
/// use condql_sqlite::SqliteWhere;
///
/// let conn = rusqlite::Connection::open_in_memory().unwrap();
/// conn.execute_batch("CREATE TABLE t (a INTEGER); INSERT INTO t VALUES (1), (2);").unwrap();
///
/// let w = SqliteWhere::compile(&Where::new().field("a", 2)).unwrap();
/// let sql = format!("SELECT count(*) FROM t {}", w.clause);
/// let count: i64 = conn.query_row(&sql, rusqlite::params_from_iter(&w.params), |row| row.get(0)).unwrap();
/// assert_eq!(count, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SqliteWhere {
    /// Empty, or `WHERE ...`
    pub clause: String,
    pub params: Vec<SqliteValue>,
}

impl SqliteWhere {
    pub fn compile(w: &Where) -> Result<Self, SqliteBindError> { Self::with_options(Some(w), &CompileOptions::sqlite()) }

    pub fn with_options(w: Option<&Where>, options: &CompileOptions) -> Result<Self, SqliteBindError> {
        if options.dialect != Dialect::Sqlite {
            warn!("SqliteWhere called with {} options, compiling for sqlite instead", options.dialect);
            let options = CompileOptions { dialect: Dialect::Sqlite, ..options.clone() };
            return mk_where(w, &options).try_into();
        }
        mk_where(w, options).try_into()
    }

    pub fn is_empty(&self) -> bool { self.clause.is_empty() }

    /// Parameters as owned rusqlite values.
    pub fn values(&self) -> Vec<rusqlite::types::Value> { self.params.iter().map(SqliteValue::to_value).collect() }
}

impl TryFrom<WhereAndValues> for SqliteWhere {
    type Error = SqliteBindError;

    fn try_from(compiled: WhereAndValues) -> Result<Self, Self::Error> {
        let params = compiled.values.into_iter().map(SqliteValue::try_from).collect::<Result<Vec<_>, _>>()?;
        Ok(Self { clause: compiled.clause, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_compile() -> Result<()> {
        let w = Where::try_from(json!({"name": "Alice", "active": true, "tags": {"in": ["a", "b"]}}))?;
        let compiled = SqliteWhere::compile(&w)?;

        assert_eq!(compiled.clause, r#"WHERE "name"=? and "active"=? and "tags" IN (SELECT value FROM json_each(?))"#);
        assert_eq!(compiled.params, vec![SqliteValue::Text("Alice".into()), SqliteValue::Integer(1), SqliteValue::Json(r#"["a","b"]"#.into())]);
        Ok(())
    }

    #[test]
    fn test_forces_sqlite_placeholders() -> Result<()> {
        let compiled = SqliteWhere::with_options(Some(&Where::new().field("a", 1)), &CompileOptions::postgres().initial_param_index(3))?;
        assert_eq!(compiled.clause, r#"WHERE "a"=?"#);
        assert_eq!(compiled.values(), vec![rusqlite::types::Value::Integer(1)]);
        Ok(())
    }

    #[test]
    fn test_empty() -> Result<()> {
        let compiled = SqliteWhere::with_options(None, &CompileOptions::sqlite())?;
        assert!(compiled.is_empty());
        assert!(compiled.params.is_empty());
        Ok(())
    }
}
