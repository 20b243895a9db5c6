use crate::ast::Value;
use crate::sql::Dialect;

/// Accumulates bound values for one compilation and hands out the matching
/// placeholder tokens.
///
/// Postgres tokens are numbered (`$1`, `$2`, ...) starting after the initial
/// index, so a clause can be spliced into a query that already binds
/// parameters. SQLite tokens are always `?` and bind by position.
#[derive(Debug, Clone)]
pub struct PlaceholderStack {
    dialect: Dialect,
    count: usize,
    values: Vec<Value>,
}

impl PlaceholderStack {
    pub fn new(dialect: Dialect, initial_index: usize) -> Self { Self { dialect, count: initial_index, values: Vec::new() } }

    pub fn postgres(initial_index: usize) -> Self { Self::new(Dialect::Postgres, initial_index) }

    pub fn sqlite() -> Self { Self::new(Dialect::Sqlite, 0) }

    /// Bind `value` and return the token to splice into the SQL text.
    pub fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        self.count += 1;
        match self.dialect {
            Dialect::Postgres => format!("${}", self.count),
            Dialect::Sqlite => "?".to_owned(),
        }
    }

    pub fn dialect(&self) -> Dialect { self.dialect }

    pub fn is_sqlite(&self) -> bool { self.dialect == Dialect::Sqlite }

    pub fn values(&self) -> &[Value] { &self.values }

    pub fn into_values(self) -> Vec<Value> { self.values }
}
