//! Postgres parameter bindings for condql where clauses.

mod value;

pub use value::{PgValue, PgValueError};

use condql::{mk_where, CompileOptions, Dialect, Where, WhereAndValues};
use tokio_postgres::types::ToSql;
use tracing::warn;

/// A compiled where clause with its arguments ready for `tokio_postgres`.
#[derive(Debug)]
pub struct PgWhere {
    /// Empty, or `WHERE ...` with `$n` placeholders
    pub clause: String,
    pub args: Vec<Box<dyn ToSql + Send + Sync>>,
}

impl PgWhere {
    /// Compile `w`, numbering placeholders after the `initial_index`
    /// parameters the enclosing query already binds.
    pub fn compile(w: &Where, initial_index: usize) -> Self {
        Self::with_options(Some(w), &CompileOptions::postgres().initial_param_index(initial_index))
    }

    pub fn with_options(w: Option<&Where>, options: &CompileOptions) -> Self {
        if options.dialect != Dialect::Postgres {
            warn!("PgWhere called with {} options, compiling for postgres instead", options.dialect);
            let options = CompileOptions { dialect: Dialect::Postgres, ..options.clone() };
            return mk_where(w, &options).into();
        }
        mk_where(w, options).into()
    }

    pub fn is_empty(&self) -> bool { self.clause.is_empty() }

    /// Borrow the arguments in the form `Client::query` takes.
    pub fn params(&self) -> Vec<&(dyn ToSql + Sync)> { self.args.iter().map(|arg| &**arg as &(dyn ToSql + Sync)).collect() }
}

impl From<WhereAndValues> for PgWhere {
    fn from(compiled: WhereAndValues) -> Self {
        let args = compiled.values.into_iter().map(|value| Box::new(PgValue(value)) as Box<dyn ToSql + Send + Sync>).collect();
        Self { clause: compiled.clause, args }
    }
}
