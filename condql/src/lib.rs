//! Compile JSON-shaped where objects into parameterized `WHERE` clauses for
//! Postgres and SQLite.
//!
//! ```
//! use condql::{mk_where, CompileOptions, Where};
//!
//! let w = Where::try_from(r#"{"name": "ann", "age": {"gt": 18}}"#).unwrap();
//! let out = mk_where(Some(&w), &CompileOptions::postgres());
//! assert_eq!(out.clause, r#"WHERE "name"=$1::text and "age">$2"#);
//! assert_eq!(out.values.len(), 2);
//! ```

pub mod ast;
pub mod conversion;
pub mod error;
pub mod prefix;
pub mod sql;

pub use ast::{
    Clause, Condition, FtsField, FtsSearch, InSelect, InSelectWithLevels, JoinKey, JoinLevel, JoinLevels, JsonCondition, JsonPath,
    JsonPathElem, JsonPredicate, Negation, Operand, RangeBound, Value, Where,
};
pub use error::ParseError;
pub use prefix::prefix_fields_in_where;
pub use sql::{mk_select_options, mk_where, CompileOptions, Dialect, SelectOptions, WhereAndValues};
