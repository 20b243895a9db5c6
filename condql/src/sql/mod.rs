//! Compilation of [`Where`] trees into parameterized SQL.

mod fts;
mod json_path;
mod placeholder;
pub mod sanitize;
mod select_options;
mod subquery;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::ast::{Clause, Condition, Negation, Operand, RangeBound, Value, Where};
use crate::error::ParseError;

pub use json_path::prepare_json_path;
pub use placeholder::PlaceholderStack;
pub use sanitize::{quote, sanitize, sanitize_allow_dots};
pub use select_options::{mk_select_options, CoordOpts, NumberOrString, OrderBy, SelectOptions};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Postgres => write!(f, "postgres"),
            Dialect::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for Dialect {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            other => Err(ParseError::UnknownDialect(other.to_owned())),
        }
    }
}

pub const DEFAULT_TEXT_SEARCH_CONFIG: &str = "english";

/// Settings for one compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    pub dialect: Dialect,
    /// Number of parameters already bound by the enclosing query (Postgres only).
    pub initial_param_index: usize,
    /// Postgres text search configuration used by `_fts`.
    pub text_search_config: String,
}

impl Default for CompileOptions {
    fn default() -> Self { Self { dialect: Dialect::Postgres, initial_param_index: 0, text_search_config: DEFAULT_TEXT_SEARCH_CONFIG.to_owned() } }
}

impl CompileOptions {
    pub fn new(dialect: Dialect) -> Self { Self { dialect, ..Self::default() } }

    pub fn postgres() -> Self { Self::new(Dialect::Postgres) }

    pub fn sqlite() -> Self { Self::new(Dialect::Sqlite) }

    pub fn initial_param_index(mut self, index: usize) -> Self {
        self.initial_param_index = index;
        self
    }

    pub fn text_search_config(mut self, config: impl Into<String>) -> Self {
        self.text_search_config = config.into();
        self
    }
}

/// A compiled clause and the values bound to its placeholders, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereAndValues {
    /// Empty, or `WHERE ...`
    pub clause: String,
    pub values: Vec<Value>,
}

/// Compile a where object into a `WHERE ...` clause and its bound values.
///
/// An absent or empty where object yields an empty clause.
pub fn mk_where(r#where: Option<&Where>, options: &CompileOptions) -> WhereAndValues {
    let mut compiler = WhereCompiler::new(options);
    let clause = match r#where {
        Some(w) if !w.is_empty() => format!("WHERE {}", compiler.clauses(w)),
        _ => String::new(),
    };
    let values = compiler.into_values();
    debug!("mk_where({}): {} with {} params", options.dialect, clause, values.len());
    WhereAndValues { clause, values }
}

impl Where {
    /// Compile with default options for `dialect`.
    pub fn to_sql(&self, dialect: Dialect) -> WhereAndValues { mk_where(Some(self), &CompileOptions::new(dialect)) }
}

/// Recursive compiler state: the options and the placeholder stack shared by
/// every nested clause and subquery of one compilation.
pub struct WhereCompiler<'a> {
    options: &'a CompileOptions,
    stack: PlaceholderStack,
}

impl<'a> WhereCompiler<'a> {
    pub fn new(options: &'a CompileOptions) -> Self {
        Self { options, stack: PlaceholderStack::new(options.dialect, options.initial_param_index) }
    }

    pub fn is_sqlite(&self) -> bool { self.stack.is_sqlite() }

    pub fn into_values(self) -> Vec<Value> { self.stack.into_values() }

    fn arg(&mut self, value: &Value) -> String { self.stack.push(value.clone()) }

    /// Bind a literal that is compared for equality; Postgres gets an explicit
    /// text cast for strings so untyped parameters resolve.
    fn literal_arg(&mut self, value: &Value) -> String {
        let token = self.arg(value);
        if value.is_string() && !self.is_sqlite() {
            format!("{}::text", token)
        } else {
            token
        }
    }

    /// Sanitize and quote a (possibly qualified) identifier. All field keys and
    /// raw operands are interpolated through here.
    fn ident(&self, name: &str) -> String {
        let sanitized = sanitize_allow_dots(name);
        if sanitized.is_empty() {
            warn!("Identifier {:?} is empty after sanitizing", name);
        }
        quote(&sanitized)
    }

    /// Sanitize and quote a single unqualified name (table, schema, alias, column).
    fn name(&self, name: &str) -> String { quote(&sanitize(name)) }

    /// AND-join every clause of `w`.
    pub fn clauses(&mut self, w: &Where) -> String {
        let mut parts = Vec::with_capacity(w.len());
        for clause in &w.clauses {
            parts.push(self.clause(clause));
        }
        parts.join(" and ")
    }

    /// ` where ...` for a nested select, or nothing when `w` is empty.
    fn sub_where(&mut self, w: &Where) -> String {
        if w.is_empty() {
            String::new()
        } else {
            format!(" where {}", self.clauses(w))
        }
    }

    pub fn clause(&mut self, clause: &Clause) -> String {
        let sql = match clause {
            Clause::Fts(search) => self.fts(search),
            Clause::Or(alternatives) => {
                let mut parts = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    parts.push(self.clauses(alternative));
                }
                wrap_parens(parts.join(" or "))
            }
            Clause::Not(Negation::Where(negated)) => format!("not ({})", self.clauses(negated)),
            Clause::Not(Negation::Raw(raw)) => format!("not ({})", self.ident(raw)),
            Clause::Not(Negation::Literal(value)) => format!("not ({})", self.arg(value)),
            Clause::Eq(left, right) => self.equals(left, right),
            Clause::Field { key, condition } => self.condition(key, condition),
        };
        trace!("clause {:?} -> {}", clause, sql);
        sql
    }

    /// Symmetric comparison of two operands, either of which may be null.
    fn equals(&mut self, left: &Operand, right: &Operand) -> String {
        match (left, right) {
            (Operand::Null, Operand::Null) => "null is null".to_owned(),
            (Operand::Null, other) | (other, Operand::Null) => format!("{} is null", self.operand(other)),
            (left, right) => {
                let left = self.operand(left);
                let right = self.operand(right);
                format!("{}={}", left, right)
            }
        }
    }

    fn operand(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Null => "null".to_owned(),
            Operand::Literal(value) => self.literal_arg(value),
            Operand::Raw(raw) => self.ident(raw),
        }
    }

    pub fn condition(&mut self, key: &str, condition: &Condition) -> String {
        match condition {
            Condition::In(members) => {
                let column = self.ident(key);
                let token = self.arg(members);
                if self.is_sqlite() {
                    format!("{} IN (SELECT value FROM json_each({}))", column, token)
                } else {
                    format!("{} = ANY ({})", column, token)
                }
            }
            Condition::Slugify(slug) => {
                let column = self.ident(key);
                let token = self.arg(&Value::String(slug.clone()));
                if self.is_sqlite() {
                    format!("REPLACE(LOWER({}),' ','-')={}", column, token)
                } else {
                    format!(r"REGEXP_REPLACE(REPLACE(LOWER({}),' ','-'),'[^\w-]','','g')={}", column, token)
                }
            }
            Condition::AnyOf(alternatives) => {
                let mut parts = Vec::with_capacity(alternatives.len());
                for alternative in alternatives {
                    parts.push(self.condition(key, alternative));
                }
                wrap_parens(parts.join(" or "))
            }
            Condition::All(conditions) => {
                let mut parts = Vec::with_capacity(conditions.len());
                for condition in conditions {
                    parts.push(self.condition(key, condition));
                }
                parts.join(" and ")
            }
            Condition::ILike(needle) => {
                let column = self.ident(key);
                let token = self.arg(needle);
                format!("{} {} '%' || {} || '%'", column, self.like(), token)
            }
            Condition::Range { bound, value, inclusive } => {
                let column = self.ident(key);
                let op = match bound {
                    RangeBound::Gt => ">",
                    RangeBound::Lt => "<",
                };
                let token = self.arg(value);
                format!("{}{}{}{}", column, op, if *inclusive { "=" } else { "" }, token)
            }
            Condition::InSelect(select) => self.in_select(key, select),
            Condition::InSelectWithLevels(select) => self.in_select_with_levels(key, select),
            Condition::Json(json) => self.json(key, json),
            Condition::IsNull | Condition::Equals(Operand::Null) => format!("{} is null", self.ident(key)),
            Condition::Equals(operand) => {
                let column = self.ident(key);
                let rhs = self.operand(operand);
                format!("{}={}", column, rhs)
            }
        }
    }

    fn like(&self) -> &'static str {
        if self.is_sqlite() {
            "LIKE"
        } else {
            "ILIKE"
        }
    }
}

fn wrap_parens(s: String) -> String {
    if s.is_empty() {
        s
    } else {
        format!("({})", s)
    }
}

/// A single fragment is used as is, several are AND-joined.
fn and_array(parts: Vec<String>) -> String {
    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        parts.join(" and ")
    }
}
