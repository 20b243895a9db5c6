use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A where object: an ordered list of clauses, AND-joined when compiled.
///
/// Clause order is significant because it fixes the order in which values are
/// bound to placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub clauses: Vec<Clause>,
}

impl Where {
    pub fn new() -> Self { Self { clauses: Vec::new() } }

    pub fn is_empty(&self) -> bool { self.clauses.is_empty() }

    pub fn len(&self) -> usize { self.clauses.len() }

    /// Append a `field = condition` clause.
    pub fn field(mut self, key: impl Into<String>, condition: impl Into<Condition>) -> Self {
        self.clauses.push(Clause::Field { key: key.into(), condition: condition.into() });
        self
    }

    pub fn clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn or(self, alternatives: Vec<Where>) -> Self { self.clause(Clause::Or(alternatives)) }

    pub fn not(self, negated: Where) -> Self { self.clause(Clause::Not(Negation::Where(Box::new(negated)))) }

    pub fn eq(self, left: impl Into<Operand>, right: impl Into<Operand>) -> Self { self.clause(Clause::Eq(left.into(), right.into())) }

    pub fn fts(self, search: FtsSearch) -> Self { self.clause(Clause::Fts(search)) }
}

impl FromIterator<Clause> for Where {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self { Self { clauses: iter.into_iter().collect() } }
}

/// One entry of a where object. The reserved keys `_fts`, `or`, `not` and `eq`
/// get their own variants; everything else is a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Clause {
    Fts(FtsSearch),
    Or(Vec<Where>),
    Not(Negation),
    Eq(Operand, Operand),
    Field { key: String, condition: Condition },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Negation {
    Where(Box<Where>),
    /// `not (<identifier>)`, typically a boolean column
    Raw(String),
    /// `not ($n)`
    Literal(Value),
}

/// The condition attached to a single field key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Membership in a list bound as a single array parameter.
    In(Value),
    /// Slug-normalized equality.
    Slugify(String),
    /// Per-field disjunction.
    AnyOf(Vec<Condition>),
    /// Per-field conjunction (a bare array in the JSON form).
    All(Vec<Condition>),
    /// Case-insensitive substring match.
    ILike(Value),
    Range { bound: RangeBound, value: Value, inclusive: bool },
    InSelect(InSelect),
    InSelectWithLevels(InSelectWithLevels),
    Json(JsonCondition),
    IsNull,
    Equals(Operand),
}

impl Condition {
    pub fn gt(value: impl Into<Value>) -> Self { Condition::Range { bound: RangeBound::Gt, value: value.into(), inclusive: false } }

    pub fn gte(value: impl Into<Value>) -> Self { Condition::Range { bound: RangeBound::Gt, value: value.into(), inclusive: true } }

    pub fn lt(value: impl Into<Value>) -> Self { Condition::Range { bound: RangeBound::Lt, value: value.into(), inclusive: false } }

    pub fn lte(value: impl Into<Value>) -> Self { Condition::Range { bound: RangeBound::Lt, value: value.into(), inclusive: true } }

    pub fn ilike(value: impl Into<Value>) -> Self { Condition::ILike(value.into()) }

    pub fn one_of<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
        Condition::In(Value::Array(values.into_iter().map(Into::into).collect()))
    }

    /// Compare against another column instead of a bound value.
    pub fn raw(identifier: impl Into<String>) -> Self { Condition::Equals(Operand::Raw(identifier.into())) }
}

impl From<Value> for Condition {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Condition::IsNull,
            v => Condition::Equals(Operand::Literal(v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeBound {
    Gt,
    Lt,
}

/// Either side of a comparison: a bound literal, a raw identifier, or SQL null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Null,
    Literal(Value),
    /// Interpolated as a (sanitized, quoted) identifier, never bound.
    Raw(String),
}

impl Operand {
    pub fn raw(identifier: impl Into<String>) -> Self { Operand::Raw(identifier.into()) }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Operand::Null,
            v => Operand::Literal(v),
        }
    }
}

macro_rules! from_scalar {
    ($target:ty: $($source:ty),*) => {
        $(impl From<$source> for $target {
            fn from(value: $source) -> Self { Value::from(value).into() }
        })*
    };
}

from_scalar!(Condition: &str, String, i64, i32, f64, bool, DateTime<Utc>);
from_scalar!(Operand: &str, String, i64, i32, f64, bool, DateTime<Utc>);

/// A value that ends up in the bound parameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Array(Vec<Value>),
    /// Structured JSON that is not a recognized condition shape
    Json(serde_json::Value),
}

impl Value {
    pub fn is_string(&self) -> bool { matches!(self, Value::String(_)) }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Render as JSON, the representation used when a driver has no native
    /// encoding for the value (arrays on SQLite, mixed arrays on Postgres).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Date(d) => serde_json::Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Json(json) => json.clone(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_owned()) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Integer(i) }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Integer(i as i64) }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Float(f) }
}
impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Boolean(b) }
}
impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self { Value::Date(d) }
}
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self { Value::Array(items.into_iter().map(Into::into).collect()) }
}
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Full-text search over a set of fields, the `_fts` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FtsSearch {
    pub fields: Vec<FtsField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub search_term: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FtsField {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub is_fkey: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reftable_name: Option<String>,
    #[serde(default)]
    pub attributes: FieldAttributes,
}

impl FtsField {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: Some(FieldType { sql_name: "text".into() }),
            is_fkey: false,
            reftable_name: None,
            attributes: FieldAttributes::default(),
        }
    }

    /// A foreign key whose referenced row's `summary_field` is searched too.
    pub fn fkey(name: impl Into<String>, reftable: impl Into<String>, summary_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: None,
            is_fkey: true,
            reftable_name: Some(reftable.into()),
            attributes: FieldAttributes { include_fts: true, summary_field: Some(summary_field.into()) },
        }
    }

    pub fn is_text(&self) -> bool { self.field_type.as_ref().is_some_and(|t| t.sql_name == "text") }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldType {
    pub sql_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldAttributes {
    #[serde(default)]
    pub include_fts: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_field: Option<String>,
}

/// `key in (select field from table where ...)`, optionally through a second table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InSelect {
    pub table: String,
    pub field: String,
    pub r#where: Where,
    pub tenant: Option<String>,
    /// Set together with `val_field` to join `table` to `through`.
    pub through: Option<String>,
    pub val_field: Option<String>,
}

impl InSelect {
    pub fn new(table: impl Into<String>, field: impl Into<String>, r#where: Where) -> Self {
        Self { table: table.into(), field: field.into(), r#where, tenant: None, through: None, val_field: None }
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn through(mut self, through: impl Into<String>, val_field: impl Into<String>) -> Self {
        self.through = Some(through.into());
        self.val_field = Some(val_field.into());
        self
    }
}

/// `key in (select ... from t0 join t1 ... join tn where ...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InSelectWithLevels {
    pub r#where: Where,
    pub schema: Option<String>,
    pub join_levels: JoinLevels,
}

/// A non-empty chain of join hops, outermost table first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<JoinLevel>", into = "Vec<JoinLevel>")]
pub struct JoinLevels(Vec<JoinLevel>);

impl JoinLevels {
    pub fn new(levels: Vec<JoinLevel>) -> Result<Self, ParseError> {
        if levels.is_empty() {
            return Err(ParseError::EmptyJoinLevels);
        }
        Ok(Self(levels))
    }

    pub fn levels(&self) -> &[JoinLevel] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { false }
}

impl TryFrom<Vec<JoinLevel>> for JoinLevels {
    type Error = ParseError;

    fn try_from(levels: Vec<JoinLevel>) -> Result<Self, Self::Error> { Self::new(levels) }
}

impl From<JoinLevels> for Vec<JoinLevel> {
    fn from(levels: JoinLevels) -> Self { levels.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLevel {
    pub table: String,
    pub key: JoinKey,
}

impl JoinLevel {
    /// Hop along a foreign key column held by the previous level.
    pub fn fkey(table: impl Into<String>, fkey: impl Into<String>) -> Self { Self { table: table.into(), key: JoinKey::Fkey(fkey.into()) } }

    /// Hop along a column on this level's table that references the previous level's id.
    pub fn inbound(table: impl Into<String>, inbound_key: impl Into<String>) -> Self {
        Self { table: table.into(), key: JoinKey::Inbound(inbound_key.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKey {
    Fkey(String),
    Inbound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsonCondition {
    /// `[path, value]`: equality at a single path
    Path(JsonPath, Value),
    /// `{subpath: predicate, ...}`, AND-joined
    Map(Vec<(String, JsonPredicate)>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JsonPredicate {
    ILike(Value),
    Range { gte: Option<Value>, lte: Option<Value> },
    Equals(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonPath {
    Elem(JsonPathElem),
    Elems(Vec<JsonPathElem>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonPathElem {
    Key(String),
    Index(u64),
}

impl From<&str> for JsonPath {
    fn from(s: &str) -> Self { JsonPath::Elem(JsonPathElem::Key(s.to_owned())) }
}
impl From<String> for JsonPath {
    fn from(s: String) -> Self { JsonPath::Elem(JsonPathElem::Key(s)) }
}
impl From<Vec<JsonPathElem>> for JsonPath {
    fn from(elems: Vec<JsonPathElem>) -> Self { JsonPath::Elems(elems) }
}
