//! Conversion from the JSON form of a where object into the typed [`Where`] tree.
//!
//! The shape precedence of the JSON form is resolved here, once: an object that
//! carries several recognized tags becomes the variant of the first tag in the
//! order below, and the compiler never has to re-inspect shapes.
//!
//! 1. `_fts` key, 2. `in`, 3. `or` key with an array, 4. `slugify`,
//! 5. `not` key with an object, 6. `eq` key with a pair, 7. `{or: [...]}`,
//! 8. array, 9. `ilike`, 10. `gt` / `lt`, 11. `inSelect`,
//! 12. `inSelectWithLevels`, 13. `json`, 14. `null`, 15. literal.

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::warn;

use crate::ast::{
    Clause, Condition, FtsSearch, InSelect, InSelectWithLevels, JoinLevel, JoinLevels, JsonCondition, JsonPath, JsonPathElem, JsonPredicate,
    Negation, Operand, RangeBound, Value, Where,
};
use crate::error::ParseError;

/// Marker object for a raw identifier operand: `{"$raw": "other_table.column"}`.
pub const RAW_MARKER: &str = "$raw";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strictness {
    /// Unrecognized condition objects are bound as JSON literals.
    Lenient,
    /// Unrecognized condition objects are rejected.
    Strict,
}

impl TryFrom<JsonValue> for Where {
    type Error = ParseError;

    fn try_from(value: JsonValue) -> Result<Self, Self::Error> { Converter { strictness: Strictness::Lenient }.where_object(&value) }
}

impl TryFrom<&JsonValue> for Where {
    type Error = ParseError;

    fn try_from(value: &JsonValue) -> Result<Self, Self::Error> { Converter { strictness: Strictness::Lenient }.where_object(value) }
}

impl<'a> TryFrom<&'a str> for Where {
    type Error = ParseError;

    fn try_from(value: &'a str) -> Result<Self, Self::Error> {
        let json: JsonValue = serde_json::from_str(value).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
        Where::try_from(json)
    }
}

impl Where {
    /// Like `Where::try_from`, but condition objects that match no known shape
    /// are an error instead of being compared as JSON literals.
    pub fn from_json_strict(value: &JsonValue) -> Result<Self, ParseError> { Converter { strictness: Strictness::Strict }.where_object(value) }
}

struct Converter {
    strictness: Strictness,
}

impl Converter {
    fn where_object(&self, value: &JsonValue) -> Result<Where, ParseError> {
        match value {
            JsonValue::Null => Ok(Where::new()),
            JsonValue::Object(map) => map.iter().map(|(k, v)| self.clause(k, v)).collect::<Result<Where, _>>(),
            other => Err(ParseError::NotAnObject(json_kind(other))),
        }
    }

    fn clause(&self, key: &str, value: &JsonValue) -> Result<Clause, ParseError> {
        if key == "_fts" {
            let search: FtsSearch = serde_json::from_value(value.clone()).map_err(|e| ParseError::descriptor(key, "_fts descriptor", e))?;
            return Ok(Clause::Fts(search));
        }
        if has_tag(value, "in") {
            return self.field(key, value);
        }

        match (key, value) {
            ("or", JsonValue::Array(alternatives)) => {
                Ok(Clause::Or(alternatives.iter().map(|w| self.where_object(w)).collect::<Result<Vec<_>, _>>()?))
            }
            _ if has_tag(value, "slugify") => self.field(key, value),
            ("not", JsonValue::Object(map)) => match raw_marker(map) {
                Some(raw) => Ok(Clause::Not(Negation::Raw(raw))),
                None => Ok(Clause::Not(Negation::Where(Box::new(self.where_object(value)?)))),
            },
            ("eq", JsonValue::Array(pair)) if pair.len() == 2 => Ok(Clause::Eq(self.operand(&pair[0])?, self.operand(&pair[1])?)),
            ("not", JsonValue::Bool(_) | JsonValue::Number(_) | JsonValue::String(_)) => Ok(Clause::Not(Negation::Literal(value_of(value)))),
            _ => self.field(key, value),
        }
    }

    fn field(&self, key: &str, value: &JsonValue) -> Result<Clause, ParseError> {
        Ok(Clause::Field { key: key.to_owned(), condition: self.condition(key, value)? })
    }

    fn condition(&self, key: &str, value: &JsonValue) -> Result<Condition, ParseError> {
        let map = match value {
            JsonValue::Null => return Ok(Condition::IsNull),
            JsonValue::Array(items) => {
                return Ok(Condition::All(items.iter().map(|item| self.condition(key, item)).collect::<Result<Vec<_>, _>>()?));
            }
            JsonValue::Object(map) => map,
            scalar => return Ok(Condition::Equals(Operand::Literal(value_of(scalar)))),
        };

        if let Some(raw) = raw_marker(map) {
            return Ok(Condition::Equals(Operand::Raw(raw)));
        }
        if let Some(members) = map.get("in") {
            return Ok(Condition::In(value_of(members)));
        }
        if let Some(slug) = map.get("slugify") {
            return Ok(Condition::Slugify(self.slug(key, slug)?));
        }
        if let Some(JsonValue::Array(alternatives)) = map.get("or") {
            return Ok(Condition::AnyOf(alternatives.iter().map(|alt| self.condition(key, alt)).collect::<Result<Vec<_>, _>>()?));
        }
        if let Some(needle) = map.get("ilike") {
            return Ok(Condition::ILike(value_of(needle)));
        }
        let inclusive = map.get("equal").is_some_and(truthy);
        if let Some(bound) = map.get("gt") {
            return Ok(Condition::Range { bound: RangeBound::Gt, value: value_of(bound), inclusive });
        }
        if let Some(bound) = map.get("lt") {
            return Ok(Condition::Range { bound: RangeBound::Lt, value: value_of(bound), inclusive });
        }
        if let Some(descriptor) = map.get("inSelect") {
            return Ok(Condition::InSelect(self.in_select(key, descriptor)?));
        }
        if let Some(descriptor) = map.get("inSelectWithLevels") {
            return Ok(Condition::InSelectWithLevels(self.in_select_with_levels(key, descriptor)?));
        }
        if let Some(json) = map.get("json") {
            return Ok(Condition::Json(json_condition(key, json)?));
        }

        match self.strictness {
            Strictness::Strict => Err(ParseError::UnrecognizedCondition { key: key.to_owned(), value: value.to_string() }),
            Strictness::Lenient => {
                warn!("Unrecognized condition shape for field {}, comparing as a JSON literal: {}", key, value);
                Ok(Condition::Equals(Operand::Literal(Value::Json(value.clone()))))
            }
        }
    }

    fn operand(&self, value: &JsonValue) -> Result<Operand, ParseError> {
        match value {
            JsonValue::Null => Ok(Operand::Null),
            JsonValue::Object(map) => match (raw_marker(map), self.strictness) {
                (Some(raw), _) => Ok(Operand::Raw(raw)),
                (None, Strictness::Strict) => Err(ParseError::InvalidOperand(value.to_string())),
                (None, Strictness::Lenient) => {
                    warn!("eq operand is neither a literal nor a raw column, binding it as JSON: {}", value);
                    Ok(Operand::Literal(Value::Json(value.clone())))
                }
            },
            other => Ok(Operand::Literal(value_of(other))),
        }
    }

    fn slug(&self, key: &str, slug: &JsonValue) -> Result<String, ParseError> {
        match slug {
            JsonValue::String(s) => Ok(s.clone()),
            other if self.strictness == Strictness::Lenient => Ok(other.to_string()),
            other => Err(ParseError::descriptor(key, "slugify value", format!("expected a string, got {}", json_kind(other)))),
        }
    }

    fn in_select(&self, key: &str, descriptor: &JsonValue) -> Result<InSelect, ParseError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Descriptor {
            table: String,
            field: String,
            #[serde(default)]
            r#where: JsonValue,
            tenant: Option<String>,
            through: Option<String>,
            val_field: Option<String>,
        }

        let d: Descriptor = serde_json::from_value(descriptor.clone()).map_err(|e| ParseError::descriptor(key, "inSelect", e))?;
        Ok(InSelect {
            table: d.table,
            field: d.field,
            r#where: self.where_object(&d.r#where)?,
            tenant: d.tenant.filter(|t| !t.is_empty()),
            through: d.through.filter(|t| !t.is_empty()),
            val_field: d.val_field.filter(|v| !v.is_empty()),
        })
    }

    fn in_select_with_levels(&self, key: &str, descriptor: &JsonValue) -> Result<InSelectWithLevels, ParseError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct LevelDescriptor {
            table: String,
            fkey: Option<String>,
            inbound_key: Option<String>,
        }

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Descriptor {
            #[serde(default)]
            r#where: JsonValue,
            schema: Option<String>,
            join_levels: Vec<LevelDescriptor>,
        }

        let d: Descriptor = serde_json::from_value(descriptor.clone()).map_err(|e| ParseError::descriptor(key, "inSelectWithLevels", e))?;
        let levels = d
            .join_levels
            .into_iter()
            .map(|level| match (level.fkey.filter(|k| !k.is_empty()), level.inbound_key.filter(|k| !k.is_empty())) {
                (Some(fkey), _) => Ok(JoinLevel::fkey(level.table, fkey)),
                (None, Some(inbound)) => Ok(JoinLevel::inbound(level.table, inbound)),
                (None, None) => Err(ParseError::MissingJoinKey(level.table)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InSelectWithLevels {
            r#where: self.where_object(&d.r#where)?,
            schema: d.schema.filter(|s| !s.is_empty()),
            join_levels: JoinLevels::new(levels)?,
        })
    }
}

fn json_condition(key: &str, json: &JsonValue) -> Result<JsonCondition, ParseError> {
    match json {
        JsonValue::Array(pair) if pair.len() >= 2 => Ok(JsonCondition::Path(json_path(key, &pair[0])?, value_of(&pair[1]))),
        JsonValue::Object(map) => Ok(JsonCondition::Map(map.iter().map(|(path, predicate)| (path.clone(), json_predicate(predicate))).collect())),
        other => Err(ParseError::descriptor(key, "json condition", format!("expected [path, value] or an object, got {}", other))),
    }
}

fn json_predicate(predicate: &JsonValue) -> JsonPredicate {
    if let JsonValue::Object(map) = predicate {
        if let Some(needle) = map.get("ilike").filter(|n| truthy(n)) {
            return JsonPredicate::ILike(value_of(needle));
        }
        if map.contains_key("gte") || map.contains_key("lte") {
            return JsonPredicate::Range { gte: map.get("gte").map(value_of), lte: map.get("lte").map(value_of) };
        }
    }
    JsonPredicate::Equals(value_of(predicate))
}

fn json_path(key: &str, path: &JsonValue) -> Result<JsonPath, ParseError> {
    match path {
        JsonValue::Array(elems) => Ok(JsonPath::Elems(elems.iter().map(|e| json_path_elem(key, e)).collect::<Result<Vec<_>, _>>()?)),
        elem => Ok(JsonPath::Elem(json_path_elem(key, elem)?)),
    }
}

fn json_path_elem(key: &str, elem: &JsonValue) -> Result<JsonPathElem, ParseError> {
    match elem {
        JsonValue::String(s) => Ok(JsonPathElem::Key(s.clone())),
        JsonValue::Number(n) => match n.as_u64() {
            Some(index) => Ok(JsonPathElem::Index(index)),
            None => Err(ParseError::descriptor(key, "json path", format!("array index must be a non-negative integer, got {}", n))),
        },
        other => Err(ParseError::descriptor(key, "json path", format!("unsupported path element {}", other))),
    }
}

/// Convert a JSON value into a bindable [`Value`].
pub fn value_of(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Boolean(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::String(s.clone()),
        JsonValue::Array(items) => Value::Array(items.iter().map(value_of).collect()),
        JsonValue::Object(_) => Value::Json(json.clone()),
    }
}

fn raw_marker(map: &Map<String, JsonValue>) -> Option<String> {
    match (map.len(), map.get(RAW_MARKER)) {
        (1, Some(JsonValue::String(raw))) => Some(raw.clone()),
        _ => None,
    }
}

fn has_tag(value: &JsonValue, tag: &str) -> bool { value.as_object().is_some_and(|map| map.contains_key(tag)) }

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        JsonValue::String(s) => !s.is_empty(),
        JsonValue::Array(_) | JsonValue::Object(_) => true,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::JoinKey;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_field_shapes() -> Result<()> {
        let w = Where::try_from(json!({
            "name": "Alice",
            "age": {"gt": 18, "equal": true},
            "deleted_at": null,
            "tags": {"in": ["a", "b"]},
            "title": {"ilike": "rust"},
        }))?;

        assert_eq!(
            w.clauses,
            vec![
                Clause::Field { key: "name".into(), condition: Condition::Equals(Operand::Literal("Alice".into())) },
                Clause::Field {
                    key: "age".into(),
                    condition: Condition::Range { bound: RangeBound::Gt, value: Value::Integer(18), inclusive: true },
                },
                Clause::Field { key: "deleted_at".into(), condition: Condition::IsNull },
                Clause::Field { key: "tags".into(), condition: Condition::In(Value::Array(vec!["a".into(), "b".into()])) },
                Clause::Field { key: "title".into(), condition: Condition::ILike("rust".into()) },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_in_takes_precedence_over_reserved_keys() -> Result<()> {
        let w = Where::try_from(json!({"or": {"in": [1, 2]}, "not": {"slugify": "a-b"}}))?;

        assert_eq!(
            w.clauses,
            vec![
                Clause::Field { key: "or".into(), condition: Condition::In(Value::Array(vec![1.into(), 2.into()])) },
                Clause::Field { key: "not".into(), condition: Condition::Slugify("a-b".into()) },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_reserved_keys() -> Result<()> {
        let w = Where::try_from(json!({
            "or": [{"a": 1}, {"b": 2}],
            "not": {"c": 3},
            "eq": [{"$raw": "t.owner"}, null],
        }))?;

        assert_eq!(
            w.clauses,
            vec![
                Clause::Or(vec![Where::new().field("a", 1), Where::new().field("b", 2)]),
                Clause::Not(Negation::Where(Box::new(Where::new().field("c", 3)))),
                Clause::Eq(Operand::Raw("t.owner".into()), Operand::Null),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_not_raw_and_literal() -> Result<()> {
        let raw = Where::try_from(json!({"not": {"$raw": "archived"}}))?;
        assert_eq!(raw.clauses, vec![Clause::Not(Negation::Raw("archived".into()))]);

        let literal = Where::try_from(json!({"not": true}))?;
        assert_eq!(literal.clauses, vec![Clause::Not(Negation::Literal(Value::Boolean(true)))]);
        Ok(())
    }

    #[test]
    fn test_per_field_or_and_array() -> Result<()> {
        let w = Where::try_from(json!({"status": {"or": ["open", null]}, "score": [{"gt": 1}, {"lt": 5}]}))?;

        assert_eq!(
            w.clauses,
            vec![
                Clause::Field { key: "status".into(), condition: Condition::AnyOf(vec!["open".into(), Condition::IsNull]) },
                Clause::Field { key: "score".into(), condition: Condition::All(vec![Condition::gt(1), Condition::lt(5)]) },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_object_eq_operand() -> Result<()> {
        let input = json!({"eq": [{"$raw": "meta"}, {"k": 1}]});

        let lenient = Where::try_from(&input)?;
        assert_eq!(lenient.clauses, vec![Clause::Eq(Operand::Raw("meta".into()), Operand::Literal(Value::Json(json!({"k": 1}))))]);

        let strict = Where::from_json_strict(&input);
        assert!(matches!(strict, Err(ParseError::InvalidOperand(_))));
        Ok(())
    }

    #[test]
    fn test_gt_wins_over_lt() -> Result<()> {
        let w = Where::try_from(json!({"n": {"gt": 1, "lt": 5}}))?;
        assert_eq!(w.clauses, vec![Clause::Field { key: "n".into(), condition: Condition::gt(1) }]);
        Ok(())
    }

    #[test]
    fn test_unrecognized_shape() -> Result<()> {
        let lenient = Where::try_from(json!({"meta": {"color": "red"}}))?;
        assert_eq!(
            lenient.clauses,
            vec![Clause::Field { key: "meta".into(), condition: Condition::Equals(Operand::Literal(Value::Json(json!({"color": "red"})))) }]
        );

        let strict = Where::from_json_strict(&json!({"meta": {"color": "red"}}));
        assert!(matches!(strict, Err(ParseError::UnrecognizedCondition { .. })));
        Ok(())
    }

    #[test]
    fn test_in_select_with_levels() -> Result<()> {
        let w = Where::try_from(json!({
            "id": {"inSelectWithLevels": {
                "where": {"name": "x"},
                "schema": "tenant1",
                "joinLevels": [
                    {"table": "orders", "inboundKey": "customer"},
                    {"table": "items", "fkey": "product"},
                ],
            }}
        }))?;

        let Clause::Field { condition: Condition::InSelectWithLevels(sel), .. } = &w.clauses[0] else { panic!("expected inSelectWithLevels") };
        assert_eq!(sel.schema.as_deref(), Some("tenant1"));
        assert_eq!(sel.join_levels.levels()[0].key, JoinKey::Inbound("customer".into()));
        assert_eq!(sel.join_levels.levels()[1].key, JoinKey::Fkey("product".into()));
        assert_eq!(sel.r#where, Where::new().field("name", "x"));
        Ok(())
    }

    #[test]
    fn test_invalid_join_levels() {
        let empty = Where::try_from(json!({"id": {"inSelectWithLevels": {"joinLevels": []}}}));
        assert_eq!(empty, Err(ParseError::EmptyJoinLevels));

        let keyless = Where::try_from(json!({"id": {"inSelectWithLevels": {"joinLevels": [{"table": "t"}]}}}));
        assert_eq!(keyless, Err(ParseError::MissingJoinKey("t".into())));
    }

    #[test]
    fn test_json_conditions() -> Result<()> {
        let w = Where::try_from(json!({
            "data": {"json": [["a", 0], "x"]},
            "attrs": {"json": {"size": {"gte": 1, "lte": 9}, "name": {"ilike": "bo"}, "kind": "cat"}},
        }))?;

        assert_eq!(
            w.clauses[0],
            Clause::Field {
                key: "data".into(),
                condition: Condition::Json(JsonCondition::Path(
                    JsonPath::Elems(vec![JsonPathElem::Key("a".into()), JsonPathElem::Index(0)]),
                    "x".into()
                )),
            }
        );
        assert_eq!(
            w.clauses[1],
            Clause::Field {
                key: "attrs".into(),
                condition: Condition::Json(JsonCondition::Map(vec![
                    ("size".into(), JsonPredicate::Range { gte: Some(1.into()), lte: Some(9.into()) }),
                    ("name".into(), JsonPredicate::ILike("bo".into())),
                    ("kind".into(), JsonPredicate::Equals("cat".into())),
                ])),
            }
        );
        Ok(())
    }

    #[test]
    fn test_fts_descriptor() -> Result<()> {
        let w = Where::try_from(json!({
            "_fts": {
                "fields": [
                    {"name": "title", "type": {"sql_name": "text"}},
                    {"name": "author", "is_fkey": true, "reftable_name": "users", "attributes": {"include_fts": true, "summary_field": "name"}},
                ],
                "searchTerm": "rust",
            }
        }))?;

        let Clause::Fts(search) = &w.clauses[0] else { panic!("expected _fts") };
        assert_eq!(search.search_term, "rust");
        assert!(search.fields[0].is_text());
        assert!(search.fields[1].attributes.include_fts);
        assert_eq!(search.table, None);
        Ok(())
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(Where::try_from(json!([1, 2])), Err(ParseError::NotAnObject("array")));
        assert_eq!(Where::try_from(json!(null)), Ok(Where::new()));
        assert!(matches!(Where::try_from("{not json"), Err(ParseError::InvalidJson(_))));
    }
}
