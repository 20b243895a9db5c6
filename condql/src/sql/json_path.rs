use crate::ast::{JsonCondition, JsonPath, JsonPathElem, JsonPredicate};
use crate::sql::{and_array, WhereCompiler};

impl WhereCompiler<'_> {
    pub(crate) fn json(&mut self, key: &str, condition: &JsonCondition) -> String {
        match condition {
            JsonCondition::Path(path, value) => {
                let lhs = self.json_lhs(key, path, true);
                let token = self.arg(value);
                format!("{}={}", lhs, token)
            }
            JsonCondition::Map(entries) => {
                let mut parts = Vec::with_capacity(entries.len());
                for (subpath, predicate) in entries {
                    let path = JsonPath::from(subpath.as_str());
                    let part = match predicate {
                        JsonPredicate::ILike(needle) => {
                            let lhs = self.json_lhs(key, &path, true);
                            let token = self.arg(needle);
                            format!("{} {} '%' || {} || '%'", lhs, self.like(), token)
                        }
                        JsonPredicate::Range { gte, lte } => {
                            let mut bounds = Vec::with_capacity(2);
                            for (op, bound) in [(">=", gte), ("<=", lte)] {
                                if let Some(bound) = bound {
                                    let lhs = self.json_lhs(key, &path, false);
                                    let token = self.arg(bound);
                                    bounds.push(format!("{} {} {}", lhs, op, token));
                                }
                            }
                            and_array(bounds)
                        }
                        JsonPredicate::Equals(value) => {
                            let lhs = self.json_lhs(key, &path, true);
                            let token = self.arg(value);
                            format!("{}={}", lhs, token)
                        }
                    };
                    parts.push(part);
                }
                and_array(parts)
            }
        }
    }

    /// Extraction expression for `path` inside column `key`. With `as_text`,
    /// Postgres unwraps the JSON scalar to text through a one-element array.
    fn json_lhs(&self, key: &str, path: &JsonPath, as_text: bool) -> String {
        let column = self.ident(key);
        let path = prepare_json_path(path);
        if self.is_sqlite() {
            format!("json_extract({}, '{}')", column, path)
        } else if as_text {
            format!("jsonb_build_array(jsonb_path_query_first({}, '{}'))->>0", column, path)
        } else {
            format!("jsonb_path_query_first({}, '{}')", column, path)
        }
    }
}

/// Render a path as a JSON path literal body, safe inside single quotes.
///
/// A single string that already reads as a path (`$.a`, `$[0]`) is kept as is,
/// provided it holds no line breaks or NULs.
pub fn prepare_json_path(path: &JsonPath) -> String {
    let rendered = match path {
        JsonPath::Elem(JsonPathElem::Key(s)) if (s.starts_with("$.") || s.starts_with("$[")) && !s.contains(['\n', '\r', '\x0B', '\0']) => s.clone(),
        JsonPath::Elem(elem) => format!("${}", escape_elem(elem)),
        JsonPath::Elems(elems) => format!("${}", elems.iter().map(escape_elem).collect::<String>()),
    };
    rendered.replace('\'', "''")
}

fn escape_elem(elem: &JsonPathElem) -> String {
    match elem {
        JsonPathElem::Index(i) => format!("[{}]", i),
        JsonPathElem::Key(name) if name.chars().any(needs_quoting) => {
            format!(".{}", serde_json::to_string(name).unwrap_or_else(|_| format!("\"{}\"", name)))
        }
        JsonPathElem::Key(name) => format!(".{}", name),
    }
}

fn needs_quoting(c: char) -> bool { matches!(c, '\x00'..='\x08' | '\x0A'..='\x1F' | '"' | '\'' | '\x7F' | '.' | '[' | ']') }
