use crate::ast::{Clause, Negation, Where};

/// Qualify every field key of `input` with `alias`, for use inside a subquery
/// where several tables are in scope.
///
/// Keys become `"alias"."key"` text and are sanitized later, when compiled.
/// `or` and `not` are rewritten recursively and `_fts` searches without a
/// table are pointed at `alias`. `eq` operands are left alone.
pub fn prefix_fields_in_where(input: &Where, alias: &str) -> Where {
    let alias = alias.trim_matches('"');
    input
        .clauses
        .iter()
        .map(|clause| match clause {
            Clause::Fts(search) => {
                let mut search = search.clone();
                search.table.get_or_insert_with(|| alias.to_owned());
                Clause::Fts(search)
            }
            Clause::Or(alternatives) => Clause::Or(alternatives.iter().map(|w| prefix_fields_in_where(w, alias)).collect()),
            Clause::Not(Negation::Where(negated)) => Clause::Not(Negation::Where(Box::new(prefix_fields_in_where(negated, alias)))),
            Clause::Field { key, condition } => Clause::Field { key: format!(r#""{}"."{}""#, alias, key), condition: condition.clone() },
            other @ (Clause::Not(_) | Clause::Eq(..)) => other.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Condition, FtsField, FtsSearch};
    use crate::sql::Dialect;

    #[test]
    fn test_prefix_fields() {
        let w = Where::new().field("name", "x").or(vec![Where::new().field("a", 1), Where::new().not(Where::new().field("b", 2))]);

        let prefixed = prefix_fields_in_where(&w, "ss2");
        assert_eq!(
            prefixed,
            Where::new()
                .field(r#""ss2"."name""#, "x")
                .or(vec![Where::new().field(r#""ss2"."a""#, 1), Where::new().not(Where::new().field(r#""ss2"."b""#, 2))])
        );
        assert_eq!(prefixed.to_sql(Dialect::Sqlite).clause, r#"WHERE "ss2"."name"=? and ("ss2"."a"=? or not ("ss2"."b"=?))"#);
    }

    #[test]
    fn test_prefix_fts_keeps_explicit_table() {
        let search = FtsSearch { fields: vec![FtsField::text("title")], table: None, search_term: "q".into(), schema: None };
        let w = Where::new().fts(search.clone()).fts(FtsSearch { table: Some("books".into()), ..search });

        let prefixed = prefix_fields_in_where(&w, r#""booksSubJ0""#);
        let tables: Vec<Option<String>> = prefixed
            .clauses
            .iter()
            .map(|c| match c {
                Clause::Fts(s) => s.table.clone(),
                _ => None,
            })
            .collect();
        assert_eq!(tables, vec![Some("booksSubJ0".into()), Some("books".into())]);
    }

    #[test]
    fn test_prefix_leaves_eq() {
        let w = Where::new().eq(crate::ast::Operand::raw("a"), 1).field("c", Condition::IsNull);
        let prefixed = prefix_fields_in_where(&w, "t");
        assert_eq!(prefixed.clauses[0], w.clauses[0]);
        assert_eq!(prefixed.to_sql(Dialect::Postgres).clause, r#"WHERE "a"=$1 and "t"."c" is null"#);
    }
}
