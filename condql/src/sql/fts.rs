use tracing::warn;

use crate::ast::{FtsSearch, Value};
use crate::sql::{sanitize, WhereCompiler, DEFAULT_TEXT_SEARCH_CONFIG};

impl WhereCompiler<'_> {
    /// Full-text match over the text fields of `search`, plus the summary field
    /// of every foreign key flagged `include_fts`.
    ///
    /// Postgres gets a `tsvector @@ tsquery` match (prefix query for single
    /// words), SQLite a substring `LIKE` over the concatenated fields.
    pub(crate) fn fts(&mut self, search: &FtsSearch) -> String {
        let table = search.table.as_deref().map(|t| self.name(t));
        let column = |name: &str| match &table {
            Some(table) => format!("{}.{}", table, self.name(name)),
            None => self.name(name),
        };

        let mut pieces: Vec<String> = search.fields.iter().filter(|f| f.is_text()).map(|f| format!("coalesce({},'')", column(&f.name))).collect();

        let schema = match &search.schema {
            Some(schema) if !self.is_sqlite() => format!("{}.", self.name(schema)),
            _ => String::new(),
        };
        for field in search.fields.iter().filter(|f| f.is_fkey && f.attributes.include_fts) {
            let (Some(reftable), Some(summary)) = (&field.reftable_name, &field.attributes.summary_field) else {
                warn!("Foreign key {} is flagged include_fts but has no reftable_name or summary_field", field.name);
                continue;
            };
            pieces.push(format!(
                "coalesce((select {} from {}{} rt where rt.id={}),'')",
                self.name(summary),
                schema,
                self.name(reftable),
                column(&field.name)
            ));
        }

        let document = if pieces.is_empty() { "''".to_owned() } else { pieces.join(" || ' ' || ") };

        if self.is_sqlite() {
            let token = self.arg(&Value::String(search.search_term.clone()));
            return format!("{} LIKE '%' || {} || '%'", document, token);
        }

        let config = match sanitize(&self.options.text_search_config) {
            c if c.is_empty() => DEFAULT_TEXT_SEARCH_CONFIG.to_owned(),
            c => c,
        };
        let prefix_match = !search.search_term.contains(' ');
        let (query_fn, term) = if prefix_match {
            ("to_tsquery", format!("{}:*", search.search_term))
        } else {
            ("plainto_tsquery", search.search_term.clone())
        };
        let token = self.arg(&Value::String(term));
        format!("to_tsvector('{config}', {document}) @@ {query_fn}('{config}', {token})")
    }
}
