use crate::ast::{InSelect, InSelectWithLevels, JoinKey};
use crate::prefix::prefix_fields_in_where;
use crate::sql::{sanitize, WhereCompiler};

/// Aliases used by the two-table `through` form.
const SELECT_ALIAS: &str = "ss1";
const THROUGH_ALIAS: &str = "ss2";

impl WhereCompiler<'_> {
    /// `key in (select field from [tenant.]table [where ...])`, or the
    /// `through` join variant when both `through` and `val_field` are set.
    ///
    /// The nested where shares this compiler's placeholder stack.
    pub(crate) fn in_select(&mut self, key: &str, select: &InSelect) -> String {
        let column = self.ident(key);
        let tenant = match &select.tenant {
            Some(tenant) => format!("{}.", self.name(tenant)),
            None => String::new(),
        };
        let table = format!("{}{}", tenant, self.name(&select.table));

        match (&select.through, &select.val_field) {
            (Some(through), Some(val_field)) => {
                let inner = prefix_fields_in_where(&select.r#where, THROUGH_ALIAS);
                let sub_where = self.sub_where(&inner);
                let (ss1, ss2) = (self.name(SELECT_ALIAS), self.name(THROUGH_ALIAS));
                format!(
                    "{column} in (select {ss1}.{val} from {table} {ss1} join {tenant}{through} {ss2} on {ss2}.id = {ss1}.{field}{sub_where})",
                    val = self.name(val_field),
                    through = self.name(through),
                    field = self.name(&select.field),
                )
            }
            _ => {
                let sub_where = self.sub_where(&select.r#where);
                format!("{} in (select {} from {}{})", column, self.name(&select.field), table, sub_where)
            }
        }
    }

    /// `key in (select <col> from t0 "t0SubJ0" join t1 "t1SubJ1" on ... [where ...])`.
    ///
    /// Each level gets the alias `<table>SubJ<index>`. The nested where is
    /// qualified with the first alias. A terminal foreign-key hop is read from
    /// the previous alias without joining its table.
    pub(crate) fn in_select_with_levels(&mut self, key: &str, select: &InSelectWithLevels) -> String {
        let column = self.ident(key);
        let schema = match &select.schema {
            Some(schema) if !self.is_sqlite() => format!("{}.", self.name(schema)),
            _ => String::new(),
        };

        let levels = select.join_levels.levels();
        let last = levels.len() - 1;
        let mut parts = Vec::with_capacity(levels.len());
        let mut first_alias = String::new();
        let mut previous = String::new();
        let mut in_column = String::new();

        for (i, level) in levels.iter().enumerate() {
            let alias_name = sanitize(&format!("{}SubJ{}", level.table, i));
            let alias = self.name(&alias_name);
            let table = format!("{}{}", schema, self.name(&level.table));

            if i == 0 {
                parts.push(format!("from {} {}", table, alias));
                first_alias = alias_name;
                if last == 0 {
                    in_column = match &level.key {
                        JoinKey::Fkey(fkey) => format!("{}.{}", alias, self.name(fkey)),
                        JoinKey::Inbound(_) => format!(r#"{}."id""#, alias),
                    };
                }
            } else {
                match (&level.key, i == last) {
                    (JoinKey::Fkey(fkey), false) => {
                        parts.push(format!("join {} {} on {}.{} = {}.id", table, alias, previous, self.name(fkey), alias));
                    }
                    (JoinKey::Fkey(fkey), true) => in_column = format!("{}.{}", previous, self.name(fkey)),
                    (JoinKey::Inbound(inbound), is_last) => {
                        parts.push(format!(r#"join {} {} on {}."id" = {}.{}"#, table, alias, previous, alias, self.name(inbound)));
                        if is_last {
                            in_column = format!(r#"{}."id""#, alias);
                        }
                    }
                }
            }
            previous = alias;
        }

        let inner = prefix_fields_in_where(&select.r#where, &first_alias);
        let sub_where = self.sub_where(&inner);
        format!("{} in (select {} {}{})", column, in_column, parts.join(" "), sub_where)
    }
}
