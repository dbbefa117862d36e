use chrono::{DateTime, Utc};
use sqlx::mysql::{MySql, MySqlArguments, MySqlRow};
use sqlx::query::{Query, QueryAs};
use sqlx::FromRow;

use crate::pagination::Pagination;

/// Positional parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

/// WHERE clause shared by a list query and its total-count query.
///
/// Both statements are rendered from the same conditions and arguments, so a
/// filter can never be applied to one and forgotten in the other.
#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    conditions: Vec<String>,
    args: Vec<SqlValue>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Condition without parameters, e.g. `u.deleted_at IS NULL`
    pub fn raw(mut self, condition: &'static str) -> Self {
        self.conditions.push(condition.to_string());
        self
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.conditions.push(format!("{column} = ?"));
        self.args.push(value.into());
        self
    }

    pub fn eq_opt<V: Into<SqlValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    /// Substring match; blank input adds nothing
    pub fn contains_opt(mut self, column: &'static str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.conditions.push(format!("{column} LIKE ?"));
            self.args.push(SqlValue::Text(format!("%{}%", escape_like(v))));
        }
        self
    }

    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn args(&self) -> &[SqlValue] {
        &self.args
    }

    /// `base` is the SELECT ... FROM ... part, without WHERE
    pub fn select_sql(&self, base: &str, order_by: &str) -> String {
        format!("{base}{} ORDER BY {order_by} LIMIT ? OFFSET ?", self.where_clause())
    }

    /// `from` is the FROM ... part, without WHERE
    pub fn count_sql(&self, from: &str) -> String {
        format!("SELECT COUNT(*) AS total {from}{}", self.where_clause())
    }

    /// Filter arguments followed by LIMIT and OFFSET
    pub fn page_args(&self, pagination: &Pagination) -> Vec<SqlValue> {
        let mut args = self.args.clone();
        args.push(SqlValue::Int(pagination.limit()));
        args.push(SqlValue::Int(pagination.offset()));
        args
    }
}

fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn bind_query<'q>(
    mut q: Query<'q, MySql, MySqlArguments>,
    args: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for arg in args {
        q = match arg {
            SqlValue::Text(s) => q.bind(s.as_str()),
            SqlValue::Int(i) => q.bind(*i),
            SqlValue::Bool(b) => q.bind(*b),
            SqlValue::Timestamp(t) => q.bind(*t),
        };
    }
    q
}

pub fn bind_query_as<'q, O>(
    mut q: QueryAs<'q, MySql, O, MySqlArguments>,
    args: &'q [SqlValue],
) -> QueryAs<'q, MySql, O, MySqlArguments>
where
    O: for<'r> FromRow<'r, MySqlRow>,
{
    for arg in args {
        q = match arg {
            SqlValue::Text(s) => q.bind(s.as_str()),
            SqlValue::Int(i) => q.bind(*i),
            SqlValue::Bool(b) => q.bind(*b),
            SqlValue::Timestamp(t) => q.bind(*t),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;

    fn activity_filter() -> FilterBuilder {
        FilterBuilder::new()
            .raw("deleted_at IS NULL")
            .eq_opt("cuui_id", Some("0111"))
            .contains_opt("description", Some("farm"))
            .eq_opt::<String>("status", None)
    }

    #[test]
    fn list_and_count_share_conditions_and_args() {
        let filter = activity_filter();
        let list = filter.select_sql("SELECT * FROM core_economic_activities", "created_at DESC");
        let count = filter.count_sql("FROM core_economic_activities");

        let where_clause = " WHERE deleted_at IS NULL AND cuui_id = ? AND description LIKE ?";
        assert!(list.contains(where_clause));
        assert!(count.ends_with(where_clause));
        assert!(list.ends_with("LIMIT ? OFFSET ?"));

        let page_args = filter.page_args(&Pagination::new(2, 10));
        assert_eq!(&page_args[..2], filter.args());
        assert_eq!(page_args[2..], [SqlValue::Int(10), SqlValue::Int(10)]);
    }

    #[test]
    fn blank_filters_are_skipped() {
        let filter = FilterBuilder::new().contains_opt("username", Some("   ")).eq_opt::<&str>("id", None);
        assert_eq!(filter.where_clause(), "");
        assert!(filter.args().is_empty());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        let filter = FilterBuilder::new().contains_opt("name", Some("50%_off"));
        assert_eq!(filter.args(), [SqlValue::Text("%50\\%\\_off%".to_string())]);
    }
}
