//! Fluent, value-returning statement builder.
//!
//! Each step consumes the builder and returns the next value, so a builder can be cloned at any
//! point to branch a shape without the branches leaking clauses into each other. Clause errors
//! are recorded and reported by [`QueryBuilder::build`], which keeps the chain free of `?`:
//!
//! ```rust
//! use sql_repository::prelude::*;
//!
//! let rendered = QueryBuilder::table("products")
//!     .select(["id", "name"])
//!     .where_eq("category", "tools")
//!     .order_by("rating", "desc")
//!     .limit(10)
//!     .build()?;
//!
//! assert_eq!(
//!     rendered.text,
//!     "SELECT id, name FROM products WHERE category = $1 ORDER BY rating DESC LIMIT 10"
//! );
//! assert_eq!(rendered.bindings, vec![RowValues::from("tools")]);
//! # Ok::<(), RepoError>(())
//! ```

mod render;
mod statement;

pub use render::{RenderedStatement, count_placeholders};
pub(crate) use statement::check_identifier;
pub use statement::{Operator, Ordering, Predicate, Statement, Verb};

use crate::error::RepoError;
use crate::types::{PlaceholderStyle, RowValues, SortDirection};

#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct QueryBuilder {
    target: String,
    verb: Option<Verb>,
    columns: Vec<String>,
    predicates: Vec<Predicate>,
    ordering: Option<Ordering>,
    limit: Option<u64>,
    assignments: Vec<(String, RowValues)>,
    style: PlaceholderStyle,
    error: Option<RepoError>,
}

impl QueryBuilder {
    /// Start a statement against `table`.
    pub fn table(table: impl Into<String>) -> Self {
        let target = table.into();
        let error = check_identifier("table", &target).err();
        Self {
            target,
            verb: None,
            columns: Vec::new(),
            predicates: Vec::new(),
            ordering: None,
            limit: None,
            assignments: Vec::new(),
            style: PlaceholderStyle::default(),
            error,
        }
    }

    /// Placeholder syntax used by [`build`](Self::build).
    pub fn placeholders(mut self, style: PlaceholderStyle) -> Self {
        self.style = style;
        self
    }

    /// SELECT the given columns; an empty list selects `*`.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self = self.set_verb(Verb::Select);
        for column in columns {
            let column = column.into();
            self = self.check("column", &column);
            self.columns.push(column);
        }
        self
    }

    pub fn insert<I, K, V>(self, assignments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        self.set_verb(Verb::Insert).assign(assignments)
    }

    pub fn update<I, K, V>(self, assignments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        self.set_verb(Verb::Update).assign(assignments)
    }

    pub fn delete(self) -> Self {
        self.set_verb(Verb::Delete)
    }

    /// Append `column = value`.
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<RowValues>) -> Self {
        self.push_predicate(column.into(), Ok(Operator::Eq), value.into())
    }

    /// Append `column <operator> value`; see [`Operator::parse`] for accepted spellings.
    pub fn where_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<RowValues>,
    ) -> Self {
        self.push_predicate(column.into(), Operator::parse(operator), value.into())
    }

    /// Set the ordering, replacing any previous one. `direction` is ASC or DESC in any case.
    pub fn order_by(mut self, column: impl Into<String>, direction: &str) -> Self {
        let column = column.into();
        self = self.check("column", &column);
        match SortDirection::parse(direction) {
            Ok(direction) => self.ordering = Some(Ordering { column, direction }),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Set the row limit, replacing any previous one.
    pub fn limit(mut self, n: i64) -> Self {
        match u64::try_from(n) {
            Ok(n) => self.limit = Some(n),
            Err(_) => self.fail(RepoError::InvalidArgument(format!(
                "limit must be a non-negative integer, got {n}"
            ))),
        }
        self
    }

    /// Validate the accumulated clauses and produce the immutable statement.
    ///
    /// # Errors
    /// Returns the first clause error recorded along the chain, or `RepoError::BuilderState`
    /// when the shape is incomplete: no verb, no assignments for INSERT/UPDATE, no predicates
    /// for UPDATE/DELETE, predicates on INSERT, or ORDER BY/LIMIT on anything but SELECT.
    pub fn finish(&self) -> Result<Statement, RepoError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let Some(verb) = self.verb else {
            return Err(RepoError::BuilderState(
                "no verb set; call select, insert, update or delete first".into(),
            ));
        };
        if matches!(verb, Verb::Insert | Verb::Update) && self.assignments.is_empty() {
            return Err(RepoError::BuilderState(format!("{verb} has no assignments")));
        }
        if verb.is_mutation() && self.predicates.is_empty() {
            return Err(RepoError::BuilderState(format!(
                "{verb} without predicates would touch every row of {}",
                self.target
            )));
        }
        if verb == Verb::Insert && !self.predicates.is_empty() {
            return Err(RepoError::BuilderState("INSERT does not take predicates".into()));
        }
        if verb != Verb::Select && (self.ordering.is_some() || self.limit.is_some()) {
            return Err(RepoError::BuilderState(format!(
                "ORDER BY and LIMIT only apply to SELECT, not {verb}"
            )));
        }

        Ok(Statement {
            verb,
            target: self.target.clone(),
            columns: self.columns.clone(),
            predicates: self.predicates.clone(),
            ordering: self.ordering.clone(),
            limit: self.limit,
            assignments: self.assignments.clone(),
        })
    }

    /// Render the statement. Calling it repeatedly yields identical output.
    ///
    /// # Errors
    /// See [`finish`](Self::finish).
    pub fn build(&self) -> Result<RenderedStatement, RepoError> {
        self.finish().map(|statement| statement.render(self.style))
    }

    fn set_verb(mut self, verb: Verb) -> Self {
        match self.verb {
            Some(existing) if existing != verb => {
                self.fail(RepoError::BuilderState(format!(
                    "verb already set to {existing}, cannot switch to {verb}"
                )));
            }
            _ => self.verb = Some(verb),
        }
        self
    }

    fn assign<I, K, V>(mut self, assignments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<RowValues>,
    {
        let mut added = 0usize;
        for (column, value) in assignments {
            let column = column.into();
            self = self.check("column", &column);
            if self.assignments.iter().any(|(c, _)| *c == column) {
                self.fail(RepoError::InvalidArgument(format!(
                    "column {column} assigned twice"
                )));
            }
            self.assignments.push((column, value.into()));
            added += 1;
        }
        if added == 0 {
            self.fail(RepoError::InvalidArgument(
                "assignments must not be empty".into(),
            ));
        }
        self
    }

    fn push_predicate(
        mut self,
        column: String,
        operator: Result<Operator, RepoError>,
        value: RowValues,
    ) -> Self {
        self = self.check("column", &column);
        match operator {
            Ok(operator) => self.predicates.push(Predicate {
                column,
                operator,
                value,
            }),
            Err(e) => self.fail(e),
        }
        self
    }

    fn check(mut self, kind: &str, name: &str) -> Self {
        if let Err(e) = check_identifier(kind, name) {
            self.fail(e);
        }
        self
    }

    /// Keep only the first error; later steps are still recorded but `finish` reports the
    /// original cause.
    fn fail(&mut self, err: RepoError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}

impl Statement {
    #[must_use]
    pub fn render(&self, style: PlaceholderStyle) -> RenderedStatement {
        render::render(self, style)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn select_by_id_binds_one_value() {
        let rendered = QueryBuilder::table("products")
            .select(Vec::<String>::new())
            .where_eq("id", "42")
            .build()
            .unwrap();

        assert_eq!(rendered.text, "SELECT * FROM products WHERE id = $1");
        assert_eq!(rendered.placeholder_count(), 1);
        assert_eq!(rendered.bindings, vec![RowValues::from("42")]);
    }

    #[test]
    fn update_binds_assignments_before_predicates() {
        let cutoff = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let rendered = QueryBuilder::table("products")
            .update([("archived", true)])
            .where_op("created_at", "<", cutoff)
            .build()
            .unwrap();

        assert_eq!(
            rendered.text,
            "UPDATE products SET archived = $1 WHERE created_at < $2"
        );
        assert_eq!(
            rendered.bindings,
            vec![RowValues::Bool(true), RowValues::Timestamp(cutoff)]
        );
    }

    #[test]
    fn build_is_repeatable() {
        let builder = QueryBuilder::table("t")
            .select(["a", "b"])
            .where_eq("a", 1)
            .where_op("b", ">=", 2.5)
            .order_by("a", "asc")
            .limit(3);

        assert_eq!(builder.build().unwrap(), builder.build().unwrap());
    }

    #[test]
    fn mutations_without_predicates_are_refused() {
        let update = QueryBuilder::table("t").update([("a", 1)]).build();
        assert!(matches!(update, Err(RepoError::BuilderState(_))));

        let delete = QueryBuilder::table("t").delete().build();
        assert!(matches!(delete, Err(RepoError::BuilderState(_))));
    }

    #[test]
    fn missing_verb_is_a_state_error() {
        let err = QueryBuilder::table("t").where_eq("a", 1).build().unwrap_err();
        assert!(matches!(err, RepoError::BuilderState(_)));
    }

    #[test]
    fn switching_verbs_is_a_state_error() {
        let err = QueryBuilder::table("t")
            .select(["a"])
            .delete()
            .where_eq("a", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::BuilderState(_)));

        // re-stating the same verb is fine
        assert!(QueryBuilder::table("t").select(["a"]).select(["b"]).build().is_ok());
    }

    #[test]
    fn empty_assignments_are_invalid() {
        let empty: [(&str, i64); 0] = [];
        let err = QueryBuilder::table("t")
            .update(empty)
            .where_eq("id", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));
    }

    #[test]
    fn bad_direction_and_limit_are_invalid() {
        let err = QueryBuilder::table("t")
            .select(["a"])
            .order_by("a", "upward")
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));

        let err = QueryBuilder::table("t").select(["a"]).limit(-1).build().unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));
    }

    #[test]
    fn later_order_and_limit_replace_earlier_ones() {
        let rendered = QueryBuilder::table("t")
            .select(["a"])
            .order_by("a", "asc")
            .order_by("b", "Desc")
            .limit(5)
            .limit(0)
            .build()
            .unwrap();
        assert_eq!(rendered.text, "SELECT a FROM t ORDER BY b DESC LIMIT 0");
    }

    #[test]
    fn insert_renders_values_list() {
        let rendered = QueryBuilder::table("t")
            .insert([("name", RowValues::from("x")), ("rating", RowValues::Float(4.5))])
            .placeholders(PlaceholderStyle::Sqlite)
            .build()
            .unwrap();
        assert_eq!(rendered.text, "INSERT INTO t (name, rating) VALUES (?1, ?2)");
        assert_eq!(rendered.placeholder_count(), rendered.bindings.len());
    }

    #[test]
    fn insert_rejects_predicates_and_limits_only_apply_to_select() {
        let err = QueryBuilder::table("t")
            .insert([("a", 1)])
            .where_eq("b", 2)
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::BuilderState(_)));

        let err = QueryBuilder::table("t")
            .delete()
            .where_eq("b", 2)
            .limit(1)
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::BuilderState(_)));
    }

    #[test]
    fn values_never_reach_the_text() {
        let rendered = QueryBuilder::table("users")
            .select(["id"])
            .where_eq("name", "'; DROP TABLE users; --")
            .build()
            .unwrap();
        assert!(!rendered.text.contains("DROP"));
    }

    #[test]
    fn unsafe_identifiers_are_rejected() {
        let err = QueryBuilder::table("users")
            .select(["id"])
            .where_eq("name = name OR 1", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));

        let err = QueryBuilder::table("users; --").delete().where_eq("id", 1).build();
        assert!(matches!(err, Err(RepoError::InvalidArgument(_))));
    }

    #[test]
    fn bindings_always_match_placeholders() {
        for predicates in 0..4 {
            for assignments in 1..4 {
                let mut builder = QueryBuilder::table("t")
                    .update((0..assignments).map(|i| (format!("c{i}"), i64::from(i))));
                for p in 0..predicates {
                    builder = builder.where_op(format!("p{p}"), "<>", "v");
                }
                match builder.build() {
                    Ok(rendered) => {
                        assert_eq!(rendered.placeholder_count(), rendered.bindings.len());
                        assert_eq!(rendered.bindings.len(), (assignments + predicates) as usize);
                    }
                    Err(e) => {
                        assert_eq!(predicates, 0);
                        assert!(matches!(e, RepoError::BuilderState(_)));
                    }
                }
            }
        }
    }
}
