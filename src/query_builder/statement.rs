use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::RepoError;
use crate::types::{RowValues, SortDirection};

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .unwrap_or_else(|e| unreachable!("identifier pattern is valid: {e}"))
});

/// Reject anything that is not a plain (optionally schema-qualified) identifier.
///
/// Identifiers are the only caller-supplied text that reaches the statement verbatim.
pub(crate) fn check_identifier(kind: &str, name: &str) -> Result<(), RepoError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(RepoError::InvalidArgument(format!(
            "{kind} name {name:?} is not a valid identifier"
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Select,
    Insert,
    Update,
    Delete,
}

impl Verb {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Verb::Select => "SELECT",
            Verb::Insert => "INSERT",
            Verb::Update => "UPDATE",
            Verb::Delete => "DELETE",
        }
    }

    /// UPDATE and DELETE must carry at least one predicate.
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(self, Verb::Update | Verb::Delete)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Operator {
    #[default]
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

impl Operator {
    /// # Errors
    /// Returns `RepoError::InvalidArgument` for unsupported operators.
    pub fn parse(op: &str) -> Result<Self, RepoError> {
        match op.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::NotEq),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::LtEq),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::GtEq),
            "LIKE" => Ok(Operator::Like),
            other => Err(RepoError::InvalidArgument(format!(
                "unsupported operator {other:?}"
            ))),
        }
    }

    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::Like => "LIKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub value: RowValues,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub column: String,
    pub direction: SortDirection,
}

/// A fully described statement, independent of placeholder syntax.
///
/// Produced by [`QueryBuilder::finish`](super::QueryBuilder::finish); the value is never
/// mutated afterwards, so rendering it any number of times yields the same output.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub(crate) verb: Verb,
    pub(crate) target: String,
    pub(crate) columns: Vec<String>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) ordering: Option<Ordering>,
    pub(crate) limit: Option<u64>,
    pub(crate) assignments: Vec<(String, RowValues)>,
}

impl Statement {
    #[must_use]
    pub fn verb(&self) -> Verb {
        self.verb
    }

    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// SELECT projection; empty means every column.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    #[must_use]
    pub fn ordering(&self) -> Option<&Ordering> {
        self.ordering.as_ref()
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn assignments(&self) -> &[(String, RowValues)] {
        &self.assignments
    }
}
