use std::fmt::Write as _;

use super::statement::{Statement, Verb};
use crate::types::{PlaceholderStyle, RowValues};

/// Statement text with positional placeholders plus the values bound to them.
///
/// `bindings[i]` is the value for placeholder number `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedStatement {
    pub verb: Verb,
    pub text: String,
    pub bindings: Vec<RowValues>,
    pub style: PlaceholderStyle,
}

impl RenderedStatement {
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        count_placeholders(&self.text, self.style)
    }
}

/// Count `$N` / `?N` placeholders in `text` for the given style.
///
/// Rendered statements never contain quoted literals, so no quote tracking is needed.
#[must_use]
pub fn count_placeholders(text: &str, style: PlaceholderStyle) -> usize {
    let sigil = style.sigil() as u8;
    let bytes = text.as_bytes();
    let mut count = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        if bytes[idx] == sigil && bytes.get(idx + 1).is_some_and(u8::is_ascii_digit) {
            count += 1;
            idx += 1;
            while idx < bytes.len() && bytes[idx].is_ascii_digit() {
                idx += 1;
            }
        } else {
            idx += 1;
        }
    }
    count
}

struct Renderer {
    style: PlaceholderStyle,
    text: String,
    bindings: Vec<RowValues>,
}

impl Renderer {
    fn bind(&mut self, value: &RowValues) {
        self.bindings.push(value.clone());
        let _ = write!(self.text, "{}{}", self.style.sigil(), self.bindings.len());
    }
}

/// Render a statement. Assignments are bound before predicate values.
pub(crate) fn render(statement: &Statement, style: PlaceholderStyle) -> RenderedStatement {
    let mut r = Renderer {
        style,
        text: String::with_capacity(64),
        bindings: Vec::with_capacity(statement.assignments.len() + statement.predicates.len()),
    };

    match statement.verb {
        Verb::Select => {
            r.text.push_str("SELECT ");
            if statement.columns.is_empty() {
                r.text.push('*');
            } else {
                r.text.push_str(&statement.columns.join(", "));
            }
            let _ = write!(r.text, " FROM {}", statement.target);
        }
        Verb::Insert => {
            let columns = statement
                .assignments
                .iter()
                .map(|(column, _)| column.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = write!(r.text, "INSERT INTO {} ({columns}) VALUES (", statement.target);
            for (i, (_, value)) in statement.assignments.iter().enumerate() {
                if i > 0 {
                    r.text.push_str(", ");
                }
                r.bind(value);
            }
            r.text.push(')');
        }
        Verb::Update => {
            let _ = write!(r.text, "UPDATE {} SET ", statement.target);
            for (i, (column, value)) in statement.assignments.iter().enumerate() {
                if i > 0 {
                    r.text.push_str(", ");
                }
                let _ = write!(r.text, "{column} = ");
                r.bind(value);
            }
        }
        Verb::Delete => {
            let _ = write!(r.text, "DELETE FROM {}", statement.target);
        }
    }

    for (i, predicate) in statement.predicates.iter().enumerate() {
        r.text.push_str(if i == 0 { " WHERE " } else { " AND " });
        let _ = write!(
            r.text,
            "{} {} ",
            predicate.column,
            predicate.operator.as_sql()
        );
        r.bind(&predicate.value);
    }

    if let Some(ordering) = &statement.ordering {
        let _ = write!(
            r.text,
            " ORDER BY {} {}",
            ordering.column,
            ordering.direction.as_sql()
        );
    }

    if let Some(limit) = statement.limit {
        let _ = write!(r.text, " LIMIT {limit}");
    }

    RenderedStatement {
        verb: statement.verb,
        text: r.text,
        bindings: r.bindings,
        style,
    }
}
