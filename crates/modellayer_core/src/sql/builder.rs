//! Clause buffer behind the fluent query chain.
//!
//! Clauses are kept in call order and only rendered when a statement is
//! executed; nothing is reordered or deduplicated.

use super::compiler::CompiledStatement;
use super::params::Params;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Select { columns: String, table: String },
    Join { kind: JoinKind, table: String },
    On { left: String, right: String },
    Where(String),
    GroupBy(String),
    OrderBy(String),
    Limit(String),
    Offset(String),
    /// Caller-supplied statement replacing everything else.
    Raw(String),
}

impl Clause {
    fn render(&self) -> String {
        match self {
            Self::Select { columns, table } => format!("SELECT {columns} FROM {table}"),
            Self::Join { kind, table } => format!("{} {table}", kind.keyword()),
            Self::On { left, right } => format!("ON {left} = {right}"),
            Self::Where(conditions) => format!("WHERE {conditions}"),
            Self::GroupBy(group) => format!("GROUP BY {group}"),
            Self::OrderBy(order) => format!("ORDER BY {order}"),
            Self::Limit(limit) => format!("LIMIT {limit}"),
            Self::Offset(offset) => format!("OFFSET {offset}"),
            Self::Raw(sql) => sql.clone(),
        }
    }
}

/// Pending statement of an entity's fluent chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryBuffer {
    clauses: Vec<Clause>,
    params: Params,
}

impl QueryBuffer {
    /// Starts over with `clause` as the only clause and no parameters.
    pub fn reset(&mut self, clause: Clause) {
        self.clauses.clear();
        self.clauses.push(clause);
        self.params = Params::new();
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn bind(&mut self, params: Params) {
        self.params.merge(params);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Statement text with clauses joined by single spaces.
    pub fn render(&self) -> String {
        self.clauses
            .iter()
            .map(Clause::render)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn compile(&self) -> CompiledStatement {
        CompiledStatement::new(self.render(), self.params.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::{Clause, JoinKind, QueryBuffer};
    use crate::sql::Params;

    #[test]
    fn renders_clauses_in_call_order() {
        let mut buffer = QueryBuffer::default();
        buffer.reset(Clause::Select {
            columns: "*".to_string(),
            table: "user".to_string(),
        });
        buffer.push(Clause::Join {
            kind: JoinKind::Left,
            table: "adress".to_string(),
        });
        buffer.push(Clause::On {
            left: "user.id".to_string(),
            right: "adress.user_id".to_string(),
        });
        buffer.push(Clause::Limit("5".to_string()));
        buffer.push(Clause::Where("user.id > 1".to_string()));

        assert_eq!(
            buffer.render(),
            "SELECT * FROM user LEFT JOIN adress ON user.id = adress.user_id LIMIT 5 WHERE user.id > 1"
        );
    }

    #[test]
    fn reset_drops_clauses_and_params() {
        let mut buffer = QueryBuffer::default();
        buffer.reset(Clause::Raw("SELECT 1".to_string()));
        buffer.bind(Params::new().bind("a", 1));
        buffer.reset(Clause::Raw(" SELECT 2 ".to_string()));

        assert_eq!(buffer.render(), "SELECT 2");
        assert!(buffer.params().is_empty());
    }
}
