//! Foreign-key resolution.
//!
//! # Responsibility
//! - After a fetch, look up referenced rows for every foreign column with a
//!   non-null value and attach them under the column's attach name.
//!
//! # Invariants
//! - Resolution is one level deep; attached entities do not resolve their
//!   own references.
//! - Row sets resolve only with [`EagerLoading::RowSets`]; relations are then
//!   indexed like the rows they belong to.

use super::query::FetchMode;
use super::{Entity, RowRelations};
use crate::error::ModelResult;
use crate::model::{ForeignRef, Record, Row, Value};
use crate::sql::Params;
use log::{debug, warn};

/// When foreign references are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EagerLoading {
    /// Only single-row fetches resolve references.
    #[default]
    SingleRow,
    /// Every fetched row resolves its references.
    RowSets,
}

/// Data attached for one foreign column.
#[derive(Debug)]
pub enum Relation<'db> {
    /// The referenced row, loaded into its own entity.
    One(Box<Entity<'db>>),
    /// All referencing rows of a has-many reference.
    Many(Vec<Row>),
}

impl<'db> Relation<'db> {
    pub fn as_entity(&self) -> Option<&Entity<'db>> {
        match self {
            Relation::One(entity) => Some(entity),
            Relation::Many(_) => None,
        }
    }

    pub fn as_rows(&self) -> Option<&[Row]> {
        match self {
            Relation::One(_) => None,
            Relation::Many(rows) => Some(rows),
        }
    }
}

impl<'db> Entity<'db> {
    pub fn set_eager_loading(&mut self, eager_loading: EagerLoading) -> &mut Self {
        self.eager_loading = eager_loading;
        self
    }

    pub fn eager_loading(&self) -> EagerLoading {
        self.eager_loading
    }

    /// Relation attached to the loaded single row (or the first row of a
    /// resolved row set).
    pub fn related(&self, name: &str) -> Option<&Relation<'db>> {
        self.related_at(0, name)
    }

    /// Relation attached to row `index` of the loaded record.
    pub fn related_at(&self, index: usize, name: &str) -> Option<&Relation<'db>> {
        self.relations.get(index).and_then(|relations| relations.get(name))
    }

    pub(super) fn resolve_relations(&mut self) -> ModelResult<()> {
        let rows: Vec<Row> = match &self.record {
            Record::Absent => return Ok(()),
            Record::Single(row) => vec![row.clone()],
            Record::Set(rows) if self.eager_loading == EagerLoading::RowSets => rows.clone(),
            Record::Set(_) => return Ok(()),
        };
        let foreign: Vec<(String, ForeignRef)> = self
            .schema
            .foreign_columns()
            .map(|(column, reference)| (column.name.clone(), reference.clone()))
            .collect();
        if foreign.is_empty() {
            return Ok(());
        }

        let mut resolved = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut relations = RowRelations::new();
            for (column, reference) in &foreign {
                let Some(value) = row.get(column).filter(|value| !value.is_null()) else {
                    continue;
                };
                let relation = self.resolve_reference(reference, value.clone());
                let relation = self.capture(relation)?;
                relations.insert(reference.attach_as.clone(), relation);
            }
            resolved.push(relations);
        }
        self.relations = resolved;
        Ok(())
    }

    fn resolve_reference(
        &self,
        reference: &ForeignRef,
        value: Value,
    ) -> ModelResult<Relation<'db>> {
        let schema = self.db.schema(&reference.entity)?;
        let mut target = Entity::new(self.db, schema);
        let conditions = format!("{} = :fkr", reference.key_column);
        target
            .find("*")
            .r#where(&conditions, Params::new().bind("fkr", value.clone()));

        let relation = if reference.has_many {
            target
                .fetch_get(FetchMode::All)
                .map(|record| Relation::Many(record.into_rows()))
        } else {
            let fetched = target.fetch_with(FetchMode::One, false).map(|_| ());
            fetched.map(|()| Relation::One(Box::new(target)))
        };

        match &relation {
            Ok(_) => debug!(
                "event=relation_resolve module=entity status=ok table={} target={} key={} value={} has_many={}",
                self.schema.table(),
                reference.entity,
                reference.key_column,
                value,
                reference.has_many
            ),
            Err(err) => warn!(
                "event=relation_resolve module=entity status=error table={} target={} key={} error={}",
                self.schema.table(),
                reference.entity,
                reference.key_column,
                err
            ),
        }
        relation
    }
}
