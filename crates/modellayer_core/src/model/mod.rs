//! Schema and record data model.
//!
//! # Responsibility
//! - Describe tables as immutable schemas with resolved column flags.
//! - Hold fetched row data as scalar values.
//!
//! # Invariants
//! - Schemas are shared read-only (`Arc<EntitySchema>`) once registered.
//! - Values stay scalars until typed coercion is requested.

pub mod record;
pub mod schema;
pub mod value;

pub use record::Record;
pub use schema::{
    ColumnOptions, ColumnSpec, EntitySchema, ForeignRef, SchemaBuilder, SchemaRegistry,
};
pub use value::{ColumnType, Row, Value};
