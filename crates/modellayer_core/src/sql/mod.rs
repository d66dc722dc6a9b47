//! Statement compilation.
//!
//! # Responsibility
//! - Assemble CRUD statements and fluent query buffers into SQL text plus
//!   named parameters.
//!
//! # Invariants
//! - Compilation is pure; execution lives in `db::exec`.

mod builder;
mod compiler;
mod params;

pub use builder::{Clause, JoinKind, QueryBuffer};
pub use compiler::{
    compile_delete, compile_insert, compile_select, compile_update, current_timestamp,
    ColumnInput, CompiledStatement, SelectSpec, TIMESTAMP_FORMAT,
};
pub use params::Params;
