//! Statement text generation.

pub mod columns;
pub mod statement;

pub use columns::ColumnFormatter;
pub use statement::{StatementBuilder, TableStatements};
