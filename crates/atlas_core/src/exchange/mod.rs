//! Bulk data exchange with files outside the database.

pub mod json;

pub use json::{export_tables, import_tables, ExchangeError, ExchangeTable, TableCount};
