//! Database layer - connection, schema inference and table replacement

pub mod connection;
pub mod schema;
pub mod writer;

pub use connection::{Connection, redact_url};
pub use writer::TableWriter;
