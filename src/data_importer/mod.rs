// Data importer module: header-driven inserts under a single transaction
pub mod connection;
pub mod importer;
pub mod sql_generator;


pub use connection::{Connection, PostgresConnection};
pub use importer::Importer;
pub use sql_generator::{InsertStatement, PlaceholderStyle};
