pub mod error;
pub mod types;
pub mod source;
pub mod data_importer;
pub mod monitoring;

pub use data_importer::{Connection, Importer, InsertStatement, PlaceholderStyle, PostgresConnection};
pub use error::{DriverError, ImporterError, RecordError};
pub use types::{ConnectionConfig, CsvOptions, ImportReport, ImportStage};
