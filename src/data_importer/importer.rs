// Atomic CSV import into a single table
use csv::StringRecord;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

use crate::data_importer::connection::{Connection, PostgresConnection};
use crate::data_importer::sql_generator::InsertStatement;
use crate::error::{ImporterError, RecordError};
use crate::monitoring::ImportTracker;
use crate::source::{check_source, record_line, CsvSource};
use crate::types::{ConnectionConfig, CsvOptions, ImportReport, ImportStage};

/// Imports CSV files into one table, one transaction per file.
///
/// The importer owns its connection exclusively. Run concurrent imports on
/// separate importers; the transaction scope is connection-wide.
pub struct Importer<C: Connection> {
    connection: C,
    table: String,
    csv_options: CsvOptions,
    /// Set between a successful `begin` and its commit or rollback. Still set
    /// when an import future was dropped mid-transaction.
    transaction_open: bool,
}

impl Importer<PostgresConnection> {
    /// Connect to PostgreSQL and target `table`.
    ///
    /// The table name is not checked against the schema here.
    pub async fn connect(
        config: &ConnectionConfig,
        table: impl Into<String>,
    ) -> Result<Self, ImporterError> {
        let connection = PostgresConnection::connect(config).await?;
        Ok(Self::new(connection, table))
    }
}

impl<C: Connection> Importer<C> {
    pub fn new(connection: C, table: impl Into<String>) -> Self {
        Self {
            connection,
            table: table.into(),
            csv_options: CsvOptions::default(),
            transaction_open: false,
        }
    }

    pub fn with_csv_options(mut self, csv_options: CsvOptions) -> Self {
        self.csv_options = csv_options;
        self
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    /// Import every data row of the CSV file at `path`, or none of them.
    ///
    /// Fails with `SourceAccess` before any database work when the path is not
    /// a readable regular file.
    pub async fn import(&mut self, path: impl AsRef<Path>) -> Result<ImportReport, ImporterError> {
        let path = path.as_ref();
        check_source(path)?;
        let source = CsvSource::open(path, &self.csv_options)?;
        self.import_source(source, &path.display().to_string()).await
    }

    /// Same as [`Importer::import`] over an arbitrary reader. `label` names the
    /// source in logs and in the report.
    pub async fn import_reader<R: Read>(
        &mut self,
        reader: R,
        label: &str,
    ) -> Result<ImportReport, ImporterError> {
        let source = CsvSource::from_reader(reader, &self.csv_options);
        self.import_source(source, label).await
    }

    /// Takes the source by value so the handle is dropped on every return path.
    async fn import_source<R: Read>(
        &mut self,
        mut source: CsvSource<R>,
        label: &str,
    ) -> Result<ImportReport, ImporterError> {
        let tracker = ImportTracker::start(&self.table, label);

        let columns = match source.read_header() {
            Ok(columns) if columns.is_empty() => {
                let err = ImporterError::EmptySource { path: label.into() };
                tracker.complete_failure(&err, false);
                return Err(err);
            }
            Ok(columns) => columns,
            Err(e) => {
                let err = ImporterError::execution(&self.table, ImportStage::ReadHeader, Some(1), e);
                tracker.complete_failure(&err, false);
                return Err(err);
            }
        };

        let insert = InsertStatement::new(&self.table, columns);
        debug!(
            operation_id = %tracker.operation_id(),
            columns = ?insert.columns(),
            "Preparing insert statement"
        );

        if let Err(err) = self.discard_abandoned_transaction().await {
            tracker.complete_failure(&err, false);
            return Err(err);
        }

        let statement = match self.connection.prepare(&insert).await {
            Ok(statement) => statement,
            Err(e) => {
                let err = ImporterError::execution(&self.table, ImportStage::Prepare, None, e);
                tracker.complete_failure(&err, false);
                return Err(err);
            }
        };

        if let Err(e) = self.connection.begin().await {
            let err = ImporterError::execution(&self.table, ImportStage::Begin, None, e);
            tracker.complete_failure(&err, false);
            return Err(err);
        }
        self.transaction_open = true;

        let outcome = match self
            .insert_rows(&statement, &mut source, insert.parameter_count())
            .await
        {
            Ok(rows) => self
                .connection
                .commit()
                .await
                .map(|()| rows)
                .map_err(|e| ImporterError::execution(&self.table, ImportStage::Commit, None, e)),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(rows) => {
                self.transaction_open = false;
                Ok(tracker.complete_success(rows))
            }
            Err(err) => {
                let rolled_back = match self.connection.rollback().await {
                    Ok(()) => {
                        self.transaction_open = false;
                        true
                    }
                    Err(rollback_err) => {
                        tracker.rollback_failed(rollback_err.as_ref());
                        false
                    }
                };
                tracker.complete_failure(&err, rolled_back);
                Err(err)
            }
        }
    }

    /// Roll back a transaction left open by an import that never finished.
    async fn discard_abandoned_transaction(&mut self) -> Result<(), ImporterError> {
        if !self.transaction_open {
            return Ok(());
        }
        warn!(table = %self.table, "Rolling back transaction left open by an interrupted import");
        self.connection
            .rollback()
            .await
            .map_err(|e| ImporterError::execution(&self.table, ImportStage::Begin, None, e))?;
        self.transaction_open = false;
        Ok(())
    }

    /// Execute the prepared insert once per data record; stops at the first failure.
    async fn insert_rows<R: Read>(
        &mut self,
        statement: &C::Statement,
        source: &mut CsvSource<R>,
        width: usize,
    ) -> Result<u64, ImporterError> {
        let mut record = StringRecord::new();
        let mut inserted: u64 = 0;

        loop {
            match source.next_record(&mut record) {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    let line = e.position().map(|p| p.line());
                    return Err(ImporterError::execution(&self.table, ImportStage::ReadRecord, line, e));
                }
            }

            let line = record_line(&record);
            if record.len() != width {
                return Err(ImporterError::execution(
                    &self.table,
                    ImportStage::Execute,
                    line,
                    RecordError::Arity {
                        expected: width,
                        found: record.len(),
                    },
                ));
            }

            let values: Vec<&str> = record.iter().collect();
            self.connection
                .execute(statement, &values)
                .await
                .map_err(|e| ImporterError::execution(&self.table, ImportStage::Execute, line, e))?;
            inserted += 1;
        }

        Ok(inserted)
    }
}
