// Delimited-text source reader
use crate::error::ImporterError;
use crate::types::CsvOptions;
use csv::{ReaderBuilder, StringRecord};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Checks that `path` names an existing regular file without touching its contents.
pub fn check_source(path: &Path) -> Result<(), ImporterError> {
    let metadata = std::fs::metadata(path).map_err(|e| ImporterError::source_access(path, e))?;
    if !metadata.is_file() {
        return Err(ImporterError::source_access(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"),
        ));
    }
    Ok(())
}

/// Header plus record stream over a CSV source.
///
/// Records are allowed to differ in width from the header here; the importer
/// decides what to do with a mismatch.
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
}

impl CsvSource<File> {
    pub fn open(path: &Path, options: &CsvOptions) -> Result<Self, ImporterError> {
        let file = File::open(path).map_err(|e| ImporterError::source_access(path, e))?;
        Ok(Self::from_reader(file, options))
    }
}

impl<R: Read> CsvSource<R> {
    pub fn from_reader(reader: R, options: &CsvOptions) -> Self {
        let reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(options.delimiter)
            .quote(options.quote)
            .double_quote(true)
            .from_reader(reader);
        Self { reader }
    }

    /// Column names in header order; empty when the source has no records at all.
    pub fn read_header(&mut self) -> Result<Vec<String>, csv::Error> {
        Ok(self.reader.headers()?.iter().map(str::to_string).collect())
    }

    /// Fills `record` with the next data row. Returns `false` at end of input.
    pub fn next_record(&mut self, record: &mut StringRecord) -> Result<bool, csv::Error> {
        self.reader.read_record(record)
    }
}

/// 1-based line on which `record` started, when the reader tracked it.
pub fn record_line(record: &StringRecord) -> Option<u64> {
    record.position().map(|p| p.line())
}
