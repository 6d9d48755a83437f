use std::path::PathBuf;

use thiserror::Error;

use crate::types::ImportStage;

/// Boxed cause reported by a database driver or by the record reader.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the importer
#[derive(Error, Debug)]
pub enum ImporterError {
    /// Driver detail is logged at the failure site and never carried here.
    #[error("Database connection error. Please check credentials.")]
    Connection,

    #[error("Source file {} does not exist or is not readable", path.display())]
    SourceAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source file {} is empty: no header row to derive columns from", path.display())]
    EmptySource { path: PathBuf },

    #[error("Import into {table} failed during {stage}{}", line_suffix(*line))]
    ImportExecution {
        table: String,
        stage: ImportStage,
        line: Option<u64>,
        #[source]
        source: DriverError,
    },
}

/// Record-level problems detected before the row reaches the database
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has {found} fields but the header declares {expected} columns")]
    Arity { expected: usize, found: usize },
}

fn line_suffix(line: Option<u64>) -> String {
    line.map(|l| format!(" at line {}", l)).unwrap_or_default()
}

impl ImporterError {
    pub fn source_access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SourceAccess { path: path.into(), source }
    }

    pub fn execution(
        table: impl Into<String>,
        stage: ImportStage,
        line: Option<u64>,
        source: impl Into<DriverError>,
    ) -> Self {
        Self::ImportExecution {
            table: table.into(),
            stage,
            line,
            source: source.into(),
        }
    }

    /// Stage at which an execution failure happened, if any.
    pub fn stage(&self) -> Option<ImportStage> {
        match self {
            Self::ImportExecution { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Renders the error and every `source()` below it, outermost first.
    pub fn chain(&self) -> String {
        let mut rendered = self.to_string();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            rendered.push_str(": ");
            rendered.push_str(&cause.to_string());
            current = cause.source();
        }
        rendered
    }
}
