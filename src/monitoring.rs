// Per-import operation tracking and audit logging
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ImporterError;
use crate::types::ImportReport;

/// Tracks a single import from start to commit or rollback
#[derive(Debug)]
pub struct ImportTracker {
    operation_id: Uuid,
    table: String,
    source: String,
    start_time: DateTime<Utc>,
}

impl ImportTracker {
    pub fn start(table: &str, source: &str) -> Self {
        let tracker = Self {
            operation_id: Uuid::new_v4(),
            table: table.to_string(),
            source: source.to_string(),
            start_time: Utc::now(),
        };

        info!(
            operation_id = %tracker.operation_id,
            table = %tracker.table,
            source = %tracker.source,
            "Import started"
        );

        tracker
    }

    pub fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    fn elapsed_ms(&self, end_time: DateTime<Utc>) -> u64 {
        end_time
            .signed_duration_since(self.start_time)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Mark the import as committed and build its report
    pub fn complete_success(self, rows_inserted: u64) -> ImportReport {
        let finished_at = Utc::now();
        let report = ImportReport {
            operation_id: self.operation_id,
            duration_ms: self.elapsed_ms(finished_at),
            table: self.table,
            source: self.source,
            rows_inserted,
            started_at: self.start_time,
            finished_at,
        };

        info!(
            operation_id = %report.operation_id,
            table = %report.table,
            source = %report.source,
            rows_inserted = report.rows_inserted,
            duration_ms = report.duration_ms,
            throughput = report.throughput(),
            "Import committed"
        );

        report
    }

    /// Log a failed import with its full cause chain
    pub fn complete_failure(&self, err: &ImporterError, rolled_back: bool) {
        error!(
            operation_id = %self.operation_id,
            table = %self.table,
            source = %self.source,
            duration_ms = self.elapsed_ms(Utc::now()),
            stage = ?err.stage(),
            rolled_back,
            error = %err.chain(),
            "Import failed"
        );
    }

    /// Rollback itself failed; the original failure is still what gets reported
    pub fn rollback_failed(&self, cause: &dyn std::error::Error) {
        warn!(
            operation_id = %self.operation_id,
            table = %self.table,
            error = %cause,
            "Rollback failed"
        );
    }
}
