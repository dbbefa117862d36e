use sqlx::{MySql, Transaction};
use tracing::warn;

use super::manager::DatabaseError;

/// Commits when `result` is Ok, otherwise rolls back and returns the original error.
///
/// Batch writes run every statement inside one transaction; a single failed
/// statement leaves the database as it was before the batch.
pub async fn commit_or_rollback(
    tx: Transaction<'static, MySql>,
    result: Result<(), DatabaseError>,
    function: &'static str,
) -> Result<(), DatabaseError> {
    match result {
        Ok(()) => tx.commit().await.map_err(DatabaseError::query(function)),
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(function, "Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

/// Maps a zero-row write to `NoRowsAffected`
pub fn expect_affected(rows_affected: u64, function: &'static str) -> Result<(), DatabaseError> {
    if rows_affected == 0 {
        Err(DatabaseError::NoRowsAffected { function })
    } else {
        Ok(())
    }
}
