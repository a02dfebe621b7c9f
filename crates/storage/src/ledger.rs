//! Append-and-update log of synchronization attempts.

use meshsync_core::{ResourceKind, RunCounts, SyncRun, SyncRunId, SyncStatus};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::StorageError;
use crate::versioned::stamp;

const RUN_COLUMNS: &str = "run_id, resource_kind, scope, status, message, created_count, \
    updated_count, unchanged_count, failed_count, started_at, completed_at";

fn conversion_failure(index: usize, err: meshsync_core::CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
}

fn read_run(row: &Row<'_>) -> rusqlite::Result<SyncRun> {
    let run_id: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let status: String = row.get(3)?;
    Ok(SyncRun {
        run_id: SyncRunId::parse(&run_id).map_err(|e| conversion_failure(0, e))?,
        resource_kind: ResourceKind::parse(&kind).map_err(|e| conversion_failure(1, e))?,
        scope: row.get(2)?,
        status: SyncStatus::parse(&status).map_err(|e| conversion_failure(3, e))?,
        message: row.get(4)?,
        counts: RunCounts {
            created: row.get(5)?,
            updated: row.get(6)?,
            unchanged: row.get(7)?,
            failed: row.get(8)?,
        },
        started_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

pub(crate) fn insert_run(conn: &Connection, run: &SyncRun) -> Result<(), StorageError> {
    conn.execute(
        &format!(
            "INSERT INTO sync_runs ({RUN_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            run.run_id.to_string(),
            run.resource_kind.as_str(),
            run.scope,
            run.status.as_str(),
            run.message,
            run.counts.created,
            run.counts.updated,
            run.counts.unchanged,
            run.counts.failed,
            stamp(run.started_at),
            run.completed_at.map(stamp).unwrap_or(Value::Null),
        ],
    )?;
    Ok(())
}

pub(crate) fn update_run(conn: &Connection, run: &SyncRun) -> Result<(), StorageError> {
    let changed = conn.execute(
        "UPDATE sync_runs SET status = ?1, message = ?2, created_count = ?3, updated_count = ?4, \
         unchanged_count = ?5, failed_count = ?6, completed_at = ?7 WHERE run_id = ?8",
        params![
            run.status.as_str(),
            run.message,
            run.counts.created,
            run.counts.updated,
            run.counts.unchanged,
            run.counts.failed,
            run.completed_at.map(stamp).unwrap_or(Value::Null),
            run.run_id.to_string(),
        ],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound(format!("sync run {}", run.run_id)));
    }
    Ok(())
}

pub(crate) fn select_run(
    conn: &Connection,
    run_id: SyncRunId,
) -> Result<Option<SyncRun>, StorageError> {
    let run = conn
        .query_row(
            &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE run_id = ?1"),
            [run_id.to_string()],
            read_run,
        )
        .optional()?;
    Ok(run)
}

pub(crate) fn select_recent(conn: &Connection, limit: usize) -> Result<Vec<SyncRun>, StorageError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY started_at DESC, run_id DESC LIMIT ?1"
    ))?;
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let runs = stmt
        .query_map([limit], read_run)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(runs)
}

pub(crate) fn select_by_kind(
    conn: &Connection,
    kind: ResourceKind,
) -> Result<Vec<SyncRun>, StorageError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RUN_COLUMNS} FROM sync_runs WHERE resource_kind = ?1 ORDER BY started_at, run_id"
    ))?;
    let runs = stmt
        .query_map([kind.as_str()], read_run)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(runs)
}
