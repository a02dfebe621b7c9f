//! Copy-on-write version history shared by every entity table.
//!
//! A table holds every version of every identity, keyed on `(id, version)`.
//! Exactly one row per identity carries `is_current = 1`. [`upsert`] either
//! leaves the identity untouched, or retires the current row and appends the
//! candidate as the next version, inside one transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use meshsync_core::{AttributeBag, EntityKey, RecordMeta, Versioned};
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info, warn};

use crate::error::StorageError;

/// Storage capabilities of a versioned entity: which table it lives in, how
/// to read it back from a row and how to serialize its business columns.
pub trait VersionedRecord: Versioned + Sized {
    const TABLE: &'static str;

    /// Business columns written on insert, `id` first. Store-owned metadata
    /// columns are appended by the engine.
    const COLUMNS: &'static [&'static str];

    /// Values for [`Self::COLUMNS`], in the same order.
    fn column_values(&self) -> Result<Vec<Value>, StorageError>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Entities owned by a network, carrying a `network_id` column.
pub trait NetworkScoped: VersionedRecord {
    fn network_id(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated { version: i64 },
    Unchanged { version: i64 },
}

pub(crate) fn key_value(key: &EntityKey) -> Value {
    match key {
        EntityKey::Text(s) => Value::Text(s.clone()),
        EntityKey::Integer(n) => Value::Integer(*n),
    }
}

pub(crate) fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(crate) fn flag(b: bool) -> Value {
    Value::Integer(i64::from(b))
}

/// Fixed-width RFC 3339 so stored timestamps also sort as text.
pub(crate) fn stamp(at: DateTime<Utc>) -> Value {
    Value::Text(at.to_rfc3339_opts(SecondsFormat::Micros, false))
}

pub(crate) fn bag(data: &AttributeBag) -> Result<Value, StorageError> {
    Ok(Value::Text(data.to_json()?))
}

pub(crate) fn read_bag(row: &Row<'_>, column: &str) -> rusqlite::Result<AttributeBag> {
    let raw: Option<String> = row.get(column)?;
    AttributeBag::from_json(raw.as_deref()).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

pub(crate) fn read_meta(row: &Row<'_>) -> rusqlite::Result<RecordMeta> {
    Ok(RecordMeta {
        version: row.get("version")?,
        is_current: row.get("is_current")?,
        created_at: row.get("created_at")?,
        last_modified: row.get("last_modified")?,
    })
}

pub(crate) fn select_current<R: VersionedRecord>(
    conn: &Connection,
    key: &EntityKey,
) -> Result<Option<R>, StorageError> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1 AND is_current = 1", R::TABLE);
    let record = conn
        .query_row(&sql, [key_value(key)], R::from_row)
        .optional()?;
    Ok(record)
}

pub(crate) fn select_history<R: VersionedRecord>(
    conn: &Connection,
    key: &EntityKey,
) -> Result<Vec<R>, StorageError> {
    let sql = format!("SELECT * FROM {} WHERE id = ?1 ORDER BY version DESC", R::TABLE);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([key_value(key)], R::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn select_all_current<R: VersionedRecord>(
    conn: &Connection,
) -> Result<Vec<R>, StorageError> {
    let sql = format!("SELECT * FROM {} WHERE is_current = 1 ORDER BY id", R::TABLE);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], R::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn select_current_in_network<R: NetworkScoped>(
    conn: &Connection,
    network_id: &str,
) -> Result<Vec<R>, StorageError> {
    let sql = format!(
        "SELECT * FROM {} WHERE network_id = ?1 AND is_current = 1 ORDER BY id",
        R::TABLE
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([network_id], R::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn insert_version<R: VersionedRecord>(
    tx: &Transaction<'_>,
    record: &R,
    version: i64,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
) -> Result<(), StorageError> {
    let mut values = record.column_values()?;
    debug_assert_eq!(values.len(), R::COLUMNS.len());
    values.push(Value::Integer(version));
    values.push(Value::Integer(1));
    values.push(stamp(created_at));
    values.push(stamp(last_modified));

    let columns = R::COLUMNS.join(", ");
    let placeholders = (1..=values.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({columns}, version, is_current, created_at, last_modified) VALUES ({placeholders})",
        R::TABLE
    );
    tx.execute(&sql, rusqlite::params_from_iter(values))?;
    Ok(())
}

/// Make `candidate` the current version of its identity.
///
/// Errors are wrapped in [`StorageError::Upsert`] naming the kind and key.
pub fn upsert<R: VersionedRecord>(
    conn: &mut Connection,
    candidate: &R,
    now: DateTime<Utc>,
) -> Result<UpsertOutcome, StorageError> {
    let key = candidate.key();
    upsert_inner(conn, candidate, &key, now).map_err(|source| StorageError::Upsert {
        kind: R::KIND,
        key: key.to_string(),
        source: Box::new(source),
    })
}

fn upsert_inner<R: VersionedRecord>(
    conn: &mut Connection,
    candidate: &R,
    key: &EntityKey,
    now: DateTime<Utc>,
) -> Result<UpsertOutcome, StorageError> {
    let tx = conn.transaction()?;
    let id = key_value(key);

    let max_sql = format!("SELECT MAX(version) FROM {} WHERE id = ?1", R::TABLE);
    let max_version: Option<i64> = tx.query_row(&max_sql, [&id], |row| row.get(0))?;

    let Some(max_version) = max_version else {
        insert_version(&tx, candidate, 1, now, now)?;
        tx.commit()?;
        info!(kind = %R::KIND, key = %key, "created version 1");
        return Ok(UpsertOutcome::Created);
    };

    let created_at = match select_current::<R>(&tx, key)? {
        Some(current) if current.same_content(candidate) => {
            debug!(kind = %R::KIND, key = %key, version = current.version(), "unchanged");
            return Ok(UpsertOutcome::Unchanged {
                version: current.version(),
            });
        }
        Some(current) => current.meta().created_at,
        None => {
            warn!(
                kind = %R::KIND,
                key = %key,
                max_version,
                "history exists but no current row; writing a fresh version"
            );
            let first_sql = format!(
                "SELECT created_at FROM {} WHERE id = ?1 ORDER BY version LIMIT 1",
                R::TABLE
            );
            tx.query_row(&first_sql, [&id], |row| row.get(0))?
        }
    };

    let retire_sql = format!(
        "UPDATE {} SET is_current = 0 WHERE id = ?1 AND is_current = 1",
        R::TABLE
    );
    tx.execute(&retire_sql, [&id])?;

    let next_version = max_version + 1;
    insert_version(&tx, candidate, next_version, created_at, now)?;
    tx.commit()?;

    info!(kind = %R::KIND, key = %key, version = next_version, "updated");
    Ok(UpsertOutcome::Updated {
        version: next_version,
    })
}
