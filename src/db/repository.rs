//! Database repository for CRUD operations.
//!
//! Every write runs in a transaction that also bumps the global revision and the
//! touched collection's revision; the change is published on the feed after commit.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::errors::AppError;
use crate::feed::ChangeFeed;
use crate::models::{ChangeEvent, ChangeKind, RevisionInfo};

pub(super) type Tx = Transaction<'static, Sqlite>;

/// A collection touched by a write, reported on the change feed.
pub(super) struct Touched {
    pub collection: &'static str,
    pub id: Option<String>,
    pub kind: ChangeKind,
}

impl Touched {
    pub fn new(collection: &'static str, id: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            collection,
            id: Some(id.into()),
            kind,
        }
    }

    pub fn collection(collection: &'static str, kind: ChangeKind) -> Self {
        Self {
            collection,
            id: None,
            kind,
        }
    }
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pub(super) pool: SqlitePool,
    feed: ChangeFeed,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            feed: ChangeFeed::new(),
        }
    }

    /// Feed carrying one event per committed write.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Get the current revision ID.
    pub async fn get_revision_id(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("revision_id"))
    }

    /// Get revision info, including per-collection revisions.
    pub async fn get_revision_info(&self) -> Result<RevisionInfo, AppError> {
        let row = sqlx::query("SELECT revision_id, generated_at FROM meta WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query("SELECT collection, revision_id FROM collection_revisions")
            .fetch_all(&self.pool)
            .await?;
        let collections: BTreeMap<String, i64> = rows
            .iter()
            .map(|r| (r.get("collection"), r.get("revision_id")))
            .collect();

        Ok(RevisionInfo {
            revision_id: row.get("revision_id"),
            generated_at: row.get("generated_at"),
            collections,
        })
    }

    /// Collections that changed after `since`.
    pub async fn collections_changed_since(&self, since: i64) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(
            "SELECT collection FROM collection_revisions WHERE revision_id > ? ORDER BY collection",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|r| r.get("collection")).collect())
    }

    pub(super) async fn begin(&self) -> Result<Tx, AppError> {
        Ok(self.pool.begin().await?)
    }

    /// Bump revisions inside `tx`, commit, then publish the changes.
    pub(super) async fn commit(&self, mut tx: Tx, touched: Vec<Touched>) -> Result<i64, AppError> {
        let now = now();
        sqlx::query("UPDATE meta SET revision_id = revision_id + 1, generated_at = ? WHERE id = 1")
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        let revision_id = sqlx::query_scalar::<_, i64>("SELECT revision_id FROM meta WHERE id = 1")
            .fetch_one(&mut *tx)
            .await?;

        for change in &touched {
            sqlx::query(
                "INSERT INTO collection_revisions (collection, revision_id) VALUES (?, ?)
                 ON CONFLICT(collection) DO UPDATE SET revision_id = excluded.revision_id",
            )
            .bind(change.collection)
            .bind(revision_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        for change in touched {
            self.feed.publish(ChangeEvent {
                collection: change.collection.to_string(),
                id: change.id,
                kind: change.kind,
                revision_id,
            });
        }

        Ok(revision_id)
    }

    /// Commit a write that touched a single row.
    pub(super) async fn commit_one(
        &self,
        tx: Tx,
        collection: &'static str,
        id: &str,
        kind: ChangeKind,
    ) -> Result<i64, AppError> {
        self.commit(tx, vec![Touched::new(collection, id, kind)])
            .await
    }
}

// Helper functions shared by the per-collection modules

pub(super) fn now() -> String {
    Utc::now().to_rfc3339()
}

pub(super) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub(super) fn flag(row: &sqlx::sqlite::SqliteRow, column: &str) -> bool {
    let value: i32 = row.get(column);
    value != 0
}

/// Reject the write when the caller's expected version is stale.
pub(super) fn check_version(expected: Option<i64>, current: i64) -> Result<(), AppError> {
    match expected {
        Some(expected) if expected != current => Err(AppError::version_mismatch(expected, current)),
        _ => Ok(()),
    }
}

/// Conflict reported when a conditional UPDATE matched no row.
pub(super) fn concurrent_modification(current_version: i64) -> AppError {
    AppError::Conflict {
        message: "Concurrent modification detected".to_string(),
        current_version,
    }
}

/// Empty strings clear an optional text field.
pub(super) fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Apply an optional patch to an optional field: `None` keeps, `Some("")` clears.
pub(super) fn patch_optional(patch: &Option<String>, existing: &Option<String>) -> Option<String> {
    match patch {
        Some(value) => blank_to_none(Some(value.clone())),
        None => existing.clone(),
    }
}
