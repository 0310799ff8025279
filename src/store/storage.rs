//! SQLite-backed local store.
//!
//! Entities persist as JSON blobs keyed by id, one table per store. The
//! schema is versioned through `PRAGMA user_version` with additive-only
//! migrations applied in increasing order; existing tables are never dropped.

use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::api::types::Restaurant;
use crate::error::{Error, Result};
use crate::queue::PendingAction;

/// One additive schema revision. `apply` only ever creates structures.
struct Migration {
  version: i64,
  apply: fn(&Connection) -> rusqlite::Result<()>,
}

const MIGRATIONS: &[Migration] = &[
  Migration {
    version: 1,
    apply: |conn| {
      conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS restaurants (
            id INTEGER PRIMARY KEY,
            data BLOB NOT NULL,
            updated_at TEXT
        );",
      )
    },
  },
  Migration {
    version: 2,
    apply: |conn| {
      conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pending_actions (
            since INTEGER PRIMARY KEY,
            action_type TEXT NOT NULL,
            data BLOB NOT NULL
        );",
      )
    },
  },
];

/// Durable key-value store for domain entities and the pending-action log.
///
/// All operations are scoped transactions; a failed write never leaves a
/// partial record. One instance per process, shared behind an `Arc`.
pub struct LocalStore {
  conn: Mutex<Connection>,
}

impl LocalStore {
  /// Open (or create) the store at `path` and bring the schema up to date.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Store(format!("failed to create database directory: {e}")))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| Error::Store(format!("failed to open database at {}: {}", path.display(), e)))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// In-memory store for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::Store(format!("lock poisoned: {e}")))
  }

  /// Apply every migration above the current `user_version`, in order, each
  /// inside its own transaction together with the version bump.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
      conn.execute_batch("BEGIN")?;
      if let Err(e) = (migration.apply)(&conn) {
        let _ = conn.execute_batch("ROLLBACK");
        return Err(Error::Store(format!(
          "migration to version {} failed: {}",
          migration.version, e
        )));
      }
      conn.execute_batch(&format!("PRAGMA user_version = {}", migration.version))?;
      conn.execute_batch("COMMIT")?;
      info!(version = migration.version, "applied store migration");
    }

    Ok(())
  }

  /// Schema version currently recorded in the database.
  pub fn schema_version(&self) -> Result<i64> {
    let conn = self.lock()?;
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
  }

  /// Fetch one restaurant record by id.
  pub fn get_restaurant(&self, id: i64) -> Result<Option<Restaurant>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT data FROM restaurants WHERE id = ?")?;

    let data: Option<Vec<u8>> = stmt.query_row(params![id], |row| row.get(0)).ok();

    match data {
      Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      None => Ok(None),
    }
  }

  /// Fetch every restaurant record. Order is unspecified; callers treat an
  /// empty result as "no data".
  pub fn get_all_restaurants(&self) -> Result<Vec<Restaurant>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT data FROM restaurants")?;

    let rows: Vec<Vec<u8>> = stmt
      .query_map([], |row| row.get(0))?
      .filter_map(|r| r.ok())
      .collect();

    rows
      .iter()
      .map(|bytes| serde_json::from_slice(bytes).map_err(Error::from))
      .collect()
  }

  /// Insert or replace a restaurant record. Atomic per key.
  pub fn put_restaurant(&self, restaurant: &Restaurant) -> Result<()> {
    let data = serde_json::to_vec(restaurant)?;
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO restaurants (id, data, updated_at) VALUES (?, ?, ?)",
      params![restaurant.id, data, restaurant.updated_at],
    )?;
    debug!(id = restaurant.id, "stored restaurant record");
    Ok(())
  }

  /// Delete a restaurant record. Deleting a missing key is a no-op.
  pub fn delete_restaurant(&self, id: i64) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM restaurants WHERE id = ?", params![id])?;
    Ok(())
  }

  /// Persist a pending action under its `since` key.
  pub fn put_action(&self, pending: &PendingAction) -> Result<()> {
    let data = serde_json::to_vec(&pending.action)?;
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO pending_actions (since, action_type, data) VALUES (?, ?, ?)",
      params![pending.since, pending.action.kind(), data],
    )?;
    debug!(
      since = pending.since,
      kind = pending.action.kind(),
      "recorded pending action"
    );
    Ok(())
  }

  /// Remove one pending action by key. Removing an absent key is a no-op,
  /// which keeps concurrent sweeps safe.
  pub fn remove_action(&self, since: i64) -> Result<()> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM pending_actions WHERE since = ?", params![since])?;
    Ok(())
  }

  /// Every pending action, ordered by `since` ascending (insertion order).
  pub fn list_actions(&self) -> Result<Vec<PendingAction>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT since, data FROM pending_actions ORDER BY since ASC")?;

    let rows: Vec<(i64, Vec<u8>)> = stmt
      .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
      .filter_map(|r| r.ok())
      .collect();

    rows
      .into_iter()
      .map(|(since, bytes)| {
        Ok(PendingAction {
          since,
          action: serde_json::from_slice(&bytes)?,
        })
      })
      .collect()
  }
}
