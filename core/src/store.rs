//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database. The projector and the
//! runner call store methods — they never execute SQL directly.
//!
//! The connection sits behind a mutex because the status projector
//! writes from its own thread while the scheduler's population queries
//! read concurrently.

use crate::error::SimResult;
use crate::event::EventLogEntry;
use crate::ports::PopulationQueryPort;
use crate::types::{PetId, Tick};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One row of the pet_status projection, as read back from SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetStatusRow {
    pub pet_id: PetId,
    pub name: String,
    pub kind: String,
    pub hunger: u8,
    pub happiness: u8,
    pub health: u8,
    pub stage: String,
    pub path: String,
    pub alive: bool,
    pub age: u32,
    pub total_ticks: u64,
    pub last_tick_seq: Option<Tick>,
    pub updated_at: DateTime<Utc>,
}

pub struct SimStore {
    conn: Mutex<Connection>,
}

impl SimStore {
    /// Open (or create) the simulation database at `path`.
    pub fn open(path: &str) -> SimResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SimResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SimResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> SimResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO event_log (pet_id, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.pet_id,
                entry.event_type,
                entry.payload,
                entry.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_pet(&self, pet_id: &str) -> SimResult<Vec<EventLogEntry>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, pet_id, event_type, payload, recorded_at
             FROM event_log WHERE pet_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![pet_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries
            .into_iter()
            .map(|(id, pet_id, event_type, payload, recorded_at)| EventLogEntry {
                id: Some(id),
                pet_id,
                event_type,
                payload,
                recorded_at: recorded_at
                    .parse::<DateTime<Utc>>()
                    .unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }

    // ── pet_status projection ──────────────────────────────────

    pub fn upsert_status(&self, status: &PetStatusRow) -> SimResult<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO pet_status
               (pet_id, name, kind, hunger, happiness, health, stage, path,
                alive, age, total_ticks, last_tick_seq, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(pet_id) DO UPDATE SET
               name = ?2, kind = ?3, hunger = ?4, happiness = ?5, health = ?6,
               stage = ?7, path = ?8, alive = ?9, age = ?10, total_ticks = ?11,
               last_tick_seq = ?12, updated_at = ?13",
            params![
                status.pet_id,
                status.name,
                status.kind,
                status.hunger as i64,
                status.happiness as i64,
                status.health as i64,
                status.stage,
                status.path,
                status.alive as i64,
                status.age as i64,
                status.total_ticks as i64,
                status.last_tick_seq.map(|t| t as i64),
                status.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn status(&self, pet_id: &str) -> SimResult<Option<PetStatusRow>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT pet_id, name, kind, hunger, happiness, health, stage, path,
                    alive, age, total_ticks, last_tick_seq, updated_at
             FROM pet_status WHERE pet_id = ?1",
        )?;
        let row = stmt
            .query_row(params![pet_id], Self::map_status_row)
            .optional()?;
        Ok(row)
    }

    pub fn all_statuses(&self) -> SimResult<Vec<PetStatusRow>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT pet_id, name, kind, hunger, happiness, health, stage, path,
                    alive, age, total_ticks, last_tick_seq, updated_at
             FROM pet_status ORDER BY pet_id ASC",
        )?;
        let rows = stmt
            .query_map([], Self::map_status_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn alive_pet_ids(&self) -> SimResult<Vec<PetId>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT pet_id FROM pet_status WHERE alive = 1 ORDER BY pet_id ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn alive_count(&self) -> SimResult<i64> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count = conn.query_row(
            "SELECT COUNT(*) FROM pet_status WHERE alive = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_status_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PetStatusRow> {
        Ok(PetStatusRow {
            pet_id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            hunger: row.get::<_, i64>(3)? as u8,
            happiness: row.get::<_, i64>(4)? as u8,
            health: row.get::<_, i64>(5)? as u8,
            stage: row.get(6)?,
            path: row.get(7)?,
            alive: row.get::<_, i64>(8)? != 0,
            age: row.get::<_, i64>(9)? as u32,
            total_ticks: row.get::<_, i64>(10)? as u64,
            last_tick_seq: row.get::<_, Option<i64>>(11)?.map(|t| t as Tick),
            updated_at: row
                .get::<_, String>(12)?
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

/// The read side of the CQRS split: alive-population snapshots come
/// from the projection table, not from the authoritative registry.
impl PopulationQueryPort for SimStore {
    fn alive_pets(&self) -> SimResult<Vec<PetId>> {
        self.alive_pet_ids()
    }
}
