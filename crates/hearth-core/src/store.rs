// SQLite-backed key-value persistence for the world graph.
//
// Layout: two key/value tables.
//   Rooms  key = decimal room ID            value = JSON room record (no exits)
//   Exits  key = "<room_id>_<direction>"    value = JSON exit

use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, Transaction};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::model::{Exit, Room, RoomId, World};

pub const ROOMS_BUCKET: &str = "Rooms";
pub const EXITS_BUCKET: &str = "Exits";

/// How [`WorldStore::save`] treats rows that are no longer in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveMode {
    /// Clear both buckets and write the snapshot. Exits removed from memory
    /// since the last save are removed from the store too.
    #[default]
    Replace,
    /// Upsert every in-memory room and exit, leaving any other rows alone.
    /// A room that lost an exit keeps the stale row, and the exit comes back
    /// on the next load.
    Merge,
}

/// Stored form of a room. Exits live in their own bucket.
#[derive(Debug, Serialize, Deserialize)]
struct RoomRecord {
    id: RoomId,
    area: String,
    title: String,
    description: String,
}

/// Embedded store holding one world snapshot.
pub struct WorldStore {
    conn: Mutex<Connection>,
}

impl WorldStore {
    /// Open (or create) the store file at `path`. Pass `":memory:"` for an
    /// ephemeral store. Buckets are created lazily by the first save.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_string(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the whole snapshot in one transaction: every room first, then
    /// every exit. An exit whose key names a room that is not stored fails
    /// the entire load.
    pub fn load(&self) -> Result<World, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        for bucket in [ROOMS_BUCKET, EXITS_BUCKET] {
            if !bucket_exists(&tx, bucket)? {
                return Err(StoreError::MissingBucket(bucket));
            }
        }

        let mut world = World::new();

        for (key, value) in read_bucket(&tx, ROOMS_BUCKET)? {
            let record: RoomRecord =
                serde_json::from_str(&value).map_err(|source| StoreError::Decode {
                    bucket: ROOMS_BUCKET,
                    key: key.clone(),
                    source,
                })?;
            world.insert_room(Room::new(
                record.id,
                record.area,
                record.title,
                record.description,
            ));
        }

        for (key, value) in read_bucket(&tx, EXITS_BUCKET)? {
            let exit: Exit = serde_json::from_str(&value).map_err(|source| StoreError::Decode {
                bucket: EXITS_BUCKET,
                key: key.clone(),
                source,
            })?;
            let room_id = owning_room(&key)?;
            match world.room_mut(room_id) {
                Some(room) => {
                    room.insert_exit(exit);
                }
                None => return Err(StoreError::OrphanExit { key }),
            }
        }

        tx.commit()?;

        info!(
            "Loaded {} rooms and {} exits from store",
            world.len(),
            world.exit_count()
        );
        Ok(world)
    }

    /// Write the snapshot in one transaction, creating the buckets if needed.
    pub fn save(&self, world: &World, mode: SaveMode) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        create_buckets(&tx)?;
        if mode == SaveMode::Replace {
            tx.execute(&format!("DELETE FROM \"{ROOMS_BUCKET}\""), [])?;
            tx.execute(&format!("DELETE FROM \"{EXITS_BUCKET}\""), [])?;
        }

        {
            let mut put_room = tx.prepare(&format!(
                "INSERT OR REPLACE INTO \"{ROOMS_BUCKET}\" (key, value) VALUES (?1, ?2)"
            ))?;
            let mut put_exit = tx.prepare(&format!(
                "INSERT OR REPLACE INTO \"{EXITS_BUCKET}\" (key, value) VALUES (?1, ?2)"
            ))?;

            for room in world.rooms() {
                let record = RoomRecord {
                    id: room.id,
                    area: room.area.clone(),
                    title: room.title.clone(),
                    description: room.description.clone(),
                };
                let room_json =
                    serde_json::to_string(&record).map_err(|source| StoreError::Encode {
                        what: format!("room {}", room.id),
                        source,
                    })?;
                put_room.execute(params![room.id.to_string(), room_json])?;

                for exit in room.exits() {
                    let exit_json =
                        serde_json::to_string(exit).map_err(|source| StoreError::Encode {
                            what: format!("exit {}", exit.id),
                            source,
                        })?;
                    put_exit.execute(params![exit_key(room.id, &exit.direction), exit_json])?;
                }
            }
        }

        tx.commit()?;

        debug!("Saved snapshot ({mode:?})");
        info!(
            "Saved {} rooms and {} exits to store",
            world.len(),
            world.exit_count()
        );
        Ok(())
    }

    /// Number of stored `(rooms, exits)`. Missing buckets count as empty.
    pub fn counts(&self) -> Result<(usize, usize), StoreError> {
        let conn = self.conn();
        let mut counts = [0usize; 2];
        for (slot, bucket) in counts.iter_mut().zip([ROOMS_BUCKET, EXITS_BUCKET]) {
            if bucket_exists(&conn, bucket)? {
                let n: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM \"{bucket}\""),
                    [],
                    |row| row.get(0),
                )?;
                *slot = n as usize;
            }
        }
        Ok((counts[0], counts[1]))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Composite key of an exit row.
pub fn exit_key(room: RoomId, direction: &str) -> String {
    format!("{room}_{direction}")
}

/// Room that owns an exit row: the key prefix before the first `_`.
fn owning_room(key: &str) -> Result<RoomId, StoreError> {
    let (prefix, _direction) = key
        .split_once('_')
        .ok_or_else(|| StoreError::BadExitKey(key.to_string()))?;
    prefix
        .parse::<i64>()
        .map(RoomId)
        .map_err(|_| StoreError::BadExitKey(key.to_string()))
}

fn bucket_exists(conn: &Connection, bucket: &str) -> Result<bool, StoreError> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![bucket],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn create_buckets(tx: &Transaction<'_>) -> Result<(), StoreError> {
    for bucket in [ROOMS_BUCKET, EXITS_BUCKET] {
        tx.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{bucket}\" (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );"
        ))?;
    }
    Ok(())
}

fn read_bucket(conn: &Connection, bucket: &str) -> Result<Vec<(String, String)>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT key, value FROM \"{bucket}\" ORDER BY key"))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
