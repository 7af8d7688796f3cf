use rusqlite::{Connection, OptionalExtension};

use stratum_core::{ContentSnapshot, Scope, ScopeKey};

use crate::error::StorageError;
use crate::traits::{ScopeStore, StoredEntry, WriteBatch, WriteOp};

pub struct SqliteScopeStore {
    conn: Connection,
}

impl SqliteScopeStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn entry_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM scope_entries", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Stored BLAKE3 digest of a slot's snapshot bytes, without decoding the snapshot.
    pub fn stored_digest(&self, key: &ScopeKey) -> Result<Option<[u8; 32]>, StorageError> {
        let digest: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT digest FROM scope_entries WHERE scope = ?1 AND scope_key = ?2",
                rusqlite::params![key.scope().as_str(), key.key_str()],
                |row| row.get(0),
            )
            .optional()?;
        digest.map(to_digest).transpose()
    }
}

fn to_digest(v: Vec<u8>) -> Result<[u8; 32], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization("invalid digest length".into()))
}

fn write_op(tx: &rusqlite::Transaction, op: &WriteOp) -> Result<(), StorageError> {
    match op {
        WriteOp::Put(key, entry) => {
            let snapshot_bytes = entry.snapshot.to_msgpack()?;
            let digest = blake3::hash(&snapshot_bytes);
            let superseded_bytes = entry
                .superseded
                .as_ref()
                .map(ContentSnapshot::to_msgpack)
                .transpose()?;
            tx.execute(
                "INSERT INTO scope_entries (scope, scope_key, snapshot, digest, exemptions, superseded) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(scope, scope_key) DO UPDATE SET snapshot = excluded.snapshot, digest = excluded.digest, exemptions = excluded.exemptions, superseded = excluded.superseded, updated_at = excluded.updated_at",
                rusqlite::params![
                    key.scope().as_str(),
                    key.key_str(),
                    snapshot_bytes,
                    digest.as_bytes().as_slice(),
                    entry.encode_exemptions()?,
                    superseded_bytes,
                ],
            )?;
        }
        WriteOp::Remove(key) => {
            tx.execute(
                "DELETE FROM scope_entries WHERE scope = ?1 AND scope_key = ?2",
                rusqlite::params![key.scope().as_str(), key.key_str()],
            )?;
        }
    }
    Ok(())
}

impl ScopeStore for SqliteScopeStore {
    fn get(&self, key: &ScopeKey) -> Result<Option<StoredEntry>, StorageError> {
        let row: Option<(Vec<u8>, Vec<u8>, Option<Vec<u8>>)> = self
            .conn
            .query_row(
                "SELECT snapshot, exemptions, superseded FROM scope_entries WHERE scope = ?1 AND scope_key = ?2",
                rusqlite::params![key.scope().as_str(), key.key_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        match row {
            Some((snapshot_bytes, exemption_bytes, superseded_bytes)) => {
                let snapshot = ContentSnapshot::from_msgpack(&snapshot_bytes)?;
                let exemptions = StoredEntry::decode_exemptions(&exemption_bytes)?;
                let superseded = superseded_bytes
                    .as_deref()
                    .map(ContentSnapshot::from_msgpack)
                    .transpose()?;
                Ok(Some(StoredEntry {
                    snapshot,
                    exemptions,
                    superseded,
                }))
            }
            None => Ok(None),
        }
    }

    fn keys(&self, scope: Scope) -> Result<Vec<ScopeKey>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT scope_key FROM scope_entries WHERE scope = ?1 ORDER BY scope_key")?;
        let rows = stmt.query_map(rusqlite::params![scope.as_str()], |row| {
            let key: String = row.get(0)?;
            Ok(key)
        })?;

        let mut result = Vec::new();
        for row in rows {
            let key = row?;
            result.push(ScopeKey::from_parts(scope, &key)?);
        }
        Ok(result)
    }

    fn apply(&mut self, batch: &WriteBatch) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for op in batch.ops() {
            write_op(&tx, op)?;
        }
        tx.commit()?;
        Ok(())
    }
}
