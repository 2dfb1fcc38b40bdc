//! JSON list documents stored in the `kv` table.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Load the JSON list stored under `key`. A missing key is an empty list.
    pub(crate) fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        self.with_conn(|conn| decode_list(read_value(conn, key)?))
    }

    /// Read, modify and write back the list under `key` in one transaction.
    ///
    /// An empty result removes the key entirely.
    pub(crate) fn update_list<T, F>(&self, key: &str, f: F) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>),
    {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut list: Vec<T> = decode_list(read_value(&tx, key)?)?;
            f(&mut list);

            if list.is_empty() {
                tx.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            } else {
                let encoded = serde_json::to_vec(&list)?;
                write_value(&tx, key, &encoded)?;
            }

            tx.commit()?;
            Ok(())
        })
    }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<Vec<u8>>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![key],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()?;
    Ok(value)
}

fn write_value(conn: &Connection, key: &str, value: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at)
         VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        params![key, value],
    )?;
    Ok(())
}

fn decode_list<T: DeserializeOwned>(raw: Option<Vec<u8>>) -> Result<Vec<T>> {
    match raw {
        Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
        _ => Ok(Vec::new()),
    }
}
