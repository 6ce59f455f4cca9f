//! Database operations

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use tracing::debug;

use super::models::*;
use crate::error::{Error, Result};

/// Where the derived tables are written.
pub trait TableSink {
    /// Clears the table and writes `table` in its place.
    fn replace_table(&mut self, name: &str, table: &Table) -> Result<()>;

    /// Inserts rows above the existing ones. A wider header replaces a
    /// stored header it extends.
    fn prepend_rows(&mut self, name: &str, table: &Table) -> Result<()>;

    fn read_table(&self, name: &str) -> Result<Option<Table>>;

    fn set_last_sync(&mut self, username: &str, mode: &str) -> Result<()>;
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sheet_columns (
                sheet TEXT PRIMARY KEY,
                columns TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sheet_rows (
                sheet TEXT NOT NULL,
                position INTEGER NOT NULL,
                cells TEXT NOT NULL,
                PRIMARY KEY (sheet, position)
            );

            CREATE TABLE IF NOT EXISTS sync_state (
                username TEXT PRIMARY KEY,
                mode TEXT NOT NULL,
                synced_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    fn now() -> i64 {
        Utc::now().timestamp()
    }

    fn stored_columns(conn: &Connection, name: &str) -> Result<Option<Vec<String>>> {
        let columns: Option<String> = conn
            .query_row(
                "SELECT columns FROM sheet_columns WHERE sheet = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        columns
            .map(|c| serde_json::from_str(&c).map_err(Error::from))
            .transpose()
    }

    fn write_columns(tx: &Transaction, name: &str, columns: &[String]) -> Result<()> {
        tx.execute(
            r#"
            INSERT INTO sheet_columns (sheet, columns, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(sheet) DO UPDATE SET columns = ?2, updated_at = ?3
            "#,
            params![name, serde_json::to_string(columns)?, Self::now()],
        )?;
        Ok(())
    }

    fn write_rows(tx: &Transaction, name: &str, first_position: i64, rows: &[Vec<String>]) -> Result<()> {
        let mut stmt =
            tx.prepare("INSERT INTO sheet_rows (sheet, position, cells) VALUES (?1, ?2, ?3)")?;
        for (position, row) in (first_position..).zip(rows) {
            stmt.execute(params![name, position, serde_json::to_string(row)?])?;
        }
        Ok(())
    }

    pub fn last_sync(&self, username: &str) -> Result<Option<SyncRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT username, mode, synced_at FROM sync_state WHERE username = ?1",
                params![username.to_lowercase()],
                |row| {
                    Ok(SyncRecord {
                        username: row.get(0)?,
                        mode: row.get(1)?,
                        synced_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT sheet FROM sheet_columns ORDER BY sheet")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn count_rows(&self, name: &str) -> Result<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sheet_rows WHERE sheet = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl TableSink for Database {
    fn replace_table(&mut self, name: &str, table: &Table) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM sheet_rows WHERE sheet = ?1", params![name])?;
        Self::write_columns(&tx, name, &table.columns)?;
        Self::write_rows(&tx, name, 0, &table.rows)?;
        tx.commit()?;

        debug!("Replaced {} with {} rows", name, table.rows.len());
        Ok(())
    }

    fn prepend_rows(&mut self, name: &str, table: &Table) -> Result<()> {
        let stored = Self::stored_columns(&self.conn, name)?;
        let columns = match stored {
            None => table.columns.clone(),
            Some(stored) if table.columns.starts_with(&stored) => table.columns.clone(),
            Some(stored) if stored.starts_with(&table.columns) => stored,
            Some(_) => {
                return Err(Error::Table(format!(
                    "cannot prepend to {}: header does not match the stored one",
                    name
                )))
            }
        };

        let tx = self.conn.transaction()?;
        let first: Option<i64> = tx.query_row(
            "SELECT MIN(position) FROM sheet_rows WHERE sheet = ?1",
            params![name],
            |row| row.get(0),
        )?;
        let start = first.unwrap_or(0) - table.rows.len() as i64;
        Self::write_columns(&tx, name, &columns)?;
        Self::write_rows(&tx, name, start, &table.rows)?;
        tx.commit()?;

        debug!("Prepended {} rows to {}", table.rows.len(), name);
        Ok(())
    }

    /// Rows shorter than the header come back padded with empty cells.
    fn read_table(&self, name: &str) -> Result<Option<Table>> {
        let Some(columns) = Self::stored_columns(&self.conn, name)? else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare("SELECT cells FROM sheet_rows WHERE sheet = ?1 ORDER BY position")?;
        let cells = stmt
            .query_map(params![name], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let rows = cells
            .iter()
            .map(|c| -> Result<Vec<String>> {
                let mut row: Vec<String> = serde_json::from_str(c)?;
                if row.len() < columns.len() {
                    row.resize(columns.len(), String::new());
                }
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Table { columns, rows }))
    }

    fn set_last_sync(&mut self, username: &str, mode: &str) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sync_state (username, mode, synced_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(username) DO UPDATE SET mode = ?2, synced_at = ?3
            "#,
            params![username.to_lowercase(), mode, Self::now()],
        )?;
        Ok(())
    }
}
