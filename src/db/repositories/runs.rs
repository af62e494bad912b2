use anyhow::{anyhow, Context, Result};
use rusqlite::{params, OptionalExtension};

use crate::{
    crypto::SealedTrack,
    db::{
        connection::Database,
        helpers::{row_to_record, to_u64},
        models::{RunId, RunRecord},
    },
};

impl Database {
    pub async fn insert_record(&self, sealed: SealedTrack, uploaded: bool) -> Result<RunId> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO records (ciphertext, iv, uploaded) VALUES (?1, ?2, ?3)",
                params![sealed.ciphertext, sealed.iv, uploaded],
            )
            .context("failed to insert record")?;
            Ok(RunId(conn.last_insert_rowid()))
        })
        .await
    }

    /// Overwrites ciphertext, iv and flag of an existing row in one statement.
    pub async fn update_record(&self, record: RunRecord) -> Result<()> {
        self.execute(move |conn| {
            let rows_affected = conn
                .execute(
                    "UPDATE records
                     SET ciphertext = ?1,
                         iv = ?2,
                         uploaded = ?3
                     WHERE id = ?4",
                    params![record.ciphertext, record.iv, record.uploaded, record.id.0],
                )
                .context("failed to update record")?;

            if rows_affected == 0 {
                return Err(anyhow!("Record {} not found", record.id));
            }
            Ok(())
        })
        .await
    }

    /// Returns whether a row was removed.
    pub async fn delete_record(&self, id: RunId) -> Result<bool> {
        self.execute(move |conn| {
            let rows_affected = conn
                .execute("DELETE FROM records WHERE id = ?1", params![id.0])
                .context("failed to delete record")?;
            Ok(rows_affected > 0)
        })
        .await
    }

    pub async fn get_record(&self, id: RunId) -> Result<Option<RunRecord>> {
        self.execute(move |conn| {
            let record = conn
                .query_row(
                    "SELECT id, ciphertext, iv, uploaded FROM records WHERE id = ?1",
                    params![id.0],
                    |row| Ok(row_to_record(row)),
                )
                .optional()?
                .transpose()?;
            Ok(record)
        })
        .await
    }

    pub async fn list_records(&self) -> Result<Vec<RunRecord>> {
        self.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, ciphertext, iv, uploaded FROM records ORDER BY id ASC")?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }

            Ok(records)
        })
        .await
    }

    pub async fn count_records(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(id) FROM records", [], |row| row.get(0))?;
            to_u64(count, "record count")
        })
        .await
    }

    pub async fn last_record(&self) -> Result<Option<RunRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ciphertext, iv, uploaded FROM records ORDER BY id DESC LIMIT 1",
            )?;

            let mut rows = stmt.query([])?;
            let record = match rows.next()? {
                Some(row) => Some(row_to_record(row)?),
                None => None,
            };
            Ok(record)
        })
        .await
    }
}
