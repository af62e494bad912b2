use std::convert::TryFrom;

use anyhow::{anyhow, Result};
use rusqlite::Row;

use crate::db::models::{RunId, RunRecord};

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn row_to_record(row: &Row) -> Result<RunRecord> {
    Ok(RunRecord {
        id: RunId(row.get("id")?),
        ciphertext: row.get("ciphertext")?,
        iv: row.get("iv")?,
        uploaded: row.get("uploaded")?,
    })
}
