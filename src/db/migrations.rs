use std::cmp::Ordering;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use rusqlite::{params, Connection, Transaction};

use crate::crypto::RecordCipher;

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

fn schema_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read schema version")
}

/// Upgrades the schema one version at a time inside a single transaction,
/// so a failed step leaves the database as it was.
pub fn run_migrations(conn: &mut Connection, cipher: &RecordCipher) -> Result<()> {
    let from = schema_version(conn)?;
    match from.cmp(&CURRENT_SCHEMA_VERSION) {
        Ordering::Equal => return Ok(()),
        Ordering::Greater => bail!(
            "database schema v{from} is newer than this build supports (v{CURRENT_SCHEMA_VERSION})"
        ),
        Ordering::Less => {}
    }

    let tx = conn.transaction().context("failed to begin schema upgrade")?;
    for target in (from + 1)..=CURRENT_SCHEMA_VERSION {
        migrate_to(&tx, target, cipher)
            .with_context(|| format!("upgrade to schema v{target} failed"))?;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to record schema version")?;
    tx.commit().context("failed to commit schema upgrade")?;

    info!("Upgraded database schema from v{from} to v{CURRENT_SCHEMA_VERSION}");
    Ok(())
}

fn migrate_to(tx: &Transaction<'_>, version: i32, cipher: &RecordCipher) -> Result<()> {
    match version {
        1 => tx
            .execute_batch(include_str!("schemas/schema_v1.sql"))
            .context("failed to create records table"),
        2 => bind_uploaded_flag(tx, cipher),
        _ => bail!("no migration defined for schema v{version}"),
    }
}

/// v2: the uploaded flag becomes associated data. Every row written under
/// v1 is opened without AAD and sealed again with the flag bound. Rows that
/// do not open are left as they are.
fn bind_uploaded_flag(tx: &Transaction<'_>, cipher: &RecordCipher) -> Result<()> {
    let rows = {
        let mut stmt = tx.prepare("SELECT id, ciphertext, iv, uploaded FROM records ORDER BY id")?;
        let mapped = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;
        let rows = mapped.collect::<rusqlite::Result<Vec<_>>>()?;
        rows
    };

    let mut migrated = 0usize;
    let mut skipped = 0usize;
    for (id, ciphertext, iv, uploaded) in rows {
        let Some(track) = cipher.decrypt_unbound(&ciphertext, &iv) else {
            warn!("record {id} could not be opened during migration, leaving it unmigrated");
            skipped += 1;
            continue;
        };

        let sealed = cipher.encrypt(&track, uploaded)?;
        tx.execute(
            "UPDATE records SET ciphertext = ?1, iv = ?2 WHERE id = ?3",
            params![sealed.ciphertext, sealed.iv, id],
        )
        .with_context(|| format!("failed to re-encrypt record {id}"))?;
        migrated += 1;
    }

    info!("Re-encrypted {migrated} records with bound upload flag ({skipped} skipped)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::MemoryKeystore,
        track::{Sample, Track},
    };

    fn v1_database(cipher: &RecordCipher, tracks: &[(Track, bool)]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("schemas/schema_v1.sql")).unwrap();
        conn.pragma_update(None, "user_version", 1).unwrap();
        for (track, uploaded) in tracks {
            let sealed = cipher.encrypt_unbound(track).unwrap();
            conn.execute(
                "INSERT INTO records (ciphertext, iv, uploaded) VALUES (?1, ?2, ?3)",
                params![sealed.ciphertext, sealed.iv, uploaded],
            )
            .unwrap();
        }
        conn
    }

    fn track(offset: i64) -> Track {
        vec![
            Sample::new(offset, 30.0, 120.0),
            Sample::new(offset + 60_000, 30.002, 120.0),
        ]
        .into()
    }

    fn stored(conn: &Connection) -> Vec<(Vec<u8>, Vec<u8>, bool)> {
        let mut stmt = conn
            .prepare("SELECT ciphertext, iv, uploaded FROM records ORDER BY id")
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        rows
    }

    #[test]
    fn fresh_database_lands_on_current_version() {
        let cipher = RecordCipher::from_keystore(&MemoryKeystore::new()).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();

        run_migrations(&mut conn, &cipher).unwrap();

        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn v1_rows_are_resealed_with_the_flag_bound() {
        let cipher = RecordCipher::from_keystore(&MemoryKeystore::new()).unwrap();
        let mut conn = v1_database(&cipher, &[(track(0), false), (track(86_400_000), true)]);
        let before = stored(&conn);

        run_migrations(&mut conn, &cipher).unwrap();

        let after = stored(&conn);
        assert_eq!(after.len(), 2);
        for ((old_ct, old_iv, _), (ciphertext, iv, uploaded)) in before.iter().zip(&after) {
            assert_ne!(old_iv, iv);
            assert_ne!(old_ct, ciphertext);
            assert!(cipher.decrypt(ciphertext, iv, *uploaded).is_some());
            assert!(cipher.decrypt(ciphertext, iv, !*uploaded).is_none());
        }
        assert_eq!(cipher.decrypt(&after[1].0, &after[1].1, true), Some(track(86_400_000)));
    }

    #[test]
    fn unreadable_rows_are_left_untouched() {
        let cipher = RecordCipher::from_keystore(&MemoryKeystore::new()).unwrap();
        let mut conn = v1_database(&cipher, &[(track(0), false)]);
        conn.execute(
            "INSERT INTO records (ciphertext, iv, uploaded) VALUES (?1, ?2, 0)",
            params![vec![0u8; 40], vec![1u8; 12]],
        )
        .unwrap();

        run_migrations(&mut conn, &cipher).unwrap();

        let after = stored(&conn);
        assert_eq!(after.len(), 2);
        assert!(cipher.decrypt(&after[0].0, &after[0].1, false).is_some());
        assert_eq!(after[1].0, vec![0u8; 40]);
        assert_eq!(after[1].1, vec![1u8; 12]);
    }

    #[test]
    fn newer_schema_is_refused() {
        let cipher = RecordCipher::from_keystore(&MemoryKeystore::new()).unwrap();
        let mut conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION + 1)
            .unwrap();

        assert!(run_migrations(&mut conn, &cipher).is_err());
    }
}
