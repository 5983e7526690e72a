use anyhow::{bail, Context, Result};
use rusqlite::Connection;

/// Schema scripts in order. Entry `n` takes `user_version` to `n + 1`.
const MIGRATIONS: &[&str] = &[include_str!("schemas/schema_v1.sql")];

pub fn schema_version() -> usize {
    MIGRATIONS.len()
}

/// Apply whatever scripts the file has not seen yet, in one transaction.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let stored: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;
    let applied = usize::try_from(stored).context("user_version is negative")?;

    if applied > schema_version() {
        bail!(
            "history was written by a newer build (schema {applied}, this build knows {})",
            schema_version()
        );
    }
    let pending = &MIGRATIONS[applied..];
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction().context("failed to begin migration")?;
    for (offset, script) in pending.iter().enumerate() {
        let version = applied + offset + 1;
        tx.execute_batch(script)
            .with_context(|| format!("schema {version} failed to apply"))?;
        log::info!("History schema at version {version}");
    }
    tx.pragma_update(None, "user_version", schema_version() as i64)
        .context("failed to record schema version")?;
    tx.commit().context("failed to commit migration")
}
