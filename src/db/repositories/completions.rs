use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_uuid, to_u32},
};
use crate::models::CompletionEvent;
use crate::session::SessionStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub sessions: u64,
    pub total_xp: u64,
}

fn row_to_completion(row: &Row) -> Result<CompletionEvent> {
    let session_id: String = row.get("session_id")?;
    let xp: i64 = row.get("xp")?;
    let completed_at: String = row.get("completed_at")?;

    Ok(CompletionEvent {
        session_id: parse_uuid(&session_id, "session_id")?,
        practice_id: row.get("practice_id")?,
        title: row.get("title")?,
        xp: to_u32(xp, "xp")?,
        completed_at: parse_datetime(&completed_at, "completed_at")?,
    })
}

/// `INSERT OR IGNORE` keyed on the session id; `false` means a repeat.
pub(crate) fn insert(conn: &Connection, event: &CompletionEvent) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT OR IGNORE INTO completed_sessions
                (session_id, practice_id, title, xp, completed_at, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.session_id.to_string(),
                event.practice_id,
                event.title,
                event.xp,
                event.completed_at.to_rfc3339(),
                Utc::now().to_rfc3339(),
            ],
        )
        .context("failed to insert completed session")?;
    Ok(inserted == 1)
}

pub(crate) fn list(conn: &Connection, limit: usize) -> Result<Vec<CompletionEvent>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare_cached(
        "SELECT session_id, practice_id, title, xp, completed_at
         FROM completed_sessions
         ORDER BY completed_at DESC, id DESC
         LIMIT ?1",
    )?;

    let mut rows = stmt.query(params![limit])?;
    let mut completions = Vec::new();
    while let Some(row) = rows.next()? {
        completions.push(row_to_completion(row)?);
    }
    Ok(completions)
}

pub(crate) fn summary(conn: &Connection) -> Result<CompletionSummary> {
    let (sessions, total_xp): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(xp), 0) FROM completed_sessions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(CompletionSummary {
        sessions: sessions.max(0) as u64,
        total_xp: total_xp.max(0) as u64,
    })
}

#[async_trait]
impl SessionStore for Database {
    async fn record_completion(&self, event: &CompletionEvent) -> Result<()> {
        if !self.insert_completion(event).await? {
            log::warn!("completion for session {} already recorded", event.session_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn event(title: &str, xp: u32, minutes: i64) -> CompletionEvent {
        CompletionEvent {
            session_id: Uuid::new_v4(),
            practice_id: title.to_lowercase().replace(' ', "-"),
            title: title.to_string(),
            xp,
            completed_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn records_and_lists_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("stillpoint.db")).unwrap();

        db.record_completion(&event("Quick Calm", 35, 0)).await.unwrap();
        db.record_completion(&event("Witness", 50, 10)).await.unwrap();

        let listed = db.list_completions(10).await.unwrap();
        let titles: Vec<_> = listed.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Witness", "Quick Calm"]);
        assert_eq!(db.total_xp().await.unwrap(), 85);
    }

    #[tokio::test]
    async fn duplicate_session_is_stored_once() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("stillpoint.db")).unwrap();
        let completion = event("Quick Calm", 35, 0);

        assert!(db.insert_completion(&completion).await.unwrap());
        assert!(!db.insert_completion(&completion).await.unwrap());
        db.record_completion(&completion).await.unwrap();

        let summary = db.completion_summary().await.unwrap();
        assert_eq!(summary, CompletionSummary { sessions: 1, total_xp: 35 });
    }

    #[test]
    fn queries_work_on_a_bare_connection() {
        let mut conn = Connection::open_in_memory().unwrap();
        crate::db::migrations::migrate(&mut conn).unwrap();

        assert_eq!(summary(&conn).unwrap(), CompletionSummary::default());
        assert!(insert(&conn, &event("Free Write", 25, 0)).unwrap());
        assert_eq!(list(&conn, 0).unwrap().len(), 0);
        assert_eq!(list(&conn, 3).unwrap()[0].xp, 25);
    }

    #[tokio::test]
    async fn reopening_keeps_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stillpoint.db");
        {
            let db = Database::new(path.clone()).unwrap();
            db.record_completion(&event("Presence", 20, 0)).await.unwrap();
        }
        let db = Database::new(path).unwrap();
        assert_eq!(db.list_completions(5).await.unwrap().len(), 1);
    }
}
