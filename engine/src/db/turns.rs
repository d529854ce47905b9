/// Conversation turn persistence
///
/// Append-only storage of conversation turns keyed by session id. All queries
/// use parameterized statements. Sequence numbers are assigned inside the
/// INSERT itself so that SQLite's single-writer serialization keeps every
/// session's turn order strict even under concurrent callers.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::time::{SystemTime, UNIX_EPOCH};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            other => anyhow::bail!("Unknown turn role: {}", other),
        }
    }
}

/// One immutable exchange unit within a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: String,
    pub seq: i64,
    pub role: TurnRole,
    pub content: String,
    pub created_at: i64,
}

/// Repository for conversation state
///
/// Sessions are implicit: the first append under a new session id creates it.
/// Different session ids are fully independent.
#[derive(Clone)]
pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    /// Create a new conversation store
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one turn to a session, returning the stored record
    ///
    /// The next sequence number is computed inside the INSERT. If two writers
    /// race on the same session, the UNIQUE(session_id, seq) constraint makes
    /// the loser fail; we retry once, which is enough because SQLite
    /// serializes writes.
    pub async fn append(&self, session_id: &str, role: TurnRole, content: &str) -> Result<Turn> {
        for attempt in 0..2 {
            match self.try_append(session_id, role, content).await {
                Ok(turn) => return Ok(turn),
                Err(e) if attempt == 0 && is_unique_violation(&e) => continue,
                Err(e) => return Err(e).context("Failed to append turn"),
            }
        }
        unreachable!("append retry loop always returns")
    }

    async fn try_append(
        &self,
        session_id: &str,
        role: TurnRole,
        content: &str,
    ) -> std::result::Result<Turn, sqlx::Error> {
        insert_turn(&self.pool, session_id, role, content).await
    }

    /// Append a completed user/assistant exchange atomically
    ///
    /// Called only after synthesis succeeded, so a failed turn is never
    /// recorded, not even partially. Both inserts run inside one transaction:
    /// if the assistant turn fails to store, the user turn rolls back with it
    /// and the session keeps its [user, assistant, ...] shape.
    pub async fn append_exchange(
        &self,
        session_id: &str,
        user_content: &str,
        assistant_content: &str,
    ) -> Result<()> {
        for attempt in 0..2 {
            match self
                .try_append_exchange(session_id, user_content, assistant_content)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if attempt == 0 && is_unique_violation(&e) => continue,
                Err(e) => return Err(e).context("Failed to persist exchange"),
            }
        }
        unreachable!("exchange retry loop always returns")
    }

    async fn try_append_exchange(
        &self,
        session_id: &str,
        user_content: &str,
        assistant_content: &str,
    ) -> std::result::Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        insert_turn(&mut *tx, session_id, TurnRole::User, user_content).await?;
        insert_turn(&mut *tx, session_id, TurnRole::Assistant, assistant_content).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Read all turns of a session in order
    pub async fn read(&self, session_id: &str) -> Result<Vec<Turn>> {
        let rows = sqlx::query(
            "SELECT session_id, seq, role, content, created_at
             FROM turns WHERE session_id = ? ORDER BY seq",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read session turns")?;

        rows.into_iter().map(row_to_turn).collect()
    }

    /// Read the last `limit` turns of a session, in chronological order
    pub async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<Turn>> {
        let rows = sqlx::query(
            "SELECT session_id, seq, role, content, created_at
             FROM turns WHERE session_id = ? ORDER BY seq DESC LIMIT ?",
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read recent turns")?;

        let mut turns: Vec<Turn> = rows
            .into_iter()
            .map(row_to_turn)
            .collect::<Result<Vec<_>>>()?;
        turns.reverse();
        Ok(turns)
    }
}

/// Insert one turn through any SQLite executor (pool or transaction)
async fn insert_turn<'e>(
    executor: impl sqlx::Executor<'e, Database = sqlx::Sqlite>,
    session_id: &str,
    role: TurnRole,
    content: &str,
) -> std::result::Result<Turn, sqlx::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let row = sqlx::query(
        r#"
        INSERT INTO turns (session_id, seq, role, content, created_at)
        VALUES (
            ?1,
            (SELECT COALESCE(MAX(seq) + 1, 0) FROM turns WHERE session_id = ?1),
            ?2, ?3, ?4
        )
        RETURNING seq
        "#,
    )
    .bind(session_id)
    .bind(role.as_str())
    .bind(content)
    .bind(now)
    .fetch_one(executor)
    .await?;

    Ok(Turn {
        session_id: session_id.to_string(),
        seq: row.get("seq"),
        role,
        content: content.to_string(),
        created_at: now,
    })
}

fn row_to_turn(row: sqlx::sqlite::SqliteRow) -> Result<Turn> {
    let role: String = row.get("role");
    Ok(Turn {
        session_id: row.get("session_id"),
        seq: row.get("seq"),
        role: TurnRole::parse(&role)?,
        content: row.get("content"),
        created_at: row.get("created_at"),
    })
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("UNIQUE"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, ConversationStore) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("test.db")).await.unwrap();
        let store = db.conversations();
        (temp_dir, store)
    }

    #[tokio::test]
    async fn test_append_assigns_sequential_seq() {
        let (_tmp, store) = setup().await;

        let t0 = store.append("s1", TurnRole::User, "Q1").await.unwrap();
        let t1 = store.append("s1", TurnRole::Assistant, "A1").await.unwrap();

        assert_eq!(t0.seq, 0);
        assert_eq!(t1.seq, 1);
    }

    #[tokio::test]
    async fn test_read_returns_turns_in_order() {
        let (_tmp, store) = setup().await;

        store.append_exchange("s1", "Q1", "A1").await.unwrap();
        store.append_exchange("s1", "Q2", "A2").await.unwrap();

        let turns = store.read("s1").await.unwrap();
        let contents: Vec<&str> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["Q1", "A1", "Q2", "A2"]);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn test_failed_exchange_leaves_no_partial_record() {
        let (_tmp, store) = setup().await;

        // Simulate a storage failure between the two inserts of an exchange:
        // the user turn goes in, then the assistant insert errors (here via
        // the role CHECK constraint) and the transaction is dropped.
        let mut tx = store.pool.begin().await.unwrap();
        insert_turn(&mut *tx, "s1", TurnRole::User, "Q1").await.unwrap();
        let failed = sqlx::query(
            "INSERT INTO turns (session_id, seq, role, content, created_at)
             VALUES ('s1', 1, 'system', 'A1', 0)",
        )
        .execute(&mut *tx)
        .await;
        assert!(failed.is_err());
        drop(tx);

        // Rollback removed the user turn too; no dangling half-exchange
        let turns = store.read("s1").await.unwrap();
        assert!(turns.is_empty());

        // A subsequent exchange starts cleanly at seq 0
        store.append_exchange("s1", "Q1", "A1").await.unwrap();
        let turns = store.read("s1").await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].seq, 0);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let (_tmp, store) = setup().await;

        store.append_exchange("s1", "Q1", "A1").await.unwrap();
        store.append_exchange("s2", "X1", "Y1").await.unwrap();

        let s1 = store.read("s1").await.unwrap();
        let s2 = store.read("s2").await.unwrap();

        assert_eq!(s1.len(), 2);
        assert_eq!(s2.len(), 2);
        assert!(s1.iter().all(|t| t.session_id == "s1"));
        assert!(s2.iter().all(|t| t.session_id == "s2"));
        // Each session numbers its turns from zero
        assert_eq!(s2[0].seq, 0);
    }

    #[tokio::test]
    async fn test_read_unknown_session_is_empty() {
        let (_tmp, store) = setup().await;
        let turns = store.read("nope").await.unwrap();
        assert!(turns.is_empty());
    }

    #[tokio::test]
    async fn test_recent_windows_history() {
        let (_tmp, store) = setup().await;

        for i in 0..5 {
            store
                .append("s1", TurnRole::User, &format!("Q{}", i))
                .await
                .unwrap();
        }

        let recent = store.recent("s1", 2).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["Q3", "Q4"]);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!(TurnRole::parse("user").unwrap(), TurnRole::User);
        assert_eq!(TurnRole::parse("assistant").unwrap(), TurnRole::Assistant);
        assert!(TurnRole::parse("system").is_err());
    }
}
