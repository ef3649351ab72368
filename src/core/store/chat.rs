use anyhow::Result;
use rusqlite::params;

use super::types::{ChatRecord, decode_list, encode_list};
use super::Store;

impl Store {
    /// Append one turn. Chat records are never updated afterwards.
    pub async fn append_chat_record(&self, record: &ChatRecord) -> Result<()> {
        let context_json = serde_json::to_string(&record.context)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO chat_history (id, session_id, user_id, user_message, assistant_response,
                updated_tables, outcome, context_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.session_id,
                record.user_id,
                record.user_message,
                record.assistant_response,
                encode_list(&record.updated_tables),
                record.outcome,
                context_json,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    /// Turns of one session in the order they happened.
    pub async fn list_chat_records(
        &self,
        session_id: &str,
        user_id: Option<&str>,
    ) -> Result<Vec<ChatRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, session_id, user_id, user_message, assistant_response, updated_tables,
                    outcome, context_json, created_at
             FROM chat_history WHERE session_id = ?1 AND user_id IS ?2 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![session_id, user_id], |row| {
            let context_json: String = row.get(7)?;
            Ok(ChatRecord {
                id: row.get(0)?,
                session_id: row.get(1)?,
                user_id: row.get(2)?,
                user_message: row.get(3)?,
                assistant_response: row.get(4)?,
                updated_tables: decode_list(row.get(5)?),
                outcome: row.get(6)?,
                context: serde_json::from_str(&context_json).unwrap_or_default(),
                created_at: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn count_chat_turns(&self, session_id: &str, user_id: Option<&str>) -> Result<usize> {
        let db = self.db.lock().await;
        let count: i64 = db.query_row(
            "SELECT COUNT(*) FROM chat_history WHERE session_id = ?1 AND user_id IS ?2",
            params![session_id, user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::super::types::ChatContextCounters;
    use super::*;

    fn record(session: &str, user: Option<&str>, message: &str) -> ChatRecord {
        ChatRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session.to_string(),
            user_id: user.map(str::to_string),
            user_message: message.to_string(),
            assistant_response: "בסדר".to_string(),
            updated_tables: vec!["תקלות פעילות".to_string()],
            outcome: "persisted".to_string(),
            context: ChatContextCounters {
                branch: "warm".to_string(),
                open_failures: 2,
                ..Default::default()
            },
            created_at: "2026-05-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn records_are_scoped_by_session_and_user() {
        let store = test_store();
        store.append_chat_record(&record("s1", Some("u1"), "שלום")).await.unwrap();
        store.append_chat_record(&record("s1", Some("u1"), "מה המצב")).await.unwrap();
        store.append_chat_record(&record("s1", Some("u2"), "זר")).await.unwrap();
        store.append_chat_record(&record("s2", None, "אנונימי")).await.unwrap();

        let turns = store.list_chat_records("s1", Some("u1")).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].user_message, "שלום");
        assert_eq!(turns[1].context.open_failures, 2);
        assert_eq!(turns[1].updated_tables, vec!["תקלות פעילות".to_string()]);

        assert_eq!(store.count_chat_turns("s1", Some("u2")).await.unwrap(), 1);
        assert_eq!(store.count_chat_turns("s2", None).await.unwrap(), 1);
        assert_eq!(store.count_chat_turns("s3", Some("u1")).await.unwrap(), 0);
    }
}
