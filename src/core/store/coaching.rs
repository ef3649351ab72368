//! Coaching records: meetings, DNA components and the 90-day plan.
//!
//! All three are addressed by a natural key per user rather than by id, and
//! "add" means find-or-create.

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params};

use super::types::{
    ColumnChanges, Conversation, ConversationUpsert, DnaItem, DnaUpsert, PlanWeek, PlanWeekUpsert,
    Upserted, decode_list,
};
use super::{Store, delete_scoped, insert_row, new_id, now_rfc3339, update_scoped};

/// Update the row owned by `user_id` whose `key_column` equals `key`, or
/// insert a fresh one. Columns not in `changes` keep their stored value on
/// update and take the schema default on insert.
fn upsert_by_natural_key(
    db: &Connection,
    table: &str,
    key_column: &'static str,
    key: Value,
    user_id: &str,
    changes: ColumnChanges,
) -> Result<Upserted> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ?1 AND user_id = ?2",
        table, key_column
    );
    let existing: Option<String> = db
        .query_row(&sql, params![key, user_id], |row| row.get(0))
        .optional()?;

    match existing {
        Some(id) => {
            update_scoped(db, table, "id", Value::Text(id.clone()), user_id, &changes)?;
            Ok(Upserted { id, created: false })
        }
        None => {
            let id = new_id();
            let mut columns: ColumnChanges = vec![
                ("id", Value::Text(id.clone())),
                ("user_id", Value::Text(user_id.to_string())),
                (key_column, key),
            ];
            columns.extend(changes);
            insert_row(db, table, &columns)?;
            Ok(Upserted { id, created: true })
        }
    }
}

impl Store {
    pub async fn upsert_conversation(
        &self,
        user_id: &str,
        upsert: &ConversationUpsert,
    ) -> Result<Upserted> {
        let db = self.db.lock().await;
        upsert_by_natural_key(
            &db,
            "conversations",
            "meeting_number",
            Value::Integer(upsert.meeting_number),
            user_id,
            upsert.columns(),
        )
    }

    pub async fn upsert_dna_item(&self, user_id: &str, upsert: &DnaUpsert) -> Result<Upserted> {
        let mut changes = upsert.columns();
        changes.push(("updated_at", Value::Text(now_rfc3339())));
        let db = self.db.lock().await;
        upsert_by_natural_key(
            &db,
            "dna_items",
            "component_name",
            Value::Text(upsert.component_name.trim().to_string()),
            user_id,
            changes,
        )
    }

    pub async fn upsert_plan_week(&self, user_id: &str, upsert: &PlanWeekUpsert) -> Result<Upserted> {
        let db = self.db.lock().await;
        upsert_by_natural_key(
            &db,
            "ninety_day_plan",
            "week_number",
            Value::Integer(upsert.week_number),
            user_id,
            upsert.columns(),
        )
    }

    pub async fn delete_conversation(&self, user_id: &str, meeting_number: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = delete_scoped(
            &db,
            "conversations",
            "meeting_number",
            Value::Integer(meeting_number),
            user_id,
        )?;
        Ok(rows > 0)
    }

    pub async fn delete_dna_item(&self, user_id: &str, component_name: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = delete_scoped(
            &db,
            "dna_items",
            "component_name",
            Value::Text(component_name.trim().to_string()),
            user_id,
        )?;
        Ok(rows > 0)
    }

    pub async fn delete_plan_week(&self, user_id: &str, week_number: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = delete_scoped(
            &db,
            "ninety_day_plan",
            "week_number",
            Value::Integer(week_number),
            user_id,
        )?;
        Ok(rows > 0)
    }

    /// Most recent meetings first. `None` returns all of them.
    pub async fn list_conversations(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Conversation>> {
        let db = self.db.lock().await;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = db.prepare(
            "SELECT id, user_id, meeting_number, date, topics, insights, decisions, notes
             FROM conversations WHERE user_id = ?1
             ORDER BY meeting_number DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![user_id, limit], |row| {
            Ok(Conversation {
                id: row.get(0)?,
                user_id: row.get(1)?,
                meeting_number: row.get(2)?,
                date: row.get(3)?,
                topics: decode_list(row.get(4)?),
                insights: decode_list(row.get(5)?),
                decisions: decode_list(row.get(6)?),
                notes: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub async fn list_dna_items(&self, user_id: &str) -> Result<Vec<DnaItem>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, component_name, current_status, target_status, gaps, actions,
                    notes, updated_at
             FROM dna_items WHERE user_id = ?1 ORDER BY component_name",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(DnaItem {
                id: row.get(0)?,
                user_id: row.get(1)?,
                component_name: row.get(2)?,
                current_status: row.get(3)?,
                target_status: row.get(4)?,
                gaps: decode_list(row.get(5)?),
                actions: decode_list(row.get(6)?),
                notes: row.get(7)?,
                updated_at: row.get(8)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Plan weeks in week order.
    pub async fn list_plan_weeks(&self, user_id: &str) -> Result<Vec<PlanWeek>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, week_number, goals, actions, metrics, status, notes
             FROM ninety_day_plan WHERE user_id = ?1 ORDER BY week_number ASC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(PlanWeek {
                id: row.get(0)?,
                user_id: row.get(1)?,
                week_number: row.get(2)?,
                goals: decode_list(row.get(3)?),
                actions: decode_list(row.get(4)?),
                metrics: decode_list(row.get(5)?),
                status: row.get(6)?,
                notes: row.get(7)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    #[tokio::test]
    async fn dna_upsert_keeps_one_record_per_component() {
        let store = test_store();
        let first = store
            .upsert_dna_item(
                "u1",
                &DnaUpsert {
                    component_name: "משמעת תחזוקה".into(),
                    current_status: Some(2),
                    gaps: Some(vec!["תיעוד".into()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = store
            .upsert_dna_item(
                "u1",
                &DnaUpsert {
                    component_name: "משמעת תחזוקה".into(),
                    current_status: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let items = store.list_dna_items("u1").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].current_status, 3);
        // Untouched columns survive the second upsert.
        assert_eq!(items[0].gaps, vec!["תיעוד".to_string()]);
        assert_eq!(items[0].target_status, 5);
    }

    #[tokio::test]
    async fn same_natural_key_is_separate_per_user() {
        let store = test_store();
        let upsert = PlanWeekUpsert {
            week_number: 1,
            goals: Some(vec!["מיפוי".into()]),
            ..Default::default()
        };
        let a = store.upsert_plan_week("u1", &upsert).await.unwrap();
        let b = store.upsert_plan_week("u2", &upsert).await.unwrap();
        assert_ne!(a.id, b.id);
        assert!(b.created);
    }

    #[tokio::test]
    async fn plan_weeks_come_back_in_week_order() {
        let store = test_store();
        for week in [3, 1, 2] {
            store
                .upsert_plan_week(
                    "u1",
                    &PlanWeekUpsert {
                        week_number: week,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let weeks: Vec<i64> = store
            .list_plan_weeks("u1")
            .await
            .unwrap()
            .iter()
            .map(|w| w.week_number)
            .collect();
        assert_eq!(weeks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn conversation_limit_returns_latest_meetings() {
        let store = test_store();
        for n in 1..=7 {
            store
                .upsert_conversation(
                    "u1",
                    &ConversationUpsert {
                        meeting_number: n,
                        topics: Some(vec![format!("נושא {}", n)]),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let latest = store.list_conversations("u1", Some(5)).await.unwrap();
        assert_eq!(latest.len(), 5);
        assert_eq!(latest[0].meeting_number, 7);
        assert_eq!(latest[4].meeting_number, 3);
        assert_eq!(store.list_conversations("u1", None).await.unwrap().len(), 7);
    }

    #[tokio::test]
    async fn delete_by_natural_key() {
        let store = test_store();
        store
            .upsert_conversation(
                "u1",
                &ConversationUpsert {
                    meeting_number: 4,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!store.delete_conversation("u2", 4).await.unwrap());
        assert!(store.delete_conversation("u1", 4).await.unwrap());
        assert!(!store.delete_conversation("u1", 4).await.unwrap());
    }
}
