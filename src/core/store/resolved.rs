use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Row, params};

use super::types::{FailureRef, ResolvedChanges, ResolvedDraft, ResolvedFailure};
use super::{Store, new_id, now_rfc3339, today, update_scoped};

pub(crate) const RESOLVED_COLUMNS: &str = "id, user_id, failure_number, date, system, description, \
     urgency, assignee, estimated_hours, status, created_at, actual_hours, resolution_method, \
     resolved_date, resolved_by, lessons_learned";

pub(crate) fn row_to_resolved(row: &Row) -> rusqlite::Result<ResolvedFailure> {
    Ok(ResolvedFailure {
        id: row.get(0)?,
        user_id: row.get(1)?,
        failure_number: row.get(2)?,
        date: row.get(3)?,
        system: row.get(4)?,
        description: row.get(5)?,
        urgency: row.get(6)?,
        assignee: row.get(7)?,
        estimated_hours: row.get(8)?,
        status: row.get(9)?,
        created_at: row.get(10)?,
        actual_hours: row.get(11)?,
        resolution_method: row.get(12)?,
        resolved_date: row.get(13)?,
        resolved_by: row.get(14)?,
        lessons_learned: row.get(15)?,
    })
}

impl Store {
    pub async fn list_resolved_failures(&self, user_id: &str) -> Result<Vec<ResolvedFailure>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM resolved_failures WHERE user_id = ?1
             ORDER BY resolved_date DESC, rowid DESC",
            RESOLVED_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], row_to_resolved)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Backfill resolution details. Returns rows matched; never inserts.
    pub async fn update_resolved_failure(
        &self,
        user_id: &str,
        key: &FailureRef,
        changes: &ResolvedChanges,
    ) -> Result<usize> {
        let db = self.db.lock().await;
        update_scoped(
            &db,
            "resolved_failures",
            key.column(),
            Value::Text(key.value().to_string()),
            user_id,
            &changes.columns(),
        )
    }

    /// Direct insert used for data repair. An existing id is left untouched.
    pub async fn insert_resolved_failure(
        &self,
        user_id: &str,
        draft: ResolvedDraft,
    ) -> Result<Option<ResolvedFailure>> {
        let db = self.db.lock().await;
        let record = ResolvedFailure {
            id: draft.id.unwrap_or_else(new_id),
            user_id: Some(user_id.to_string()),
            failure_number: draft.failure_number,
            date: draft.date.unwrap_or_else(today),
            system: draft.system,
            description: draft.description,
            urgency: draft.urgency.clamp(1, 5),
            resolved_by: draft.resolved_by.unwrap_or_else(|| draft.assignee.clone()),
            assignee: draft.assignee,
            actual_hours: draft.actual_hours.unwrap_or(draft.estimated_hours),
            estimated_hours: draft.estimated_hours,
            status: draft.status.unwrap_or_else(|| "הושלם".to_string()),
            created_at: now_rfc3339(),
            resolution_method: draft.resolution_method,
            resolved_date: draft.resolved_date.unwrap_or_else(today),
            lessons_learned: draft.lessons_learned,
        };
        let inserted = db.execute(
            "INSERT OR IGNORE INTO resolved_failures (id, user_id, failure_number, date, system,
                description, urgency, assignee, estimated_hours, status, created_at,
                actual_hours, resolution_method, resolved_date, resolved_by, lessons_learned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.id,
                record.user_id,
                record.failure_number,
                record.date,
                record.system,
                record.description,
                record.urgency,
                record.assignee,
                record.estimated_hours,
                record.status,
                record.created_at,
                record.actual_hours,
                record.resolution_method,
                record.resolved_date,
                record.resolved_by,
                record.lessons_learned,
            ],
        )?;
        Ok((inserted > 0).then_some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::super::types::{FailureChanges, FailureDraft, ResolutionDetails};
    use super::*;

    #[tokio::test]
    async fn backfill_updates_in_place() {
        let store = test_store();
        store
            .insert_failure(
                "u1",
                FailureDraft {
                    failure_number: Some("F010".into()),
                    description: "משאבה לא עולה".into(),
                    assignee: "אבי".into(),
                    estimated_hours: 2.0,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store
            .resolve_failure(
                "u1",
                &FailureRef::Number("F010".into()),
                "הושלם",
                &FailureChanges::default(),
                &ResolutionDetails::default(),
            )
            .await
            .unwrap();

        let changes = ResolvedChanges {
            actual_hours: Some(4.5),
            resolution_method: Some("החלפת ממסר".into()),
            lessons_learned: Some("לבדוק ממסרים בכל סבב".into()),
            ..Default::default()
        };
        let matched = store
            .update_resolved_failure("u1", &FailureRef::Number("F010".into()), &changes)
            .await
            .unwrap();
        assert_eq!(matched, 1);

        let rows = store.list_resolved_failures("u1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actual_hours, 4.5);
        assert_eq!(rows[0].resolved_by, "אבי");
        assert_eq!(rows[0].resolution_method, "החלפת ממסר");
    }

    #[tokio::test]
    async fn backfill_never_creates() {
        let store = test_store();
        let changes = ResolvedChanges {
            actual_hours: Some(1.0),
            ..Default::default()
        };
        let matched = store
            .update_resolved_failure("u1", &FailureRef::Number("F999".into()), &changes)
            .await
            .unwrap();
        assert_eq!(matched, 0);
        assert!(store.list_resolved_failures("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repair_insert_suppresses_duplicate_ids() {
        let store = test_store();
        let draft = ResolvedDraft {
            id: Some("fixed-id".into()),
            failure_number: "F050".into(),
            estimated_hours: 6.0,
            assignee: "מיכל".into(),
            ..Default::default()
        };
        let first = store
            .insert_resolved_failure("u1", draft.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.actual_hours, 6.0);
        assert_eq!(first.resolved_by, "מיכל");
        assert!(store.insert_resolved_failure("u1", draft).await.unwrap().is_none());
        assert_eq!(store.list_resolved_failures("u1").await.unwrap().len(), 1);
    }
}
