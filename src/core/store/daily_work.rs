use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::{Row, params};

use super::types::{DailyWorkChanges, DailyWorkDraft, DailyWorkPlan, WorkSource};
use super::{Store, delete_scoped, new_id, today, update_scoped};

const COLUMNS: &str =
    "id, user_id, date, task, source, source_id, assignee, estimated_hours, status, notes";

fn row_to_plan(row: &Row) -> rusqlite::Result<DailyWorkPlan> {
    let source: String = row.get(4)?;
    Ok(DailyWorkPlan {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        task: row.get(3)?,
        source: WorkSource::from_label(&source),
        source_id: row.get(5)?,
        assignee: row.get(6)?,
        estimated_hours: row.get(7)?,
        status: row.get(8)?,
        notes: row.get(9)?,
    })
}

impl Store {
    /// Work items, optionally narrowed to one `YYYY-MM-DD` date.
    pub async fn list_daily_work(
        &self,
        user_id: &str,
        date: Option<&str>,
    ) -> Result<Vec<DailyWorkPlan>> {
        let db = self.db.lock().await;
        let mut out = Vec::new();
        match date {
            Some(date) => {
                let sql = format!(
                    "SELECT {} FROM daily_work_plans WHERE user_id = ?1 AND date = ?2 ORDER BY rowid",
                    COLUMNS
                );
                let mut stmt = db.prepare(&sql)?;
                let rows = stmt.query_map(params![user_id, date], row_to_plan)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM daily_work_plans WHERE user_id = ?1 ORDER BY date DESC, rowid",
                    COLUMNS
                );
                let mut stmt = db.prepare(&sql)?;
                let rows = stmt.query_map(params![user_id], row_to_plan)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    pub async fn insert_daily_work(&self, user_id: &str, draft: DailyWorkDraft) -> Result<DailyWorkPlan> {
        let record = DailyWorkPlan {
            id: new_id(),
            user_id: Some(user_id.to_string()),
            date: draft.date.unwrap_or_else(today),
            task: draft.task,
            source: draft
                .source
                .as_deref()
                .map(WorkSource::from_label)
                .unwrap_or(WorkSource::Other),
            source_id: draft.source_id.filter(|s| !s.trim().is_empty()),
            assignee: draft.assignee,
            estimated_hours: draft.estimated_hours,
            status: draft.status.unwrap_or_else(|| "מתוכנן".to_string()),
            notes: draft.notes,
        };
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO daily_work_plans
                (id, user_id, date, task, source, source_id, assignee, estimated_hours, status, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.user_id,
                record.date,
                record.task,
                record.source.as_str(),
                record.source_id,
                record.assignee,
                record.estimated_hours,
                record.status,
                record.notes,
            ],
        )?;
        Ok(record)
    }

    pub async fn update_daily_work(
        &self,
        user_id: &str,
        id: &str,
        changes: &DailyWorkChanges,
    ) -> Result<usize> {
        let db = self.db.lock().await;
        update_scoped(
            &db,
            "daily_work_plans",
            "id",
            Value::Text(id.to_string()),
            user_id,
            &changes.columns(),
        )
    }

    pub async fn delete_daily_work(&self, user_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = delete_scoped(&db, "daily_work_plans", "id", Value::Text(id.to_string()), user_id)?;
        Ok(rows > 0)
    }
}
