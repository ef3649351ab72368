use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::params;

use crate::core::derived::MAX_FREQUENCY_DAYS;

use super::types::{MaintenanceChanges, MaintenanceDraft, MaintenanceView, PendingMaintenance};
use super::{Store, delete_scoped, new_id, today, update_scoped};

impl Store {
    /// All maintenance items with due dates computed against `now`.
    pub async fn list_maintenance(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MaintenanceView>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, maintenance_type, system, frequency_days, last_performed, notes
             FROM pending_maintenance WHERE user_id = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(PendingMaintenance {
                id: row.get(0)?,
                user_id: row.get(1)?,
                maintenance_type: row.get(2)?,
                system: row.get(3)?,
                frequency_days: row.get(4)?,
                last_performed: row.get(5)?,
                notes: row.get(6)?,
            })
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?.with_derived(now));
        }
        items.sort_by_key(|item| item.days_until_due.unwrap_or(i64::MAX));
        Ok(items)
    }

    pub async fn insert_maintenance(
        &self,
        user_id: &str,
        draft: MaintenanceDraft,
    ) -> Result<PendingMaintenance> {
        let record = PendingMaintenance {
            id: new_id(),
            user_id: Some(user_id.to_string()),
            maintenance_type: draft.maintenance_type,
            system: draft.system,
            frequency_days: draft.frequency_days.clamp(1, MAX_FREQUENCY_DAYS),
            last_performed: draft.last_performed.unwrap_or_else(today),
            notes: draft.notes,
        };
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO pending_maintenance
                (id, user_id, maintenance_type, system, frequency_days, last_performed, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id,
                record.user_id,
                record.maintenance_type,
                record.system,
                record.frequency_days,
                record.last_performed,
                record.notes,
            ],
        )?;
        Ok(record)
    }

    pub async fn update_maintenance(
        &self,
        user_id: &str,
        id: &str,
        changes: &MaintenanceChanges,
    ) -> Result<usize> {
        let db = self.db.lock().await;
        update_scoped(
            &db,
            "pending_maintenance",
            "id",
            Value::Text(id.to_string()),
            user_id,
            &changes.columns(),
        )
    }

    pub async fn delete_maintenance(&self, user_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = delete_scoped(
            &db,
            "pending_maintenance",
            "id",
            Value::Text(id.to_string()),
            user_id,
        )?;
        Ok(rows > 0)
    }
}
