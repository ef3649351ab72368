use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::params;

use super::types::{EquipmentChanges, EquipmentDraft, EquipmentHours, EquipmentView};
use super::{Store, delete_scoped, new_id, now_rfc3339, update_scoped};

impl Store {
    pub async fn list_equipment(&self, user_id: &str) -> Result<Vec<EquipmentView>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT id, user_id, system, system_type, current_hours, updated_at
             FROM equipment_hours WHERE user_id = ?1 ORDER BY system",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(EquipmentHours {
                id: row.get(0)?,
                user_id: row.get(1)?,
                system: row.get(2)?,
                system_type: row.get(3)?,
                current_hours: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?.with_derived());
        }
        Ok(items)
    }

    pub async fn insert_equipment(&self, user_id: &str, draft: EquipmentDraft) -> Result<EquipmentView> {
        let record = EquipmentHours {
            id: new_id(),
            user_id: Some(user_id.to_string()),
            system: draft.system,
            system_type: draft.system_type,
            current_hours: draft.current_hours.max(0.0),
            updated_at: now_rfc3339(),
        };
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO equipment_hours (id, user_id, system, system_type, current_hours, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.user_id,
                record.system,
                record.system_type,
                record.current_hours,
                record.updated_at,
            ],
        )?;
        Ok(record.with_derived())
    }

    pub async fn update_equipment(
        &self,
        user_id: &str,
        id: &str,
        changes: &EquipmentChanges,
    ) -> Result<usize> {
        let mut columns = changes.columns();
        if !columns.is_empty() {
            columns.push(("updated_at", Value::Text(now_rfc3339())));
        }
        let db = self.db.lock().await;
        update_scoped(
            &db,
            "equipment_hours",
            "id",
            Value::Text(id.to_string()),
            user_id,
            &columns,
        )
    }

    pub async fn delete_equipment(&self, user_id: &str, id: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = delete_scoped(&db, "equipment_hours", "id", Value::Text(id.to_string()), user_id)?;
        Ok(rows > 0)
    }
}
