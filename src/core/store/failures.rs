use anyhow::{Result, bail};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::{info, warn};

use super::types::{
    ActiveFailure, FAILURE_NUMBER_PREFIX, FailureChanges, FailureDraft, FailureRef,
    ResolutionDetails, ResolvedFailure,
};
use super::{Store, delete_scoped, new_id, now_rfc3339, today, update_scoped};

pub(crate) const ACTIVE_COLUMNS: &str = "id, user_id, failure_number, date, system, description, \
     urgency, assignee, estimated_hours, status, created_at";

const DEFAULT_STATUS: &str = "פתוח";

pub(crate) fn row_to_active(row: &Row) -> rusqlite::Result<ActiveFailure> {
    Ok(ActiveFailure {
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
    })
}

fn find_active(db: &Connection, user_id: &str, key: &FailureRef) -> Result<Option<ActiveFailure>> {
    let sql = format!(
        "SELECT {} FROM active_failures WHERE {} = ?1 AND user_id = ?2",
        ACTIVE_COLUMNS,
        key.column()
    );
    Ok(db
        .query_row(&sql, params![key.value(), user_id], row_to_active)
        .optional()?)
}

/// Next `F###` for this user, counting numbers already moved to the resolved
/// table so a closed number is never handed out twice.
fn next_failure_number(db: &Connection, user_id: &str) -> Result<String> {
    let mut stmt = db.prepare(
        "SELECT failure_number FROM active_failures WHERE user_id = ?1
         UNION ALL
         SELECT failure_number FROM resolved_failures WHERE user_id = ?1",
    )?;
    let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
    let mut highest = 0u64;
    for row in rows {
        let number = row?;
        if let Some(n) = number
            .strip_prefix(FAILURE_NUMBER_PREFIX)
            .and_then(|digits| digits.parse::<u64>().ok())
        {
            highest = highest.max(n);
        }
    }
    Ok(format!("{}{:03}", FAILURE_NUMBER_PREFIX, highest + 1))
}

impl Store {
    pub async fn list_active_failures(&self, user_id: &str) -> Result<Vec<ActiveFailure>> {
        let db = self.db.lock().await;
        let sql = format!(
            "SELECT {} FROM active_failures WHERE user_id = ?1
             ORDER BY urgency DESC, date DESC, rowid DESC",
            ACTIVE_COLUMNS
        );
        let mut stmt = db.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], row_to_active)?;
        let mut failures = Vec::new();
        for row in rows {
            failures.push(row?);
        }
        Ok(failures)
    }

    pub async fn get_active_failure(
        &self,
        user_id: &str,
        key: &FailureRef,
    ) -> Result<Option<ActiveFailure>> {
        let db = self.db.lock().await;
        find_active(&db, user_id, key)
    }

    pub async fn insert_failure(&self, user_id: &str, draft: FailureDraft) -> Result<ActiveFailure> {
        let db = self.db.lock().await;
        let failure_number = match draft.failure_number.map(|n| n.trim().to_string()) {
            Some(number) if !number.is_empty() => number,
            _ => next_failure_number(&db, user_id)?,
        };
        let failure = ActiveFailure {
            id: new_id(),
            user_id: Some(user_id.to_string()),
            failure_number,
            date: draft.date.unwrap_or_else(today),
            system: draft.system,
            description: draft.description,
            urgency: draft.urgency.clamp(1, 5),
            assignee: draft.assignee,
            estimated_hours: draft.estimated_hours,
            status: draft.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            created_at: now_rfc3339(),
        };
        db.execute(
            "INSERT INTO active_failures (id, user_id, failure_number, date, system, description,
                urgency, assignee, estimated_hours, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                failure.id,
                failure.user_id,
                failure.failure_number,
                failure.date,
                failure.system,
                failure.description,
                failure.urgency,
                failure.assignee,
                failure.estimated_hours,
                failure.status,
                failure.created_at,
            ],
        )?;
        info!(
            "Failure {} opened ({})",
            failure.failure_number, failure.system
        );
        Ok(failure)
    }

    /// Plain field update. Returns the number of rows matched.
    pub async fn update_failure(
        &self,
        user_id: &str,
        key: &FailureRef,
        changes: &FailureChanges,
    ) -> Result<usize> {
        let db = self.db.lock().await;
        let mut columns = changes.columns();
        if let Some((_, Value::Integer(urgency))) =
            columns.iter_mut().find(|(name, _)| *name == "urgency")
        {
            *urgency = (*urgency).clamp(1, 5);
        }
        update_scoped(
            &db,
            "active_failures",
            key.column(),
            Value::Text(key.value().to_string()),
            user_id,
            &columns,
        )
    }

    pub async fn delete_failure(&self, user_id: &str, key: &FailureRef) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = delete_scoped(
            &db,
            "active_failures",
            key.column(),
            Value::Text(key.value().to_string()),
            user_id,
        )?;
        Ok(rows > 0)
    }

    /// Move an active failure into the resolved table.
    ///
    /// The resolved row is inserted first and verified before the active row
    /// is removed, all inside one transaction. An existing resolved row with
    /// the same id is kept as is. Returns `None` when no active failure
    /// matches.
    pub async fn resolve_failure(
        &self,
        user_id: &str,
        key: &FailureRef,
        status: &str,
        changes: &FailureChanges,
        details: &ResolutionDetails,
    ) -> Result<Option<ResolvedFailure>> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;

        let Some(mut active) = find_active(&tx, user_id, key)? else {
            return Ok(None);
        };
        active.apply(changes);
        let resolved = ResolvedFailure::from_active(active, status, details, &today());

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO resolved_failures (id, user_id, failure_number, date, system,
                description, urgency, assignee, estimated_hours, status, created_at,
                actual_hours, resolution_method, resolved_date, resolved_by, lessons_learned)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                resolved.id,
                resolved.user_id,
                resolved.failure_number,
                resolved.date,
                resolved.system,
                resolved.description,
                resolved.urgency,
                resolved.assignee,
                resolved.estimated_hours,
                resolved.status,
                resolved.created_at,
                resolved.actual_hours,
                resolved.resolution_method,
                resolved.resolved_date,
                resolved.resolved_by,
                resolved.lessons_learned,
            ],
        )?;
        if inserted == 0 {
            warn!(
                "Resolved record for {} already present, keeping existing row",
                resolved.failure_number
            );
        }

        let stored: Option<ResolvedFailure> = tx
            .query_row(
                &format!(
                    "SELECT {} FROM resolved_failures WHERE id = ?1 AND user_id = ?2",
                    super::resolved::RESOLVED_COLUMNS
                ),
                params![resolved.id, user_id],
                super::resolved::row_to_resolved,
            )
            .optional()?;
        let Some(stored) = stored else {
            bail!(
                "resolved record for {} missing after insert",
                resolved.failure_number
            );
        };

        tx.execute(
            "DELETE FROM active_failures WHERE id = ?1 AND user_id = ?2",
            params![stored.id, user_id],
        )?;
        tx.commit()?;

        info!(
            "Failure {} resolved with status {}",
            stored.failure_number, stored.status
        );
        Ok(Some(stored))
    }

    /// Remove active rows whose id already exists in the resolved table for
    /// the same owner. Covers a move that was interrupted between insert and
    /// delete.
    pub async fn reconcile_resolved(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let removed = db.execute(
            "DELETE FROM active_failures
             WHERE EXISTS (
                SELECT 1 FROM resolved_failures r
                WHERE r.id = active_failures.id AND r.user_id IS active_failures.user_id
             )",
            [],
        )?;
        if removed > 0 {
            warn!("Reconciliation removed {} stale active failure(s)", removed);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_store;
    use super::*;

    fn draft(number: Option<&str>) -> FailureDraft {
        FailureDraft {
            failure_number: number.map(str::to_string),
            system: "מדחס אוויר".to_string(),
            description: "רעש חריג".to_string(),
            urgency: 5,
            assignee: "רון".to_string(),
            estimated_hours: 3.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn allocates_sequential_failure_numbers() {
        let store = test_store();
        let a = store.insert_failure("u1", draft(None)).await.unwrap();
        let b = store.insert_failure("u1", draft(None)).await.unwrap();
        assert_eq!(a.failure_number, "F001");
        assert_eq!(b.failure_number, "F002");
        assert_eq!(a.status, "פתוח");

        let other = store.insert_failure("u2", draft(None)).await.unwrap();
        assert_eq!(other.failure_number, "F001");
    }

    #[tokio::test]
    async fn allocation_skips_resolved_numbers() {
        let store = test_store();
        store.insert_failure("u1", draft(Some("F007"))).await.unwrap();
        store
            .resolve_failure(
                "u1",
                &FailureRef::Number("F007".into()),
                "הושלם",
                &FailureChanges::default(),
                &ResolutionDetails::default(),
            )
            .await
            .unwrap();
        let next = store.insert_failure("u1", draft(None)).await.unwrap();
        assert_eq!(next.failure_number, "F008");
    }

    #[tokio::test]
    async fn lookups_are_scoped_by_user() {
        let store = test_store();
        let f = store.insert_failure("u1", draft(Some("F100"))).await.unwrap();
        let by_id = FailureRef::Id(f.id.clone());
        assert!(store.get_active_failure("u2", &by_id).await.unwrap().is_none());
        assert!(store.get_active_failure("u1", &by_id).await.unwrap().is_some());
        assert!(!store.delete_failure("u2", &by_id).await.unwrap());
        assert_eq!(store.list_active_failures("u2").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn resolve_moves_record_with_same_id() {
        let store = test_store();
        let f = store.insert_failure("u1", draft(Some("F100"))).await.unwrap();
        let resolved = store
            .resolve_failure(
                "u1",
                &FailureRef::Number("F100".into()),
                "טופל",
                &FailureChanges::default(),
                &ResolutionDetails::default(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, f.id);
        assert_eq!(resolved.actual_hours, 3.0);
        assert_eq!(resolved.resolved_by, "רון");
        assert!(store.list_active_failures("u1").await.unwrap().is_empty());
        assert_eq!(store.list_resolved_failures("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_missing_failure_is_none() {
        let store = test_store();
        let out = store
            .resolve_failure(
                "u1",
                &FailureRef::Number("F404".into()),
                "הושלם",
                &FailureChanges::default(),
                &ResolutionDetails::default(),
            )
            .await
            .unwrap();
        assert!(out.is_none());
        assert!(store.list_resolved_failures("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reconcile_removes_interrupted_moves() {
        let store = test_store();
        let f = store.insert_failure("u1", draft(Some("F200"))).await.unwrap();
        {
            // Simulate a move that inserted but never deleted.
            let db = store.get_db();
            let db = db.lock().await;
            db.execute(
                "INSERT INTO resolved_failures (id, user_id, failure_number, date, created_at)
                 VALUES (?1, 'u1', 'F200', '2026-01-01', '2026-01-01T00:00:00Z')",
                params![f.id],
            )
            .unwrap();
        }
        assert_eq!(store.list_active_failures("u1").await.unwrap().len(), 1);
        assert_eq!(store.reconcile_resolved().await.unwrap(), 1);
        assert!(store.list_active_failures("u1").await.unwrap().is_empty());
        assert_eq!(store.reconcile_resolved().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn urgency_is_clamped() {
        let store = test_store();
        let mut d = draft(None);
        d.urgency = 9;
        let f = store.insert_failure("u1", d).await.unwrap();
        assert_eq!(f.urgency, 5);
        let changes = FailureChanges {
            urgency: Some(0),
            ..Default::default()
        };
        store
            .update_failure("u1", &FailureRef::Id(f.id.clone()), &changes)
            .await
            .unwrap();
        let f = store
            .get_active_failure("u1", &FailureRef::Id(f.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(f.urgency, 1);
    }
}
