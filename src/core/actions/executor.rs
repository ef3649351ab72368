use anyhow::Result;
use tracing::{error, info, warn};

use super::types::{Action, ById, FailureUpdate, RawAction, ResolvedUpdate};
use crate::core::store::Store;
use crate::core::store::labels;
use crate::core::store::types::is_resolved_status;

/// What happened to one action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Applied {
        kind: String,
        tables: Vec<&'static str>,
    },
    /// The target record does not exist for this user. Not an error.
    NotFound { kind: String, key: String },
    /// Rejected before touching the store.
    Skipped { kind: String, reason: String },
    /// The store returned an error. Later actions still run.
    Failed { kind: String, error: String },
}

impl ActionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ActionOutcome::Applied { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub outcomes: Vec<ActionOutcome>,
    /// Labels of the tables that were actually mutated, first mention first.
    pub updated_tables: Vec<String>,
}

impl ApplyReport {
    fn record(&mut self, outcome: ActionOutcome) {
        match &outcome {
            ActionOutcome::Applied { kind, tables } => {
                info!("Applied {} ({})", kind, tables.join(", "));
                for table in tables {
                    if !self.updated_tables.iter().any(|t| t == table) {
                        self.updated_tables.push(table.to_string());
                    }
                }
            }
            ActionOutcome::NotFound { kind, key } => {
                warn!("{}: no record matching {}", kind, key)
            }
            ActionOutcome::Skipped { kind, reason } => warn!("Skipping {}: {}", kind, reason),
            ActionOutcome::Failed { kind, error } => error!("{} failed: {}", kind, error),
        }
        self.outcomes.push(outcome);
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_applied()).count()
    }
}

enum Effect {
    Tables(Vec<&'static str>),
    Missing(String),
}

fn touched(rows: usize, table: &'static str, key: impl Into<String>) -> Effect {
    if rows > 0 {
        Effect::Tables(vec![table])
    } else {
        Effect::Missing(key.into())
    }
}

/// Applies parsed actions for one user, in order.
pub struct ActionExecutor<'a> {
    store: &'a Store,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn apply(&self, user_id: &str, actions: &[RawAction]) -> ApplyReport {
        let mut report = ApplyReport::default();
        for raw in actions {
            let action = match Action::from_raw(raw) {
                Ok(action) => action,
                Err(e) => {
                    report.record(ActionOutcome::Skipped {
                        kind: raw.kind.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let outcome = match self.apply_one(user_id, action).await {
                Ok(Effect::Tables(tables)) => ActionOutcome::Applied {
                    kind: raw.kind.clone(),
                    tables,
                },
                Ok(Effect::Missing(key)) => ActionOutcome::NotFound {
                    kind: raw.kind.clone(),
                    key,
                },
                Err(e) => ActionOutcome::Failed {
                    kind: raw.kind.clone(),
                    error: format!("{:#}", e),
                },
            };
            report.record(outcome);
        }
        report
    }

    async fn apply_one(&self, user_id: &str, action: Action) -> Result<Effect> {
        let store = self.store;
        let effect = match action {
            Action::AddFailure(draft) => {
                store.insert_failure(user_id, draft).await?;
                Effect::Tables(vec![labels::ACTIVE_FAILURES])
            }
            Action::UpdateFailure(FailureUpdate { key, changes }) => {
                let Some(key) = key.resolve() else {
                    return Ok(Effect::Missing("<none>".to_string()));
                };
                match changes.status.as_deref() {
                    Some(status) if is_resolved_status(status) => {
                        let status = status.trim().to_string();
                        let resolved = store
                            .resolve_failure(user_id, &key, &status, &changes, &changes.resolution())
                            .await?;
                        match resolved {
                            Some(_) => Effect::Tables(vec![
                                labels::ACTIVE_FAILURES,
                                labels::RESOLVED_FAILURES,
                            ]),
                            None => Effect::Missing(key.to_string()),
                        }
                    }
                    _ => {
                        let rows = store.update_failure(user_id, &key, &changes).await?;
                        touched(rows, labels::ACTIVE_FAILURES, key.to_string())
                    }
                }
            }
            Action::DeleteFailure(key) => {
                let Some(key) = key.resolve() else {
                    return Ok(Effect::Missing("<none>".to_string()));
                };
                let deleted = store.delete_failure(user_id, &key).await?;
                touched(deleted as usize, labels::ACTIVE_FAILURES, key.to_string())
            }
            Action::UpdateResolvedFailure(ResolvedUpdate { key, changes }) => {
                let Some(key) = key.resolve() else {
                    return Ok(Effect::Missing("<none>".to_string()));
                };
                let rows = store.update_resolved_failure(user_id, &key, &changes).await?;
                touched(rows, labels::RESOLVED_FAILURES, key.to_string())
            }

            Action::AddMaintenance(draft) => {
                store.insert_maintenance(user_id, draft).await?;
                Effect::Tables(vec![labels::PENDING_MAINTENANCE])
            }
            Action::UpdateMaintenance(ById { id, changes }) => {
                let rows = store.update_maintenance(user_id, &id, &changes).await?;
                touched(rows, labels::PENDING_MAINTENANCE, format!("id={}", id))
            }
            Action::DeleteMaintenance(key) => {
                let deleted = store.delete_maintenance(user_id, &key.id).await?;
                touched(deleted as usize, labels::PENDING_MAINTENANCE, format!("id={}", key.id))
            }

            Action::AddEquipment(draft) => {
                store.insert_equipment(user_id, draft).await?;
                Effect::Tables(vec![labels::EQUIPMENT_HOURS])
            }
            Action::UpdateEquipment(ById { id, changes }) => {
                let rows = store.update_equipment(user_id, &id, &changes).await?;
                touched(rows, labels::EQUIPMENT_HOURS, format!("id={}", id))
            }
            Action::DeleteEquipment(key) => {
                let deleted = store.delete_equipment(user_id, &key.id).await?;
                touched(deleted as usize, labels::EQUIPMENT_HOURS, format!("id={}", key.id))
            }

            Action::AddDailyWork(draft) => {
                store.insert_daily_work(user_id, draft).await?;
                Effect::Tables(vec![labels::DAILY_WORK])
            }
            Action::UpdateDailyWork(ById { id, changes }) => {
                let rows = store.update_daily_work(user_id, &id, &changes).await?;
                touched(rows, labels::DAILY_WORK, format!("id={}", id))
            }
            Action::DeleteDailyWork(key) => {
                let deleted = store.delete_daily_work(user_id, &key.id).await?;
                touched(deleted as usize, labels::DAILY_WORK, format!("id={}", key.id))
            }

            Action::UpsertConversation(upsert) => {
                store.upsert_conversation(user_id, &upsert).await?;
                Effect::Tables(vec![labels::CONVERSATIONS])
            }
            Action::DeleteConversation(key) => {
                let deleted = store.delete_conversation(user_id, key.meeting_number).await?;
                touched(
                    deleted as usize,
                    labels::CONVERSATIONS,
                    format!("meeting_number={}", key.meeting_number),
                )
            }

            Action::UpsertDnaItem(upsert) => {
                store.upsert_dna_item(user_id, &upsert).await?;
                Effect::Tables(vec![labels::DNA_ITEMS])
            }
            Action::DeleteDnaItem(key) => {
                let deleted = store.delete_dna_item(user_id, &key.component_name).await?;
                touched(
                    deleted as usize,
                    labels::DNA_ITEMS,
                    format!("component_name={}", key.component_name),
                )
            }

            Action::UpsertPlanWeek(upsert) => {
                store.upsert_plan_week(user_id, &upsert).await?;
                Effect::Tables(vec![labels::NINETY_DAY_PLAN])
            }
            Action::DeletePlanWeek(key) => {
                let deleted = store.delete_plan_week(user_id, key.week_number).await?;
                touched(
                    deleted as usize,
                    labels::NINETY_DAY_PLAN,
                    format!("week_number={}", key.week_number),
                )
            }
        };
        Ok(effect)
    }
}
