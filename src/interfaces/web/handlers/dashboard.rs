use axum::{Extension, Json, extract::State};
use chrono::Utc;
use serde::Serialize;

use super::super::AppState;
use super::super::auth::AuthUser;
use super::super::error::ApiResult;
use crate::core::brain::ContextBundle;

const DUE_SOON_DAYS: i64 = 7;

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub open_failures: usize,
    pub critical_failures: usize,
    pub resolved_failures: usize,
    pub overdue_maintenance: usize,
    pub maintenance_due_soon: usize,
    pub equipment_alerts: usize,
    pub todays_tasks: usize,
    pub dna_items: usize,
    pub plan_weeks: usize,
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Dashboard>> {
    let bundle = ContextBundle::gather(&state.store, Some(&user.user_id), &[], Utc::now()).await?;
    let counters = bundle.counters();
    let resolved = state
        .store
        .list_resolved_failures(&user.user_id)
        .await?
        .len();

    Ok(Json(Dashboard {
        open_failures: counters.open_failures,
        critical_failures: counters.critical_failures,
        resolved_failures: resolved,
        overdue_maintenance: counters.overdue_maintenance,
        maintenance_due_soon: bundle
            .maintenance
            .iter()
            .filter(|m| m.days_until_due.is_some_and(|d| (0..=DUE_SOON_DAYS).contains(&d)))
            .count(),
        equipment_alerts: counters.equipment_alerts,
        todays_tasks: bundle.daily_work.len(),
        dna_items: bundle.dna_items.len(),
        plan_weeks: bundle.plan_weeks.len(),
    }))
}
