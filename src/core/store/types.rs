use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::core::derived::{self, AlertLevel};

/// Failure numbers start with this character; internal ids (lowercase UUIDs) never do.
pub const FAILURE_NUMBER_PREFIX: char = 'F';

/// Statuses that close a failure. Matched exactly, case included.
pub const RESOLVED_STATUSES: &[&str] = &["הושלם", "טופל", "נסגר", "סגור", "resolved", "closed"];

pub fn is_resolved_status(status: &str) -> bool {
    RESOLVED_STATUSES.contains(&status.trim())
}

/// Which key a failure lookup goes through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureRef {
    Id(String),
    Number(String),
}

impl FailureRef {
    pub fn classify(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with(FAILURE_NUMBER_PREFIX) {
            FailureRef::Number(value.to_string())
        } else {
            FailureRef::Id(value.to_string())
        }
    }

    /// `id` wins over `failure_number` when both are given.
    pub fn from_keys(id: Option<&str>, failure_number: Option<&str>) -> Option<Self> {
        id.or(failure_number)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Self::classify)
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            FailureRef::Id(_) => "id",
            FailureRef::Number(_) => "failure_number",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            FailureRef::Id(v) | FailureRef::Number(v) => v,
        }
    }
}

impl std::fmt::Display for FailureRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.column(), self.value())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveFailure {
    pub id: String,
    pub user_id: Option<String>,
    pub failure_number: String,
    pub date: String,
    pub system: String,
    pub description: String,
    pub urgency: i64,
    pub assignee: String,
    pub estimated_hours: f64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFailure {
    pub id: String,
    pub user_id: Option<String>,
    pub failure_number: String,
    pub date: String,
    pub system: String,
    pub description: String,
    pub urgency: i64,
    pub assignee: String,
    pub estimated_hours: f64,
    pub status: String,
    pub created_at: String,
    pub actual_hours: f64,
    pub resolution_method: String,
    pub resolved_date: String,
    pub resolved_by: String,
    pub lessons_learned: String,
}

/// Resolution fields supplied alongside a closing status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolutionDetails {
    #[serde(default)]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub resolution_method: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub lessons_learned: Option<String>,
}

impl ActiveFailure {
    /// Overlay the non-resolution fields of `changes`.
    pub fn apply(&mut self, changes: &FailureChanges) {
        if let Some(v) = &changes.date {
            self.date = v.clone();
        }
        if let Some(v) = &changes.system {
            self.system = v.clone();
        }
        if let Some(v) = &changes.description {
            self.description = v.clone();
        }
        if let Some(v) = changes.urgency {
            self.urgency = v;
        }
        if let Some(v) = &changes.assignee {
            self.assignee = v.clone();
        }
        if let Some(v) = changes.estimated_hours {
            self.estimated_hours = v;
        }
        if let Some(v) = &changes.status {
            self.status = v.clone();
        }
    }
}

impl ResolvedFailure {
    /// Carry every active field over. Missing resolution data defaults to the
    /// original estimate and assignee so the record is usable before backfill.
    pub fn from_active(
        active: ActiveFailure,
        status: &str,
        details: &ResolutionDetails,
        resolved_date: &str,
    ) -> Self {
        Self {
            actual_hours: details.actual_hours.unwrap_or(active.estimated_hours),
            resolution_method: details.resolution_method.clone().unwrap_or_default(),
            resolved_date: resolved_date.to_string(),
            resolved_by: details
                .resolved_by
                .clone()
                .unwrap_or_else(|| active.assignee.clone()),
            lessons_learned: details.lessons_learned.clone().unwrap_or_default(),
            id: active.id,
            user_id: active.user_id,
            failure_number: active.failure_number,
            date: active.date,
            system: active.system,
            description: active.description,
            urgency: active.urgency,
            assignee: active.assignee,
            estimated_hours: active.estimated_hours,
            status: status.to_string(),
            created_at: active.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMaintenance {
    pub id: String,
    pub user_id: Option<String>,
    pub maintenance_type: String,
    pub system: String,
    pub frequency_days: i64,
    pub last_performed: String,
    pub notes: String,
}

/// A maintenance row with its due date computed against a specific instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaintenanceView {
    #[serde(flatten)]
    pub record: PendingMaintenance,
    pub next_due: Option<String>,
    pub days_until_due: Option<i64>,
}

impl PendingMaintenance {
    pub fn with_derived(self, now: DateTime<Utc>) -> MaintenanceView {
        let dates = derived::parse_record_date(&self.last_performed)
            .and_then(|last| derived::maintenance_dates(last, self.frequency_days, now));
        MaintenanceView {
            next_due: dates.map(|d| d.next_due.format("%Y-%m-%d").to_string()),
            days_until_due: dates.map(|d| d.days_until_due),
            record: self,
        }
    }
}

impl MaintenanceView {
    pub fn is_overdue(&self) -> bool {
        self.days_until_due.is_some_and(|d| d < 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentHours {
    pub id: String,
    pub user_id: Option<String>,
    pub system: String,
    pub system_type: String,
    pub current_hours: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquipmentView {
    #[serde(flatten)]
    pub record: EquipmentHours,
    pub next_service_hours: f64,
    pub hours_until_service: f64,
    pub alert_level: AlertLevel,
}

impl EquipmentHours {
    pub fn with_derived(self) -> EquipmentView {
        let status = derived::service_hours(&self.system_type, self.current_hours.max(0.0));
        EquipmentView {
            next_service_hours: status.next_service_hours,
            hours_until_service: status.hours_until_service,
            alert_level: status.alert_level,
            record: self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkSource {
    Failure,
    Maintenance,
    Other,
}

impl WorkSource {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkSource::Failure => "failure",
            WorkSource::Maintenance => "maintenance",
            WorkSource::Other => "other",
        }
    }

    /// Anything unrecognised is filed under `other`.
    pub fn from_label(value: &str) -> Self {
        match value.trim() {
            "failure" | "תקלה" => WorkSource::Failure,
            "maintenance" | "אחזקה" => WorkSource::Maintenance,
            _ => WorkSource::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWorkPlan {
    pub id: String,
    pub user_id: Option<String>,
    pub date: String,
    pub task: String,
    pub source: WorkSource,
    pub source_id: Option<String>,
    pub assignee: String,
    pub estimated_hours: f64,
    pub status: String,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: Option<String>,
    pub meeting_number: i64,
    pub date: String,
    pub topics: Vec<String>,
    pub insights: Vec<String>,
    pub decisions: Vec<String>,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnaItem {
    pub id: String,
    pub user_id: Option<String>,
    pub component_name: String,
    pub current_status: i64,
    pub target_status: i64,
    pub gaps: Vec<String>,
    pub actions: Vec<String>,
    pub notes: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanWeek {
    pub id: String,
    pub user_id: Option<String>,
    pub week_number: i64,
    pub goals: Vec<String>,
    pub actions: Vec<String>,
    pub metrics: Vec<String>,
    pub status: String,
    pub notes: String,
}

/// Result of a find-or-create by natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upserted {
    pub id: String,
    pub created: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContextCounters {
    pub branch: String,
    pub open_failures: usize,
    pub critical_failures: usize,
    pub overdue_maintenance: usize,
    pub equipment_alerts: usize,
    pub history_turns: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub session_id: String,
    pub user_id: Option<String>,
    pub user_message: String,
    pub assistant_response: String,
    pub updated_tables: Vec<String>,
    pub outcome: String,
    pub context: ChatContextCounters,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub google_sub: String,
    pub created_at: String,
}

fn default_urgency() -> i64 {
    1
}

fn default_frequency_days() -> i64 {
    30
}

/// New active failure. A missing `failure_number` is allocated by the store.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FailureDraft {
    #[serde(default)]
    pub failure_number: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub system: String,
    pub description: String,
    #[serde(default = "default_urgency")]
    pub urgency: i64,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub status: Option<String>,
}

/// Field changes for an active failure, plus any resolution details that ride
/// along with a closing status.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FailureChanges {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub urgency: Option<i64>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub resolution_method: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub lessons_learned: Option<String>,
}

impl FailureChanges {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "date", text(&self.date));
        push(&mut out, "system", text(&self.system));
        push(&mut out, "description", text(&self.description));
        push(&mut out, "urgency", self.urgency.map(Value::Integer));
        push(&mut out, "assignee", text(&self.assignee));
        push(&mut out, "estimated_hours", self.estimated_hours.map(Value::Real));
        push(&mut out, "status", text(&self.status));
        out
    }

    pub fn resolution(&self) -> ResolutionDetails {
        ResolutionDetails {
            actual_hours: self.actual_hours,
            resolution_method: self.resolution_method.clone(),
            resolved_by: self.resolved_by.clone(),
            lessons_learned: self.lessons_learned.clone(),
        }
    }
}

/// Backfill for a resolved failure. Never creates a record.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolvedChanges {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub resolution_method: Option<String>,
    #[serde(default)]
    pub resolved_date: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub lessons_learned: Option<String>,
}

impl ResolvedChanges {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "status", text(&self.status));
        push(&mut out, "actual_hours", self.actual_hours.map(Value::Real));
        push(&mut out, "resolution_method", text(&self.resolution_method));
        push(&mut out, "resolved_date", text(&self.resolved_date));
        push(&mut out, "resolved_by", text(&self.resolved_by));
        push(&mut out, "lessons_learned", text(&self.lessons_learned));
        out
    }
}

/// Direct insert into the resolved table, used to repair data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResolvedDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub failure_number: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub system: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_urgency")]
    pub urgency: i64,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub actual_hours: Option<f64>,
    #[serde(default)]
    pub resolution_method: String,
    #[serde(default)]
    pub resolved_date: Option<String>,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub lessons_learned: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MaintenanceDraft {
    pub maintenance_type: String,
    #[serde(default)]
    pub system: String,
    #[serde(default = "default_frequency_days")]
    pub frequency_days: i64,
    #[serde(default)]
    pub last_performed: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MaintenanceChanges {
    #[serde(default)]
    pub maintenance_type: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub frequency_days: Option<i64>,
    #[serde(default)]
    pub last_performed: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MaintenanceChanges {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "maintenance_type", text(&self.maintenance_type));
        push(&mut out, "system", text(&self.system));
        push(&mut out, "frequency_days", self.frequency_days.map(Value::Integer));
        push(&mut out, "last_performed", text(&self.last_performed));
        push(&mut out, "notes", text(&self.notes));
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EquipmentDraft {
    pub system: String,
    #[serde(default)]
    pub system_type: String,
    #[serde(default)]
    pub current_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EquipmentChanges {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub system_type: Option<String>,
    #[serde(default)]
    pub current_hours: Option<f64>,
}

impl EquipmentChanges {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "system", text(&self.system));
        push(&mut out, "system_type", text(&self.system_type));
        push(&mut out, "current_hours", self.current_hours.map(Value::Real));
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DailyWorkDraft {
    #[serde(default)]
    pub date: Option<String>,
    pub task: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DailyWorkChanges {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DailyWorkChanges {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "date", text(&self.date));
        push(&mut out, "task", text(&self.task));
        push(
            &mut out,
            "source",
            self.source
                .as_deref()
                .map(|s| Value::Text(WorkSource::from_label(s).as_str().to_string())),
        );
        push(&mut out, "source_id", text(&self.source_id));
        push(&mut out, "assignee", text(&self.assignee));
        push(&mut out, "estimated_hours", self.estimated_hours.map(Value::Real));
        push(&mut out, "status", text(&self.status));
        push(&mut out, "notes", text(&self.notes));
        out
    }
}

/// Find-or-create payload for a coaching meeting, keyed by `meeting_number`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConversationUpsert {
    pub meeting_number: i64,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub topics: Option<Vec<String>>,
    #[serde(default)]
    pub insights: Option<Vec<String>>,
    #[serde(default)]
    pub decisions: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ConversationUpsert {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "date", text(&self.date));
        push(&mut out, "topics", list(&self.topics));
        push(&mut out, "insights", list(&self.insights));
        push(&mut out, "decisions", list(&self.decisions));
        push(&mut out, "notes", text(&self.notes));
        out
    }
}

/// Find-or-create payload for a DNA component, keyed by `component_name`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DnaUpsert {
    pub component_name: String,
    #[serde(default)]
    pub current_status: Option<i64>,
    #[serde(default)]
    pub target_status: Option<i64>,
    #[serde(default)]
    pub gaps: Option<Vec<String>>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DnaUpsert {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "current_status", self.current_status.map(Value::Integer));
        push(&mut out, "target_status", self.target_status.map(Value::Integer));
        push(&mut out, "gaps", list(&self.gaps));
        push(&mut out, "actions", list(&self.actions));
        push(&mut out, "notes", text(&self.notes));
        out
    }
}

/// Find-or-create payload for a 90-day plan week, keyed by `week_number`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlanWeekUpsert {
    pub week_number: i64,
    #[serde(default)]
    pub goals: Option<Vec<String>>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
    #[serde(default)]
    pub metrics: Option<Vec<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PlanWeekUpsert {
    pub fn columns(&self) -> ColumnChanges {
        let mut out = ColumnChanges::new();
        push(&mut out, "goals", list(&self.goals));
        push(&mut out, "actions", list(&self.actions));
        push(&mut out, "metrics", list(&self.metrics));
        push(&mut out, "status", text(&self.status));
        push(&mut out, "notes", text(&self.notes));
        out
    }
}

/// Column changes for a partial update, in `SET col = ?` order.
pub type ColumnChanges = Vec<(&'static str, Value)>;

fn push(out: &mut ColumnChanges, column: &'static str, value: Option<Value>) {
    if let Some(value) = value {
        out.push((column, value));
    }
}

pub(crate) fn text(v: &Option<String>) -> Option<Value> {
    v.as_ref().map(|s| Value::Text(s.clone()))
}

pub(crate) fn list(v: &Option<Vec<String>>) -> Option<Value> {
    v.as_ref()
        .map(|items| Value::Text(serde_json::to_string(items).unwrap_or_else(|_| "[]".into())))
}

pub(crate) fn decode_list(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

pub(crate) fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
