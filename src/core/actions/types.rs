use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::derived::{MAX_FREQUENCY_DAYS, frequency_in_range};
use crate::core::store::types::{
    ConversationUpsert, DailyWorkChanges, DailyWorkDraft, DnaUpsert, EquipmentChanges,
    EquipmentDraft, FailureChanges, FailureDraft, FailureRef, MaintenanceChanges,
    MaintenanceDraft, PlanWeekUpsert, ResolvedChanges,
};

/// One coerced parameter value from an action token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Int(i64),
    Float(f64),
    List(Vec<String>),
}

pub type ParamMap = BTreeMap<String, ParamValue>;

/// An action token as it appeared in the reply, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAction {
    /// `VERB_ENTITY` keyword, e.g. `UPDATE_FAILURE`.
    pub kind: String,
    pub params: ParamMap,
}

#[cfg(test)]
impl RawAction {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("{kind}: {reason}")]
    Invalid { kind: String, reason: String },
    #[error("{kind}: missing id or failure_number")]
    MissingKey { kind: String },
}

/// Failure-targeted key. `id` wins over `failure_number`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FailureKey {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub failure_number: Option<String>,
}

impl FailureKey {
    pub fn resolve(&self) -> Option<FailureRef> {
        FailureRef::from_keys(self.id.as_deref(), self.failure_number.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FailureUpdate {
    #[serde(flatten)]
    pub key: FailureKey,
    #[serde(flatten)]
    pub changes: FailureChanges,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResolvedUpdate {
    #[serde(flatten)]
    pub key: FailureKey,
    #[serde(flatten)]
    pub changes: ResolvedChanges,
}

/// Update addressed by internal id.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ById<T> {
    pub id: String,
    #[serde(flatten)]
    pub changes: T,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IdKey {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeetingKey {
    pub meeting_number: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentKey {
    pub component_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeekKey {
    pub week_number: i64,
}

/// Typed form of every action the assistant may request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    #[serde(rename = "ADD_FAILURE")]
    AddFailure(FailureDraft),
    #[serde(rename = "UPDATE_FAILURE")]
    UpdateFailure(FailureUpdate),
    #[serde(rename = "DELETE_FAILURE")]
    DeleteFailure(FailureKey),
    #[serde(rename = "UPDATE_RESOLVED_FAILURE")]
    UpdateResolvedFailure(ResolvedUpdate),

    #[serde(rename = "ADD_MAINTENANCE")]
    AddMaintenance(MaintenanceDraft),
    #[serde(rename = "UPDATE_MAINTENANCE")]
    UpdateMaintenance(ById<MaintenanceChanges>),
    #[serde(rename = "DELETE_MAINTENANCE")]
    DeleteMaintenance(IdKey),

    #[serde(rename = "ADD_EQUIPMENT")]
    AddEquipment(EquipmentDraft),
    #[serde(rename = "UPDATE_EQUIPMENT")]
    UpdateEquipment(ById<EquipmentChanges>),
    #[serde(rename = "DELETE_EQUIPMENT")]
    DeleteEquipment(IdKey),

    #[serde(rename = "ADD_DAILY_WORK")]
    AddDailyWork(DailyWorkDraft),
    #[serde(rename = "UPDATE_DAILY_WORK")]
    UpdateDailyWork(ById<DailyWorkChanges>),
    #[serde(rename = "DELETE_DAILY_WORK")]
    DeleteDailyWork(IdKey),

    #[serde(rename = "ADD_CONVERSATION", alias = "UPDATE_CONVERSATION")]
    UpsertConversation(ConversationUpsert),
    #[serde(rename = "DELETE_CONVERSATION")]
    DeleteConversation(MeetingKey),

    #[serde(rename = "ADD_DNA_ITEM", alias = "UPDATE_DNA_ITEM")]
    UpsertDnaItem(DnaUpsert),
    #[serde(rename = "DELETE_DNA_ITEM")]
    DeleteDnaItem(ComponentKey),

    #[serde(rename = "ADD_90DAY_PLAN", alias = "UPDATE_90DAY_PLAN")]
    UpsertPlanWeek(PlanWeekUpsert),
    #[serde(rename = "DELETE_90DAY_PLAN")]
    DeletePlanWeek(WeekKey),
}

impl Action {
    /// Validate a raw token into a typed action. Unknown kinds, missing
    /// required fields and type mismatches all come back as `Invalid`.
    pub fn from_raw(raw: &RawAction) -> Result<Self, ActionError> {
        let mut object = serde_json::Map::new();
        for (key, value) in &raw.params {
            if key == "action" {
                continue;
            }
            let value = serde_json::to_value(value).map_err(|e| ActionError::Invalid {
                kind: raw.kind.clone(),
                reason: e.to_string(),
            })?;
            object.insert(key.clone(), value);
        }
        object.insert(
            "action".to_string(),
            serde_json::Value::String(raw.kind.clone()),
        );

        let action: Action = serde_json::from_value(serde_json::Value::Object(object)).map_err(
            |e| ActionError::Invalid {
                kind: raw.kind.clone(),
                reason: e.to_string(),
            },
        )?;

        match &action {
            Action::UpdateFailure(FailureUpdate { key, .. })
            | Action::DeleteFailure(key)
            | Action::UpdateResolvedFailure(ResolvedUpdate { key, .. })
                if key.resolve().is_none() =>
            {
                Err(ActionError::MissingKey {
                    kind: raw.kind.clone(),
                })
            }
            // Non-positive frequencies on insert are clamped to one day by the store.
            Action::AddMaintenance(draft) if draft.frequency_days > MAX_FREQUENCY_DAYS => {
                Err(frequency_error(&raw.kind, draft.frequency_days))
            }
            Action::UpdateMaintenance(ById { changes, .. })
                if changes.frequency_days.is_some_and(|f| !frequency_in_range(f)) =>
            {
                Err(frequency_error(
                    &raw.kind,
                    changes.frequency_days.unwrap_or_default(),
                ))
            }
            _ => Ok(action),
        }
    }
}

fn frequency_error(kind: &str, frequency_days: i64) -> ActionError {
    ActionError::Invalid {
        kind: kind.to_string(),
        reason: format!(
            "frequency_days {} is outside 1..={}",
            frequency_days, MAX_FREQUENCY_DAYS
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(kind: &str, params: &[(&str, ParamValue)]) -> RawAction {
        RawAction {
            kind: kind.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn text(s: &str) -> ParamValue {
        ParamValue::Text(s.to_string())
    }

    #[test]
    fn update_failure_carries_status_and_resolution() {
        let action = Action::from_raw(&raw(
            "UPDATE_FAILURE",
            &[
                ("failure_number", text("F004")),
                ("status", text("הושלם")),
                ("actual_hours", ParamValue::Float(2.5)),
            ],
        ))
        .unwrap();
        let Action::UpdateFailure(update) = action else {
            panic!("wrong variant");
        };
        assert_eq!(update.key.resolve(), Some(FailureRef::Number("F004".into())));
        assert_eq!(update.changes.status.as_deref(), Some("הושלם"));
        assert_eq!(update.changes.actual_hours, Some(2.5));
    }

    #[test]
    fn add_failure_requires_description() {
        let err = Action::from_raw(&raw("ADD_FAILURE", &[("system", text("מנוע"))])).unwrap_err();
        assert!(matches!(err, ActionError::Invalid { .. }));
    }

    #[test]
    fn failure_update_without_key_is_rejected() {
        let err = Action::from_raw(&raw("UPDATE_FAILURE", &[("status", text("טופל"))])).unwrap_err();
        assert_eq!(
            err,
            ActionError::MissingKey {
                kind: "UPDATE_FAILURE".into()
            }
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = Action::from_raw(&raw("ADD_SPACESHIP", &[])).unwrap_err();
        assert!(err.to_string().starts_with("ADD_SPACESHIP"));
    }

    #[test]
    fn add_and_update_coaching_share_upsert() {
        let add = Action::from_raw(&raw(
            "ADD_DNA_ITEM",
            &[
                ("component_name", text("שגרות")),
                ("gaps", ParamValue::List(vec!["א".into(), "ב".into()])),
            ],
        ))
        .unwrap();
        let update = Action::from_raw(&raw(
            "UPDATE_DNA_ITEM",
            &[("component_name", text("שגרות")), ("current_status", ParamValue::Int(3))],
        ))
        .unwrap();
        assert!(matches!(add, Action::UpsertDnaItem(_)));
        let Action::UpsertDnaItem(upsert) = update else {
            panic!("wrong variant");
        };
        assert_eq!(upsert.current_status, Some(3));
    }

    #[test]
    fn plan_week_uses_numeric_key() {
        let action = Action::from_raw(&raw(
            "ADD_90DAY_PLAN",
            &[("week_number", ParamValue::Int(2)), ("goals", ParamValue::List(vec!["x".into()]))],
        ))
        .unwrap();
        assert_eq!(
            action,
            Action::UpsertPlanWeek(PlanWeekUpsert {
                week_number: 2,
                goals: Some(vec!["x".into()]),
                ..Default::default()
            })
        );
    }

    #[test]
    fn maintenance_frequency_is_bounded() {
        let huge = Action::from_raw(&raw(
            "ADD_MAINTENANCE",
            &[
                ("maintenance_type", text("שטיפה")),
                ("frequency_days", ParamValue::Int(9_999_999_999_999)),
            ],
        ))
        .unwrap_err();
        assert!(huge.to_string().contains("frequency_days"));

        let ok = Action::from_raw(&raw(
            "ADD_MAINTENANCE",
            &[
                ("maintenance_type", text("שטיפה")),
                ("frequency_days", ParamValue::Int(MAX_FREQUENCY_DAYS)),
            ],
        ));
        assert!(ok.is_ok());

        for bad in [0, -3, MAX_FREQUENCY_DAYS + 1] {
            let err = Action::from_raw(&raw(
                "UPDATE_MAINTENANCE",
                &[("id", text("m1")), ("frequency_days", ParamValue::Int(bad))],
            ));
            assert!(err.is_err(), "accepted {}", bad);
        }
    }

    #[test]
    fn update_by_id_requires_id() {
        let err = Action::from_raw(&raw(
            "UPDATE_EQUIPMENT",
            &[("current_hours", ParamValue::Float(10.0))],
        ))
        .unwrap_err();
        assert!(matches!(err, ActionError::Invalid { .. }));
        let ok = Action::from_raw(&raw(
            "UPDATE_EQUIPMENT",
            &[("id", text("e1")), ("current_hours", ParamValue::Float(10.0))],
        ))
        .unwrap();
        let Action::UpdateEquipment(by_id) = ok else {
            panic!("wrong variant");
        };
        assert_eq!(by_id.changes.current_hours, Some(10.0));
    }
}
