use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::fmt::Write;
use std::sync::LazyLock;

use super::HistoryTurn;
use crate::core::derived::AlertLevel;
use crate::core::store::Store;
use crate::core::store::types::{
    ActiveFailure, ChatContextCounters, Conversation, DailyWorkPlan, DnaItem, EquipmentView,
    MaintenanceView, PlanWeek,
};

pub const RECENT_CONVERSATIONS: usize = 5;
pub const HISTORY_WINDOW: usize = 6;
pub const CRITICAL_URGENCY: i64 = 4;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:קוראים לי|שמי|תקרא לי|my name is|call me)\s+([^\s,.!?]+)").unwrap()
});

/// Everything the model sees about the user's department on a warm turn.
#[derive(Debug, Default)]
pub struct ContextBundle {
    pub failures: Vec<ActiveFailure>,
    pub maintenance: Vec<MaintenanceView>,
    pub equipment: Vec<EquipmentView>,
    pub daily_work: Vec<DailyWorkPlan>,
    pub conversations: Vec<Conversation>,
    pub dna_items: Vec<DnaItem>,
    pub plan_weeks: Vec<PlanWeek>,
    pub display_name: Option<String>,
}

impl ContextBundle {
    /// Reads only the given user's rows. Without a user the bundle is empty.
    pub async fn gather(
        store: &Store,
        user_id: Option<&str>,
        history: &[HistoryTurn],
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let display_name = display_name_from(history);
        let Some(user_id) = user_id else {
            return Ok(Self {
                display_name,
                ..Default::default()
            });
        };
        let today = now.format("%Y-%m-%d").to_string();
        Ok(Self {
            failures: store.list_active_failures(user_id).await?,
            maintenance: store.list_maintenance(user_id, now).await?,
            equipment: store.list_equipment(user_id).await?,
            daily_work: store.list_daily_work(user_id, Some(&today)).await?,
            conversations: store
                .list_conversations(user_id, Some(RECENT_CONVERSATIONS))
                .await?,
            dna_items: store.list_dna_items(user_id).await?,
            plan_weeks: store.list_plan_weeks(user_id).await?,
            display_name,
        })
    }

    pub fn counters(&self) -> ChatContextCounters {
        ChatContextCounters {
            branch: String::new(),
            open_failures: self.failures.len(),
            critical_failures: self
                .failures
                .iter()
                .filter(|f| f.urgency >= CRITICAL_URGENCY)
                .count(),
            overdue_maintenance: self.maintenance.iter().filter(|m| m.is_overdue()).count(),
            equipment_alerts: self
                .equipment
                .iter()
                .filter(|e| e.alert_level != AlertLevel::Normal)
                .count(),
            history_turns: 0,
        }
    }

    pub fn render_department(&self) -> String {
        let counters = self.counters();
        let mut out = String::new();
        let _ = writeln!(out, "=== מצב המחלקה ===");
        let _ = writeln!(
            out,
            "תקלות פתוחות: {} | קריטיות: {} | אחזקות באיחור: {} | התראות מכלולים: {}",
            counters.open_failures,
            counters.critical_failures,
            counters.overdue_maintenance,
            counters.equipment_alerts
        );

        let _ = writeln!(out, "\n-- תקלות פעילות --");
        if self.failures.is_empty() {
            let _ = writeln!(out, "אין");
        }
        for f in &self.failures {
            let _ = writeln!(
                out,
                "{} | {} | {} | דחיפות {} | אחראי: {} | סטטוס: {}",
                f.failure_number, f.system, f.description, f.urgency, f.assignee, f.status
            );
        }

        let _ = writeln!(out, "\n-- אחזקות ממתינות --");
        if self.maintenance.is_empty() {
            let _ = writeln!(out, "אין");
        }
        for m in &self.maintenance {
            let due = match (&m.next_due, m.days_until_due) {
                (Some(next), Some(days)) => format!("{} ({} ימים)", next, days),
                _ => "לא ידוע".to_string(),
            };
            let _ = writeln!(
                out,
                "{} | {} | כל {} ימים | הבא: {}",
                m.record.maintenance_type, m.record.system, m.record.frequency_days, due
            );
        }

        let _ = writeln!(out, "\n-- שעות מכלולים --");
        if self.equipment.is_empty() {
            let _ = writeln!(out, "אין");
        }
        for e in &self.equipment {
            let _ = writeln!(
                out,
                "{} ({}) | {} ש\"ע | טיפול הבא ב-{} | נותרו {} | {}",
                e.record.system,
                e.record.system_type,
                e.record.current_hours,
                e.next_service_hours,
                e.hours_until_service,
                e.alert_level.as_str()
            );
        }

        let _ = writeln!(out, "\n-- עבודה להיום --");
        if self.daily_work.is_empty() {
            let _ = writeln!(out, "אין");
        }
        for w in &self.daily_work {
            let _ = writeln!(
                out,
                "{} | {} | {} | {}",
                w.task,
                w.source.as_str(),
                w.assignee,
                w.status
            );
        }
        out
    }

    pub fn render_coaching(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== אימון ===");
        for c in &self.conversations {
            let _ = writeln!(
                out,
                "מפגש {} ({}): נושאים: {} | תובנות: {} | החלטות: {}",
                c.meeting_number,
                c.date,
                c.topics.join(", "),
                c.insights.join(", "),
                c.decisions.join(", ")
            );
        }
        for d in &self.dna_items {
            let _ = writeln!(
                out,
                "DNA {}: {}/{} | פערים: {} | פעולות: {}",
                d.component_name,
                d.current_status,
                d.target_status,
                d.gaps.join(", "),
                d.actions.join(", ")
            );
        }
        for w in &self.plan_weeks {
            let _ = writeln!(
                out,
                "שבוע {} [{}]: יעדים: {} | מדדים: {}",
                w.week_number,
                w.status,
                w.goals.join(", "),
                w.metrics.join(", ")
            );
        }
        out
    }
}

/// Latest name the user announced in the conversation, if any.
pub fn display_name_from(history: &[HistoryTurn]) -> Option<String> {
    history
        .iter()
        .rev()
        .filter(|t| t.role == "user")
        .find_map(|t| {
            NAME_RE
                .captures(&t.content)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
}

/// The tail of the history, oldest first.
pub fn recent_history(history: &[HistoryTurn]) -> &[HistoryTurn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(role: &str, content: &str) -> HistoryTurn {
        HistoryTurn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn picks_latest_announced_name() {
        let history = vec![
            turn("user", "שלום, קוראים לי דני"),
            turn("assistant", "נעים מאוד דני"),
            turn("user", "בעצם תקרא לי דן."),
        ];
        assert_eq!(display_name_from(&history).as_deref(), Some("דן"));
        assert_eq!(
            display_name_from(&[turn("user", "my name is Noa")]).as_deref(),
            Some("Noa")
        );
    }

    #[test]
    fn assistant_turns_do_not_name_the_user() {
        let history = vec![turn("assistant", "שמי עוזר האחזקה")];
        assert_eq!(display_name_from(&history), None);
    }

    #[test]
    fn history_window_keeps_the_tail() {
        let history: Vec<HistoryTurn> = (0..9).map(|i| turn("user", &i.to_string())).collect();
        let tail = recent_history(&history);
        assert_eq!(tail.len(), HISTORY_WINDOW);
        assert_eq!(tail[0].content, "3");
        assert_eq!(recent_history(&history[..2]).len(), 2);
    }

    #[tokio::test]
    async fn counters_follow_thresholds() {
        use crate::core::store::test_store;
        use crate::core::store::types::{EquipmentDraft, FailureDraft};

        let store = test_store();
        for urgency in [2, 4, 5] {
            store
                .insert_failure(
                    "u-1",
                    FailureDraft {
                        description: format!("דחיפות {}", urgency),
                        urgency,
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        store
            .insert_equipment(
                "u-1",
                EquipmentDraft {
                    system: "מנוע ראשי".into(),
                    system_type: "מנועים".into(),
                    current_hours: 240.0,
                },
            )
            .await
            .unwrap();

        let bundle = ContextBundle::gather(&store, Some("u-1"), &[], Utc::now())
            .await
            .unwrap();
        let counters = bundle.counters();
        assert_eq!(counters.open_failures, 3);
        assert_eq!(counters.critical_failures, 2);
        assert_eq!(counters.equipment_alerts, 1);
        assert!(bundle.render_department().contains("דחיפות 5"));

        let other = ContextBundle::gather(&store, Some("u-2"), &[], Utc::now())
            .await
            .unwrap();
        assert_eq!(other.counters().open_failures, 0);
    }
}
