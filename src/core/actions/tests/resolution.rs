use std::sync::Arc;

use crate::core::actions::{ActionExecutor, ActionOutcome, parse_actions};
use crate::core::store::labels;
use crate::core::store::test_store;
use crate::core::store::types::FailureDraft;

fn draft(number: &str) -> FailureDraft {
    FailureDraft {
        failure_number: Some(number.to_string()),
        date: Some("2026-05-10".to_string()),
        system: "מערכת קירור".to_string(),
        description: "משאבת מי ים לא מספקת לחץ".to_string(),
        urgency: 5,
        assignee: "שירה".to_string(),
        estimated_hours: 3.0,
        status: None,
    }
}

#[tokio::test]
async fn add_then_close_moves_record_intact() {
    let store = test_store();
    let executor = ActionExecutor::new(&store);
    executor
        .apply(
            "u1",
            &parse_actions(
                "[ADD_FAILURE: failure_number=\"F300\", date=\"2026-05-10\", system=\"הגה\", \
                 description=\"תזוזה חופשית\", urgency=3, assignee=\"עומר\", estimated_hours=1.5]",
            ),
        )
        .await;
    let original = store.list_active_failures("u1").await.unwrap().remove(0);

    let report = executor
        .apply(
            "u1",
            &parse_actions("[UPDATE_FAILURE: failure_number=\"F300\", status=\"נסגר\"]"),
        )
        .await;
    assert_eq!(
        report.updated_tables,
        vec![
            labels::ACTIVE_FAILURES.to_string(),
            labels::RESOLVED_FAILURES.to_string()
        ]
    );

    assert!(store.list_active_failures("u1").await.unwrap().is_empty());
    let resolved = store.list_resolved_failures("u1").await.unwrap();
    assert_eq!(resolved.len(), 1);
    let r = &resolved[0];
    assert_eq!(r.id, original.id);
    assert_eq!(r.failure_number, original.failure_number);
    assert_eq!(r.date, original.date);
    assert_eq!(r.system, original.system);
    assert_eq!(r.description, original.description);
    assert_eq!(r.urgency, original.urgency);
    assert_eq!(r.assignee, original.assignee);
    assert_eq!(r.estimated_hours, original.estimated_hours);
    assert_eq!(r.created_at, original.created_at);
    assert_eq!(r.status, "נסגר");
    assert_eq!(r.actual_hours, 1.5);
    assert_eq!(r.resolved_by, "עומר");
}

#[tokio::test]
async fn resolution_details_in_the_same_action_are_kept() {
    let store = test_store();
    store.insert_failure("u1", draft("F301")).await.unwrap();
    let report = ActionExecutor::new(&store)
        .apply(
            "u1",
            &parse_actions(
                "[UPDATE_FAILURE: failure_number=\"F301\", status=\"טופל\", actual_hours=4, \
                 resolution_method=\"החלפת אימפלר\", resolved_by=\"נועה\", lessons_learned=\"מלאי חלפים\"]",
            ),
        )
        .await;
    assert!(report.outcomes[0].is_applied());
    let r = store.list_resolved_failures("u1").await.unwrap().remove(0);
    assert_eq!(r.actual_hours, 4.0);
    assert_eq!(r.resolution_method, "החלפת אימפלר");
    assert_eq!(r.resolved_by, "נועה");
    assert_eq!(r.lessons_learned, "מלאי חלפים");
}

#[tokio::test]
async fn closing_by_internal_id_works() {
    let store = test_store();
    let f = store.insert_failure("u1", draft("F302")).await.unwrap();
    let reply = format!("[UPDATE_FAILURE: id=\"{}\", status=\"resolved\"]", f.id);
    let report = ActionExecutor::new(&store)
        .apply("u1", &parse_actions(&reply))
        .await;
    assert!(report.outcomes[0].is_applied());
    assert_eq!(store.list_resolved_failures("u1").await.unwrap()[0].id, f.id);
}

#[tokio::test]
async fn non_closing_status_stays_active() {
    let store = test_store();
    store.insert_failure("u1", draft("F303")).await.unwrap();
    let report = ActionExecutor::new(&store)
        .apply(
            "u1",
            &parse_actions("[UPDATE_FAILURE: failure_number=\"F303\", status=\"Closed\"]"),
        )
        .await;
    assert_eq!(report.updated_tables, vec![labels::ACTIVE_FAILURES.to_string()]);
    let active = store.list_active_failures("u1").await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].status, "Closed");
    assert!(store.list_resolved_failures("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn closing_unknown_failure_is_a_reported_no_op() {
    let store = test_store();
    let report = ActionExecutor::new(&store)
        .apply(
            "u1",
            &parse_actions("[UPDATE_FAILURE: failure_number=\"F999\", status=\"הושלם\"]"),
        )
        .await;
    assert!(matches!(report.outcomes[0], ActionOutcome::NotFound { .. }));
    assert!(report.updated_tables.is_empty());
}

#[tokio::test]
async fn another_users_failure_cannot_be_closed() {
    let store = test_store();
    store.insert_failure("owner", draft("F304")).await.unwrap();
    let report = ActionExecutor::new(&store)
        .apply(
            "intruder",
            &parse_actions("[UPDATE_FAILURE: failure_number=\"F304\", status=\"הושלם\"]"),
        )
        .await;
    assert!(matches!(report.outcomes[0], ActionOutcome::NotFound { .. }));
    assert_eq!(store.list_active_failures("owner").await.unwrap().len(), 1);
}

#[tokio::test]
async fn backfill_after_partial_close() {
    let store = test_store();
    store.insert_failure("u1", draft("F305")).await.unwrap();
    let executor = ActionExecutor::new(&store);
    executor
        .apply(
            "u1",
            &parse_actions("[UPDATE_FAILURE: failure_number=\"F305\", status=\"הושלם\"]"),
        )
        .await;
    let report = executor
        .apply(
            "u1",
            &parse_actions(
                "[UPDATE_RESOLVED_FAILURE: failure_number=\"F305\", actual_hours=5, \
                 resolution_method=\"ניקוי מסננת\"]",
            ),
        )
        .await;
    assert_eq!(report.updated_tables, vec![labels::RESOLVED_FAILURES.to_string()]);

    let resolved = store.list_resolved_failures("u1").await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].actual_hours, 5.0);
    assert_eq!(resolved[0].resolution_method, "ניקוי מסננת");
    assert_eq!(resolved[0].resolved_by, "שירה");
}

#[tokio::test]
async fn backfill_for_unknown_failure_creates_nothing() {
    let store = test_store();
    let report = ActionExecutor::new(&store)
        .apply(
            "u1",
            &parse_actions("[UPDATE_RESOLVED_FAILURE: failure_number=\"F777\", actual_hours=2]"),
        )
        .await;
    assert!(matches!(report.outcomes[0], ActionOutcome::NotFound { .. }));
    assert!(store.list_resolved_failures("u1").await.unwrap().is_empty());
}

#[tokio::test]
async fn racing_closures_leave_one_resolved_record() {
    let store = Arc::new(test_store());
    store.insert_failure("u1", draft("F306")).await.unwrap();

    let reply = "[UPDATE_FAILURE: failure_number=\"F306\", status=\"הושלם\"]";
    let mut handles = Vec::new();
    for _ in 0..2 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            ActionExecutor::new(&store)
                .apply("u1", &parse_actions(reply))
                .await
        }));
    }

    let mut applied = 0;
    let mut not_found = 0;
    for handle in handles {
        let report = handle.await.unwrap();
        match &report.outcomes[0] {
            ActionOutcome::Applied { .. } => applied += 1,
            ActionOutcome::NotFound { .. } => not_found += 1,
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(not_found, 1);
    assert!(store.list_active_failures("u1").await.unwrap().is_empty());
    assert_eq!(store.list_resolved_failures("u1").await.unwrap().len(), 1);
}
