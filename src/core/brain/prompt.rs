use super::HistoryTurn;
use super::context::{ContextBundle, recent_history};
use crate::core::llm::ChatMessage;

const COLD_START_PROMPT: &str = "אתה עוזר אחזקה ומאמן אישי של מפקד מחלקת אחזקה בחיל הים.\n\
זו תחילת השיחה. הצג את עצמך בקצרה ושאל איך המשתמש מעדיף שיקראו לו.\n\
אל תציג נתונים ואל תבצע שום עדכון בטבלאות בשלב זה.\n\
ענה בעברית, בקצרה ובחום.";

const PERSONA: &str = "אתה עוזר אחזקה ומאמן אישי של מפקד מחלקת אחזקה בחיל הים.\n\
אתה מכיר את מצב המחלקה המפורט למטה, עוזר לתעדף תקלות ואחזקות, ומלווה את המשתמש בתהליך האימון.\n\
ענה בעברית, בקצרה ולעניין.";

const ACTION_PROTOCOL: &str = "=== עדכון טבלאות ===\n\
כאשר המשתמש מבקש לעדכן נתונים, שלב בתשובה פקודה אחת או יותר בפורמט:\n\
[VERB_ENTITY: key=\"value\", key2=\"value2\"]\n\
VERB הוא ADD, UPDATE או DELETE. ENTITY הוא FAILURE, MAINTENANCE, EQUIPMENT, DAILY_WORK, \
CONVERSATION, DNA_ITEM, 90DAY_PLAN. לגיבוי פרטי סגירה של תקלה: UPDATE_RESOLVED_FAILURE.\n\
דוגמאות:\n\
[ADD_FAILURE: system=\"מנוע ראשי\", description=\"נזילת שמן\", urgency=4, assignee=\"יוסי\"]\n\
[UPDATE_FAILURE: failure_number=\"F012\", status=\"הושלם\", actual_hours=3, resolution_method=\"החלפת אטם\"]\n\
[UPDATE_EQUIPMENT: id=\"...\", current_hours=480]\n\
[ADD_DNA_ITEM: component_name=\"משמעת\", current_status=2, target_status=4, gaps=\"תיעוד, נוכחות\"]\n\
רשימות (topics, insights, decisions, gaps, goals, actions, metrics) מופרדות בפסיקים בתוך המרכאות.\n\
סגירת תקלה: UPDATE_FAILURE עם status אחד מ: הושלם, טופל, נסגר, סגור.\n\
הפקודות מוסרות מהתשובה לפני שהמשתמש רואה אותה, לכן כתוב גם משפט רגיל שמסביר מה עודכן.\n\
אל תמציא מזהים. השתמש רק במספרי תקלות ומזהים שמופיעים בנתונים.";

pub fn cold_start_messages(user_message: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(COLD_START_PROMPT),
        ChatMessage::user(user_message),
    ]
}

pub fn warm_messages(
    bundle: &ContextBundle,
    history: &[HistoryTurn],
    user_message: &str,
    today: &str,
) -> Vec<ChatMessage> {
    let mut head = String::from(PERSONA);
    head.push_str(&format!("\nהתאריך היום: {}.", today));
    if let Some(name) = &bundle.display_name {
        head.push_str(&format!("\nפנה למשתמש בשם {}.", name));
    }
    head.push_str("\n\n");
    head.push_str(ACTION_PROTOCOL);

    let mut messages = vec![
        ChatMessage::system(head),
        ChatMessage::system(bundle.render_department()),
        ChatMessage::system(bundle.render_coaching()),
    ];
    for turn in recent_history(history) {
        match turn.role.as_str() {
            "user" => messages.push(ChatMessage::user(turn.content.clone())),
            "assistant" | "model" => messages.push(ChatMessage::assistant(turn.content.clone())),
            _ => {}
        }
    }
    messages.push(ChatMessage::user(user_message));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cold_start_has_no_department_data() {
        let messages = cold_start_messages("היי");
        assert_eq!(messages.len(), 2);
        assert!(!messages[0].content.contains("מצב המחלקה"));
        assert!(!messages[0].content.contains("[VERB_ENTITY"));
    }

    #[test]
    fn warm_prompt_carries_protocol_name_and_history() {
        let bundle = ContextBundle {
            display_name: Some("דני".into()),
            ..Default::default()
        };
        let history = vec![
            HistoryTurn {
                role: "user".into(),
                content: "קוראים לי דני".into(),
            },
            HistoryTurn {
                role: "system".into(),
                content: "ignored".into(),
            },
            HistoryTurn {
                role: "assistant".into(),
                content: "שלום דני".into(),
            },
        ];
        let messages = warm_messages(&bundle, &history, "מה פתוח?", "2026-03-01");
        assert!(messages[0].content.contains("דני"));
        assert!(messages[0].content.contains("2026-03-01"));
        assert!(messages[0].content.contains("UPDATE_RESOLVED_FAILURE"));
        assert!(messages[1].content.contains("מצב המחלקה"));
        let roles: Vec<&str> = messages[3..].iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(messages.last().unwrap().content, "מה פתוח?");
    }
}
