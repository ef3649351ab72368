use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::core::store::types::MaintenanceView;

pub const CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventDate {
    pub date: String,
}

/// All-day Google Calendar event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventDate,
    pub end: EventDate,
}

#[derive(Deserialize)]
struct InsertedEvent {
    id: String,
}

/// Event for the next due date of a maintenance item. Items without a
/// parseable due date get none.
pub fn maintenance_event(item: &MaintenanceView) -> Option<CalendarEvent> {
    let due = item.next_due.as_deref()?;
    let day = NaiveDate::parse_from_str(due, "%Y-%m-%d").ok()?;
    let next = day.succ_opt()?;
    Some(CalendarEvent {
        summary: format!("אחזקה: {} - {}", item.record.maintenance_type, item.record.system),
        description: format!(
            "תדירות: כל {} ימים. בוצע לאחרונה: {}",
            item.record.frequency_days, item.record.last_performed
        ),
        start: EventDate {
            date: day.format("%Y-%m-%d").to_string(),
        },
        end: EventDate {
            date: next.format("%Y-%m-%d").to_string(),
        },
    })
}

pub struct CalendarClient {
    client: Client,
    base_url: String,
    calendar_id: String,
}

impl CalendarClient {
    pub fn new(calendar_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: CALENDAR_BASE_URL.to_string(),
            calendar_id: calendar_id
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| "primary".to_string()),
        }
    }

    fn events_url(&self) -> String {
        format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(&self.calendar_id)
        )
    }

    /// Returns the id Google assigned to the new event.
    pub async fn insert_event(&self, access_token: &str, event: &CalendarEvent) -> Result<String> {
        let res = self
            .client
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(event)
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Calendar API Error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let inserted: InsertedEvent = res.json().await?;
        Ok(inserted.id)
    }
}
