use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::core::store::types::{ActiveFailure, ResolvedFailure};

pub const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    #[serde(default)]
    updated_rows: usize,
}

pub fn failure_rows(failures: &[ActiveFailure]) -> Vec<Vec<Value>> {
    failures
        .iter()
        .map(|f| {
            vec![
                json!(f.failure_number),
                json!(f.date),
                json!(f.system),
                json!(f.description),
                json!(f.urgency),
                json!(f.assignee),
                json!(f.estimated_hours),
                json!(f.status),
            ]
        })
        .collect()
}

pub fn resolved_rows(resolved: &[ResolvedFailure]) -> Vec<Vec<Value>> {
    resolved
        .iter()
        .map(|f| {
            vec![
                json!(f.failure_number),
                json!(f.date),
                json!(f.system),
                json!(f.description),
                json!(f.resolved_date),
                json!(f.resolved_by),
                json!(f.actual_hours),
                json!(f.resolution_method),
                json!(f.lessons_learned),
            ]
        })
        .collect()
}

pub struct SheetsClient {
    client: Client,
    base_url: String,
    spreadsheet_id: Option<String>,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: SHEETS_BASE_URL.to_string(),
            spreadsheet_id: spreadsheet_id.filter(|s| !s.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.spreadsheet_id.is_some()
    }

    fn append_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}:append?valueInputOption=USER_ENTERED",
            self.base_url,
            spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    /// Appends below the last row of `range`; returns the rows written.
    pub async fn append_rows(
        &self,
        access_token: &str,
        range: &str,
        rows: Vec<Vec<Value>>,
    ) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        let spreadsheet_id = self
            .spreadsheet_id
            .as_deref()
            .ok_or_else(|| anyhow!("sheets_spreadsheet_id is not configured"))?;
        let res = self
            .client
            .post(self.append_url(spreadsheet_id, range))
            .bearer_auth(access_token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(anyhow!(
                "Sheets API Error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }
        let parsed: AppendResponse = res.json().await?;
        Ok(parsed.updates.map(|u| u.updated_rows).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_column_order() {
        let failure = ActiveFailure {
            id: "id-1".into(),
            user_id: Some("u-1".into()),
            failure_number: "F001".into(),
            date: "2026-03-01".into(),
            system: "מדחס".into(),
            description: "רעידות".into(),
            urgency: 4,
            assignee: "אבי".into(),
            estimated_hours: 1.5,
            status: "פתוח".into(),
            created_at: String::new(),
        };
        let rows = failure_rows(&[failure]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], json!("F001"));
        assert_eq!(rows[0][4], json!(4));
        assert_eq!(rows[0][7], json!("פתוח"));
    }

    #[test]
    fn range_is_url_encoded() {
        let client = SheetsClient::new(Some("sheet-1".into()));
        assert!(client.is_configured());
        assert_eq!(
            client.append_url("sheet-1", "תקלות!A1"),
            format!(
                "{}/spreadsheets/sheet-1/values/{}:append?valueInputOption=USER_ENTERED",
                SHEETS_BASE_URL,
                urlencoding::encode("תקלות!A1")
            )
        );
        assert!(!SheetsClient::new(Some(" ".into())).is_configured());
    }

    #[tokio::test]
    async fn empty_export_makes_no_call() {
        let client = SheetsClient::new(None);
        assert_eq!(client.append_rows("token", "A1", Vec::new()).await.unwrap(), 0);
        assert!(client.append_rows("token", "A1", vec![vec![json!(1)]]).await.is_err());
    }
}
