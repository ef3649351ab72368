//! Conversation orchestration for `/api/ai-chat`.
//!
//! One turn: pick the branch, assemble context, call the model under a
//! timeout, apply any action tokens in the reply, strip them, and persist a
//! chat record whatever happened.

mod context;
mod prompt;
mod state;


use anyhow::{Result, anyhow};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::core::actions::{ActionExecutor, parse_actions, strip_actions};
use crate::core::llm::LlmManager;
use crate::core::store::types::{ChatContextCounters, ChatRecord};
use crate::core::store::{Store, new_id, now_rfc3339};

pub use context::ContextBundle;
pub use state::{TurnBranch, TurnPhase, can_transition};

pub const APOLOGY: &str = "מצטער, נתקלתי בבעיה בעיבוד הבקשה. נסה שוב בעוד רגע.";
const CONFIRMATION_PREFIX: &str = "✅ עודכנו הטבלאות:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub user_message: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub chat_history: Vec<HistoryTurn>,
    #[serde(skip)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResponse {
    pub response: String,
    pub updated_tables: Vec<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum BrainError {
    #[error("no language model is configured")]
    NotConfigured,
}

/// Reply text after token stripping, plus the table labels that changed.
struct Reply {
    text: String,
    updated_tables: Vec<String>,
}

pub struct ConversationBrain {
    store: Arc<Store>,
    llm: Arc<RwLock<LlmManager>>,
    model_timeout: Duration,
}

impl ConversationBrain {
    pub fn new(store: Arc<Store>, llm: Arc<RwLock<LlmManager>>, model_timeout: Duration) -> Self {
        Self {
            store,
            llm,
            model_timeout,
        }
    }

    pub async fn is_configured(&self) -> bool {
        self.llm.read().await.is_configured()
    }

    pub async fn handle_turn(&self, req: TurnRequest) -> Result<TurnResponse, BrainError> {
        if !self.is_configured().await {
            return Err(BrainError::NotConfigured);
        }

        let user_id = req.user_id.as_deref();
        let stored_turns = match self.store.count_chat_turns(&req.session_id, user_id).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Could not count turns for session {}: {}", req.session_id, e);
                0
            }
        };
        let branch = TurnBranch::detect(req.chat_history.len(), stored_turns);
        let mut phase = TurnPhase::ModelCallPending;
        let mut counters = ChatContextCounters {
            branch: branch.as_str().to_string(),
            history_turns: req.chat_history.len(),
            ..Default::default()
        };

        info!(
            "Chat turn [{}] session={} user={}",
            branch.as_str(),
            req.session_id,
            user_id.unwrap_or("-")
        );

        let outcome = self
            .run_turn(branch, &mut phase, &req, &mut counters)
            .await;
        let (response, updated_tables) = match outcome {
            Ok(reply) => (reply.text, reply.updated_tables),
            Err(e) => {
                error!("Chat turn failed in phase {}: {}", phase.as_str(), e);
                advance(branch, &mut phase, TurnPhase::Failed);
                (APOLOGY.to_string(), Vec::new())
            }
        };

        let mut record = ChatRecord {
            id: new_id(),
            session_id: req.session_id.clone(),
            user_id: req.user_id.clone(),
            user_message: req.user_message.clone(),
            assistant_response: response.clone(),
            updated_tables: updated_tables.clone(),
            outcome: String::new(),
            context: counters,
            created_at: now_rfc3339(),
        };

        if phase == TurnPhase::Failed {
            record.outcome = TurnPhase::Failed.as_str().to_string();
            if let Err(e) = self.store.append_chat_record(&record).await {
                error!("Failed to record failed turn: {}", e);
            }
            return Ok(TurnResponse {
                response,
                updated_tables,
            });
        }

        record.outcome = TurnPhase::Persisted.as_str().to_string();
        match self.store.append_chat_record(&record).await {
            Ok(()) => {
                advance(branch, &mut phase, TurnPhase::Persisted);
                Ok(TurnResponse {
                    response,
                    updated_tables,
                })
            }
            Err(e) => {
                error!("Failed to persist chat turn: {}", e);
                advance(branch, &mut phase, TurnPhase::Failed);
                Ok(TurnResponse {
                    response: APOLOGY.to_string(),
                    updated_tables,
                })
            }
        }
    }

    async fn run_turn(
        &self,
        branch: TurnBranch,
        phase: &mut TurnPhase,
        req: &TurnRequest,
        counters: &mut ChatContextCounters,
    ) -> Result<Reply> {
        let messages = match branch {
            TurnBranch::ColdStart => prompt::cold_start_messages(&req.user_message),
            TurnBranch::Warm => {
                let now = Utc::now();
                let bundle = ContextBundle::gather(
                    &self.store,
                    req.user_id.as_deref(),
                    &req.chat_history,
                    now,
                )
                .await?;
                let summary = bundle.counters();
                counters.open_failures = summary.open_failures;
                counters.critical_failures = summary.critical_failures;
                counters.overdue_maintenance = summary.overdue_maintenance;
                counters.equipment_alerts = summary.equipment_alerts;
                prompt::warm_messages(
                    &bundle,
                    &req.chat_history,
                    &req.user_message,
                    &now.format("%Y-%m-%d").to_string(),
                )
            }
        };

        let raw = {
            let llm = self.llm.read().await;
            match tokio::time::timeout(self.model_timeout, llm.generate_with_selected(&messages))
                .await
            {
                Ok(result) => result?,
                Err(_) => {
                    return Err(anyhow!(
                        "model call timed out after {}s",
                        self.model_timeout.as_secs()
                    ));
                }
            }
        };

        if branch == TurnBranch::ColdStart {
            return Ok(Reply {
                text: strip_actions(&raw),
                updated_tables: Vec::new(),
            });
        }

        let actions = parse_actions(&raw);
        let mut updated_tables = Vec::new();
        if !actions.is_empty() {
            match req.user_id.as_deref() {
                Some(user_id) => {
                    let report = ActionExecutor::new(&self.store).apply(user_id, &actions).await;
                    info!(
                        "Applied {}/{} actions, tables: {:?}",
                        report.applied_count(),
                        actions.len(),
                        report.updated_tables
                    );
                    updated_tables = report.updated_tables;
                }
                None => warn!(
                    "Dropping {} actions from a turn without a user",
                    actions.len()
                ),
            }
        }
        advance(branch, phase, TurnPhase::ActionsApplied);

        let mut text = strip_actions(&raw);
        if !updated_tables.is_empty() {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(&format!(
                "{} {}",
                CONFIRMATION_PREFIX,
                updated_tables.join(", ")
            ));
        }
        Ok(Reply {
            text,
            updated_tables,
        })
    }
}

fn advance(branch: TurnBranch, phase: &mut TurnPhase, to: TurnPhase) {
    if can_transition(branch, *phase, to) {
        *phase = to;
    } else {
        warn!(
            "Ignoring turn transition {} -> {} on {}",
            phase.as_str(),
            to.as_str(),
            branch.as_str()
        );
    }
}
