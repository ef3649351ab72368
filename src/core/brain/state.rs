use serde::{Deserialize, Serialize};

/// Which prompt a turn is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnBranch {
    /// First contact in a session: ask for a name, no records, no actions.
    ColdStart,
    Warm,
}

impl TurnBranch {
    /// Cold only when neither the client nor the store knows of an earlier turn.
    pub fn detect(client_history_len: usize, stored_turns: usize) -> Self {
        if client_history_len == 0 && stored_turns == 0 {
            TurnBranch::ColdStart
        } else {
            TurnBranch::Warm
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnBranch::ColdStart => "cold_start",
            TurnBranch::Warm => "warm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    ModelCallPending,
    ActionsApplied,
    Persisted,
    Failed,
}

impl TurnPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TurnPhase::ModelCallPending => "model_call_pending",
            TurnPhase::ActionsApplied => "actions_applied",
            TurnPhase::Persisted => "persisted",
            TurnPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Persisted | TurnPhase::Failed)
    }
}

pub fn can_transition(branch: TurnBranch, from: TurnPhase, to: TurnPhase) -> bool {
    if from == to {
        return !from.is_terminal();
    }
    match from {
        TurnPhase::ModelCallPending => match to {
            TurnPhase::ActionsApplied => branch == TurnBranch::Warm,
            TurnPhase::Persisted | TurnPhase::Failed => true,
            TurnPhase::ModelCallPending => false,
        },
        TurnPhase::ActionsApplied => matches!(to, TurnPhase::Persisted | TurnPhase::Failed),
        TurnPhase::Persisted | TurnPhase::Failed => false,
    }
}
