//! Wire types for the discussion backend.
//!
//! Snapshots are decoded once on ingress into these typed structures; any
//! payload that does not fit is rejected as [`ViewerError::Malformed`] rather
//! than being checked field by field later.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

/// Name the backend gives the presiding judge in the participant roster.
pub const JUDGE_NAME: &str = "재판관";

// ---------------------------------------------------------------------------
// Lifecycle status
// ---------------------------------------------------------------------------

/// Server-reported lifecycle status of a discussion.
///
/// Only `WaitingForVote`, `Completed` and `Failed` are terminal for a poll
/// session; every other status means the backend is still working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionStatus {
    Orchestrating,
    Ready,
    #[serde(alias = "turn_inprogress", alias = "in_progress", alias = "processing")]
    Running,
    TurnComplete,
    ReportGenerating,
    WaitingForVote,
    Completed,
    Failed,
}

impl DiscussionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DiscussionStatus::WaitingForVote | DiscussionStatus::Completed | DiscussionStatus::Failed
        )
    }
}

impl std::fmt::Display for DiscussionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscussionStatus::Orchestrating    => "orchestrating",
            DiscussionStatus::Ready            => "ready",
            DiscussionStatus::Running          => "running",
            DiscussionStatus::TurnComplete     => "turn_complete",
            DiscussionStatus::ReportGenerating => "report_generating",
            DiscussionStatus::WaitingForVote   => "waiting_for_vote",
            DiscussionStatus::Completed        => "completed",
            DiscussionStatus::Failed           => "failed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Transcript and roster
// ---------------------------------------------------------------------------

/// One transcript entry. Its position in the transcript is its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub agent_name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl Turn {
    pub fn new(agent_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            message: message.into(),
            timestamp: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Model identifier, e.g. `gemini-2.5-pro`.
    #[serde(default)]
    pub model: String,
}

// ---------------------------------------------------------------------------
// Per-round analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalUtterance {
    pub agent_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanceChange {
    pub agent_name: String,
    pub change: String,
    #[serde(default)]
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    #[serde(default)]
    pub critical_utterance: Option<CriticalUtterance>,
    #[serde(default)]
    pub stance_changes: Option<Vec<StanceChange>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Agreement,
    Disagreement,
    #[serde(other)]
    Other,
}

/// A directed "who responded to whom" edge from the interaction analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: InteractionKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowData {
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// Vote proposed by the backend for the next round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteProposal {
    pub topic: String,
    #[serde(default)]
    pub options: Vec<String>,
}

// ---------------------------------------------------------------------------
// Evidence briefing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub source: String,
    #[serde(default)]
    pub publication_date: String,
    pub summary: String,
}

impl EvidenceItem {
    pub fn is_link(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBriefing {
    #[serde(default)]
    pub web_evidence: Vec<EvidenceItem>,
    #[serde(default)]
    pub file_evidence: Vec<EvidenceItem>,
}

// ---------------------------------------------------------------------------
// Discussion snapshot
// ---------------------------------------------------------------------------

/// Full server-reported state of one discussion at a point in time.
///
/// Never patched in place: each fetch produces a new snapshot that
/// supersedes the previous one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscussionSnapshot {
    pub discussion_id: String,
    pub status: DiscussionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default)]
    pub transcript: Vec<Turn>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_summary: Option<RoundSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_data: Option<FlowData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_vote: Option<VoteProposal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_briefing: Option<EvidenceBriefing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl DiscussionSnapshot {
    /// Decode and validate a snapshot body.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let snapshot: DiscussionSnapshot = serde_json::from_slice(bytes)?;
        if snapshot.discussion_id.trim().is_empty() {
            return Err(ViewerError::malformed("empty discussion_id"));
        }
        Ok(snapshot)
    }

    /// Minimal snapshot, mostly useful when building fixtures.
    pub fn new(discussion_id: impl Into<String>, status: DiscussionStatus) -> Self {
        Self {
            discussion_id: discussion_id.into(),
            status,
            topic: None,
            transcript: Vec::new(),
            participants: Vec::new(),
            round_summary: None,
            flow_data: None,
            current_vote: None,
            evidence_briefing: None,
            report_html: None,
            pdf_url: None,
        }
    }

    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.name == name)
    }

    /// Split the roster into the judge and the jury.
    pub fn team(&self) -> DebateTeam {
        DebateTeam {
            discussion_id: self.discussion_id.clone(),
            judge: self.participant(JUDGE_NAME).cloned(),
            jury: self
                .participants
                .iter()
                .filter(|p| p.name != JUDGE_NAME)
                .cloned()
                .collect(),
        }
    }
}

/// The panel of agents assembled by orchestration.
#[derive(Debug, Clone, PartialEq)]
pub struct DebateTeam {
    pub discussion_id: String,
    pub judge: Option<Participant>,
    pub jury: Vec<Participant>,
}

// ---------------------------------------------------------------------------
// Request / response bodies for the session endpoints
// ---------------------------------------------------------------------------

/// Orchestration progress reported while the backend assembles the team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub progress: u32,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedDiscussion {
    pub discussion_id: String,
}

/// Body of `POST /discussions/{id}/turns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TurnRequest {
    pub user_vote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_overrides: Option<BTreeMap<String, String>>,
}
