//! Speaker classification.
//!
//! The backend interleaves debating participants with a fixed set of staff
//! speakers (moderator, round divider, signal-to-noise scorer, fact
//! verifier). Staff turns are meta-commentary: they render instantly and
//! centered, and never take part in left/right alignment.

use serde::Deserialize;

pub const MODERATOR: &str = "사회자";
pub const DIVIDER: &str = "구분선";
pub const SCORER: &str = "SNR 전문가";
pub const VERIFIER: &str = "정보 검증부";

/// Verifier status that flags a turn as needing caution.
pub const CAUTION_STATUS: &str = "주의 필요";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemSpeaker {
    Moderator,
    Divider,
    Scorer,
    Verifier,
}

impl SystemSpeaker {
    pub fn from_agent_name(name: &str) -> Option<Self> {
        match name {
            MODERATOR => Some(SystemSpeaker::Moderator),
            DIVIDER => Some(SystemSpeaker::Divider),
            SCORER => Some(SystemSpeaker::Scorer),
            VERIFIER => Some(SystemSpeaker::Verifier),
            _ => None,
        }
    }

    pub fn agent_name(self) -> &'static str {
        match self {
            SystemSpeaker::Moderator => MODERATOR,
            SystemSpeaker::Divider => DIVIDER,
            SystemSpeaker::Scorer => SCORER,
            SystemSpeaker::Verifier => VERIFIER,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerKind {
    System(SystemSpeaker),
    Regular,
}

pub fn classify(agent_name: &str) -> SpeakerKind {
    SystemSpeaker::from_agent_name(agent_name).map_or(SpeakerKind::Regular, SpeakerKind::System)
}

/// Visual tone of a staff notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTone {
    Moderator,
    Divider,
    Score,
    Verified,
    Caution,
}

/// A staff turn ready to display.
#[derive(Debug, Clone, PartialEq)]
pub struct SystemNotice {
    pub speaker: SystemSpeaker,
    pub tone: NoticeTone,
    pub icon: &'static str,
    /// Plain text body.
    pub text: String,
}

#[derive(Deserialize)]
struct ScorePayload {
    snr_score: serde_json::Value,
    #[serde(default)]
    reason: String,
}

#[derive(Deserialize)]
struct VerificationPayload {
    #[serde(default)]
    status: String,
    #[serde(default)]
    reason: String,
}

impl SystemNotice {
    /// Build the notice for a staff turn. Scorer and verifier messages are
    /// JSON payloads; when one does not decode, the raw message is shown.
    pub fn from_turn(speaker: SystemSpeaker, message: &str) -> Self {
        match speaker {
            SystemSpeaker::Moderator => Self {
                speaker,
                tone: NoticeTone::Moderator,
                icon: "🧑",
                text: message.to_string(),
            },
            SystemSpeaker::Divider => Self {
                speaker,
                tone: NoticeTone::Divider,
                icon: "",
                text: message.to_string(),
            },
            SystemSpeaker::Scorer => {
                let text = match serde_json::from_str::<ScorePayload>(message) {
                    Ok(p) => {
                        let score = match p.snr_score {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        format!("SNR Score: {score} - {}", p.reason)
                    }
                    Err(_) => message.to_string(),
                };
                Self { speaker, tone: NoticeTone::Score, icon: "📈", text }
            }
            SystemSpeaker::Verifier => match serde_json::from_str::<VerificationPayload>(message) {
                Ok(p) => {
                    let caution = p.status == CAUTION_STATUS;
                    Self {
                        speaker,
                        tone: if caution { NoticeTone::Caution } else { NoticeTone::Verified },
                        icon: if caution { "⚠️" } else { "✅" },
                        text: format!("검증 상태: {}", p.reason),
                    }
                }
                Err(_) => Self {
                    speaker,
                    tone: NoticeTone::Verified,
                    icon: "✅",
                    text: message.to_string(),
                },
            },
        }
    }
}
