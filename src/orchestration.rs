//! Waiting for the backend to assemble a debate team.
//!
//! After a topic is submitted the backend analyses it, gathers evidence and
//! selects experts in the background, publishing a percentage on the
//! progress endpoint. This poll runs to completion before the discussion
//! poller is started, so the two never overlap for one discussion.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::ProgressConfig;
use crate::error::{Result, ViewerError};
use crate::model::{DebateTeam, ProgressUpdate};
use crate::poller::DiscussionSource;

#[async_trait]
pub trait ProgressSource: Send + Sync {
    async fn fetch_progress(&self, discussion_id: &str, token: &str) -> Result<ProgressUpdate>;
}

/// Coarse orchestration phase derived from the progress percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrchestrationStep {
    Starting,
    TopicAnalysis,
    EvidenceGathering,
    ExpertSelection,
    Done,
}

impl OrchestrationStep {
    pub fn from_progress(progress: u32) -> Self {
        match progress {
            0..=9 => OrchestrationStep::Starting,
            10..=34 => OrchestrationStep::TopicAnalysis,
            35..=74 => OrchestrationStep::EvidenceGathering,
            75..=99 => OrchestrationStep::ExpertSelection,
            _ => OrchestrationStep::Done,
        }
    }

    /// 1-based step number shown to the user, if any.
    pub fn number(self) -> Option<u8> {
        match self {
            OrchestrationStep::Starting          => None,
            OrchestrationStep::TopicAnalysis     => Some(1),
            OrchestrationStep::EvidenceGathering => Some(2),
            OrchestrationStep::ExpertSelection | OrchestrationStep::Done => Some(3),
        }
    }
}

impl std::fmt::Display for OrchestrationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrchestrationStep::Starting          => "준비 중",
            OrchestrationStep::TopicAnalysis     => "주제 분석",
            OrchestrationStep::EvidenceGathering => "자료 수집",
            OrchestrationStep::ExpertSelection   => "전문가 선정",
            OrchestrationStep::Done              => "완료",
        };
        write!(f, "{s}")
    }
}

/// Poll orchestration progress until it reaches 100%, then fetch the
/// assembled team.
///
/// Failed progress polls are logged and skipped. Gives up with
/// [`ViewerError::OrchestrationTimeout`] after `cfg.max_polls` polls.
pub async fn wait_for_team<S, F>(
    source: &S,
    discussion_id: &str,
    token: &str,
    cfg: &ProgressConfig,
    mut on_progress: F,
) -> Result<DebateTeam>
where
    S: ProgressSource + DiscussionSource + ?Sized,
    F: FnMut(&ProgressUpdate, OrchestrationStep),
{
    let interval = Duration::from_millis(cfg.interval_ms);
    for poll in 1..=cfg.max_polls {
        tokio::time::sleep(interval).await;
        let update = match source.fetch_progress(discussion_id, token).await {
            Ok(u) => u,
            Err(e) => {
                warn!(%discussion_id, poll, error = %e, "progress poll failed, will retry");
                continue;
            }
        };
        let step = OrchestrationStep::from_progress(update.progress);
        debug!(%discussion_id, progress = update.progress, %step, "orchestration progress");
        on_progress(&update, step);

        if update.progress >= 100 {
            let snapshot = source.fetch_discussion(discussion_id, token).await?;
            let team = snapshot.team();
            info!(%discussion_id, jury = team.jury.len(), "debate team assembled");
            return Ok(team);
        }
    }
    Err(ViewerError::OrchestrationTimeout { polls: cfg.max_polls })
}
