//! Round lifecycle: which snapshots end a poll session and what the user
//! sees when they do.

use crate::model::{DiscussionSnapshot, DiscussionStatus, VoteProposal};
use crate::render::RenderSurface;

/// Message shown when the backend reports a failed discussion.
pub const FAILED_MESSAGE: &str = "처리 실패: 오류가 발생했습니다. 관리자에게 문의하세요.";

/// Message shown when the poller gives up after repeated fetch failures.
pub const ABANDONED_MESSAGE: &str = "서버와의 연결이 반복적으로 실패하여 업데이트를 중단했습니다.";

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleTransition {
    /// Still running; keep polling.
    Continue,
    /// Round finished; the user decides what happens next.
    AwaitingVote { vote: Option<VoteProposal> },
    Completed {
        report_html: Option<String>,
        pdf_url: Option<String>,
    },
    Failed,
}

impl LifecycleTransition {
    pub fn evaluate(snapshot: &DiscussionSnapshot) -> Self {
        match snapshot.status {
            DiscussionStatus::WaitingForVote => LifecycleTransition::AwaitingVote {
                vote: snapshot.current_vote.clone(),
            },
            DiscussionStatus::Completed => LifecycleTransition::Completed {
                report_html: snapshot.report_html.clone(),
                pdf_url: snapshot.pdf_url.clone(),
            },
            DiscussionStatus::Failed => LifecycleTransition::Failed,
            _ => LifecycleTransition::Continue,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LifecycleTransition::Continue)
    }

    /// Draw the terminal panel for this transition. `Continue` draws nothing.
    pub fn render<S: RenderSurface + ?Sized>(&self, surface: &mut S) {
        match self {
            LifecycleTransition::Continue => return,
            LifecycleTransition::AwaitingVote { vote } => surface.show_action_panel(vote.as_ref()),
            LifecycleTransition::Completed { report_html, pdf_url } => {
                surface.show_report(report_html.as_deref(), pdf_url.as_deref())
            }
            LifecycleTransition::Failed => surface.show_error_panel(FAILED_MESSAGE),
        }
        surface.scroll_to_bottom();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{MemorySurface, SurfaceOp};
    use rstest::rstest;

    #[rstest]
    #[case(DiscussionStatus::Running, false)]
    #[case(DiscussionStatus::Ready, false)]
    #[case(DiscussionStatus::ReportGenerating, false)]
    #[case(DiscussionStatus::WaitingForVote, true)]
    #[case(DiscussionStatus::Completed, true)]
    #[case(DiscussionStatus::Failed, true)]
    fn terminal_matches_status(#[case] status: DiscussionStatus, #[case] terminal: bool) {
        let snap = DiscussionSnapshot::new("d1", status);
        assert_eq!(LifecycleTransition::evaluate(&snap).is_terminal(), terminal);
    }

    #[test]
    fn completed_carries_report() {
        let mut snap = DiscussionSnapshot::new("d1", DiscussionStatus::Completed);
        snap.report_html = Some("<h1>R</h1>".into());
        snap.pdf_url = Some("/reports/d1.pdf".into());
        let t = LifecycleTransition::evaluate(&snap);
        let mut surface = MemorySurface::new();
        t.render(&mut surface);
        assert_eq!(
            surface.ops()[0],
            SurfaceOp::Report {
                html: Some("<h1>R</h1>".into()),
                pdf_url: Some("/reports/d1.pdf".into()),
            }
        );
    }

    #[test]
    fn waiting_for_vote_shows_actions() {
        let mut snap = DiscussionSnapshot::new("d1", DiscussionStatus::WaitingForVote);
        snap.current_vote = Some(VoteProposal {
            topic: "Extend the deadline?".into(),
            options: vec!["yes".into(), "no".into()],
        });
        let mut surface = MemorySurface::new();
        LifecycleTransition::evaluate(&snap).render(&mut surface);
        assert_eq!(
            surface.ops()[0],
            SurfaceOp::ActionPanel { vote_topic: Some("Extend the deadline?".into()) }
        );
    }

    #[test]
    fn failed_shows_error_panel() {
        let snap = DiscussionSnapshot::new("d1", DiscussionStatus::Failed);
        let mut surface = MemorySurface::new();
        LifecycleTransition::evaluate(&snap).render(&mut surface);
        assert!(matches!(surface.ops()[0], SurfaceOp::ErrorPanel(_)));
    }

    #[test]
    fn continue_draws_nothing() {
        let snap = DiscussionSnapshot::new("d1", DiscussionStatus::Running);
        let mut surface = MemorySurface::new();
        LifecycleTransition::evaluate(&snap).render(&mut surface);
        assert!(surface.ops().is_empty());
    }
}
