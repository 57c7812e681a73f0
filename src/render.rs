//! Rendering surfaces.
//!
//! The reconciler and live view never format output themselves; they drive
//! a [`RenderSurface`]. Two implementations ship with the crate:
//! [`TerminalSurface`] streams colored text to stdout, and [`MemorySurface`]
//! records every operation for headless runs and tests.

use std::io::{self, Write};

use colored::*;

use crate::catalog::model_display_name;
use crate::markup::{decode_entity, to_plain_text, Unit};
use crate::model::{DiscussionSnapshot, InteractionKind, Participant, VoteProposal};
use crate::speaker::{NoticeTone, SystemNotice};

// ---------------------------------------------------------------------------
// Shared view types
// ---------------------------------------------------------------------------

/// Side of the transcript a regular turn is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

impl Alignment {
    /// Regular turns alternate, starting on the left.
    pub fn for_count(regular_count: usize) -> Self {
        if regular_count % 2 == 0 {
            Alignment::Left
        } else {
            Alignment::Right
        }
    }
}

/// Header shown above a regular turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerCard {
    pub name: String,
    pub icon: String,
    /// Display name of the backing model, when the participant is known.
    pub model: Option<String>,
}

impl SpeakerCard {
    pub fn new(agent_name: &str, participant: Option<&Participant>) -> Self {
        Self {
            name: agent_name.to_string(),
            icon: participant
                .and_then(|p| p.icon.clone())
                .unwrap_or_else(|| "🤖".to_string()),
            model: participant
                .filter(|p| !p.model.is_empty())
                .map(|p| model_display_name(&p.model)),
        }
    }
}

/// Side panels derived from the newest snapshot. Always replaced wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyticsPanels {
    pub critical_utterance: Option<(String, String)>,
    /// `(agent, icon, change)` rows.
    pub stance_changes: Vec<(String, String, String)>,
    /// `(from, to, kind)` edges.
    pub interactions: Vec<(String, String, InteractionKind)>,
}

impl AnalyticsPanels {
    pub fn from_snapshot(snapshot: &DiscussionSnapshot) -> Self {
        let summary = snapshot.round_summary.as_ref();
        Self {
            critical_utterance: summary
                .and_then(|s| s.critical_utterance.as_ref())
                .map(|c| (c.agent_name.clone(), c.message.clone())),
            stance_changes: summary
                .and_then(|s| s.stance_changes.as_ref())
                .map(|rows| {
                    rows.iter()
                        .map(|r| (r.agent_name.clone(), r.icon.clone(), r.change.clone()))
                        .collect()
                })
                .unwrap_or_default(),
            interactions: snapshot
                .flow_data
                .as_ref()
                .map(|f| {
                    f.interactions
                        .iter()
                        .map(|i| (i.from.clone(), i.to.clone(), i.kind))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.critical_utterance.is_none()
            && self.stance_changes.is_empty()
            && self.interactions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Surface trait
// ---------------------------------------------------------------------------

pub trait RenderSurface: Send {
    /// Staff notice, centered, rendered in one step.
    fn system_notice(&mut self, notice: &SystemNotice);

    /// "Composing" placeholder for the next regular turn.
    fn show_composing(&mut self, speaker: &SpeakerCard, align: Alignment);
    fn clear_composing(&mut self);

    /// Between-rounds "waiting for the next speaker" indicator.
    fn set_general_indicator(&mut self, shown: bool);

    /// Animated message: header, then units one at a time, then close.
    fn begin_message(&mut self, speaker: &SpeakerCard, align: Alignment);
    fn reveal(&mut self, unit: Unit<'_>);
    fn end_message(&mut self);

    /// Whole message at once.
    fn append_message(&mut self, speaker: &SpeakerCard, align: Alignment, html: &str);

    fn update_panels(&mut self, panels: &AnalyticsPanels);

    fn show_action_panel(&mut self, vote: Option<&VoteProposal>);
    fn show_report(&mut self, report_html: Option<&str>, pdf_url: Option<&str>);
    fn show_error_panel(&mut self, message: &str);

    fn scroll_to_bottom(&mut self);
}

// ---------------------------------------------------------------------------
// In-memory surface
// ---------------------------------------------------------------------------

/// One recorded surface mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Notice { agent: String, text: String },
    Composing { agent: String },
    ComposingCleared,
    GeneralIndicator(bool),
    Message { agent: String, align: Alignment, html: String, animated: bool },
    Panels(AnalyticsPanels),
    ActionPanel { vote_topic: Option<String> },
    Report { html: Option<String>, pdf_url: Option<String> },
    ErrorPanel(String),
    ScrollToBottom,
}

#[derive(Debug, Default)]
pub struct MemorySurface {
    ops: Vec<SurfaceOp>,
    open: Option<(String, Alignment, String)>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[SurfaceOp] {
        &self.ops
    }

    /// Agent names of every transcript entry (staff and regular) in order.
    pub fn rendered_agents(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                SurfaceOp::Notice { agent, .. } | SurfaceOp::Message { agent, .. } => Some(agent.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> impl Iterator<Item = (&str, Alignment, &str, bool)> {
        self.ops.iter().filter_map(|op| match op {
            SurfaceOp::Message { agent, align, html, animated } => {
                Some((agent.as_str(), *align, html.as_str(), *animated))
            }
            _ => None,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.rendered_agents().len()
    }

    pub fn count(&self, pred: impl Fn(&SurfaceOp) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }
}

impl RenderSurface for MemorySurface {
    fn system_notice(&mut self, notice: &SystemNotice) {
        self.ops.push(SurfaceOp::Notice {
            agent: notice.speaker.agent_name().to_string(),
            text: notice.text.clone(),
        });
    }

    fn show_composing(&mut self, speaker: &SpeakerCard, _align: Alignment) {
        self.ops.push(SurfaceOp::Composing { agent: speaker.name.clone() });
    }

    fn clear_composing(&mut self) {
        self.ops.push(SurfaceOp::ComposingCleared);
    }

    fn set_general_indicator(&mut self, shown: bool) {
        self.ops.push(SurfaceOp::GeneralIndicator(shown));
    }

    fn begin_message(&mut self, speaker: &SpeakerCard, align: Alignment) {
        self.open = Some((speaker.name.clone(), align, String::new()));
    }

    fn reveal(&mut self, unit: Unit<'_>) {
        if let Some((_, _, html)) = self.open.as_mut() {
            html.push_str(unit.as_str());
        }
    }

    fn end_message(&mut self) {
        if let Some((agent, align, html)) = self.open.take() {
            self.ops.push(SurfaceOp::Message { agent, align, html, animated: true });
        }
    }

    fn append_message(&mut self, speaker: &SpeakerCard, align: Alignment, html: &str) {
        self.ops.push(SurfaceOp::Message {
            agent: speaker.name.clone(),
            align,
            html: html.to_string(),
            animated: false,
        });
    }

    fn update_panels(&mut self, panels: &AnalyticsPanels) {
        self.ops.push(SurfaceOp::Panels(panels.clone()));
    }

    fn show_action_panel(&mut self, vote: Option<&VoteProposal>) {
        self.ops.push(SurfaceOp::ActionPanel { vote_topic: vote.map(|v| v.topic.clone()) });
    }

    fn show_report(&mut self, report_html: Option<&str>, pdf_url: Option<&str>) {
        self.ops.push(SurfaceOp::Report {
            html: report_html.map(str::to_string),
            pdf_url: pdf_url.map(str::to_string),
        });
    }

    fn show_error_panel(&mut self, message: &str) {
        self.ops.push(SurfaceOp::ErrorPanel(message.to_string()));
    }

    fn scroll_to_bottom(&mut self) {
        self.ops.push(SurfaceOp::ScrollToBottom);
    }
}

// ---------------------------------------------------------------------------
// Terminal surface
// ---------------------------------------------------------------------------

/// Streams the transcript to stdout. Left turns are flush, right turns are
/// indented; staff notices are centered on a fixed width.
pub struct TerminalSurface {
    width: usize,
    bold: bool,
    italic: bool,
    align: Alignment,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            width: 72,
            bold: false,
            italic: false,
            align: Alignment::Left,
        }
    }

    fn indent(&self) -> &'static str {
        match self.align {
            Alignment::Left  => "",
            Alignment::Right => "                ",
        }
    }

    fn header(&self, speaker: &SpeakerCard, align: Alignment) -> String {
        let model = speaker
            .model
            .as_deref()
            .map(|m| format!(" ({m})"))
            .unwrap_or_default();
        let name = match align {
            Alignment::Left  => speaker.name.bright_cyan().bold(),
            Alignment::Right => speaker.name.bright_magenta().bold(),
        };
        format!("{}{} {}{}", self.indent(), speaker.icon, name, model.dimmed())
    }

    fn styled(&self, text: &str) -> ColoredString {
        let mut s = text.normal();
        if self.bold {
            s = s.bold();
        }
        if self.italic {
            s = s.italic();
        }
        s
    }

    fn flush() {
        let _ = io::stdout().flush();
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for TerminalSurface {
    fn system_notice(&mut self, notice: &SystemNotice) {
        let body = if notice.icon.is_empty() {
            notice.text.clone()
        } else {
            format!("{} {}", notice.icon, notice.text)
        };
        let line = format!("{body:^width$}", width = self.width);
        let styled = match notice.tone {
            NoticeTone::Moderator => line.bright_white(),
            NoticeTone::Divider   => line.bright_blue(),
            NoticeTone::Score     => line.bright_yellow(),
            NoticeTone::Verified  => line.bright_green(),
            NoticeTone::Caution   => line.bright_red().bold(),
        };
        println!("{styled}");
    }

    fn show_composing(&mut self, speaker: &SpeakerCard, align: Alignment) {
        self.align = align;
        print!("{} {}", self.header(speaker, align), "…".dimmed());
        Self::flush();
    }

    fn clear_composing(&mut self) {
        print!("\r\x1b[2K");
        Self::flush();
    }

    fn set_general_indicator(&mut self, shown: bool) {
        if shown {
            println!("{}", "다음 발언자를 기다리는 중…".dimmed());
        }
    }

    fn begin_message(&mut self, speaker: &SpeakerCard, align: Alignment) {
        self.align = align;
        self.bold = false;
        self.italic = false;
        println!("{}", self.header(speaker, align));
        print!("{}", self.indent());
    }

    fn reveal(&mut self, unit: Unit<'_>) {
        match unit {
            Unit::Tag("<strong>")  => self.bold = true,
            Unit::Tag("</strong>") => self.bold = false,
            Unit::Tag("<em>")      => self.italic = true,
            Unit::Tag("</em>")     => self.italic = false,
            Unit::Tag("<br>")      => print!("\n{}", self.indent()),
            Unit::Tag("<li>")      => print!("• "),
            Unit::Tag(_)           => {}
            Unit::Entity(e)        => print!("{}", self.styled(decode_entity(e))),
            Unit::Char(c)          => print!("{}", self.styled(c)),
        }
        Self::flush();
    }

    fn end_message(&mut self) {
        println!();
        println!();
    }

    fn append_message(&mut self, speaker: &SpeakerCard, align: Alignment, html: &str) {
        self.begin_message(speaker, align);
        for unit in crate::markup::reveal_units(html) {
            self.reveal(unit);
        }
        self.end_message();
    }

    fn update_panels(&mut self, panels: &AnalyticsPanels) {
        if panels.is_empty() {
            return;
        }
        println!("{}", "─".repeat(self.width).bright_blue());
        if let Some((agent, message)) = &panels.critical_utterance {
            println!("{} {}: {}", "핵심 발언".bright_yellow(), agent.bold(), message);
        }
        for (agent, icon, change) in &panels.stance_changes {
            println!("{} {} {} {}", "입장 변화".bright_yellow(), icon, agent.bold(), change);
        }
        for (from, to, kind) in &panels.interactions {
            let arrow = match kind {
                InteractionKind::Agreement    => "──▶".green(),
                InteractionKind::Disagreement => "──▶".red(),
                InteractionKind::Other        => "──▶".normal(),
            };
            println!("{} {from} {arrow} {to}", "상호작용".bright_yellow());
        }
        println!("{}", "─".repeat(self.width).bright_blue());
    }

    fn show_action_panel(&mut self, vote: Option<&VoteProposal>) {
        println!("{}", "=".repeat(self.width).bright_blue());
        if let Some(v) = vote {
            println!("{}: {}", "투표".bright_yellow(), v.topic);
            for (i, option) in v.options.iter().enumerate() {
                println!("  {}. {option}", i + 1);
            }
        }
        println!(
            "{}  {}  {}",
            "[n] 다음 라운드".bright_green(),
            "[r] 보고서와 함께 종료".bright_cyan(),
            "[q] 보고서 없이 종료".bright_red()
        );
    }

    fn show_report(&mut self, report_html: Option<&str>, pdf_url: Option<&str>) {
        println!("{}", "=".repeat(self.width).bright_blue());
        println!("{}", "최종 보고서".bright_green().bold());
        match report_html {
            Some(html) => println!("{}", to_plain_text(html)),
            None => println!("{}", "(보고서 본문 없음)".dimmed()),
        }
        if let Some(url) = pdf_url {
            println!("{}: {}", "PDF".bright_yellow(), url.underline());
        }
    }

    fn show_error_panel(&mut self, message: &str) {
        println!("{}", "=".repeat(self.width).red());
        println!("{} {}", "오류".bright_red().bold(), message);
    }

    fn scroll_to_bottom(&mut self) {
        Self::flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CriticalUtterance, DiscussionStatus, FlowData, Interaction, RoundSummary, StanceChange,
    };
    use crate::speaker::SystemSpeaker;

    #[test]
    fn alignment_alternates_from_left() {
        assert_eq!(Alignment::for_count(0), Alignment::Left);
        assert_eq!(Alignment::for_count(1), Alignment::Right);
        assert_eq!(Alignment::for_count(2), Alignment::Left);
    }

    #[test]
    fn speaker_card_uses_participant_details() {
        let p = Participant {
            name: "Economist".into(),
            icon: Some("💰".into()),
            model: "gpt-4o".into(),
        };
        let card = SpeakerCard::new("Economist", Some(&p));
        assert_eq!(card.icon, "💰");
        assert_eq!(card.model.as_deref(), Some("GPT-4o"));
    }

    #[test]
    fn speaker_card_defaults_without_participant() {
        let card = SpeakerCard::new("Ghost", None);
        assert_eq!(card.icon, "🤖");
        assert!(card.model.is_none());
    }

    #[test]
    fn panels_built_from_snapshot() {
        let mut snap = DiscussionSnapshot::new("d1", DiscussionStatus::Running);
        snap.round_summary = Some(RoundSummary {
            critical_utterance: Some(CriticalUtterance {
                agent_name: "A".into(),
                message: "key point".into(),
            }),
            stance_changes: Some(vec![StanceChange {
                agent_name: "B".into(),
                change: "flipped".into(),
                icon: "🔄".into(),
            }]),
        });
        snap.flow_data = Some(FlowData {
            interactions: vec![Interaction {
                from: "A".into(),
                to: "B".into(),
                kind: InteractionKind::Agreement,
            }],
        });
        let panels = AnalyticsPanels::from_snapshot(&snap);
        assert_eq!(panels.critical_utterance, Some(("A".into(), "key point".into())));
        assert_eq!(panels.stance_changes.len(), 1);
        assert_eq!(panels.interactions[0].2, InteractionKind::Agreement);
        assert!(!panels.is_empty());
    }

    #[test]
    fn empty_snapshot_has_empty_panels() {
        let snap = DiscussionSnapshot::new("d1", DiscussionStatus::Running);
        assert!(AnalyticsPanels::from_snapshot(&snap).is_empty());
    }

    #[test]
    fn memory_surface_assembles_revealed_units() {
        let mut s = MemorySurface::new();
        let card = SpeakerCard::new("A", None);
        s.begin_message(&card, Alignment::Right);
        for u in crate::markup::reveal_units("<em>hi</em>") {
            s.reveal(u);
        }
        s.end_message();
        let msgs: Vec<_> = s.messages().collect();
        assert_eq!(msgs, vec![("A", Alignment::Right, "<em>hi</em>", true)]);
    }

    #[test]
    fn memory_surface_tracks_entry_order() {
        let mut s = MemorySurface::new();
        s.system_notice(&SystemNotice::from_turn(SystemSpeaker::Moderator, "hello"));
        s.append_message(&SpeakerCard::new("A", None), Alignment::Left, "x");
        assert_eq!(s.rendered_agents(), vec!["사회자", "A"]);
        assert_eq!(s.entry_count(), 2);
    }
}
