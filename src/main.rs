use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use discussion_viewer::catalog::SUPPORTED_MODELS;
use discussion_viewer::cli::{Args, Command};
use discussion_viewer::config::ViewerConfig;
use discussion_viewer::live::{LiveOptions, LiveView, ViewOutcome};
use discussion_viewer::model::{DebateTeam, EvidenceBriefing, EvidenceItem};
use discussion_viewer::poller::DiscussionSource;
use discussion_viewer::render::TerminalSurface;
use discussion_viewer::session::{DiscussionSession, RoundAction};

type BoxError = Box<dyn std::error::Error>;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let mut config = ViewerConfig::load(args.config.as_deref())?;
    if let Some(url) = &args.base_url {
        config.base_url = url.clone();
    }
    if args.no_animation {
        config.animation.enabled = false;
    }
    config.validate()?;

    let mut session = DiscussionSession::new(config);

    match args.command {
        Command::Login { email, password, remember } => login(&session, &email, password, remember).await,
        Command::Logout => {
            session.logout()?;
            println!("{}", "로그아웃되었습니다.".bright_green());
            Ok(())
        }
        Command::Models => {
            print_models();
            Ok(())
        }
        Command::Start { topic, file, models } => {
            let team = session
                .submit_topic(&topic, file.as_deref(), |update, step| {
                    let label = match step.number() {
                        Some(n) => format!("[{n}/3] {step}"),
                        None => step.to_string(),
                    };
                    print!("\r{} {:>3}%  {}", label.bright_cyan(), update.progress, update.message.dimmed());
                    let _ = io::stdout().flush();
                })
                .await?;
            println!();
            print_team(&team);

            let overrides: BTreeMap<String, String> = models.into_iter().collect();
            let mut view = new_view(&session);
            let outcome = session.start_debate(&mut view, &team.discussion_id, overrides).await?;
            follow(&mut session, view, &team.discussion_id, outcome).await
        }
        Command::Watch { discussion_id } => {
            let mut view = new_view(&session);
            let outcome = session.watch(&mut view, &discussion_id).await?;
            follow(&mut session, view, &discussion_id, outcome).await
        }
        Command::Next { discussion_id, vote } => {
            let mut view = new_view(&session);
            // Replay the transcript so far before continuing.
            let outcome = session.watch(&mut view, &discussion_id).await?;
            if !matches!(outcome, ViewOutcome::AwaitingVote(_)) {
                return finish(view, outcome).await;
            }
            let outcome = session.advance_round(&mut view, &discussion_id, vote).await?;
            follow(&mut session, view, &discussion_id, outcome).await
        }
        Command::Report { discussion_id } => {
            let mut view = new_view(&session);
            let outcome = session.end_with_report(&mut view, &discussion_id).await?;
            finish(view, outcome).await
        }
        Command::Archive { discussion_id } => {
            session.end_without_report(&discussion_id).await?;
            println!("{}", "토론을 보고서 없이 종료했습니다.".bright_yellow());
            Ok(())
        }
        Command::Evidence { discussion_id } => {
            let briefing = session.evidence(&discussion_id).await?;
            print_evidence(&briefing);
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

async fn login(
    session: &DiscussionSession,
    email: &str,
    password: Option<String>,
    remember: bool,
) -> Result<(), BoxError> {
    let password = match password {
        Some(p) => p,
        None => match session.remembered_login()? {
            Some((saved_email, saved_password)) if saved_email == email => saved_password,
            _ => prompt("비밀번호: ").await?,
        },
    };
    let info = session.login(email, &password, remember).await?;
    let role = if info.admin { " (관리자)" } else { "" };
    println!("{} {}{}", "로그인 완료:".bright_green(), info.email.bold(), role);
    Ok(())
}

fn new_view(session: &DiscussionSession) -> LiveView<TerminalSurface> {
    let source: Arc<dyn DiscussionSource> = session.api();
    let (view, _handle) = LiveView::new(
        TerminalSurface::new(),
        source,
        LiveOptions::from_config(session.config()),
    );
    view
}

/// Keep asking for end-of-round actions until the discussion ends.
async fn follow(
    session: &mut DiscussionSession,
    mut view: LiveView<TerminalSurface>,
    discussion_id: &str,
    mut outcome: ViewOutcome,
) -> Result<(), BoxError> {
    loop {
        let options = match &outcome {
            ViewOutcome::AwaitingVote(snapshot) => Some(
                snapshot
                    .current_vote
                    .as_ref()
                    .map(|v| v.options.clone())
                    .unwrap_or_default(),
            ),
            _ => None,
        };
        let Some(options) = options else {
            return finish(view, outcome).await;
        };
        let action = ask_action(&options).await?;
        match session.act(&mut view, discussion_id, action).await? {
            Some(next) => outcome = next,
            None => {
                println!("{}", "토론을 보고서 없이 종료했습니다.".bright_yellow());
                view.shutdown().await;
                return Ok(());
            }
        }
    }
}

async fn finish(view: LiveView<TerminalSurface>, outcome: ViewOutcome) -> Result<(), BoxError> {
    view.shutdown().await;
    match outcome {
        ViewOutcome::Completed(_) | ViewOutcome::AwaitingVote(_) => Ok(()),
        ViewOutcome::Failed(_) => Err("discussion failed".into()),
        ViewOutcome::PollingAbandoned { last_error } => Err(format!(
            "polling abandoned: {}",
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )
        .into()),
        ViewOutcome::Closed => Err("poller stopped unexpectedly".into()),
    }
}

async fn ask_action(options: &[String]) -> Result<RoundAction, BoxError> {
    loop {
        let answer = prompt("선택 [n/r/q]: ").await?;
        match answer.trim() {
            "n" | "N" => {
                let vote = choose_vote(options).await?;
                return Ok(RoundAction::Next { vote });
            }
            "r" | "R" => return Ok(RoundAction::EndWithReport),
            "q" | "Q" => return Ok(RoundAction::EndWithoutReport),
            _ => println!("{}", "n, r, q 중 하나를 입력하세요.".yellow()),
        }
    }
}

async fn choose_vote(options: &[String]) -> Result<Option<String>, BoxError> {
    if options.is_empty() {
        return Ok(None);
    }
    let answer = prompt("투표 번호 (건너뛰려면 Enter): ").await?;
    let vote = answer
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| options.get(i).cloned());
    Ok(vote)
}

/// Read one line from stdin without blocking the runtime.
async fn prompt(label: &str) -> Result<String, BoxError> {
    print!("{}", label.bold());
    io::stdout().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

// ---------------------------------------------------------------------------
// Printing
// ---------------------------------------------------------------------------

fn print_models() {
    for (provider, models) in SUPPORTED_MODELS {
        println!("{}", provider.bright_cyan().bold());
        for m in *models {
            println!("  {:<28} {}", m.id, m.name.dimmed());
        }
    }
}

fn print_team(team: &DebateTeam) {
    println!("{} {}", "토론 ID:".bright_yellow(), team.discussion_id);
    if let Some(judge) = &team.judge {
        println!("  {} {} ({})", "⚖️", judge.name.bold(), judge.model.dimmed());
    }
    for juror in &team.jury {
        let icon = juror.icon.as_deref().unwrap_or("🤖");
        println!("  {} {} ({})", icon, juror.name.bold(), juror.model.dimmed());
    }
}

fn print_evidence(briefing: &EvidenceBriefing) {
    if briefing.web_evidence.is_empty() && briefing.file_evidence.is_empty() {
        println!("{}", "수집된 자료가 없습니다.".dimmed());
        return;
    }
    print_evidence_section("웹 자료", &briefing.web_evidence);
    print_evidence_section("첨부 파일 자료", &briefing.file_evidence);
}

fn print_evidence_section(title: &str, items: &[EvidenceItem]) {
    if items.is_empty() {
        return;
    }
    println!("{}", title.bright_cyan().bold());
    for item in items {
        let source = if item.is_link() {
            item.source.underline()
        } else {
            item.source.normal()
        };
        if item.publication_date.is_empty() {
            println!("  • {source}");
        } else {
            println!("  • {source} {}", format!("({})", item.publication_date).dimmed());
        }
        println!("    {}", item.summary);
    }
}
