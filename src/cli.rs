use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::catalog;

#[derive(Parser, Debug)]
#[command(name = "discussion-viewer")]
#[command(version)]
#[command(about = "Follow multi-agent discussions from the terminal")]
pub struct Args {
    /// Backend origin (overrides the config file and DISCUSSION_VIEWER_BASE_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Render every turn at once instead of typing it out
    #[arg(long, global = true)]
    pub no_animation: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Log in and store the access token
    Login {
        email: String,
        /// Password; prompted for when omitted
        #[arg(long)]
        password: Option<String>,
        /// Keep the email and password for the next login
        #[arg(long)]
        remember: bool,
    },
    /// Forget the stored access token
    Logout,
    /// Submit a topic, wait for the team, and follow the first round
    Start {
        topic: String,
        /// Evidence file attached to the topic
        #[arg(long)]
        file: Option<PathBuf>,
        /// Per-agent model override, e.g. `--model Economist=gpt-4o`
        #[arg(long = "model", value_parser = parse_model_override)]
        models: Vec<(String, String)>,
    },
    /// Follow an existing discussion
    Watch { discussion_id: String },
    /// Continue to the next round, optionally casting a vote
    Next {
        discussion_id: String,
        #[arg(long)]
        vote: Option<String>,
    },
    /// End the discussion and wait for the final report
    Report { discussion_id: String },
    /// End the discussion without a report
    Archive { discussion_id: String },
    /// Print the evidence briefing
    Evidence { discussion_id: String },
    /// List the selectable models
    Models,
}

/// Parse `AGENT=MODEL`, rejecting models outside the catalog.
pub fn parse_model_override(s: &str) -> Result<(String, String), String> {
    let (agent, model) = s
        .split_once('=')
        .ok_or_else(|| format!("expected AGENT=MODEL, got `{s}`"))?;
    let (agent, model) = (agent.trim(), model.trim());
    if agent.is_empty() {
        return Err("agent name must not be empty".to_string());
    }
    if !catalog::is_supported(model) {
        return Err(format!("unsupported model `{model}` (see `discussion-viewer models`)"));
    }
    Ok((agent.to_string(), model.to_string()))
}
