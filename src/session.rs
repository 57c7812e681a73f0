//! User-facing flows: login, topic submission, and the per-round actions
//! that follow each `waiting_for_vote` pause.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::api::{ApiClient, Upload};
use crate::config::ViewerConfig;
use crate::error::{Result, ViewerError};
use crate::live::{LiveView, ViewOutcome};
use crate::model::{DebateTeam, EvidenceBriefing, ProgressUpdate, TurnRequest};
use crate::orchestration::{wait_for_team, OrchestrationStep};
use crate::render::RenderSurface;
use crate::store::{now_secs, CredentialStore, TokenClaims};

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInfo {
    pub email: String,
    pub admin: bool,
}

/// What the user chose at the end of a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundAction {
    Next { vote: Option<String> },
    EndWithReport,
    EndWithoutReport,
}

pub struct DiscussionSession {
    api: Arc<ApiClient>,
    store: CredentialStore,
    config: ViewerConfig,
    evidence: HashMap<String, EvidenceBriefing>,
}

impl DiscussionSession {
    pub fn new(config: ViewerConfig) -> Self {
        let api = Arc::new(ApiClient::from_config(&config));
        let store = CredentialStore::new(config.credentials_path());
        Self::with_parts(config, api, store)
    }

    pub fn with_parts(config: ViewerConfig, api: Arc<ApiClient>, store: CredentialStore) -> Self {
        Self {
            api,
            store,
            config,
            evidence: HashMap::new(),
        }
    }

    pub fn api(&self) -> Arc<ApiClient> {
        Arc::clone(&self.api)
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<LoginInfo> {
        let token = self.api.login(email, password).await?;
        self.store
            .record_login(email, password, &token.access_token, remember)?;
        let admin = TokenClaims::decode(&token.access_token).is_some_and(|c| c.is_admin());
        info!(%email, admin, "logged in");
        Ok(LoginInfo {
            email: email.to_string(),
            admin,
        })
    }

    pub fn logout(&self) -> Result<()> {
        self.store.logout()?;
        info!("logged out");
        Ok(())
    }

    /// Email and password saved by an earlier `remember` login.
    pub fn remembered_login(&self) -> Result<Option<(String, String)>> {
        let creds = self.store.load()?;
        Ok(creds.remembered_email.zip(creds.remembered_password))
    }

    /// Stored, unexpired bearer token.
    pub fn token(&self) -> Result<String> {
        self.store
            .valid_token(now_secs())?
            .ok_or(ViewerError::Unauthorized)
    }

    // -----------------------------------------------------------------------
    // Discussion setup
    // -----------------------------------------------------------------------

    /// Submit a topic (with an optional evidence file) and wait until the
    /// backend has assembled the debate team.
    pub async fn submit_topic<F>(&self, topic: &str, file: Option<&Path>, on_progress: F) -> Result<DebateTeam>
    where
        F: FnMut(&ProgressUpdate, OrchestrationStep),
    {
        let token = self.token()?;
        let upload = match file {
            Some(path) => Some(Upload::from_path(path).await?),
            None => None,
        };
        let created = self.api.create_discussion(&token, topic, upload).await?;
        info!(discussion_id = %created.discussion_id, "topic submitted; waiting for orchestration");
        wait_for_team(
            self.api.as_ref(),
            &created.discussion_id,
            &token,
            &self.config.progress,
            on_progress,
        )
        .await
    }

    /// Run the first round with optional per-agent model overrides.
    pub async fn start_debate<S: RenderSurface>(
        &self,
        view: &mut LiveView<S>,
        discussion_id: &str,
        model_overrides: BTreeMap<String, String>,
    ) -> Result<ViewOutcome> {
        let token = self.token()?;
        let body = TurnRequest {
            user_vote: None,
            model_overrides: (!model_overrides.is_empty()).then_some(model_overrides),
        };
        self.api.submit_turn(discussion_id, &token, &body).await?;
        view.begin_round(discussion_id, &token, true).await;
        Ok(view.run_until_terminal().await)
    }

    /// Attach to an existing discussion and follow it from the beginning.
    pub async fn watch<S: RenderSurface>(&self, view: &mut LiveView<S>, discussion_id: &str) -> Result<ViewOutcome> {
        let token = self.token()?;
        view.begin_round(discussion_id, &token, true).await;
        Ok(view.run_until_terminal().await)
    }

    /// Carry out the user's end-of-round choice.
    ///
    /// `EndWithoutReport` archives the discussion and returns `None`; the
    /// other actions follow the discussion to its next terminal state.
    pub async fn act<S: RenderSurface>(
        &mut self,
        view: &mut LiveView<S>,
        discussion_id: &str,
        action: RoundAction,
    ) -> Result<Option<ViewOutcome>> {
        match action {
            RoundAction::Next { vote } => self.advance_round(view, discussion_id, vote).await.map(Some),
            RoundAction::EndWithReport => self.end_with_report(view, discussion_id).await.map(Some),
            RoundAction::EndWithoutReport => {
                self.end_without_report(discussion_id).await?;
                Ok(None)
            }
        }
    }

    pub async fn advance_round<S: RenderSurface>(
        &self,
        view: &mut LiveView<S>,
        discussion_id: &str,
        vote: Option<String>,
    ) -> Result<ViewOutcome> {
        let token = self.token()?;
        let body = TurnRequest { user_vote: vote, model_overrides: None };
        self.api.submit_turn(discussion_id, &token, &body).await?;
        view.begin_round(discussion_id, &token, false).await;
        Ok(view.run_until_terminal().await)
    }

    /// Ask for the final report and wait for the `completed` snapshot.
    pub async fn end_with_report<S: RenderSurface>(
        &self,
        view: &mut LiveView<S>,
        discussion_id: &str,
    ) -> Result<ViewOutcome> {
        let token = self.token()?;
        self.api.complete(discussion_id, &token).await?;
        info!(%discussion_id, "report requested");
        view.begin_round(discussion_id, &token, false).await;
        Ok(view.run_until_terminal().await)
    }

    pub async fn end_without_report(&mut self, discussion_id: &str) -> Result<()> {
        let token = self.token()?;
        self.api.archive(discussion_id, &token).await?;
        self.evidence.remove(discussion_id);
        info!(%discussion_id, "discussion archived without report");
        Ok(())
    }

    /// Evidence briefing for a discussion, fetched once and cached.
    pub async fn evidence(&mut self, discussion_id: &str) -> Result<EvidenceBriefing> {
        if let Some(cached) = self.evidence.get(discussion_id) {
            return Ok(cached.clone());
        }
        let token = self.token()?;
        let snapshot = self.api.get_discussion(discussion_id, &token).await?;
        let briefing = snapshot.evidence_briefing.unwrap_or_default();
        self.evidence.insert(discussion_id.to_string(), briefing.clone());
        Ok(briefing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_in(dir: &tempfile::TempDir) -> DiscussionSession {
        let config = ViewerConfig {
            credentials_path: Some(dir.path().join("creds.toml")),
            ..Default::default()
        };
        DiscussionSession::new(config)
    }

    #[test]
    fn token_without_login_is_unauthorized() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);
        assert!(matches!(session.token(), Err(ViewerError::Unauthorized)));
    }

    #[test]
    fn remembered_login_requires_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);
        assert_eq!(session.remembered_login().unwrap(), None);
        session.store.record_login("a@b.c", "pw", "tok", true).unwrap();
        assert_eq!(
            session.remembered_login().unwrap(),
            Some(("a@b.c".to_string(), "pw".to_string()))
        );
    }

    #[test]
    fn logout_clears_token() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_in(&dir);
        session.store.record_login("a@b.c", "pw", "tok", false).unwrap();
        assert_eq!(session.token().unwrap(), "tok");
        session.logout().unwrap();
        assert!(session.token().is_err());
    }

    #[tokio::test]
    async fn cached_evidence_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        let briefing = EvidenceBriefing::default();
        session.evidence.insert("d1".into(), briefing.clone());
        // No token stored: a network call would fail with Unauthorized.
        assert_eq!(session.evidence("d1").await.unwrap(), briefing);
    }
}
