use crate::auth::AuthContext;
use crate::client::{build_async_client, ApiClient};
use crate::config::ClientSettings;
use crate::session::{default_session_path, Session};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Everything a command needs to talk to the server: resolved settings and
/// where the session lives.
#[derive(Clone, Debug)]
pub struct AppContext {
    settings: ClientSettings,
    session_path: PathBuf,
}

impl AppContext {
    pub fn initialize(settings: ClientSettings) -> Result<Self> {
        let session_path = default_session_path(settings.session_file.as_deref());
        debug!(
            "Using API {} with session file {}",
            settings.api_base_url,
            session_path.display()
        );
        Ok(Self {
            settings,
            session_path,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    pub fn session(&self) -> Result<Session> {
        Session::load(&self.session_path)
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        session.save(&self.session_path)
    }

    /// `STRATENV_TOKEN` wins over the stored session token.
    pub fn auth(&self, session: &Session) -> AuthContext {
        match self.settings.token.as_deref() {
            Some(token) => AuthContext::bearer(token),
            None => session.auth(),
        }
    }

    pub fn client_with(&self, auth: AuthContext) -> Result<ApiClient> {
        let http = build_async_client(self.settings.timeout)?;
        ApiClient::new(http, &self.settings.api_base_url, auth)
            .with_context(|| format!("invalid API URL {}", self.settings.api_base_url))
    }

    /// Client for the current session, with backtest markers restored from
    /// earlier invocations.
    pub fn api_client(&self) -> Result<ApiClient> {
        let session = self.session()?;
        let auth = self.auth(&session);
        if auth.is_anonymous() {
            warn!("Not logged in; requests are sent without a bearer token");
        } else if let Some(claims) = auth.claims() {
            if claims.is_expired_at(chrono::Utc::now()) {
                warn!("Stored token has expired; run `stratenv login` again");
            }
        }
        let api = self.client_with(auth)?;
        for scope in session.backtested {
            api.mark_backtested(scope);
        }
        Ok(api)
    }

    /// Writes the client's backtest markers back to the session file.
    pub fn persist_backtests(&self, api: &ApiClient) -> Result<()> {
        let mut session = self.session()?;
        session.backtested = api.backtested_scopes();
        self.save_session(&session)
    }
}
