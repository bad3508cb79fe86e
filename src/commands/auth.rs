use crate::auth::{AuthContext, AuthToken, Credentials};
use crate::commands::read_password;
use crate::context::AppContext;
use crate::session::Session;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::info;

pub async fn login(app: &AppContext, username: &str, password: Option<String>) -> Result<()> {
    let credentials = Credentials::new(username, read_password(password)?);
    let api = app.client_with(AuthContext::anonymous())?;
    let token = api
        .login(&credentials)
        .await
        .with_context(|| format!("login failed for {}", username.trim()))?;
    store_session(app, username.trim(), &token)?;
    println!("Logged in as {}", username.trim());
    Ok(())
}

pub async fn signup(app: &AppContext, username: &str, password: Option<String>) -> Result<()> {
    let credentials = Credentials::new(username, read_password(password)?);
    let api = app.client_with(AuthContext::anonymous())?;
    let token = match api.signup(&credentials).await {
        Ok(token) => token,
        Err(err) if err.is_conflict() => {
            return Err(anyhow!("username {} already exists", username.trim()));
        }
        Err(err) => return Err(err).context("signup failed"),
    };
    store_session(app, username.trim(), &token)?;
    println!("Created account {} and logged in", username.trim());
    Ok(())
}

pub async fn logout(app: &AppContext) -> Result<()> {
    Session::clear(app.session_path())?;
    info!("Removed session file {}", app.session_path().display());
    println!("Logged out");
    Ok(())
}

pub async fn whoami(app: &AppContext) -> Result<()> {
    let session = app.session()?;
    let auth = app.auth(&session);
    println!("API: {}", app.settings().api_base_url);
    if auth.is_anonymous() {
        println!("Not logged in");
        return Ok(());
    }

    let claims = auth.claims();
    let user = session
        .username
        .clone()
        .or_else(|| claims.as_ref().and_then(|c| c.sub.clone()))
        .unwrap_or_else(|| "unknown user".to_string());
    println!("User: {}", user);
    if app.settings().token.is_some() {
        println!("Token: from STRATENV_TOKEN");
    }
    match claims.as_ref().and_then(|c| c.expires_at()) {
        Some(expires) if expires <= Utc::now() => println!("Token expired at {}", expires),
        Some(expires) => println!("Token expires at {}", expires),
        None => println!("Token expiry unknown"),
    }
    Ok(())
}

// A different user starts with no backtest markers.
fn store_session(app: &AppContext, username: &str, token: &AuthToken) -> Result<()> {
    let previous = app.session()?;
    let backtested = if previous.username.as_deref() == Some(username) {
        previous.backtested
    } else {
        Vec::new()
    };
    app.save_session(&Session {
        username: Some(username.to_string()),
        token: Some(token.access_token.clone()),
        backtested,
    })?;
    info!("Saved session to {}", app.session_path().display());
    Ok(())
}
