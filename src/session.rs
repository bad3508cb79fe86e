use crate::auth::AuthContext;
use crate::backtest::BacktestScope;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

const SESSION_DIR: &str = ".stratenv";
const SESSION_FILE: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = ".stratenv-session.json";

/// What survives between CLI invocations: who is logged in, their token,
/// and which scopes this machine has requested backtests for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub backtested: Vec<BacktestScope>,
}

impl Session {
    pub fn auth(&self) -> AuthContext {
        match &self.token {
            Some(token) => AuthContext::bearer(token.clone()),
            None => AuthContext::anonymous(),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        !self.auth().is_anonymous()
    }

    /// A missing file is an empty session.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No session file at {}", path.display());
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&raw)
            .with_context(|| format!("session file {} is not valid JSON", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        write_private(path, json.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        debug!("Saved session to {}", path.display());
        Ok(())
    }

    pub fn clear(path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("removing {}", path.display())),
        }
    }
}

/// The session holds a bearer token, so only the owner may read it. An
/// existing file is tightened as well.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.flush()
}

pub fn session_path(configured: Option<&Path>, home: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }
    match home {
        Some(home) if !home.as_os_str().is_empty() => home.join(SESSION_DIR).join(SESSION_FILE),
        _ => PathBuf::from(FALLBACK_SESSION_FILE),
    }
}

pub fn default_session_path(configured: Option<&Path>) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    session_path(configured, home.as_deref())
}
