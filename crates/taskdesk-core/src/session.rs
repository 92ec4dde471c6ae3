use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::accessors::LoginPortal;
use crate::context::{Credential, RequestContext};

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    token: String,
    pub user_name: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub portal: LoginPortal,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        credential: &Credential,
        user_name: impl Into<String>,
        user_email: impl Into<String>,
        portal: LoginPortal,
    ) -> Self {
        Self {
            token: credential.expose().to_string(),
            user_name: user_name.into(),
            user_email: user_email.into(),
            portal,
            created_at: Utc::now(),
        }
    }

    pub fn credential(&self) -> Credential {
        Credential::new(self.token.clone())
    }

    pub fn context(&self) -> RequestContext {
        RequestContext::with_credential(self.credential())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_name", &self.user_name)
            .field("user_email", &self.user_email)
            .field("portal", &self.portal)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// The logged-in session, kept as `session.toml` in the data directory.
#[derive(Debug)]
pub struct SessionStore {
    pub path: PathBuf,
}

impl SessionStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;
        let path = data_dir.join("session.toml");
        debug!(session = %path.display(), "opened session store");
        Ok(Self { path })
    }

    #[tracing::instrument(skip(self))]
    pub fn load(&self) -> anyhow::Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let session: Session = toml::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        debug!(user = %session.user_name, "loaded session");
        Ok(Some(session))
    }

    #[tracing::instrument(skip(self, session))]
    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        let serialized = toml::to_string(session).context("failed serializing session")?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(serialized.as_bytes())?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        info!(user = %session.user_name, portal = session.portal.as_str(), "session saved");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn clear(&self) -> anyhow::Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("failed removing {}", self.path.display()))?;
        info!("session cleared");
        Ok(true)
    }
}
