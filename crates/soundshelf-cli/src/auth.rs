//! Account session: tokens persisted between runs and the login/refresh flow.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use soundshelf_types::{AccessToken, AuthTokens, User};

/// Auth endpoints of the catalog API.
pub trait AuthApi {
    fn login(&self, username: &str, password: &str) -> Result<AuthTokens>;
    fn register(&self, username: &str, email: &str, password: &str) -> Result<AuthTokens>;
    fn refresh(&self, refresh: &str) -> Result<AccessToken>;
    fn me(&self, access: &str) -> Result<User>;
}

/// Stored tokens. Both empty means signed out.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl Session {
    fn from_tokens(tokens: AuthTokens) -> Self {
        Self {
            access: Some(tokens.access),
            refresh: Some(tokens.refresh),
        }
    }
}

/// TOML file holding the [`Session`].
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// `<data dir>/soundshelf/session.toml`.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir().ok_or_else(|| anyhow!("no data directory for this user"))?;
        Ok(Self::new(dir.join("soundshelf").join("session.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty session.
    pub fn load(&self) -> Result<Session> {
        if !self.path.exists() {
            return Ok(Session::default());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("read session {}", self.path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parse session {}", self.path.display()))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let raw = toml::to_string(session).context("serialize session")?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("write session {}", self.path.display()))
    }

    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("remove session {}", self.path.display()))
            }
        }
    }
}

/// Exchange credentials for tokens, store them and return the profile.
pub fn login(
    api: &impl AuthApi,
    store: &SessionStore,
    username: &str,
    password: &str,
) -> Result<User> {
    let tokens = api.login(username, password).context("login failed")?;
    sign_in(api, store, tokens)
}

/// Create an account, then behave like [`login`].
pub fn register(
    api: &impl AuthApi,
    store: &SessionStore,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User> {
    let tokens = api
        .register(username, email, password)
        .context("registration failed")?;
    sign_in(api, store, tokens)
}

/// Store fresh tokens, then load the profile through [`load_user`] so a rejected token
/// gets the same refresh-then-clear treatment as a stored one.
fn sign_in(api: &impl AuthApi, store: &SessionStore, tokens: AuthTokens) -> Result<User> {
    store.save(&Session::from_tokens(tokens))?;
    tracing::debug!(path = %store.path().display(), "session saved");
    load_user(api, store)?.ok_or_else(|| anyhow!("fetch profile: new session was rejected"))
}

/// The signed-in user, if any.
///
/// A rejected access token is refreshed once and retried. When that fails too the stored
/// session is discarded and `None` is returned.
pub fn load_user(api: &impl AuthApi, store: &SessionStore) -> Result<Option<User>> {
    let mut session = store.load()?;
    let Some(access) = session.access.clone() else {
        return Ok(None);
    };
    match api.me(&access) {
        Ok(user) => return Ok(Some(user)),
        Err(e) => tracing::debug!("access token rejected: {e:#}"),
    }

    let refreshed = session
        .refresh
        .as_deref()
        .map(|refresh| api.refresh(refresh));
    match refreshed {
        Some(Ok(AccessToken { access })) => match api.me(&access) {
            Ok(user) => {
                session.access = Some(access);
                store.save(&session)?;
                Ok(Some(user))
            }
            Err(e) => {
                tracing::info!("session expired: {e:#}");
                store.clear()?;
                Ok(None)
            }
        },
        Some(Err(e)) => {
            tracing::info!("session expired: {e:#}");
            store.clear()?;
            Ok(None)
        }
        None => {
            store.clear()?;
            Ok(None)
        }
    }
}

pub fn logout(store: &SessionStore) -> Result<()> {
    store.clear()
}
