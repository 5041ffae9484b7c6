//! Who the game is launched as.
//!
//! A [`Session`] is either an offline identity (empty token)
//! or an Ely.by account. [`SessionProvider`] keeps the current
//! account in the settings store; the actual login exchange
//! is done by an [`AuthCollaborator`].

use std::sync::Arc;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use serde_json::Value;
use sl_core::{info, ErrorKind, JsonFileError, SettingsStore};
use thiserror::Error;

mod ely;
pub use ely::ElyByPasswordAuth;

#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub uuid: String,
    /// Empty for offline play.
    pub token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("uuid", &self.uuid)
            .field("token", &if self.token.is_empty() { "" } else { "[REDACTED]" })
            .finish()
    }
}

impl Session {
    /// An offline identity with a fresh random uuid.
    #[must_use]
    pub fn offline(username: &str) -> Self {
        Self {
            username: username.to_owned(),
            uuid: uuid::Uuid::new_v4().to_string(),
            token: String::new(),
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        !self.token.is_empty()
    }
}

const ADJECTIVES: &[&str] = &[
    "Cool", "Mighty", "Epic", "Crazy", "Wild", "Sneaky", "Happy", "Angry", "Funny", "Lucky",
    "Dark", "Light", "Red", "Blue", "Green", "Golden", "Silver", "Iron", "Diamond", "Emerald",
];
const NOUNS: &[&str] = &[
    "Player", "Gamer", "Hero", "Villain", "Warrior", "Miner", "Builder", "Explorer", "Adventurer",
    "Hunter", "Wizard", "Knight", "Ninja", "Pirate", "Dragon", "Wolf", "Fox", "Bear", "Tiger",
    "Ender", "Sosun",
];
const NUMBERS: &[&str] = &["123", "42", "99", "2023", "777", "1337", "69", "100", "1", "0"];

/// Something like `MightyMiner` or `LuckyFox1337`.
#[must_use]
pub fn random_username() -> String {
    let mut rng = rand::rng();
    let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("Cool");
    let noun = NOUNS.choose(&mut rng).copied().unwrap_or("Player");
    let with_number = [true, false].choose(&mut rng).copied().unwrap_or(false);
    let number = if with_number {
        NUMBERS.choose(&mut rng).copied().unwrap_or_default()
    } else {
        ""
    };
    format!("{adjective}{noun}{number}")
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("couldn't log in:\n{0}")]
    Rejected(String),
    #[error("couldn't reach the login server:\n{0}")]
    Request(String),
    #[error("couldn't save the session:\n{0}")]
    Store(#[from] JsonFileError),
    #[error("this account provider doesn't support {0} login")]
    Unsupported(&'static str),
}

impl AuthError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::Rejected(_) | AuthError::Request(_) | AuthError::Unsupported(_) => {
                ErrorKind::AuthenticationFailed
            }
            AuthError::Store(_) => ErrorKind::DiskWriteError,
        }
    }
}

/// Login details handed to an [`AuthCollaborator`].
///
/// A collaborator answers the kinds it supports and
/// rejects the rest with [`AuthError::Unsupported`].
#[derive(Clone)]
pub enum Credentials {
    Password {
        username: String,
        password: String,
    },
    /// A device code the user has already confirmed
    /// on the provider's website.
    DeviceCode { device_code: String },
}

impl Credentials {
    #[must_use]
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Password {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Who is logging in, for logs. Never the secret.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Credentials::Password { username, .. } => username,
            Credentials::DeviceCode { .. } => "device code",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Credentials::DeviceCode { .. } => f.debug_struct("DeviceCode").finish_non_exhaustive(),
        }
    }
}

/// Performs the actual login exchange with an identity provider.
#[async_trait]
pub trait AuthCollaborator: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError>;
}

const KEY_TOKEN: &str = "ely_access_token";
const KEY_USERNAME: &str = "ely_username";
const KEY_UUID: &str = "ely_uuid";
const KEY_LOGGED_IN: &str = "ely_logged_in";

/// The persisted account, read from and written to the settings store.
pub struct SessionProvider {
    store: Arc<dyn SettingsStore>,
    auth: Arc<dyn AuthCollaborator>,
}

impl SessionProvider {
    pub fn new(store: Arc<dyn SettingsStore>, auth: Arc<dyn AuthCollaborator>) -> Self {
        Self { store, auth }
    }

    /// The logged-in account, if any. No network.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        let logged_in = self
            .store
            .get(KEY_LOGGED_IN)
            .and_then(|n| n.as_bool())
            .unwrap_or(false);
        if !logged_in {
            return None;
        }
        let get = |key: &str| {
            self.store
                .get(key)
                .and_then(|n| n.as_str().map(str::to_owned))
                .unwrap_or_default()
        };
        let session = Session {
            username: get(KEY_USERNAME),
            uuid: get(KEY_UUID),
            token: get(KEY_TOKEN),
        };
        (!session.username.is_empty() && session.is_online()).then_some(session)
    }

    /// Logs in and persists the account.
    pub async fn authenticate(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        info!("Logging in as {}", credentials.label());
        let session = self.auth.authenticate(credentials).await?;
        self.persist(&session, true)?;
        info!("Logged in as {}", session.username);
        Ok(session)
    }

    /// Forgets the account. No network.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.persist(
            &Session {
                username: String::new(),
                uuid: String::new(),
                token: String::new(),
            },
            false,
        )?;
        info!("Logged out");
        Ok(())
    }

    fn persist(&self, session: &Session, logged_in: bool) -> Result<(), AuthError> {
        self.store.set(KEY_USERNAME, Value::String(session.username.clone()));
        self.store.set(KEY_UUID, Value::String(session.uuid.clone()));
        self.store.set(KEY_TOKEN, Value::String(session.token.clone()));
        self.store.set(KEY_LOGGED_IN, Value::Bool(logged_in));
        self.store.flush()?;
        Ok(())
    }
}
