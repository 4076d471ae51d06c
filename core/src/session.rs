//! Authenticated session: the persisted user record and its lifecycle.
//!
//! `SessionStore` abstracts where the single user record lives. `AuthSession`
//! is the explicitly owned handle that the rest of the client receives; it
//! populates itself from the store on startup, re-validates against the
//! identity endpoint, and clears itself on logout or failed re-validation.

use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::MentoraClient;
use crate::errors::{AuthFailure, MentoraError, MentoraResult};
use crate::transport::{HttpTransport, Transport};
use crate::types::User;

/// Trait defining the interface for the persisted user record
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Read the stored user, if any. Unusable records are discarded.
    async fn load(&self) -> MentoraResult<Option<User>>;

    async fn save(&self, user: &User) -> MentoraResult<()>;

    async fn clear(&self) -> MentoraResult<()>;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;

/// JSON file holding the `mentora_user` record
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn discard(&self, reason: &str) -> MentoraResult<Option<User>> {
        warn!("Discarding stored session at {}: {}", self.path.display(), reason);
        self.clear().await?;
        Ok(None)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self) -> MentoraResult<Option<User>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No stored session at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<User>(&content) {
            Ok(user) if user.is_complete() => Ok(Some(user)),
            Ok(_) => self.discard("incomplete user record").await,
            Err(e) => self.discard(&e.to_string()).await,
        }
    }

    async fn save(&self, user: &User) -> MentoraResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(user)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }

    async fn clear(&self) -> MentoraResult<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory implementation of SessionStore
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    user: RwLock<Option<User>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: User) -> Self {
        Self {
            user: RwLock::new(Some(user)),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self) -> MentoraResult<Option<User>> {
        let user = self
            .user
            .read()
            .map_err(|e| MentoraError::SessionError(format!("Failed to acquire read lock: {}", e)))?;
        Ok(user.clone().filter(User::is_complete))
    }

    async fn save(&self, user: &User) -> MentoraResult<()> {
        let mut stored = self
            .user
            .write()
            .map_err(|e| MentoraError::SessionError(format!("Failed to acquire write lock: {}", e)))?;
        *stored = Some(user.clone());
        Ok(())
    }

    async fn clear(&self) -> MentoraResult<()> {
        let mut stored = self
            .user
            .write()
            .map_err(|e| MentoraError::SessionError(format!("Failed to acquire write lock: {}", e)))?;
        *stored = None;
        Ok(())
    }
}

/// Handle to the signed-in user, shared by everything that needs an identity
pub struct AuthSession<T = HttpTransport> {
    client: MentoraClient<T>,
    store: SessionStoreRef,
    user: Arc<RwLock<Option<User>>>,
}

impl<T> Clone for AuthSession<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: Arc::clone(&self.store),
            user: Arc::clone(&self.user),
        }
    }
}

impl<T> Debug for AuthSession<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("store", &self.store)
            .field("user", &self.current_user().map(|u| u.email))
            .finish()
    }
}

impl<T> AuthSession<T> {
    pub fn current_user(&self) -> Option<User> {
        self.user
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user().is_some()
    }

    pub fn client(&self) -> &MentoraClient<T> {
        &self.client
    }

    fn set_user(&self, user: Option<User>) {
        *self
            .user
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = user;
    }

    /// Swap in `fresh` only while `email` is still the signed-in user
    fn replace_user_if(&self, email: &str, fresh: User) -> bool {
        let mut slot = self
            .user
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match slot.as_ref() {
            Some(user) if user.email == email => {
                *slot = Some(fresh);
                true
            }
            _ => false,
        }
    }
}

impl<T: Transport> AuthSession<T> {
    pub fn new(client: MentoraClient<T>, store: SessionStoreRef) -> Self {
        Self {
            client,
            store,
            user: Arc::new(RwLock::new(None)),
        }
    }

    /// Populate the session from the store, re-validating the stored user
    /// with the server. Any failure leaves the session signed out.
    pub async fn restore(&self) -> Option<User> {
        let stored = match self.store.load().await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("No stored user to restore");
                return None;
            }
            Err(e) => {
                warn!("Failed to read stored session: {}", e);
                self.drop_session().await;
                return None;
            }
        };

        info!("Validating stored user {} with the server", stored.email);
        match self.fetch_teacher(&stored.email, None).await {
            Ok(fresh) => {
                if let Err(e) = self.store.save(&fresh).await {
                    warn!("Failed to persist refreshed user: {}", e);
                }
                self.set_user(Some(fresh.clone()));
                Some(fresh)
            }
            Err(e) => {
                warn!("Stored user is no longer valid: {}", e);
                self.drop_session().await;
                None
            }
        }
    }

    /// Validate credentials and persist the resulting profile
    pub async fn login(&self, email: &str, password: Option<&str>) -> MentoraResult<User> {
        let user = self.fetch_teacher(email, password).await?;
        self.store.save(&user).await?;
        self.set_user(Some(user.clone()));
        info!("Signed in as {}", user.email);
        Ok(user)
    }

    pub async fn logout(&self) -> MentoraResult<()> {
        self.set_user(None);
        self.store.clear().await?;
        info!("Signed out");
        Ok(())
    }

    /// Re-check the current user with the server, refreshing the profile in
    /// place. Any error, transport errors included, signs the user out.
    pub async fn revalidate(&self) -> bool {
        let Some(current) = self.current_user() else {
            return false;
        };

        match self.fetch_teacher(&current.email, None).await {
            Ok(fresh) => {
                // Signed out or switched user while the check was in flight
                if !self.replace_user_if(&current.email, fresh.clone()) {
                    debug!("Session changed during validation of {}", current.email);
                    return false;
                }
                if fresh != current {
                    debug!("Refreshing profile for {}", fresh.email);
                    if let Err(e) = self.store.save(&fresh).await {
                        warn!("Failed to persist refreshed user: {}", e);
                    }
                }
                true
            }
            Err(e) => {
                warn!("Periodic validation failed for {}: {}", current.email, e);
                if self.current_user().is_some_and(|u| u.email == current.email) {
                    self.drop_session().await;
                }
                false
            }
        }
    }

    async fn fetch_teacher(&self, email: &str, password: Option<&str>) -> MentoraResult<User> {
        let user = self.client.validate_teacher(email, password).await?;
        if !user.is_complete() {
            return Err(AuthFailure::Rejected("perfil de usuario incompleto".to_string()).into());
        }
        if !user.is_teacher {
            return Err(AuthFailure::NotATeacher.into());
        }
        Ok(user)
    }

    async fn drop_session(&self) {
        if let Err(e) = self.logout().await {
            warn!("Failed to clear stored session: {}", e);
        }
    }
}

impl<T: Transport + 'static> AuthSession<T> {
    /// Re-validate every `every` until the session ends
    pub fn spawn_integrity_check(&self, every: Duration) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !session.is_authenticated() {
                    debug!("Session ended, stopping integrity check");
                    break;
                }
                if !session.revalidate().await {
                    break;
                }
            }
        })
    }
}
