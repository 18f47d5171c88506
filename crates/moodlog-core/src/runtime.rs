use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backend::{BlobStorage, EntryCollection, MemoryBackend, ProfileDirectory};
use crate::config::CoreConfig;
use crate::error::JournalError;
use crate::journal::JournalService;
use crate::models::{validate_user_id, OwnerId, Role, UserProfile};
use crate::session::{drive_feed, Session};
use crate::store::FeedStore;

/// Wires the session, feed store and journal service around one backend.
pub struct CoreRuntime {
    config: CoreConfig,
    session: Session,
    profiles: Arc<dyn ProfileDirectory>,
    feed: Arc<FeedStore>,
    journal: Arc<JournalService>,
    driver: Option<JoinHandle<()>>,
}

impl CoreRuntime {
    pub fn new(
        config: CoreConfig,
        collection: Arc<dyn EntryCollection>,
        blobs: Arc<dyn BlobStorage>,
        profiles: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let session = Session::new();
        let feed = Arc::new(FeedStore::new(
            collection.clone(),
            config.page_size,
            config.live_window,
        ));
        let journal = Arc::new(JournalService::new(
            collection,
            blobs,
            profiles.clone(),
            feed.clone(),
            session.clone(),
        ));

        Self {
            config,
            session,
            profiles,
            feed,
            journal,
            driver: None,
        }
    }

    /// Runtime over the local backend persisted in `config.data_dir`.
    pub fn local(config: CoreConfig) -> Result<Self> {
        let backend = Arc::new(
            MemoryBackend::open(&config.data_dir).with_context(|| {
                format!("Failed to open local store in {}", config.data_dir.display())
            })?,
        );
        info!(data_dir = %config.data_dir.display(), "opened local store");
        Ok(Self::new(config, backend.clone(), backend.clone(), backend))
    }

    /// Spawn the task that keeps the feed on the signed-in user. Must be
    /// called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.driver.is_some() {
            return;
        }
        let rx = self.session.subscribe();
        self.driver = Some(tokio::spawn(drive_feed(self.feed.clone(), rx)));
    }

    pub fn shutdown(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
        self.feed.close();
        info!("core runtime stopped");
    }

    /// Sign in, registering the user on first use.
    ///
    /// The role is decided once, at registration: the admin code grants the
    /// admin role when it matches the configured one. Later sign-ins use the
    /// stored profile and ignore the code.
    pub async fn sign_in(
        &self,
        id: &str,
        email: &str,
        display_name: &str,
        admin_code: Option<&str>,
    ) -> Result<UserProfile, JournalError> {
        let id = id.trim();
        validate_user_id(id)?;

        let profile = match self.profiles.get_profile(&OwnerId::new(id)).await? {
            Some(stored) => {
                debug!(user = %stored.id, "known user");
                stored
            }
            None => {
                let role = Role::for_signup(admin_code, self.config.admin_code.as_deref());
                let profile = UserProfile {
                    email: email.to_string(),
                    display_name: display_name.to_string(),
                    ..UserProfile::new(id)
                }
                .with_role(role);
                self.profiles.register(profile).await?
            }
        };
        self.session.sign_in(profile.clone());
        Ok(profile)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn feed(&self) -> Arc<FeedStore> {
        self.feed.clone()
    }

    pub fn journal(&self) -> Arc<JournalService> {
        self.journal.clone()
    }
}

impl Drop for CoreRuntime {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}
