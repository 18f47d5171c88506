//! Signed-in user, published as a stream of changes.
//!
//! The feed follows the session: `drive_feed` opens it on sign-in, reopens
//! it when the user changes and closes it on sign-out.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::models::{OwnerId, UserProfile};
use crate::store::FeedStore;

#[derive(Clone)]
pub struct Session {
    tx: Arc<watch::Sender<Option<UserProfile>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn sign_in(&self, profile: UserProfile) {
        info!(user = %profile.id, role = ?profile.role, "signed in");
        self.tx.send_replace(Some(profile));
    }

    pub fn sign_out(&self) {
        if self.tx.send_replace(None).is_some() {
            info!("signed out");
        }
    }

    pub fn current(&self) -> Option<UserProfile> {
        self.tx.borrow().clone()
    }

    pub fn current_owner(&self) -> Option<OwnerId> {
        self.tx.borrow().as_ref().map(|p| p.id.clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserProfile>> {
        self.tx.subscribe()
    }
}

/// Keep `feed` pointed at the signed-in user until every `Session` handle is
/// dropped.
pub async fn drive_feed(feed: Arc<FeedStore>, mut rx: watch::Receiver<Option<UserProfile>>) {
    loop {
        let owner = rx.borrow_and_update().as_ref().map(|p| p.id.clone());
        match owner {
            Some(owner) => feed.open(owner).await,
            None => feed.close(),
        }
        if rx.changed().await.is_err() {
            debug!("session dropped, feed driver exiting");
            break;
        }
    }
}
