use super::*;

use std::path::PathBuf;
use std::time::Duration;

use crate::config::CoreConfig;

/// Upper bound on waiting for the first live snapshot after sign in
const SIGN_IN_FEED_TIMEOUT: Duration = Duration::from_secs(5);

#[uniffi::export]
impl MoodlogCore {
    /// Create a new MoodlogCore instance.
    /// This is the entry point for the FFI API.
    #[uniffi::constructor]
    pub fn new() -> Self {
        Self {
            runtime: RwLock::new(None),
            callback_task: Mutex::new(None),
        }
    }

    /// Open the local store in `data_dir`. Must be called before other
    /// operations; calling it again is a no-op.
    ///
    /// A `config.json` inside `data_dir` is honoured when present.
    pub fn init(&self, data_dir: String) -> Result<(), MoodlogFfiError> {
        let mut guard = self.runtime.write();
        if guard.is_some() {
            return Ok(());
        }

        let data_dir = PathBuf::from(data_dir);
        let config_path = data_dir.join("config.json");
        let config = if config_path.exists() {
            let mut config = CoreConfig::load(&config_path).map_err(|e| {
                MoodlogFfiError::Internal {
                    message: format!("{:#}", e),
                }
            })?;
            config.data_dir = data_dir;
            config
        } else {
            CoreConfig::new(data_dir)
        };

        let rt = get_tokio_runtime()?;
        let mut runtime = CoreRuntime::local(config).map_err(|e| MoodlogFfiError::Internal {
            message: format!("{:#}", e),
        })?;
        let _enter = rt.enter();
        runtime.start();
        *guard = Some(runtime);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.runtime.read().is_some()
    }

    /// Sign in (registering on first use). The admin code only counts at
    /// registration. Returns once the feed follows the new user.
    pub fn sign_in(
        &self,
        user_id: String,
        email: String,
        display_name: String,
        admin_code: Option<String>,
    ) -> Result<FfiUser, MoodlogFfiError> {
        let rt = get_tokio_runtime()?;
        let (profile, feed) = {
            let guard = self.runtime.read();
            let runtime = guard.as_ref().ok_or(MoodlogFfiError::CoreNotInitialized)?;
            let profile = rt.block_on(runtime.sign_in(
                &user_id,
                &email,
                &display_name,
                admin_code.as_deref(),
            ))?;
            (profile, runtime.feed())
        };

        // The session driver may be opening the feed concurrently; wait for
        // the first live snapshot either way.
        let owner = profile.id.clone();
        rt.block_on(async {
            feed.open(owner.clone()).await;
            let mut rx = feed.watch();
            let ready = rx.wait_for(|s| s.owner.as_ref() == Some(&owner) && !s.loading);
            if tokio::time::timeout(SIGN_IN_FEED_TIMEOUT, ready).await.is_err() {
                tracing::warn!(%owner, "feed not ready after sign in");
            }
        });
        Ok(FfiUser::from(&profile))
    }

    pub fn sign_out(&self) -> Result<(), MoodlogFfiError> {
        let guard = self.runtime.read();
        let runtime = guard.as_ref().ok_or(MoodlogFfiError::CoreNotInitialized)?;
        runtime.session().sign_out();
        runtime.feed().close();
        Ok(())
    }

    pub fn current_user(&self) -> Option<FfiUser> {
        let guard = self.runtime.read();
        let profile = guard.as_ref()?.session().current()?;
        Some(FfiUser::from(&profile))
    }

    /// Stop background work and release the store.
    pub fn shutdown(&self) {
        self.stop_callback_task();
        if let Some(mut runtime) = self.runtime.write().take() {
            runtime.shutdown();
        }
    }
}

impl Default for MoodlogCore {
    fn default() -> Self {
        Self::new()
    }
}
